pub mod client;
pub mod errors;
pub mod ops;
pub mod types;

pub use client::SpmsClient;
pub use errors::ApiError;
#[cfg(any(test, feature = "testing"))]
pub use ops::MockSpmsOps;
pub use ops::SpmsOps;
pub use types::{
    ClosureOutcome, CloseProjectRequest, CreateCommentRequest, CreateProgressReportRequest, DirectorateMember,
    DocumentActionRequest, MentionNotification,
};
