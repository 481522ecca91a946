// Network-calling action handlers
//
// Each handler loads what it needs through `SpmsOps`, refuses locally when
// the caller lacks permission, and reports the result as an `ActionOutcome`.

pub mod caller;
pub mod comments;
pub mod documents;
pub mod outcome;
pub mod project;
pub mod team;

pub use caller::CallerContext;
pub use comments::CommentWorkflow;
pub use documents::{DocumentCommand, DocumentView, DocumentWorkflow};
pub use outcome::{ActionOutcome, Notification, NotificationLevel};
pub use project::ProjectWorkflow;
pub use team::TeamWorkflow;
