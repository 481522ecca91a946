// SPMS Workflow Library - document approval, team ordering and comment mentions
// This exposes the core components for the CLI, testing and integration

pub mod api;
pub mod approval;
pub mod config;
pub mod context;
pub mod domain;
pub mod mentions;
pub mod observability;
pub mod team;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use api::{ApiError, SpmsClient, SpmsOps};
pub use approval::{
    can_perform, check, permitted_actions, Action, ApprovalState, DocumentApprovalMachine,
    DocumentGate, GateError, PermittedAction,
};
pub use config::{config, init_config, SpmsConfig};
pub use context::{AppContext, ColorMode, EditorBlocker, LayoutKind};
pub use domain::{ApprovalFlags, CallerRole, CallerRoles, DocumentKind, ProjectStatus, Stage};
pub use mentions::{mentioned_users, parse_html, prepopulate, to_html, EditorDocument};
pub use observability::{api_metrics, create_action_span, ApiMetrics, OperationTimer};
pub use team::{promote_leader, reorder, TeamError};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{
    ActionOutcome, CommentWorkflow, DocumentCommand, DocumentWorkflow, Notification,
    ProjectWorkflow, TeamWorkflow,
};
