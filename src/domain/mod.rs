// Domain model shared by the approval gate, team tools and API client

pub mod roles;
pub mod types;

pub use roles::{stage_roles, CallerRole, CallerRoles};
pub use types::{
    ApprovalFlags, BusinessArea, Comment, DocumentKind, DocumentStatus, FullProject, Project,
    ProjectDocument, ProjectDocuments, ProjectKind, ProjectMember, ProjectRole, ProjectStatus,
    Stage, User, UserSummary,
};
