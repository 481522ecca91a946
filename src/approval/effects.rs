// Project status side effects of document lifecycle changes

use crate::domain::{DocumentKind, ProjectStatus};

/// Status the project should move to after deleting a document, if any.
///
/// `documents_before_delete` counts every document on the project, including
/// the one being deleted. Zero means the listing is stale, so the status is left alone.
pub fn status_after_delete(
    kind: DocumentKind,
    documents_before_delete: usize,
) -> Option<ProjectStatus> {
    if kind == DocumentKind::ProjectClosure {
        Some(ProjectStatus::Updating)
    } else if documents_before_delete == 1 {
        Some(ProjectStatus::Pending)
    } else {
        None
    }
}

/// Creating a closure document requests closure of the project.
pub fn status_after_closure_request() -> ProjectStatus {
    ProjectStatus::ClosureRequested
}

/// Reopening removes the closure and puts the project back into updating.
pub fn status_after_reopen() -> ProjectStatus {
    ProjectStatus::Updating
}

/// Closure may only be requested for projects that are still running.
pub fn can_request_closure(status: ProjectStatus) -> bool {
    !status.is_closed()
        && !matches!(
            status,
            ProjectStatus::ClosureRequested | ProjectStatus::Closing
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleting_closure_returns_to_updating() {
        assert_eq!(
            status_after_delete(DocumentKind::ProjectClosure, 4),
            Some(ProjectStatus::Updating)
        );
    }

    #[test]
    fn test_deleting_last_document_resets_to_pending() {
        assert_eq!(
            status_after_delete(DocumentKind::ConceptPlan, 1),
            Some(ProjectStatus::Pending)
        );
        assert_eq!(status_after_delete(DocumentKind::ProgressReport, 3), None);
    }

    #[test]
    fn test_empty_listing_leaves_status_alone() {
        assert_eq!(status_after_delete(DocumentKind::ConceptPlan, 0), None);
        assert_eq!(
            status_after_delete(DocumentKind::ProjectClosure, 0),
            Some(ProjectStatus::Updating)
        );
    }

    #[test]
    fn test_closure_request_allowed_statuses() {
        assert!(can_request_closure(ProjectStatus::Active));
        assert!(can_request_closure(ProjectStatus::Updating));
        assert!(!can_request_closure(ProjectStatus::ClosureRequested));
        assert!(!can_request_closure(ProjectStatus::Terminated));
        assert_eq!(status_after_closure_request(), ProjectStatus::ClosureRequested);
        assert_eq!(status_after_reopen(), ProjectStatus::Updating);
    }
}
