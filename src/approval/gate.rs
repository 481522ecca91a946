// Three-stage approval gate
//
// Pure predicate over a document's flags, the project status and the caller's roles.
// The result is an affordance hint: the API remains the authority on every mutation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{
    ApprovalFlags, CallerRole, CallerRoles, DocumentKind, ProjectDocument, ProjectStatus, Stage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Approve,
    Recall,
    SendBack,
    Reopen,
    Delete,
    CreateProgressReport,
}

impl Action {
    /// Path segment used by `documents/actions/{action}`.
    pub fn api_name(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Recall => "recall",
            Action::SendBack => "send_back",
            Action::Reopen => "reopen",
            Action::Delete => "delete",
            Action::CreateProgressReport => "create_progress_report",
        }
    }

    /// Whether this action is routed through the staged action endpoint.
    pub fn is_staged(&self) -> bool {
        matches!(
            self,
            Action::Approve | Action::Recall | Action::SendBack | Action::Reopen
        )
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "approve" => Some(Action::Approve),
            "recall" => Some(Action::Recall),
            "send_back" => Some(Action::SendBack),
            "reopen" => Some(Action::Reopen),
            "delete" => Some(Action::Delete),
            "create_progress_report" => Some(Action::CreateProgressReport),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// S0..S3 in approval order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApprovalState {
    Unapproved,
    LeadApproved,
    BusinessAreaApproved,
    FullyApproved,
}

impl ApprovalState {
    /// Classify flags by how many contiguous stages are granted.
    pub fn from_flags(flags: &ApprovalFlags) -> Self {
        match flags.next_stage() {
            Some(Stage::ProjectLead) => ApprovalState::Unapproved,
            Some(Stage::BusinessAreaLead) => ApprovalState::LeadApproved,
            Some(Stage::Directorate) => ApprovalState::BusinessAreaApproved,
            None => ApprovalState::FullyApproved,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApprovalState::Unapproved => "S0",
            ApprovalState::LeadApproved => "S1",
            ApprovalState::BusinessAreaApproved => "S2",
            ApprovalState::FullyApproved => "S3",
        }
    }
}

/// Everything about a document the gate needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGate {
    pub kind: DocumentKind,
    pub flags: ApprovalFlags,
    /// Progress reports already attached to the project.
    pub progress_report_count: usize,
    /// Whether the project's division has any directorate members.
    pub directorate_available: bool,
}

impl DocumentGate {
    pub fn new(kind: DocumentKind, flags: ApprovalFlags) -> Self {
        Self {
            kind,
            flags,
            progress_report_count: 0,
            directorate_available: true,
        }
    }

    pub fn for_document(document: &ProjectDocument, progress_report_count: usize) -> Self {
        Self {
            kind: document.kind,
            flags: document.flags,
            progress_report_count,
            directorate_available: true,
        }
    }

    pub fn with_progress_reports(mut self, count: usize) -> Self {
        self.progress_report_count = count;
        self
    }

    pub fn with_directorate_available(mut self, available: bool) -> Self {
        self.directorate_available = available;
        self
    }

    pub fn state(&self) -> ApprovalState {
        ApprovalState::from_flags(&self.flags)
    }
}

/// Reason a gate check did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("{stage} is not the next stage awaiting approval")]
    OutOfOrder { stage: Stage },
    #[error("{stage} approval has not been granted")]
    NotGranted { stage: Stage },
    #[error("{stage} approval is already superseded by the next stage")]
    Superseded { stage: Stage },
    #[error("send back is not applicable from {stage}")]
    NotApplicable { stage: Stage },
    #[error("{action} only applies to {expected} documents, not {actual}")]
    WrongKind {
        action: Action,
        expected: DocumentKind,
        actual: DocumentKind,
    },
    #[error("project status {status} does not allow this action")]
    ProjectStatus { status: ProjectStatus },
    #[error("caller has no role that may act on {stage}")]
    MissingRole { stage: Stage },
    #[error("no directorate members are assigned to this business area's division")]
    DirectorateUnavailable,
    #[error("document is fully approved")]
    FullyApproved,
    #[error("document has already been submitted")]
    AlreadySubmitted,
    #[error("a progress report already exists for this project")]
    ProgressReportExists,
    #[error("approval flags are out of order: {flags:?}")]
    InconsistentFlags { flags: ApprovalFlags },
}

/// Check one action against the gate, returning the first failed condition.
pub fn check(
    action: Action,
    stage: Stage,
    document: &DocumentGate,
    project_status: ProjectStatus,
    roles: &CallerRoles,
) -> Result<(), GateError> {
    let flags = &document.flags;

    match action {
        Action::Approve => {
            if flags.get(stage) {
                return Err(GateError::OutOfOrder { stage });
            }
            if flags.next_stage() != Some(stage) {
                return Err(GateError::OutOfOrder { stage });
            }
            require_stage_role(stage, roles)?;
            if stage == Stage::BusinessAreaLead
                && !document.directorate_available
                && !roles.contains(CallerRole::Superuser)
            {
                return Err(GateError::DirectorateUnavailable);
            }
            Ok(())
        }
        Action::Recall => {
            if !flags.get(stage) {
                return Err(GateError::NotGranted { stage });
            }
            if let Some(next) = stage.next() {
                if flags.get(next) {
                    return Err(GateError::Superseded { stage });
                }
            }
            require_stage_role(stage, roles)
        }
        Action::SendBack => {
            let previous = stage.previous().ok_or(GateError::NotApplicable { stage })?;
            if !flags.get(previous) {
                return Err(GateError::NotGranted { stage: previous });
            }
            if flags.get(stage) {
                return Err(GateError::Superseded { stage: previous });
            }
            require_stage_role(stage, roles)
        }
        Action::Reopen => {
            require_kind(action, DocumentKind::ProjectClosure, document.kind)?;
            if !project_status.is_closed() {
                return Err(GateError::ProjectStatus {
                    status: project_status,
                });
            }
            require_stage_role(Stage::ProjectLead, roles)
        }
        Action::Delete => {
            if flags.directorate {
                return Err(GateError::FullyApproved);
            }
            let deletable = !flags.project_lead
                || (document.kind == DocumentKind::ProjectPlan
                    && document.progress_report_count == 0);
            if !deletable {
                return Err(GateError::AlreadySubmitted);
            }
            require_stage_role(Stage::ProjectLead, roles)
        }
        Action::CreateProgressReport => {
            require_kind(action, DocumentKind::ProjectPlan, document.kind)?;
            if !flags.is_fully_approved() {
                return Err(GateError::NotGranted {
                    stage: flags.next_stage().unwrap_or(Stage::Directorate),
                });
            }
            if document.progress_report_count > 0 {
                return Err(GateError::ProgressReportExists);
            }
            require_stage_role(Stage::ProjectLead, roles)
        }
    }
}

/// `true` when the caller should be offered `action` at `stage`.
///
/// `stage` selects the approval stage for approve/recall/send back; it is
/// ignored for reopen, delete and progress report creation, which all use
/// the stage-1 role set.
pub fn can_perform(
    action: Action,
    stage: Stage,
    document: &DocumentGate,
    project_status: ProjectStatus,
    roles: &CallerRoles,
) -> bool {
    check(action, stage, document, project_status, roles).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermittedAction {
    pub action: Action,
    pub stage: Option<Stage>,
}

impl fmt::Display for PermittedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{}({})", self.action, stage.number()),
            None => write!(f, "{}", self.action),
        }
    }
}

/// Every action the caller may currently take on the document.
pub fn permitted_actions(
    document: &DocumentGate,
    project_status: ProjectStatus,
    roles: &CallerRoles,
) -> Vec<PermittedAction> {
    let mut permitted = Vec::new();

    for action in [Action::Approve, Action::Recall, Action::SendBack] {
        for stage in Stage::ALL {
            if can_perform(action, stage, document, project_status, roles) {
                permitted.push(PermittedAction {
                    action,
                    stage: Some(stage),
                });
            }
        }
    }

    if can_perform(Action::Reopen, Stage::ProjectLead, document, project_status, roles) {
        permitted.push(PermittedAction {
            action: Action::Reopen,
            stage: Some(reopen_stage(&document.flags)),
        });
    }

    for action in [Action::Delete, Action::CreateProgressReport] {
        if can_perform(action, Stage::ProjectLead, document, project_status, roles) {
            permitted.push(PermittedAction {
                action,
                stage: None,
            });
        }
    }

    permitted
}

/// Stage a reopen is issued from: the highest stage whose approval is granted.
pub fn reopen_stage(flags: &ApprovalFlags) -> Stage {
    if flags.directorate {
        Stage::Directorate
    } else if flags.business_area_lead {
        Stage::BusinessAreaLead
    } else {
        Stage::ProjectLead
    }
}

fn require_stage_role(stage: Stage, roles: &CallerRoles) -> Result<(), GateError> {
    if roles.can_act_on(stage) {
        Ok(())
    } else {
        Err(GateError::MissingRole { stage })
    }
}

fn require_kind(
    action: Action,
    expected: DocumentKind,
    actual: DocumentKind,
) -> Result<(), GateError> {
    if expected == actual {
        Ok(())
    } else {
        Err(GateError::WrongKind {
            action,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(kind: DocumentKind, pl: bool, ba: bool, dir: bool) -> DocumentGate {
        DocumentGate::new(kind, ApprovalFlags::new(pl, ba, dir))
    }

    fn roles(role: CallerRole) -> CallerRoles {
        CallerRoles::new().with(role)
    }

    #[test]
    fn test_business_area_lead_on_lead_approved_document() {
        let document = gate(DocumentKind::ConceptPlan, true, false, false);
        let ba_lead = roles(CallerRole::BusinessAreaLead);
        let status = ProjectStatus::Pending;

        assert!(can_perform(Action::Approve, Stage::BusinessAreaLead, &document, status, &ba_lead));
        assert!(!can_perform(Action::Approve, Stage::ProjectLead, &document, status, &ba_lead));
        assert!(!can_perform(Action::Approve, Stage::Directorate, &document, status, &ba_lead));
        assert!(can_perform(Action::Recall, Stage::ProjectLead, &document, status, &ba_lead));
        assert_eq!(
            check(Action::SendBack, Stage::ProjectLead, &document, status, &ba_lead),
            Err(GateError::NotApplicable {
                stage: Stage::ProjectLead
            })
        );
        assert!(can_perform(Action::SendBack, Stage::BusinessAreaLead, &document, status, &ba_lead));
    }

    #[test]
    fn test_recall_blocked_once_superseded() {
        let document = gate(DocumentKind::ProjectPlan, true, true, false);
        let admin = roles(CallerRole::Superuser);

        assert_eq!(
            check(Action::Recall, Stage::ProjectLead, &document, ProjectStatus::Active, &admin),
            Err(GateError::Superseded {
                stage: Stage::ProjectLead
            })
        );
        assert!(can_perform(Action::Recall, Stage::BusinessAreaLead, &document, ProjectStatus::Active, &admin));
    }

    #[test]
    fn test_directorate_recall_and_send_back() {
        let director = roles(CallerRole::Directorate);
        let approved = gate(DocumentKind::ProgressReport, true, true, true);
        assert!(can_perform(Action::Recall, Stage::Directorate, &approved, ProjectStatus::Active, &director));
        assert!(!can_perform(Action::SendBack, Stage::Directorate, &approved, ProjectStatus::Active, &director));

        let pending = gate(DocumentKind::ProgressReport, true, true, false);
        assert!(can_perform(Action::SendBack, Stage::Directorate, &pending, ProjectStatus::Active, &director));
        assert!(can_perform(Action::Approve, Stage::Directorate, &pending, ProjectStatus::Active, &director));
        assert!(!can_perform(Action::Recall, Stage::BusinessAreaLead, &pending, ProjectStatus::Active, &director));
    }

    #[test]
    fn test_team_member_sees_nothing() {
        let member = roles(CallerRole::TeamMember);
        let document = gate(DocumentKind::ConceptPlan, false, false, false);
        assert!(permitted_actions(&document, ProjectStatus::New, &member).is_empty());
    }

    #[test]
    fn test_stage_two_approval_waits_for_directorate() {
        let document = gate(DocumentKind::ConceptPlan, true, false, false)
            .with_directorate_available(false);

        assert_eq!(
            check(
                Action::Approve,
                Stage::BusinessAreaLead,
                &document,
                ProjectStatus::Pending,
                &roles(CallerRole::BusinessAreaLead)
            ),
            Err(GateError::DirectorateUnavailable)
        );
        assert!(can_perform(
            Action::Approve,
            Stage::BusinessAreaLead,
            &document,
            ProjectStatus::Pending,
            &roles(CallerRole::Superuser)
        ));
    }

    #[test]
    fn test_delete_rules() {
        let lead = roles(CallerRole::ProjectLead);
        let status = ProjectStatus::Active;

        assert!(can_perform(Action::Delete, Stage::ProjectLead, &gate(DocumentKind::ConceptPlan, false, false, false), status, &lead));
        assert!(!can_perform(Action::Delete, Stage::ProjectLead, &gate(DocumentKind::ConceptPlan, true, false, false), status, &lead));
        assert!(can_perform(Action::Delete, Stage::ProjectLead, &gate(DocumentKind::ProjectPlan, true, true, false), status, &lead));
        assert!(!can_perform(
            Action::Delete,
            Stage::ProjectLead,
            &gate(DocumentKind::ProjectPlan, true, true, false).with_progress_reports(1),
            status,
            &lead
        ));
        assert_eq!(
            check(Action::Delete, Stage::ProjectLead, &gate(DocumentKind::ProjectPlan, true, true, true), status, &lead),
            Err(GateError::FullyApproved)
        );
        assert!(!can_perform(
            Action::Delete,
            Stage::ProjectLead,
            &gate(DocumentKind::ConceptPlan, false, false, false),
            status,
            &roles(CallerRole::Directorate)
        ));
    }

    #[test]
    fn test_reopen_requires_closed_project_and_closure() {
        let lead = roles(CallerRole::ProjectLead);
        let closure = gate(DocumentKind::ProjectClosure, true, true, true);

        assert!(can_perform(Action::Reopen, Stage::ProjectLead, &closure, ProjectStatus::Completed, &lead));
        assert!(can_perform(Action::Reopen, Stage::ProjectLead, &closure, ProjectStatus::Suspended, &lead));
        assert_eq!(
            check(Action::Reopen, Stage::ProjectLead, &closure, ProjectStatus::ClosureRequested, &lead),
            Err(GateError::ProjectStatus {
                status: ProjectStatus::ClosureRequested
            })
        );
        assert!(!can_perform(
            Action::Reopen,
            Stage::ProjectLead,
            &gate(DocumentKind::ProjectPlan, true, true, true),
            ProjectStatus::Completed,
            &lead
        ));
        assert!(can_perform(Action::Reopen, Stage::Directorate, &closure, ProjectStatus::Completed, &lead));
    }

    #[test]
    fn test_directorate_cannot_reopen_or_spawn_reports() {
        let director = roles(CallerRole::Directorate);
        let closure = gate(DocumentKind::ProjectClosure, true, true, true);
        let plan = gate(DocumentKind::ProjectPlan, true, true, true);

        for stage in Stage::ALL {
            assert_eq!(
                check(Action::Reopen, stage, &closure, ProjectStatus::Completed, &director),
                Err(GateError::MissingRole {
                    stage: Stage::ProjectLead
                })
            );
        }
        assert!(!can_perform(Action::CreateProgressReport, Stage::ProjectLead, &plan, ProjectStatus::Active, &director));

        let labels: Vec<String> = permitted_actions(&closure, ProjectStatus::Completed, &director)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(labels, vec!["recall(3)"]);
    }

    #[test]
    fn test_reopen_stage_follows_flags() {
        let ba_lead = roles(CallerRole::BusinessAreaLead);
        for (flags, expected) in [
            ((true, true, true), Stage::Directorate),
            ((true, true, false), Stage::BusinessAreaLead),
            ((true, false, false), Stage::ProjectLead),
            ((false, false, false), Stage::ProjectLead),
        ] {
            let closure = gate(DocumentKind::ProjectClosure, flags.0, flags.1, flags.2);
            let reopen = permitted_actions(&closure, ProjectStatus::Terminated, &ba_lead)
                .into_iter()
                .find(|permitted| permitted.action == Action::Reopen)
                .expect("BA lead may reopen");
            assert_eq!(reopen.stage, Some(expected));
        }
    }

    #[test]
    fn test_create_progress_report() {
        let lead = roles(CallerRole::ProjectLead);
        let plan = gate(DocumentKind::ProjectPlan, true, true, true);

        assert!(can_perform(Action::CreateProgressReport, Stage::ProjectLead, &plan, ProjectStatus::Active, &lead));
        assert_eq!(
            check(
                Action::CreateProgressReport,
                Stage::ProjectLead,
                &plan.clone().with_progress_reports(2),
                ProjectStatus::Active,
                &lead
            ),
            Err(GateError::ProgressReportExists)
        );
        assert!(!can_perform(
            Action::CreateProgressReport,
            Stage::ProjectLead,
            &plan,
            ProjectStatus::Active,
            &roles(CallerRole::TeamMember)
        ));
    }

    #[test]
    fn test_permitted_actions_for_fresh_document() {
        let lead = roles(CallerRole::ProjectLead);
        let document = gate(DocumentKind::ConceptPlan, false, false, false);
        let actions = permitted_actions(&document, ProjectStatus::New, &lead);

        assert_eq!(
            actions,
            vec![
                PermittedAction {
                    action: Action::Approve,
                    stage: Some(Stage::ProjectLead)
                },
                PermittedAction {
                    action: Action::Delete,
                    stage: None
                },
            ]
        );
        assert_eq!(actions[0].to_string(), "approve(1)");
    }

    #[test]
    fn test_approval_state_labels() {
        assert_eq!(ApprovalState::from_flags(&ApprovalFlags::new(true, true, false)), ApprovalState::BusinessAreaApproved);
        assert_eq!(ApprovalState::FullyApproved.label(), "S3");
        assert_eq!(Action::parse("send-back"), Some(Action::SendBack));
    }
}
