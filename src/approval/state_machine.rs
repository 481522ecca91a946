use serde::{Deserialize, Serialize};
use statig::prelude::*;

use crate::approval::gate::{Action, ApprovalState, GateError};
use crate::domain::{ApprovalFlags, DocumentStatus, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalEvent {
    Approve { stage: Stage },
    Recall { stage: Stage },
    SendBack { stage: Stage },
    /// Re-grant a stored flag while rebuilding from fetched data; leaves status untouched.
    Restore { stage: Stage },
}

impl ApprovalEvent {
    /// The event a staged document action sends; `None` for actions outside the gate walk.
    pub fn for_action(action: Action, stage: Stage) -> Option<Self> {
        match action {
            Action::Approve => Some(Self::Approve { stage }),
            Action::Recall => Some(Self::Recall { stage }),
            Action::SendBack => Some(Self::SendBack { stage }),
            Action::Reopen | Action::Delete | Action::CreateProgressReport => None,
        }
    }
}

/// Local model of a document walking the S0..S3 gate.
///
/// Mirrors the transitions the API performs so callers can predict the
/// post-action flags and document status without waiting for a refetch.
#[derive(Debug, Default)]
pub struct DocumentApprovalMachine {
    pub document_pk: u64,
    flags: ApprovalFlags,
    status: Option<DocumentStatus>,
    ignored_events: u32,
}

impl DocumentApprovalMachine {
    pub fn new(document_pk: u64) -> Self {
        Self {
            document_pk,
            ..Default::default()
        }
    }

    /// Build a running machine positioned at the state the stored flags describe.
    pub fn restore(
        document_pk: u64,
        flags: ApprovalFlags,
        status: DocumentStatus,
    ) -> Result<StateMachine<Self>, GateError> {
        if !flags.is_monotonic() {
            return Err(GateError::InconsistentFlags { flags });
        }

        let machine = Self {
            document_pk,
            status: Some(status),
            ..Default::default()
        };
        let mut sm = machine.state_machine();
        for stage in Stage::ALL.into_iter().filter(|stage| flags.get(*stage)) {
            sm.handle(&ApprovalEvent::Restore { stage });
        }
        Ok(sm)
    }

    pub fn flags(&self) -> ApprovalFlags {
        self.flags
    }

    pub fn status(&self) -> DocumentStatus {
        self.status.unwrap_or(DocumentStatus::New)
    }

    pub fn approval_state(&self) -> ApprovalState {
        ApprovalState::from_flags(&self.flags)
    }

    /// Events the machine received but had no transition for.
    pub fn ignored_events(&self) -> u32 {
        self.ignored_events
    }

    fn grant(&mut self, stage: Stage) {
        self.flags.set(stage, true);
        self.status = Some(if stage == Stage::Directorate {
            DocumentStatus::Approved
        } else {
            DocumentStatus::InApproval
        });
        tracing::info!(
            document_pk = %self.document_pk,
            stage = %stage,
            "Approval granted"
        );
    }

    fn revoke(&mut self, stage: Stage, reason: &str) {
        self.flags.set(stage, false);
        self.status = Some(DocumentStatus::Revising);
        tracing::info!(
            document_pk = %self.document_pk,
            stage = %stage,
            reason = reason,
            "Approval revoked"
        );
    }

    fn ignore(&mut self, event: &ApprovalEvent) -> Outcome<State> {
        self.ignored_events += 1;
        tracing::debug!(
            document_pk = %self.document_pk,
            event = ?event,
            flags = ?self.flags,
            "Event has no transition from current state"
        );
        Handled
    }
}

#[state_machine(initial = "State::unapproved()")]
impl DocumentApprovalMachine {
    #[state]
    fn unapproved(&mut self, event: &ApprovalEvent) -> Outcome<State> {
        match event {
            ApprovalEvent::Approve {
                stage: Stage::ProjectLead,
            } => {
                self.grant(Stage::ProjectLead);
                Transition(State::lead_approved())
            }
            ApprovalEvent::Restore {
                stage: Stage::ProjectLead,
            } => {
                self.flags.project_lead = true;
                Transition(State::lead_approved())
            }
            _ => self.ignore(event),
        }
    }

    #[state]
    fn lead_approved(&mut self, event: &ApprovalEvent) -> Outcome<State> {
        match event {
            ApprovalEvent::Approve {
                stage: Stage::BusinessAreaLead,
            } => {
                self.grant(Stage::BusinessAreaLead);
                Transition(State::business_area_approved())
            }
            ApprovalEvent::Restore {
                stage: Stage::BusinessAreaLead,
            } => {
                self.flags.business_area_lead = true;
                Transition(State::business_area_approved())
            }
            ApprovalEvent::Recall {
                stage: Stage::ProjectLead,
            } => {
                self.revoke(Stage::ProjectLead, "recalled");
                Transition(State::unapproved())
            }
            ApprovalEvent::SendBack {
                stage: Stage::BusinessAreaLead,
            } => {
                self.revoke(Stage::ProjectLead, "sent back");
                Transition(State::unapproved())
            }
            _ => self.ignore(event),
        }
    }

    #[state]
    fn business_area_approved(&mut self, event: &ApprovalEvent) -> Outcome<State> {
        match event {
            ApprovalEvent::Approve {
                stage: Stage::Directorate,
            } => {
                self.grant(Stage::Directorate);
                Transition(State::fully_approved())
            }
            ApprovalEvent::Restore {
                stage: Stage::Directorate,
            } => {
                self.flags.directorate = true;
                Transition(State::fully_approved())
            }
            ApprovalEvent::Recall {
                stage: Stage::BusinessAreaLead,
            } => {
                self.revoke(Stage::BusinessAreaLead, "recalled");
                Transition(State::lead_approved())
            }
            ApprovalEvent::SendBack {
                stage: Stage::Directorate,
            } => {
                self.revoke(Stage::BusinessAreaLead, "sent back");
                Transition(State::lead_approved())
            }
            _ => self.ignore(event),
        }
    }

    #[state]
    fn fully_approved(&mut self, event: &ApprovalEvent) -> Outcome<State> {
        match event {
            ApprovalEvent::Recall {
                stage: Stage::Directorate,
            } => {
                self.revoke(Stage::Directorate, "recalled");
                Transition(State::business_area_approved())
            }
            _ => self.ignore(event),
        }
    }
}

/// Predict the flags and status after `event`, or `None` when the event has no transition.
pub fn predict(
    flags: ApprovalFlags,
    status: DocumentStatus,
    event: ApprovalEvent,
) -> Option<(ApprovalFlags, DocumentStatus)> {
    let mut sm = DocumentApprovalMachine::restore(0, flags, status).ok()?;
    sm.handle(&event);
    let machine = sm.inner();
    if machine.ignored_events() > 0 {
        return None;
    }
    Some((machine.flags(), machine.status()))
}
