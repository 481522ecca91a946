use tracing::{info, warn, Instrument};

use super::caller::CallerContext;
use super::outcome::{ActionOutcome, Notification};
use crate::api::{ClosureOutcome, CloseProjectRequest, SpmsOps};
use crate::approval::effects::{can_request_closure, status_after_closure_request};
use crate::approval::GateError;
use crate::domain::{DocumentKind, Stage};
use crate::observability::{api_metrics, create_action_span};
use crate::telemetry::generate_correlation_id;

/// Project-level lifecycle actions that sit outside the document gate.
pub struct ProjectWorkflow<'a, O: SpmsOps + ?Sized> {
    ops: &'a O,
}

impl<'a, O: SpmsOps + ?Sized> ProjectWorkflow<'a, O> {
    pub fn new(ops: &'a O) -> Self {
        Self { ops }
    }

    /// Request closure by creating the project's closure document.
    pub async fn request_closure(
        &self,
        project_pk: u64,
        reason: &str,
        outcome: ClosureOutcome,
    ) -> ActionOutcome {
        let span = create_action_span("request_closure", project_pk, &generate_correlation_id());
        async {
            let context = match self.load(project_pk, "Could Not Close Project").await {
                Ok(context) => context,
                Err(outcome) => return outcome,
            };
            let status = context.project.project.status;
            if !can_request_closure(status) {
                return self.deny(GateError::ProjectStatus { status });
            }
            if !context.roles.can_act_on(Stage::ProjectLead) {
                return self.deny(GateError::MissingRole {
                    stage: Stage::ProjectLead,
                });
            }

            let request = CloseProjectRequest {
                project: project_pk,
                kind: DocumentKind::ProjectClosure.api_name().to_string(),
                project_kind: serde_json::to_value(context.project.project.kind)
                    .ok()
                    .and_then(|kind| kind.as_str().map(str::to_string)),
                reason: reason.to_string(),
                outcome,
            };
            let result = match self.ops.close_project(request).await {
                Ok(()) => {
                    self.ops
                        .set_project_status(project_pk, status_after_closure_request())
                        .await
                }
                Err(err) => Err(err),
            };
            self.finish(project_pk, result, "Closure requested", "Could Not Close Project")
                .await
        }
        .instrument(span)
        .await
    }

    /// Suspend an active project. Restricted to the directorate and administrators.
    pub async fn suspend(&self, project_pk: u64) -> ActionOutcome {
        let span = create_action_span("suspend_project", project_pk, &generate_correlation_id());
        async {
            let context = match self.load(project_pk, "Could Not Suspend Project").await {
                Ok(context) => context,
                Err(outcome) => return outcome,
            };
            let status = context.project.project.status;
            if status.is_closed() {
                return self.deny(GateError::ProjectStatus { status });
            }
            if !context.roles.can_act_on(Stage::Directorate) {
                return self.deny(GateError::MissingRole {
                    stage: Stage::Directorate,
                });
            }

            let result = self.ops.suspend_project(project_pk).await;
            self.finish(project_pk, result, "Project suspended", "Could Not Suspend Project")
                .await
        }
        .instrument(span)
        .await
    }

    async fn load(&self, project_pk: u64, title: &str) -> Result<CallerContext, ActionOutcome> {
        CallerContext::load(self.ops, project_pk)
            .await
            .map_err(|err| ActionOutcome::Failed(Notification::error(title, err.to_string())))
    }

    fn deny(&self, reason: GateError) -> ActionOutcome {
        api_metrics().record_denied_action();
        info!(reason = %reason, "Project action refused");
        ActionOutcome::NotPermitted(reason)
    }

    async fn finish(
        &self,
        project_pk: u64,
        result: Result<(), crate::api::ApiError>,
        success: &str,
        failure_title: &str,
    ) -> ActionOutcome {
        match result {
            Ok(()) => {
                self.ops.invalidate(&format!("projects/{project_pk}")).await;
                self.ops.invalidate("documents/").await;
                info!(project_pk, "{}", success);
                ActionOutcome::Completed(Notification::success(success))
            }
            Err(err) => {
                warn!(project_pk, error = %err, "{}", failure_title);
                ActionOutcome::Failed(Notification::error(failure_title, err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockSpmsOps;
    use crate::domain::{
        FullProject, Project, ProjectKind, ProjectMember, ProjectRole, ProjectStatus, User,
        UserSummary,
    };
    use mockall::predicate::eq;

    fn ops_for(caller: u64, superuser: bool, status: ProjectStatus) -> MockSpmsOps {
        let mut ops = MockSpmsOps::new();
        ops.expect_me().returning(move || {
            Ok(User {
                pk: caller,
                is_superuser: superuser,
                ..Default::default()
            })
        });
        ops.expect_project().returning(move |pk| {
            Ok(FullProject {
                project: Project {
                    pk,
                    title: "Dune restoration".into(),
                    status,
                    kind: ProjectKind::Student,
                    year: 2022,
                    number: 14,
                    business_area: None,
                },
                documents: Default::default(),
                members: vec![],
            })
        });
        ops.expect_team().returning(|_| {
            Ok(vec![ProjectMember {
                pk: 1,
                project: 3,
                user: UserSummary {
                    pk: 50,
                    ..Default::default()
                },
                role: ProjectRole::Supervising,
                time_allocation: 0.3,
                position: 1,
                is_leader: true,
                short_code: None,
            }])
        });
        ops
    }

    #[tokio::test]
    async fn test_leader_requests_closure() {
        let mut ops = ops_for(50, false, ProjectStatus::Active);
        ops.expect_close_project()
            .withf(|request| {
                request.kind == "projectclosure"
                    && request.project_kind.as_deref() == Some("student")
                    && request.outcome == ClosureOutcome::Completed
            })
            .times(1)
            .returning(|_| Ok(()));
        ops.expect_set_project_status()
            .with(eq(3), eq(ProjectStatus::ClosureRequested))
            .times(1)
            .returning(|_, _| Ok(()));
        ops.expect_invalidate().returning(|_| ());

        let outcome = ProjectWorkflow::new(&ops)
            .request_closure(3, "Finished fieldwork", ClosureOutcome::Completed)
            .await;
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn test_closure_refused_when_already_requested() {
        let mut ops = ops_for(50, false, ProjectStatus::ClosureRequested);
        ops.expect_close_project().never();

        let outcome = ProjectWorkflow::new(&ops)
            .request_closure(3, "again", ClosureOutcome::Terminated)
            .await;
        assert_eq!(
            outcome,
            ActionOutcome::NotPermitted(GateError::ProjectStatus {
                status: ProjectStatus::ClosureRequested
            })
        );
    }

    #[tokio::test]
    async fn test_only_admins_suspend() {
        let mut ops = ops_for(50, false, ProjectStatus::Active);
        ops.expect_suspend_project().never();
        let outcome = ProjectWorkflow::new(&ops).suspend(3).await;
        assert!(matches!(outcome, ActionOutcome::NotPermitted(GateError::MissingRole { .. })));

        let mut ops = ops_for(1, true, ProjectStatus::Active);
        ops.expect_suspend_project().with(eq(3)).times(1).returning(|_| Ok(()));
        ops.expect_invalidate().returning(|_| ());
        assert!(ProjectWorkflow::new(&ops).suspend(3).await.is_completed());
    }
}
