use tracing::{info, warn, Instrument};

use super::caller::CallerContext;
use super::outcome::{ActionOutcome, Notification};
use crate::api::SpmsOps;
use crate::approval::GateError;
use crate::domain::{ProjectMember, Stage};
use crate::observability::{api_metrics, create_action_span};
use crate::team::{can_manage_team, promote_leader, reorder};
use crate::telemetry::generate_correlation_id;

pub struct TeamWorkflow<'a, O: SpmsOps + ?Sized> {
    ops: &'a O,
}

impl<'a, O: SpmsOps + ?Sized> TeamWorkflow<'a, O> {
    pub fn new(ops: &'a O) -> Self {
        Self { ops }
    }

    /// Move the member at display index `from` to `to` and persist the new positions.
    pub async fn reorder(&self, project_pk: u64, from: usize, to: usize) -> ActionOutcome {
        let span = create_action_span("reorder_team", project_pk, &generate_correlation_id());
        async {
            let context = match self.authorize(project_pk).await {
                Ok(context) => context,
                Err(outcome) => return outcome,
            };
            match reorder(&context.team, from, to) {
                Ok(reordered) => {
                    self.persist(project_pk, reordered, "Team order updated")
                        .await
                }
                Err(err) => ActionOutcome::Failed(Notification::error(
                    "Could Not Reorder Team",
                    err.to_string(),
                )),
            }
        }
        .instrument(span)
        .await
    }

    /// Make `user_pk` the project leader.
    pub async fn promote(&self, project_pk: u64, user_pk: u64) -> ActionOutcome {
        let span = create_action_span("promote_leader", project_pk, &generate_correlation_id());
        async {
            let context = match self.authorize(project_pk).await {
                Ok(context) => context,
                Err(outcome) => return outcome,
            };
            let promoted = match promote_leader(&context.team, user_pk) {
                Ok(promoted) => promoted,
                Err(err) => {
                    return ActionOutcome::Failed(Notification::error(
                        "Could Not Promote Member",
                        err.to_string(),
                    ))
                }
            };
            let leader = promoted
                .first()
                .map(|member| member.user.display_name())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("User {user_pk}"));

            match self.ops.promote_leader(project_pk, user_pk).await {
                Ok(()) => {
                    self.ops.invalidate(&format!("projects/{project_pk}")).await;
                    let order: Vec<u64> = promoted.iter().map(|member| member.pk).collect();
                    info!(project_pk, user_pk, ?order, "Promoted project leader");
                    ActionOutcome::Completed(Notification::success(format!(
                        "{leader} promoted to project leader"
                    )))
                }
                Err(err) => {
                    warn!(project_pk, user_pk, error = %err, "Leader promotion failed");
                    ActionOutcome::Failed(Notification::error("Could Not Promote Member", err.to_string()))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn authorize(&self, project_pk: u64) -> Result<CallerContext, ActionOutcome> {
        let context = CallerContext::load(self.ops, project_pk)
            .await
            .map_err(|err| {
                ActionOutcome::Failed(Notification::error("Could Not Load Team", err.to_string()))
            })?;
        if !can_manage_team(&context.roles) {
            api_metrics().record_denied_action();
            return Err(ActionOutcome::NotPermitted(GateError::MissingRole {
                stage: Stage::ProjectLead,
            }));
        }
        Ok(context)
    }

    async fn persist(
        &self,
        project_pk: u64,
        reordered: Vec<ProjectMember>,
        message: &str,
    ) -> ActionOutcome {
        match self.ops.update_team_positions(project_pk, reordered).await {
            Ok(sorted) => {
                self.ops.invalidate(&format!("projects/{project_pk}")).await;
                info!(project_pk, members = sorted.len(), "Team positions saved");
                ActionOutcome::Completed(Notification::success(message))
            }
            Err(err) => {
                warn!(project_pk, error = %err, "Saving team positions failed");
                ActionOutcome::Failed(Notification::error("Could Not Reorder Team", err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockSpmsOps};
    use crate::domain::{
        FullProject, Project, ProjectKind, ProjectRole, ProjectStatus, User, UserSummary,
    };

    fn member(pk: u64, position: u32, is_leader: bool) -> ProjectMember {
        ProjectMember {
            pk,
            project: 8,
            user: UserSummary {
                pk: pk * 100,
                ..Default::default()
            },
            role: ProjectRole::Technical,
            time_allocation: 0.1,
            position,
            is_leader,
            short_code: None,
        }
    }

    fn ops_for(caller: u64) -> MockSpmsOps {
        let mut ops = MockSpmsOps::new();
        ops.expect_me().returning(move || {
            Ok(User {
                pk: caller,
                ..Default::default()
            })
        });
        ops.expect_project().returning(|pk| {
            Ok(FullProject {
                project: Project {
                    pk,
                    title: "Seagrass".into(),
                    status: ProjectStatus::Active,
                    kind: ProjectKind::CoreFunction,
                    year: 2023,
                    number: 1,
                    business_area: None,
                },
                documents: Default::default(),
                members: vec![],
            })
        });
        ops.expect_team().returning(|_| {
            Ok(vec![
                member(1, 1, true),
                member(2, 2, false),
                member(3, 3, false),
            ])
        });
        ops
    }

    #[tokio::test]
    async fn test_leader_reorders_team() {
        let mut ops = ops_for(100);
        ops.expect_update_team_positions()
            .withf(|project, team| {
                *project == 8
                    && team.iter().map(|m| m.pk).collect::<Vec<_>>() == vec![1, 3, 2]
                    && team.iter().map(|m| m.position).collect::<Vec<_>>() == vec![1, 2, 3]
            })
            .times(1)
            .returning(|_, team| Ok(team));
        ops.expect_invalidate().times(1).returning(|_| ());

        let outcome = TeamWorkflow::new(&ops).reorder(8, 2, 1).await;
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn test_member_cannot_reorder() {
        let mut ops = ops_for(200);
        ops.expect_update_team_positions().never();

        let outcome = TeamWorkflow::new(&ops).reorder(8, 2, 1).await;
        assert!(matches!(outcome, ActionOutcome::NotPermitted(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_move_fails_locally() {
        let mut ops = ops_for(100);
        ops.expect_update_team_positions().never();

        let outcome = TeamWorkflow::new(&ops).reorder(8, 0, 9).await;
        assert_eq!(outcome.notification().title, "Could Not Reorder Team");
    }

    #[tokio::test]
    async fn test_promote_reports_api_error() {
        let mut ops = ops_for(100);
        ops.expect_promote_leader().returning(|_, _| {
            Err(ApiError::Http {
                status: 500,
                message: "boom".into(),
            })
        });

        let outcome = TeamWorkflow::new(&ops).promote(8, 300).await;
        assert_eq!(
            outcome,
            ActionOutcome::Failed(Notification::error("Could Not Promote Member", "HTTP 500: boom"))
        );
    }

    #[tokio::test]
    async fn test_promote_names_new_leader() {
        let mut ops = ops_for(100);
        ops.expect_promote_leader()
            .withf(|project, user| *project == 8 && *user == 300)
            .times(1)
            .returning(|_, _| Ok(()));
        ops.expect_invalidate().times(1).returning(|_| ());

        let outcome = TeamWorkflow::new(&ops).promote(8, 300).await;
        assert_eq!(
            outcome,
            ActionOutcome::Completed(Notification::success("User 300 promoted to project leader"))
        );
    }

    #[tokio::test]
    async fn test_promoting_non_member_fails_locally() {
        let mut ops = ops_for(100);
        ops.expect_promote_leader().never();

        let outcome = TeamWorkflow::new(&ops).promote(8, 999).await;
        assert_eq!(
            outcome,
            ActionOutcome::Failed(Notification::error(
                "Could Not Promote Member",
                "user 999 is not a member of this team"
            ))
        );
    }
}
