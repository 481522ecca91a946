use tracing::{debug, info, warn, Instrument};

use super::outcome::{ActionOutcome, Notification};
use crate::api::{CreateCommentRequest, MentionNotification, SpmsOps};
use crate::domain::UserSummary;
use crate::mentions::{mentioned_users, prepopulate, to_html, MentionedUser};
use crate::observability::create_action_span;
use crate::telemetry::generate_correlation_id;

/// Posts document comments and notifies the users they mention.
pub struct CommentWorkflow<'a, O: SpmsOps + ?Sized> {
    ops: &'a O,
}

impl<'a, O: SpmsOps + ?Sized> CommentWorkflow<'a, O> {
    pub fn new(ops: &'a O) -> Self {
        Self { ops }
    }

    /// Post `text` (HTML or plain text) on a document.
    ///
    /// `@Name` references to project team members become mention nodes. A
    /// failed notification is logged but does not fail the comment.
    pub async fn post(&self, document_pk: u64, text: &str, notify: bool) -> ActionOutcome {
        let span = create_action_span("post_comment", document_pk, &generate_correlation_id());
        self.post_inner(document_pk, text, notify)
            .instrument(span)
            .await
    }

    async fn post_inner(&self, document_pk: u64, text: &str, notify: bool) -> ActionOutcome {
        const FAILED: &str = "Could Not Post Comment";

        let loaded = async {
            let document = self.ops.document(document_pk).await?;
            let user = self.ops.me().await?;
            let team = self.ops.team(document.project.pk).await?;
            Ok::<_, crate::api::ApiError>((document, user, team))
        }
        .await;
        let (document, user, team) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => return ActionOutcome::Failed(Notification::error(FAILED, err.to_string())),
        };

        let roster: Vec<UserSummary> = team.iter().map(|member| member.user.clone()).collect();
        let editor = match prepopulate(text, &roster) {
            Ok(editor) => editor,
            Err(err) => return ActionOutcome::Failed(Notification::error(FAILED, err.to_string())),
        };
        if editor.is_empty() {
            return ActionOutcome::Failed(Notification::error(FAILED, "Comment is empty"));
        }
        let payload = to_html(&editor);

        let request = CreateCommentRequest {
            user: user.pk,
            payload: payload.clone(),
        };
        if let Err(err) = self.ops.create_comment(document_pk, request).await {
            warn!(document_pk, error = %err, "Creating comment failed");
            return ActionOutcome::Failed(Notification::error(FAILED, err.to_string()));
        }
        self.ops
            .invalidate(&format!("documents/projectdocuments/{document_pk}/comments"))
            .await;

        let mentioned: Vec<MentionedUser> = mentioned_users(&editor)
            .into_iter()
            .filter(|mentioned| mentioned.id != user.pk)
            .collect();
        if notify && !mentioned.is_empty() {
            let summary = user.summary();
            let notification = MentionNotification {
                document_id: document_pk,
                project_id: document.project.pk,
                commenter: MentionedUser {
                    id: user.pk,
                    name: summary.display_name(),
                    email: user.email.clone(),
                },
                mentioned_users: mentioned.clone(),
                document_kind: Some(document.kind.api_name().to_string()),
                comment_content: payload,
            };
            match self.ops.send_mention_notifications(notification).await {
                Ok(()) => info!(document_pk, mentioned = mentioned.len(), "Mention notifications sent"),
                Err(err) => warn!(document_pk, error = %err, "Mention notifications failed"),
            }
        } else {
            debug!(document_pk, notify, "No mention notifications to send");
        }

        ActionOutcome::Completed(Notification::success("Comment posted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockSpmsOps};
    use crate::domain::{
        ApprovalFlags, Comment, DocumentKind, DocumentStatus, Project, ProjectDocument,
        ProjectKind, ProjectMember, ProjectRole, ProjectStatus, User,
    };

    fn person(pk: u64, first: &str, last: &str) -> UserSummary {
        UserSummary {
            pk,
            first_name: first.into(),
            last_name: last.into(),
            email: format!("{}@example.com", first.to_lowercase()),
            is_superuser: false,
        }
    }

    fn ops() -> MockSpmsOps {
        let mut ops = MockSpmsOps::new();
        ops.expect_document().returning(|pk| {
            Ok(ProjectDocument {
                pk,
                kind: DocumentKind::ProgressReport,
                status: DocumentStatus::Revising,
                project: Project {
                    pk: 12,
                    title: "Bat acoustics".into(),
                    status: ProjectStatus::Active,
                    kind: ProjectKind::Science,
                    year: 2021,
                    number: 2,
                    business_area: None,
                },
                flags: ApprovalFlags::default(),
                creator: None,
                modifier: None,
                created_at: None,
                updated_at: None,
            })
        });
        ops.expect_me().returning(|| {
            Ok(User {
                pk: 1,
                first_name: "Ana".into(),
                last_name: "Ruiz".into(),
                email: "ana@example.com".into(),
                ..Default::default()
            })
        });
        ops.expect_team().returning(|_| {
            Ok([person(1, "Ana", "Ruiz"), person(2, "Jane", "Doe")]
                .into_iter()
                .enumerate()
                .map(|(index, user)| ProjectMember {
                    pk: user.pk,
                    project: 12,
                    user,
                    role: ProjectRole::Research,
                    time_allocation: 0.2,
                    position: index as u32 + 1,
                    is_leader: index == 0,
                    short_code: None,
                })
                .collect())
        });
        ops
    }

    #[tokio::test]
    async fn test_comment_with_mention_notifies() {
        let mut ops = ops();
        ops.expect_create_comment()
            .withf(|document, request| {
                *document == 4 && request.payload.contains(r#"data-user-id="2""#)
            })
            .times(1)
            .returning(|_, request| {
                Ok(Comment {
                    pk: 1,
                    user: UserSummary::default(),
                    payload: request.payload,
                    created_at: None,
                    updated_at: None,
                })
            });
        ops.expect_invalidate().times(1).returning(|_| ());
        ops.expect_send_mention_notifications()
            .withf(|notification| {
                notification.mentioned_users.len() == 1
                    && notification.mentioned_users[0].id == 2
                    && notification.commenter.name == "Ana Ruiz"
            })
            .times(1)
            .returning(|_| Ok(()));

        let outcome = CommentWorkflow::new(&ops)
            .post(4, "Hello @Jane Doe, please review (cc @Ana Ruiz)", true)
            .await;
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_comment() {
        let mut ops = ops();
        ops.expect_create_comment().returning(|_, request| {
            Ok(Comment {
                pk: 2,
                user: UserSummary::default(),
                payload: request.payload,
                created_at: None,
                updated_at: None,
            })
        });
        ops.expect_invalidate().returning(|_| ());
        ops.expect_send_mention_notifications().returning(|_| {
            Err(ApiError::Http {
                status: 502,
                message: "mail relay down".into(),
            })
        });

        let outcome = CommentWorkflow::new(&ops).post(4, "@Jane Doe ping", true).await;
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn test_empty_comment_is_rejected() {
        let mut ops = ops();
        ops.expect_create_comment().never();
        let outcome = CommentWorkflow::new(&ops).post(4, "<p></p>", true).await;
        assert_eq!(outcome.notification().description, "Comment is empty");
    }
}
