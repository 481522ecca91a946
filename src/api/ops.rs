use async_trait::async_trait;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use super::client::SpmsClient;
use super::errors::ApiError;
use super::types::{
    CloseProjectRequest, CreateCommentRequest, CreateProgressReportRequest, DirectorateMember, DirectorateResponse,
    DocumentActionRequest, MentionNotification, PromoteLeaderRequest, ReopenRequest,
    SetStatusRequest, TeamPositionsRequest, TeamPositionsResponse,
};
use crate::domain::{
    BusinessArea, Comment, FullProject, ProjectDocument, ProjectMember, ProjectStatus, User,
};

/// Trait for SPMS API operations that can be mocked in tests
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait SpmsOps: Send + Sync {
    async fn me(&self) -> Result<User, ApiError>;
    async fn project(&self, project_pk: u64) -> Result<FullProject, ApiError>;
    async fn set_project_status(&self, project_pk: u64, status: ProjectStatus) -> Result<(), ApiError>;
    async fn team(&self, project_pk: u64) -> Result<Vec<ProjectMember>, ApiError>;
    async fn update_team_positions(
        &self,
        project_pk: u64,
        reordered_team: Vec<ProjectMember>,
    ) -> Result<Vec<ProjectMember>, ApiError>;
    async fn promote_leader(&self, project_pk: u64, user_pk: u64) -> Result<(), ApiError>;
    async fn suspend_project(&self, project_pk: u64) -> Result<(), ApiError>;
    async fn business_area(&self, business_area_pk: u64) -> Result<BusinessArea, ApiError>;
    async fn directorate(&self, division_pk: u64) -> Result<Vec<DirectorateMember>, ApiError>;
    async fn document(&self, document_pk: u64) -> Result<ProjectDocument, ApiError>;
    async fn document_action(&self, request: DocumentActionRequest) -> Result<(), ApiError>;
    async fn delete_document(&self, document_pk: u64) -> Result<(), ApiError>;
    async fn close_project(&self, request: CloseProjectRequest) -> Result<(), ApiError>;
    async fn create_progress_report(&self, request: CreateProgressReportRequest) -> Result<(), ApiError>;
    async fn reopen_project(&self, project_pk: u64) -> Result<(), ApiError>;
    async fn comments(&self, document_pk: u64) -> Result<Vec<Comment>, ApiError>;
    async fn create_comment(&self, document_pk: u64, request: CreateCommentRequest) -> Result<Comment, ApiError>;
    async fn send_mention_notifications(&self, notification: MentionNotification) -> Result<(), ApiError>;
    /// Drop cached reads whose path starts with `prefix`.
    async fn invalidate(&self, prefix: &str);
}

#[async_trait]
impl SpmsOps for SpmsClient {
    async fn me(&self) -> Result<User, ApiError> {
        self.get("users/me").await
    }

    async fn project(&self, project_pk: u64) -> Result<FullProject, ApiError> {
        self.get(&format!("projects/{project_pk}")).await
    }

    async fn set_project_status(&self, project_pk: u64, status: ProjectStatus) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .put(&format!("projects/{project_pk}"), &SetStatusRequest { status })
            .await?;
        Ok(())
    }

    async fn team(&self, project_pk: u64) -> Result<Vec<ProjectMember>, ApiError> {
        self.get(&format!("projects/{project_pk}/team")).await
    }

    async fn update_team_positions(
        &self,
        project_pk: u64,
        reordered_team: Vec<ProjectMember>,
    ) -> Result<Vec<ProjectMember>, ApiError> {
        let response: TeamPositionsResponse = self
            .put(
                &format!("projects/{project_pk}/team"),
                &TeamPositionsRequest { reordered_team },
            )
            .await?;
        Ok(response.sorted_team)
    }

    async fn promote_leader(&self, project_pk: u64, user_pk: u64) -> Result<(), ApiError> {
        let request = PromoteLeaderRequest {
            user: user_pk,
            project: project_pk,
        };
        let _: serde_json::Value = self.post("projects/promote", Some(&request)).await?;
        Ok(())
    }

    async fn suspend_project(&self, project_pk: u64) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post::<(), _>(&format!("projects/{project_pk}/suspend"), None)
            .await?;
        Ok(())
    }

    async fn business_area(&self, business_area_pk: u64) -> Result<BusinessArea, ApiError> {
        self.get(&format!("agencies/business_areas/{business_area_pk}"))
            .await
    }

    async fn directorate(&self, division_pk: u64) -> Result<Vec<DirectorateMember>, ApiError> {
        let response: DirectorateResponse = self
            .get(&format!("agencies/divisions/{division_pk}/email_list"))
            .await?;
        Ok(response.directorate_email_list)
    }

    async fn document(&self, document_pk: u64) -> Result<ProjectDocument, ApiError> {
        self.get(&format!("documents/projectdocuments/{document_pk}"))
            .await
    }

    async fn document_action(&self, request: DocumentActionRequest) -> Result<(), ApiError> {
        let path = format!("documents/actions/{}", request.action);
        let _: serde_json::Value = self.post(&path, Some(&request)).await?;
        Ok(())
    }

    async fn delete_document(&self, document_pk: u64) -> Result<(), ApiError> {
        self.delete(&format!("documents/projectdocuments/{document_pk}"))
            .await
    }

    async fn close_project(&self, request: CloseProjectRequest) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post("documents/projectdocuments", Some(&request))
            .await?;
        Ok(())
    }

    async fn create_progress_report(&self, request: CreateProgressReportRequest) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post("documents/projectdocuments", Some(&request))
            .await?;
        Ok(())
    }

    async fn reopen_project(&self, project_pk: u64) -> Result<(), ApiError> {
        let request = ReopenRequest { project: project_pk };
        let _: serde_json::Value = self
            .post(
                &format!("documents/projectclosures/reopen/{project_pk}"),
                Some(&request),
            )
            .await?;
        Ok(())
    }

    async fn comments(&self, document_pk: u64) -> Result<Vec<Comment>, ApiError> {
        self.get(&format!("documents/projectdocuments/{document_pk}/comments"))
            .await
    }

    async fn create_comment(&self, document_pk: u64, request: CreateCommentRequest) -> Result<Comment, ApiError> {
        self.post(
            &format!("documents/projectdocuments/{document_pk}/comments"),
            Some(&request),
        )
        .await
    }

    async fn send_mention_notifications(&self, notification: MentionNotification) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post("documents/notifications/mentions", Some(&notification))
            .await?;
        Ok(())
    }

    async fn invalidate(&self, prefix: &str) {
        self.invalidate_prefix(prefix).await;
    }
}
