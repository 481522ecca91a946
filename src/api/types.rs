// Request and response bodies for the SPMS REST API

use serde::{Deserialize, Serialize};

use crate::approval::Action;
use crate::domain::{DocumentKind, ProjectMember, ProjectStatus, Stage, UserSummary};
use crate::mentions::MentionedUser;

/// Body of `POST documents/actions/{action}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentActionRequest {
    pub action: String,
    pub stage: u8,
    #[serde(rename = "documentPk")]
    pub document_pk: u64,
    #[serde(rename = "shouldSendEmail")]
    pub should_send_email: bool,
    #[serde(rename = "feedbackHTML", skip_serializing_if = "Option::is_none")]
    pub feedback_html: Option<String>,
}

impl DocumentActionRequest {
    /// Feedback is only forwarded when an email is going out.
    pub fn new(
        action: Action,
        stage: Stage,
        document_pk: u64,
        should_send_email: bool,
        feedback_html: Option<String>,
    ) -> Self {
        let carries_feedback = matches!(action, Action::Recall | Action::SendBack);
        Self {
            action: action.api_name().to_string(),
            stage: stage.number(),
            document_pk,
            should_send_email,
            feedback_html: feedback_html
                .filter(|html| carries_feedback && should_send_email && !html.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetStatusRequest {
    pub status: ProjectStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPositionsRequest {
    pub reordered_team: Vec<ProjectMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPositionsResponse {
    pub sorted_team: Vec<ProjectMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoteLeaderRequest {
    pub user: u64,
    pub project: u64,
}

/// Body of `POST documents/projectdocuments` when requesting closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseProjectRequest {
    pub project: u64,
    pub kind: String,
    #[serde(rename = "projectKind", skip_serializing_if = "Option::is_none")]
    pub project_kind: Option<String>,
    pub reason: String,
    pub outcome: ClosureOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosureOutcome {
    Completed,
    Forcecompleted,
    Suspended,
    Terminated,
}

impl ClosureOutcome {
    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase())).ok()
    }
}

/// Body of `POST documents/projectdocuments` when spawning the first progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProgressReportRequest {
    pub kind: String,
    pub project: u64,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<u64>,
    pub is_final_report: bool,
    pub context: String,
    pub aims: String,
    pub progress: String,
    pub implications: String,
    pub future: String,
}

impl CreateProgressReportRequest {
    /// An empty report for `year`; every section starts as an empty paragraph.
    pub fn empty(project: u64, year: i32, report: Option<u64>) -> Self {
        let empty = || "<p></p>".to_string();
        Self {
            kind: DocumentKind::ProgressReport.api_name().to_string(),
            project,
            year,
            report,
            is_final_report: false,
            context: empty(),
            aims: empty(),
            progress: empty(),
            implications: empty(),
            future: empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReopenRequest {
    pub project: u64,
}

/// One entry of a division's directorate email list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorateMember {
    pub pk: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl From<&DirectorateMember> for UserSummary {
    fn from(member: &DirectorateMember) -> Self {
        let (first_name, last_name) = match member.name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (member.name.clone(), String::new()),
        };
        UserSummary {
            pk: member.pk,
            first_name,
            last_name,
            email: member.email.clone(),
            is_superuser: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorateResponse {
    #[serde(default)]
    pub directorate_email_list: Vec<DirectorateMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub user: u64,
    pub payload: String,
}

/// Body of `POST documents/notifications/mentions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionNotification {
    pub document_id: u64,
    pub project_id: u64,
    pub commenter: MentionedUser,
    pub mentioned_users: Vec<MentionedUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_kind: Option<String>,
    pub comment_content: String,
}
