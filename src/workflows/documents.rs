// Document action handlers
//
// Fetch context, gate locally, send the mutation, apply the project status
// side effect, then drop cached reads so the next fetch resynchronises.

use chrono::Datelike;
use tracing::{info, warn, Instrument};

use super::caller::CallerContext;
use super::outcome::{ActionOutcome, Notification};
use crate::api::types::CreateProgressReportRequest;
use crate::api::{ApiError, DocumentActionRequest, SpmsOps};
use crate::approval::effects::{status_after_delete, status_after_reopen};
use crate::approval::{
    check, permitted_actions, predict, Action, ApprovalEvent, DocumentGate, PermittedAction,
};
use crate::domain::{ApprovalFlags, DocumentKind, DocumentStatus, ProjectDocument, ProjectStatus, Stage};
use crate::observability::{api_metrics, create_action_span, OperationTimer};
use crate::telemetry::generate_correlation_id;

/// One requested action on one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCommand {
    pub document_pk: u64,
    pub action: Action,
    pub stage: Stage,
    pub send_email: bool,
    pub feedback_html: Option<String>,
    /// Year of the progress report to create; defaults to the current year.
    pub year: Option<i32>,
}

impl DocumentCommand {
    pub fn new(document_pk: u64, action: Action, stage: Stage) -> Self {
        Self {
            document_pk,
            action,
            stage,
            send_email: false,
            feedback_html: None,
            year: None,
        }
    }

    pub fn with_email(mut self, send_email: bool) -> Self {
        self.send_email = send_email;
        self
    }

    pub fn with_feedback(mut self, feedback_html: impl Into<String>) -> Self {
        self.feedback_html = Some(feedback_html.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

fn past_tense(action: Action) -> &'static str {
    match action {
        Action::Approve => "Approved",
        Action::Recall => "Recalled",
        Action::SendBack => "Sent Back",
        Action::Reopen => "Reopened",
        Action::Delete => "Deleted",
        Action::CreateProgressReport => "Progress Report Created",
    }
}

fn imperative(action: Action) -> &'static str {
    match action {
        Action::Approve => "Approve",
        Action::Recall => "Recall",
        Action::SendBack => "Send Back",
        Action::Reopen => "Reopen",
        Action::Delete => "Delete",
        Action::CreateProgressReport => "Create Progress Report For",
    }
}

/// Snapshot of a document with the actions its viewer may take.
#[derive(Debug, Clone)]
pub struct DocumentView {
    pub document: ProjectDocument,
    pub project_status: ProjectStatus,
    pub permitted: Vec<PermittedAction>,
}

impl DocumentView {
    /// Flags and document status a permitted approve, recall or send back would leave behind.
    pub fn preview(&self, permitted: &PermittedAction) -> Option<(ApprovalFlags, DocumentStatus)> {
        let event = ApprovalEvent::for_action(permitted.action, permitted.stage?)?;
        predict(self.document.flags, self.document.status, event)
    }
}

pub struct DocumentWorkflow<'a, O: SpmsOps + ?Sized> {
    ops: &'a O,
}

impl<'a, O: SpmsOps + ?Sized> DocumentWorkflow<'a, O> {
    pub fn new(ops: &'a O) -> Self {
        Self { ops }
    }

    /// Fetch a document and compute what the caller may do with it.
    pub async fn view(&self, document_pk: u64) -> Result<DocumentView, ApiError> {
        let document = self.ops.document(document_pk).await?;
        let context = CallerContext::load(self.ops, document.project.pk).await?;
        let gate = gate_for(&document, &context);
        let project_status = context.project.project.status;

        Ok(DocumentView {
            permitted: permitted_actions(&gate, project_status, &context.roles),
            project_status,
            document,
        })
    }

    pub async fn perform(&self, command: DocumentCommand) -> ActionOutcome {
        let correlation_id = generate_correlation_id();
        let span = create_action_span(command.action.api_name(), command.document_pk, &correlation_id);
        self.perform_inner(command).instrument(span).await
    }

    async fn perform_inner(&self, command: DocumentCommand) -> ActionOutcome {
        let timer = OperationTimer::new(command.action.api_name());

        let document = match self.ops.document(command.document_pk).await {
            Ok(document) => document,
            Err(err) => return load_failure(&command, None, err),
        };
        let title = failure_title(command.action, document.kind);

        let context = match CallerContext::load(self.ops, document.project.pk).await {
            Ok(context) => context,
            Err(err) => return load_failure(&command, Some(title), err),
        };

        let gate = gate_for(&document, &context);
        if let Err(reason) = check(
            command.action,
            command.stage,
            &gate,
            context.project.project.status,
            &context.roles,
        ) {
            api_metrics().record_denied_action();
            info!(
                document_pk = command.document_pk,
                action = %command.action,
                stage = %command.stage,
                reason = %reason,
                "Action refused by approval gate"
            );
            return ActionOutcome::NotPermitted(reason);
        }

        let result = self.execute(&command, &document, &context).await;
        timer.finish();

        match result {
            Ok(()) => {
                self.invalidate(&document).await;
                info!(
                    document_pk = command.document_pk,
                    action = %command.action,
                    stage = %command.stage,
                    "Document action completed"
                );
                ActionOutcome::Completed(Notification::success(format!(
                    "{} {}",
                    document.kind.display_name(),
                    past_tense(command.action)
                )))
            }
            Err(err) => {
                warn!(
                    document_pk = command.document_pk,
                    action = %command.action,
                    error = %err,
                    "Document action failed"
                );
                ActionOutcome::Failed(Notification::error(title, err.to_string()))
            }
        }
    }

    async fn execute(
        &self,
        command: &DocumentCommand,
        document: &ProjectDocument,
        context: &CallerContext,
    ) -> Result<(), ApiError> {
        let project_pk = document.project.pk;

        match command.action {
            Action::Approve | Action::Recall | Action::SendBack => {
                let request = DocumentActionRequest::new(
                    command.action,
                    command.stage,
                    document.pk,
                    command.send_email,
                    command.feedback_html.clone(),
                );
                self.ops.document_action(request).await
            }
            Action::Reopen => {
                self.ops.reopen_project(project_pk).await?;
                self.ops
                    .set_project_status(project_pk, status_after_reopen())
                    .await
            }
            Action::Delete => {
                let documents_before_delete = context.project.documents.count();
                self.ops.delete_document(document.pk).await?;
                if let Some(status) = status_after_delete(document.kind, documents_before_delete) {
                    self.ops.set_project_status(project_pk, status).await?;
                }
                Ok(())
            }
            Action::CreateProgressReport => {
                let year = command.year.unwrap_or_else(|| chrono::Utc::now().year());
                self.ops
                    .create_progress_report(CreateProgressReportRequest::empty(project_pk, year, None))
                    .await
            }
        }
    }

    async fn invalidate(&self, document: &ProjectDocument) {
        self.ops
            .invalidate(&format!("documents/projectdocuments/{}", document.pk))
            .await;
        self.ops
            .invalidate(&format!("projects/{}", document.project.pk))
            .await;
    }
}

fn gate_for(document: &ProjectDocument, context: &CallerContext) -> DocumentGate {
    DocumentGate::for_document(document, context.project.documents.progress_report_count())
        .with_directorate_available(context.directorate_available())
}

fn failure_title(action: Action, kind: DocumentKind) -> String {
    format!("Could Not {} {}", imperative(action), kind.display_name())
}

fn load_failure(command: &DocumentCommand, title: Option<String>, err: ApiError) -> ActionOutcome {
    warn!(
        document_pk = command.document_pk,
        action = %command.action,
        error = %err,
        "Could not load document context"
    );
    let title = title.unwrap_or_else(|| format!("Could Not {} Document", imperative(command.action)));
    ActionOutcome::Failed(Notification::error(title, err.to_string()))
}
