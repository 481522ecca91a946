use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::future::Future;

use spms_workflow::api::{ClosureOutcome, SpmsClient};
use spms_workflow::approval::{permitted_actions, Action, ApprovalState, DocumentGate};
use spms_workflow::config::SpmsConfig;
use spms_workflow::domain::{
    ApprovalFlags, CallerRole, CallerRoles, DocumentKind, ProjectStatus, Stage, UserSummary,
};
use spms_workflow::mentions::{mentioned_users, prepopulate, to_html};
use spms_workflow::telemetry::{init_telemetry, shutdown_telemetry};
use spms_workflow::workflows::{
    ActionOutcome, CommentWorkflow, DocumentCommand, DocumentWorkflow, ProjectWorkflow,
    TeamWorkflow,
};

#[derive(Parser)]
#[command(name = "spms")]
#[command(about = "Science project document approvals, team ordering and comment mentions")]
#[command(long_about = "spms drives the document approval workflow of a science project \
                       management API. Use 'spms gate' to ask offline which actions a caller \
                       would be offered, or 'spms document show <pk>' against a live API.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the approval gate offline and list permitted actions
    Gate {
        /// Approval flags for stages 1,2,3 (e.g. 1,0,0)
        #[arg(long, value_parser = parse_flags)]
        flags: ApprovalFlags,
        /// Document kind (concept, projectplan, progressreport, studentreport, projectclosure)
        #[arg(long, default_value = "concept", value_parser = parse_kind)]
        kind: DocumentKind,
        /// Project status (active, updating, closure_requested, ...)
        #[arg(long, default_value = "active", value_parser = parse_status)]
        project_status: ProjectStatus,
        /// Caller roles, comma separated (project-lead, business-area-lead, directorate, superuser, ...)
        #[arg(long, value_delimiter = ',', value_parser = parse_role)]
        roles: Vec<CallerRole>,
        /// Progress reports already attached to the project
        #[arg(long, default_value = "0")]
        progress_reports: usize,
        /// Treat the division as having no directorate members
        #[arg(long)]
        no_directorate: bool,
    },
    /// Show or act on a project document
    #[command(subcommand)]
    Document(DocumentCommands),
    /// Reorder the project team or promote a new leader
    #[command(subcommand)]
    Team(TeamCommands),
    /// Project lifecycle actions
    #[command(subcommand)]
    Project(ProjectCommands),
    /// Document comments
    #[command(subcommand)]
    Comment(CommentCommands),
    /// Turn @Name references into mention markup offline
    Mentions {
        /// Comment text or HTML
        text: String,
        /// Roster entry as pk,first,last,email (repeatable)
        #[arg(long = "user", value_parser = parse_user)]
        users: Vec<UserSummary>,
    },
}

#[derive(Subcommand)]
enum DocumentCommands {
    /// Show a document's approval state and the actions you may take
    Show { document: u64 },
    /// Approve the document at a stage
    Approve(StagedArgs),
    /// Recall an approval at a stage
    Recall(StagedArgs),
    /// Send the document back for revision
    SendBack(StagedArgs),
    /// Reopen a closed project from its closure document
    Reopen(StagedArgs),
    /// Delete the document
    Delete { document: u64 },
    /// Create the project's next progress report
    CreateProgressReport {
        document: u64,
        /// Report year, defaults to the current year
        #[arg(long)]
        year: Option<i32>,
    },
}

#[derive(Args)]
struct StagedArgs {
    document: u64,
    /// Approval stage (1 project lead, 2 business area lead, 3 directorate)
    #[arg(long, value_parser = parse_stage)]
    stage: Stage,
    /// Email the affected users (defaults to api.send_emails)
    #[arg(long, conflicts_with = "no_email")]
    email: bool,
    /// Do not email the affected users
    #[arg(long)]
    no_email: bool,
    /// Feedback HTML sent with recall or send back emails
    #[arg(long)]
    feedback: Option<String>,
}

impl StagedArgs {
    /// Explicit `--email`/`--no-email` wins over the configured default.
    fn send_email(&self, default: bool) -> bool {
        if self.email {
            true
        } else if self.no_email {
            false
        } else {
            default
        }
    }
}

#[derive(Subcommand)]
enum TeamCommands {
    /// Move the member at display index FROM to TO (zero based)
    Reorder {
        project: u64,
        #[arg(long)]
        from: usize,
        #[arg(long)]
        to: usize,
    },
    /// Make a team member the project leader
    Promote {
        project: u64,
        #[arg(long)]
        user: u64,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Request closure of a project
    Close {
        project: u64,
        #[arg(long)]
        reason: String,
        /// completed, forcecompleted, suspended or terminated
        #[arg(long, default_value = "completed", value_parser = parse_outcome)]
        outcome: ClosureOutcome,
    },
    /// Suspend a project
    Suspend { project: u64 },
}

#[derive(Subcommand)]
enum CommentCommands {
    /// Post a comment, turning @Name references to team members into mentions
    Post {
        document: u64,
        text: String,
        /// Do not email mentioned users
        #[arg(long)]
        no_notify: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    SpmsConfig::load_env_file()?;
    let config = SpmsConfig::load().context("Failed to load configuration")?;
    init_telemetry(&config.observability)?;

    let result = match cli.command {
        Commands::Gate {
            flags,
            kind,
            project_status,
            roles,
            progress_reports,
            no_directorate,
        } => gate_command(flags, kind, project_status, roles, progress_reports, no_directorate),
        Commands::Mentions { text, users } => mentions_command(&text, &users),
        Commands::Document(command) => {
            let send_emails = config.api.send_emails;
            online(&config, |client| document_command(client, command, send_emails))
        }
        Commands::Team(command) => online(&config, |client| team_command(client, command)),
        Commands::Project(command) => online(&config, |client| project_command(client, command)),
        Commands::Comment(command) => online(&config, |client| comment_command(client, command)),
    };

    shutdown_telemetry(&config.observability);
    result
}

fn gate_command(
    flags: ApprovalFlags,
    kind: DocumentKind,
    project_status: ProjectStatus,
    roles: Vec<CallerRole>,
    progress_reports: usize,
    no_directorate: bool,
) -> Result<()> {
    let gate = DocumentGate::new(kind, flags)
        .with_progress_reports(progress_reports)
        .with_directorate_available(!no_directorate);
    let roles = roles
        .into_iter()
        .fold(CallerRoles::new(), |roles, role| roles.with(role));

    println!("📄 {} ({}), project {}", kind, gate.state().label(), project_status);
    let permitted = permitted_actions(&gate, project_status, &roles);
    if permitted.is_empty() {
        println!("No actions permitted");
    }
    for action in permitted {
        println!("{action}");
    }
    Ok(())
}

fn mentions_command(text: &str, users: &[UserSummary]) -> Result<()> {
    let editor = prepopulate(text, users)?;
    println!("{}", to_html(&editor));
    for user in mentioned_users(&editor) {
        println!("@ {} <{}> (#{})", user.name, user.email, user.id);
    }
    Ok(())
}

/// Run an API-backed command on a fresh runtime.
fn online<F, Fut>(config: &SpmsConfig, run: F) -> Result<()>
where
    F: FnOnce(SpmsClient) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    tokio::runtime::Runtime::new()?.block_on(async {
        let client = SpmsClient::from_config(config)?;
        run(client).await
    })
}

async fn document_command(
    client: SpmsClient,
    command: DocumentCommands,
    send_emails: bool,
) -> Result<()> {
    let outcome = match command {
        DocumentCommands::Show { document } => {
            let view = DocumentWorkflow::new(&client).view(document).await?;
            println!(
                "📄 {} #{} for {} ({})",
                view.document.kind,
                view.document.pk,
                view.document.project.tag(),
                view.document.project.title
            );
            println!("   Status: {}", view.document.status.label());
            println!("   Approval: {}", ApprovalState::from_flags(&view.document.flags).label());
            println!("   Project: {}", view.project_status);
            if view.permitted.is_empty() {
                println!("No actions permitted");
            }
            for action in &view.permitted {
                match view.preview(action) {
                    Some((flags, status)) => println!(
                        "{action} → {}, {}",
                        ApprovalState::from_flags(&flags).label(),
                        status.label()
                    ),
                    None => println!("{action}"),
                }
            }
            return Ok(());
        }
        DocumentCommands::Approve(args) => perform(&client, Action::Approve, args, send_emails).await,
        DocumentCommands::Recall(args) => perform(&client, Action::Recall, args, send_emails).await,
        DocumentCommands::SendBack(args) => perform(&client, Action::SendBack, args, send_emails).await,
        DocumentCommands::Reopen(args) => perform(&client, Action::Reopen, args, send_emails).await,
        DocumentCommands::Delete { document } => {
            let command = DocumentCommand::new(document, Action::Delete, Stage::ProjectLead);
            DocumentWorkflow::new(&client).perform(command).await
        }
        DocumentCommands::CreateProgressReport { document, year } => {
            let mut command =
                DocumentCommand::new(document, Action::CreateProgressReport, Stage::ProjectLead);
            if let Some(year) = year {
                command = command.with_year(year);
            }
            DocumentWorkflow::new(&client).perform(command).await
        }
    };
    report(outcome)
}

async fn team_command(client: SpmsClient, command: TeamCommands) -> Result<()> {
    let workflow = TeamWorkflow::new(&client);
    let outcome = match command {
        TeamCommands::Reorder { project, from, to } => workflow.reorder(project, from, to).await,
        TeamCommands::Promote { project, user } => workflow.promote(project, user).await,
    };
    report(outcome)
}

async fn project_command(client: SpmsClient, command: ProjectCommands) -> Result<()> {
    let workflow = ProjectWorkflow::new(&client);
    let outcome = match command {
        ProjectCommands::Close {
            project,
            reason,
            outcome,
        } => workflow.request_closure(project, &reason, outcome).await,
        ProjectCommands::Suspend { project } => workflow.suspend(project).await,
    };
    report(outcome)
}

async fn comment_command(client: SpmsClient, command: CommentCommands) -> Result<()> {
    let CommentCommands::Post {
        document,
        text,
        no_notify,
    } = command;
    report(CommentWorkflow::new(&client).post(document, &text, !no_notify).await)
}

async fn perform(
    client: &SpmsClient,
    action: Action,
    args: StagedArgs,
    send_emails: bool,
) -> ActionOutcome {
    let email = args.send_email(send_emails);
    let mut command = DocumentCommand::new(args.document, action, args.stage).with_email(email);
    if let Some(feedback) = args.feedback {
        command = command.with_feedback(feedback);
    }
    DocumentWorkflow::new(client).perform(command).await
}

fn report(outcome: ActionOutcome) -> Result<()> {
    let notification = outcome.notification();
    match outcome {
        ActionOutcome::Completed(_) => {
            println!("✅ {}", notification.description);
            Ok(())
        }
        ActionOutcome::Failed(_) => bail!("❌ {notification}"),
        ActionOutcome::NotPermitted(_) => bail!("⚠️  {notification}"),
    }
}

fn parse_flags(value: &str) -> Result<ApprovalFlags, String> {
    let parsed = value
        .split(',')
        .map(|flag| match flag.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => Ok(true),
            "0" | "f" | "false" => Ok(false),
            other => Err(format!("invalid flag {other:?}")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    match parsed.as_slice() {
        [lead, business_area, directorate] => {
            Ok(ApprovalFlags::new(*lead, *business_area, *directorate))
        }
        _ => Err(format!("expected three flags, got {}", parsed.len())),
    }
}

fn parse_kind(value: &str) -> Result<DocumentKind, String> {
    DocumentKind::parse(value).ok_or_else(|| format!("unknown document kind {value:?}"))
}

fn parse_status(value: &str) -> Result<ProjectStatus, String> {
    ProjectStatus::parse(value).ok_or_else(|| format!("unknown project status {value:?}"))
}

fn parse_role(value: &str) -> Result<CallerRole, String> {
    CallerRole::parse(value.trim()).ok_or_else(|| format!("unknown role {value:?}"))
}

fn parse_stage(value: &str) -> Result<Stage, String> {
    value
        .parse::<u8>()
        .ok()
        .and_then(Stage::from_number)
        .ok_or_else(|| format!("stage must be 1, 2 or 3, got {value:?}"))
}

fn parse_outcome(value: &str) -> Result<ClosureOutcome, String> {
    ClosureOutcome::parse(value).ok_or_else(|| format!("unknown closure outcome {value:?}"))
}

fn parse_user(value: &str) -> Result<UserSummary, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [pk, first, last, email] = parts.as_slice() else {
        return Err("expected pk,first,last,email".to_string());
    };
    let pk = pk
        .parse()
        .map_err(|err| format!("invalid user pk {pk:?}: {err}"))?;
    Ok(UserSummary {
        pk,
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: email.to_string(),
        is_superuser: false,
    })
}
