use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of project document. Wire names follow the API (`concept`, `projectplan`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "concept")]
    ConceptPlan,
    #[serde(rename = "projectplan")]
    ProjectPlan,
    #[serde(rename = "progressreport")]
    ProgressReport,
    #[serde(rename = "studentreport")]
    StudentReport,
    #[serde(rename = "projectclosure")]
    ProjectClosure,
}

impl DocumentKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentKind::ConceptPlan => "Concept Plan",
            DocumentKind::ProjectPlan => "Project Plan",
            DocumentKind::ProgressReport => "Progress Report",
            DocumentKind::StudentReport => "Student Report",
            DocumentKind::ProjectClosure => "Project Closure",
        }
    }

    pub fn api_name(&self) -> &'static str {
        match self {
            DocumentKind::ConceptPlan => "concept",
            DocumentKind::ProjectPlan => "projectplan",
            DocumentKind::ProgressReport => "progressreport",
            DocumentKind::StudentReport => "studentreport",
            DocumentKind::ProjectClosure => "projectclosure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "concept" | "conceptplan" => Some(DocumentKind::ConceptPlan),
            "projectplan" => Some(DocumentKind::ProjectPlan),
            "progressreport" => Some(DocumentKind::ProgressReport),
            "studentreport" => Some(DocumentKind::StudentReport),
            "projectclosure" => Some(DocumentKind::ProjectClosure),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    New,
    InReview,
    InApproval,
    Approved,
    Revising,
}

impl DocumentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentStatus::New => "New Document",
            DocumentStatus::InReview => "Review Requested",
            DocumentStatus::InApproval => "Approval Requested",
            DocumentStatus::Approved => "Approved",
            DocumentStatus::Revising => "Revising",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    New,
    Pending,
    Active,
    Updating,
    ClosureRequested,
    Closing,
    FinalUpdate,
    Completed,
    Terminated,
    Suspended,
}

impl ProjectStatus {
    /// Completed, terminated and suspended projects can only be reopened.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            ProjectStatus::Completed | ProjectStatus::Terminated | ProjectStatus::Suspended
        )
    }

    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase())).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::New => "new",
            ProjectStatus::Pending => "pending",
            ProjectStatus::Active => "active",
            ProjectStatus::Updating => "updating",
            ProjectStatus::ClosureRequested => "closure_requested",
            ProjectStatus::Closing => "closing",
            ProjectStatus::FinalUpdate => "final_update",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Terminated => "terminated",
            ProjectStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    CoreFunction,
    Science,
    Student,
    External,
}

impl ProjectKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ProjectKind::CoreFunction => "CF",
            ProjectKind::Science => "SP",
            ProjectKind::Student => "STP",
            ProjectKind::External => "EXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Supervising,
    Research,
    Technical,
    ExternalCol,
    ExternalPeer,
    AcademicSuper,
    Student,
    Consulted,
    Group,
}

/// One of the three sequential sign-offs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Stage {
    ProjectLead = 1,
    BusinessAreaLead = 2,
    Directorate = 3,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::ProjectLead, Stage::BusinessAreaLead, Stage::Directorate];

    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn from_number(value: u8) -> Option<Self> {
        match value {
            1 => Some(Stage::ProjectLead),
            2 => Some(Stage::BusinessAreaLead),
            3 => Some(Stage::Directorate),
            _ => None,
        }
    }

    pub fn previous(&self) -> Option<Stage> {
        Stage::from_number(self.number() - 1)
    }

    pub fn next(&self) -> Option<Stage> {
        Stage::from_number(self.number() + 1)
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.number()
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stage::from_number(value).ok_or_else(|| format!("invalid approval stage {value}"))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ProjectLead => "project lead",
            Stage::BusinessAreaLead => "business area lead",
            Stage::Directorate => "directorate",
        };
        write!(f, "stage {} ({})", self.number(), name)
    }
}

/// The three independent approval flags carried by every project document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalFlags {
    #[serde(rename = "project_lead_approval_granted", default)]
    pub project_lead: bool,
    #[serde(rename = "business_area_lead_approval_granted", default)]
    pub business_area_lead: bool,
    #[serde(rename = "directorate_approval_granted", default)]
    pub directorate: bool,
}

impl ApprovalFlags {
    pub fn new(project_lead: bool, business_area_lead: bool, directorate: bool) -> Self {
        Self {
            project_lead,
            business_area_lead,
            directorate,
        }
    }

    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::ProjectLead => self.project_lead,
            Stage::BusinessAreaLead => self.business_area_lead,
            Stage::Directorate => self.directorate,
        }
    }

    pub fn set(&mut self, stage: Stage, granted: bool) {
        match stage {
            Stage::ProjectLead => self.project_lead = granted,
            Stage::BusinessAreaLead => self.business_area_lead = granted,
            Stage::Directorate => self.directorate = granted,
        }
    }

    /// Lowest stage whose approval is still outstanding.
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| !self.get(*stage))
    }

    pub fn is_fully_approved(&self) -> bool {
        self.project_lead && self.business_area_lead && self.directorate
    }

    pub fn is_untouched(&self) -> bool {
        !self.project_lead && !self.business_area_lead && !self.directorate
    }

    /// True when no later stage is granted ahead of an earlier one.
    pub fn is_monotonic(&self) -> bool {
        (self.project_lead || !self.business_area_lead)
            && (self.business_area_lead || !self.directorate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub pk: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_superuser: bool,
}

impl UserSummary {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// The signed-in user as returned by `users/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub pk: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_superuser: bool,
    /// Users whose approval authority this user currently holds.
    #[serde(default)]
    pub caretaking_for: Vec<UserSummary>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            pk: self.pk,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            is_superuser: self.is_superuser,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessArea {
    pub pk: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub leader: Option<u64>,
    #[serde(default)]
    pub division: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub pk: u64,
    #[serde(default)]
    pub title: String,
    pub status: ProjectStatus,
    pub kind: ProjectKind,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub business_area: Option<BusinessArea>,
}

impl Project {
    /// Display tag such as `SP-2024-12`.
    pub fn tag(&self) -> String {
        format!("{}-{}-{}", self.kind.tag(), self.year, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub pk: u64,
    pub project: u64,
    pub user: UserSummary,
    pub role: ProjectRole,
    #[serde(default)]
    pub time_allocation: f64,
    pub position: u32,
    pub is_leader: bool,
    #[serde(default)]
    pub short_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub pk: u64,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub project: Project,
    #[serde(flatten)]
    pub flags: ApprovalFlags,
    #[serde(default)]
    pub creator: Option<u64>,
    #[serde(default)]
    pub modifier: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Documents attached to a project, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocuments {
    #[serde(default)]
    pub concept_plan: Option<ProjectDocument>,
    #[serde(default)]
    pub project_plan: Option<ProjectDocument>,
    #[serde(default)]
    pub progress_reports: Vec<ProjectDocument>,
    #[serde(default)]
    pub student_reports: Vec<ProjectDocument>,
    #[serde(default)]
    pub project_closure: Option<ProjectDocument>,
}

impl ProjectDocuments {
    pub fn count(&self) -> usize {
        self.concept_plan.iter().count()
            + self.project_plan.iter().count()
            + self.progress_reports.len()
            + self.student_reports.len()
            + self.project_closure.iter().count()
    }

    pub fn progress_report_count(&self) -> usize {
        self.progress_reports.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullProject {
    pub project: Project,
    pub documents: ProjectDocuments,
    #[serde(default)]
    pub members: Vec<ProjectMember>,
}

impl FullProject {
    pub fn leader(&self) -> Option<&ProjectMember> {
        self.members.iter().find(|member| member.is_leader)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub pk: u64,
    pub user: UserSummary,
    pub payload: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_stage_is_lowest_unapproved() {
        assert_eq!(ApprovalFlags::default().next_stage(), Some(Stage::ProjectLead));
        assert_eq!(
            ApprovalFlags::new(true, false, false).next_stage(),
            Some(Stage::BusinessAreaLead)
        );
        assert_eq!(ApprovalFlags::new(true, true, true).next_stage(), None);
        assert_eq!(
            ApprovalFlags::new(false, true, false).next_stage(),
            Some(Stage::ProjectLead)
        );
    }

    #[test]
    fn test_flags_deserialize_from_document_fields() {
        let json = serde_json::json!({
            "pk": 7,
            "kind": "projectplan",
            "status": "inapproval",
            "project": {"pk": 3, "status": "active", "kind": "science", "year": 2024, "number": 12},
            "project_lead_approval_granted": true,
            "business_area_lead_approval_granted": false,
            "directorate_approval_granted": false
        });

        let document: ProjectDocument = serde_json::from_value(json).unwrap();
        assert_eq!(document.kind, DocumentKind::ProjectPlan);
        assert_eq!(document.status, DocumentStatus::InApproval);
        assert_eq!(document.flags, ApprovalFlags::new(true, false, false));
        assert_eq!(document.project.tag(), "SP-2024-12");
    }

    #[test]
    fn test_project_status_wire_names() {
        assert_eq!(
            serde_json::to_value(ProjectStatus::ClosureRequested).unwrap(),
            serde_json::json!("closure_requested")
        );
        assert_eq!(ProjectStatus::parse("final_update"), Some(ProjectStatus::FinalUpdate));
        assert_eq!(ProjectStatus::parse("archived"), None);
        assert!(ProjectStatus::Suspended.is_closed());
        assert!(!ProjectStatus::Closing.is_closed());
    }

    #[test]
    fn test_stage_serializes_as_number() {
        assert_eq!(serde_json::to_value(Stage::Directorate).unwrap(), serde_json::json!(3));
        let stage: Stage = serde_json::from_value(serde_json::json!(2)).unwrap();
        assert_eq!(stage, Stage::BusinessAreaLead);
        assert!(serde_json::from_value::<Stage>(serde_json::json!(4)).is_err());
    }

    #[test]
    fn test_project_without_document_listing_is_rejected() {
        let project = serde_json::json!({"pk": 3, "status": "active", "kind": "science", "year": 2024, "number": 12});
        let missing = serde_json::json!({"project": project, "members": []});
        assert!(serde_json::from_value::<FullProject>(missing).is_err());

        let listed = serde_json::json!({"project": project, "documents": {}});
        let full: FullProject = serde_json::from_value(listed).unwrap();
        assert_eq!(full.documents.count(), 0);
        assert!(full.members.is_empty());
    }
}
