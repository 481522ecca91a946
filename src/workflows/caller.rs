use crate::api::{ApiError, DirectorateMember, SpmsOps};
use crate::domain::{BusinessArea, CallerRoles, FullProject, ProjectMember, User, UserSummary};

/// Everything fetched about the caller and a project before gating an action.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user: User,
    pub project: FullProject,
    pub team: Vec<ProjectMember>,
    pub business_area: Option<BusinessArea>,
    pub directorate: Vec<DirectorateMember>,
    pub roles: CallerRoles,
}

impl CallerContext {
    pub async fn load<O: SpmsOps + ?Sized>(ops: &O, project_pk: u64) -> Result<Self, ApiError> {
        let user = ops.me().await?;
        let project = ops.project(project_pk).await?;
        let team = ops.team(project_pk).await?;

        let business_area = match project.project.business_area.as_ref() {
            Some(area) => Some(ops.business_area(area.pk).await?),
            None => None,
        };
        let directorate = match business_area.as_ref().and_then(|area| area.division) {
            Some(division) => ops.directorate(division).await?,
            None => Vec::new(),
        };

        let directorate_users: Vec<UserSummary> =
            directorate.iter().map(UserSummary::from).collect();
        let roles = CallerRoles::resolve(&user, &team, business_area.as_ref(), &directorate_users);

        Ok(Self {
            user,
            project,
            team,
            business_area,
            directorate,
            roles,
        })
    }

    /// Stage-2 approval forwards to the directorate, which must exist.
    pub fn directorate_available(&self) -> bool {
        !self.directorate.is_empty()
    }
}
