// Caller role resolution
// A caller's relationship to a project, collapsed into a set the approval gate can query.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::types::{BusinessArea, ProjectMember, Stage, User, UserSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallerRole {
    Superuser,
    TeamMember,
    ProjectLead,
    BusinessAreaLead,
    Directorate,
    CaretakerOfAdmin,
    CaretakerOfProjectLead,
    CaretakerOfBusinessAreaLead,
    CaretakerOfMember,
}

impl CallerRole {
    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase())).ok()
    }
}

/// Roles that may act on a given approval stage.
pub fn stage_roles(stage: Stage) -> &'static [CallerRole] {
    match stage {
        Stage::ProjectLead => &[
            CallerRole::Superuser,
            CallerRole::CaretakerOfAdmin,
            CallerRole::ProjectLead,
            CallerRole::CaretakerOfProjectLead,
            CallerRole::BusinessAreaLead,
            CallerRole::CaretakerOfBusinessAreaLead,
        ],
        Stage::BusinessAreaLead => &[
            CallerRole::Superuser,
            CallerRole::CaretakerOfAdmin,
            CallerRole::BusinessAreaLead,
            CallerRole::CaretakerOfBusinessAreaLead,
        ],
        Stage::Directorate => &[
            CallerRole::Superuser,
            CallerRole::CaretakerOfAdmin,
            CallerRole::Directorate,
        ],
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerRoles {
    roles: BTreeSet<CallerRole>,
}

impl CallerRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: CallerRole) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn insert(&mut self, role: CallerRole) {
        self.roles.insert(role);
    }

    pub fn contains(&self, role: CallerRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn any_of(&self, roles: &[CallerRole]) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }

    pub fn can_act_on(&self, stage: Stage) -> bool {
        self.any_of(stage_roles(stage))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallerRole> {
        self.roles.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Resolve the caller's roles from fetched project context.
    pub fn resolve(
        user: &User,
        team: &[ProjectMember],
        business_area: Option<&BusinessArea>,
        directorate: &[UserSummary],
    ) -> Self {
        let mut roles = CallerRoles::new();
        let leader = team.iter().find(|member| member.is_leader).map(|m| m.user.pk);
        let ba_leader = business_area.and_then(|area| area.leader);

        if user.is_superuser {
            roles.insert(CallerRole::Superuser);
        }
        if team.iter().any(|member| member.user.pk == user.pk) {
            roles.insert(CallerRole::TeamMember);
        }
        if leader == Some(user.pk) {
            roles.insert(CallerRole::ProjectLead);
        }
        if ba_leader == Some(user.pk) {
            roles.insert(CallerRole::BusinessAreaLead);
        }
        if directorate.iter().any(|member| member.pk == user.pk) {
            roles.insert(CallerRole::Directorate);
        }

        for absent in &user.caretaking_for {
            if absent.is_superuser {
                roles.insert(CallerRole::CaretakerOfAdmin);
            }
            if leader == Some(absent.pk) {
                roles.insert(CallerRole::CaretakerOfProjectLead);
            }
            if ba_leader == Some(absent.pk) {
                roles.insert(CallerRole::CaretakerOfBusinessAreaLead);
            }
            if team.iter().any(|member| member.user.pk == absent.pk) {
                roles.insert(CallerRole::CaretakerOfMember);
            }
        }

        tracing::debug!(user = user.pk, roles = ?roles.roles, "Resolved caller roles");
        roles
    }
}

impl FromIterator<CallerRole> for CallerRoles {
    fn from_iter<T: IntoIterator<Item = CallerRole>>(iter: T) -> Self {
        Self {
            roles: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ProjectRole;

    fn member(pk: u64, user_pk: u64, is_leader: bool) -> ProjectMember {
        ProjectMember {
            pk,
            project: 1,
            user: UserSummary {
                pk: user_pk,
                ..Default::default()
            },
            role: ProjectRole::Research,
            time_allocation: 0.5,
            position: pk as u32,
            is_leader,
            short_code: None,
        }
    }

    #[test]
    fn test_resolve_direct_roles() {
        let team = vec![member(1, 10, true), member(2, 11, false)];
        let area = BusinessArea {
            pk: 4,
            leader: Some(20),
            division: Some(1),
            ..Default::default()
        };
        let directorate = vec![UserSummary {
            pk: 30,
            ..Default::default()
        }];

        let lead = User {
            pk: 10,
            ..Default::default()
        };
        let roles = CallerRoles::resolve(&lead, &team, Some(&area), &directorate);
        assert!(roles.contains(CallerRole::ProjectLead));
        assert!(roles.contains(CallerRole::TeamMember));
        assert!(!roles.contains(CallerRole::BusinessAreaLead));

        let director = User {
            pk: 30,
            ..Default::default()
        };
        let roles = CallerRoles::resolve(&director, &team, Some(&area), &directorate);
        assert!(roles.contains(CallerRole::Directorate));
        assert!(!roles.contains(CallerRole::TeamMember));
    }

    #[test]
    fn test_resolve_caretaker_roles() {
        let team = vec![member(1, 10, true), member(2, 11, false)];
        let area = BusinessArea {
            pk: 4,
            leader: Some(20),
            ..Default::default()
        };
        let caretaker = User {
            pk: 99,
            caretaking_for: vec![
                UserSummary {
                    pk: 10,
                    ..Default::default()
                },
                UserSummary {
                    pk: 20,
                    ..Default::default()
                },
                UserSummary {
                    pk: 1,
                    is_superuser: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let roles = CallerRoles::resolve(&caretaker, &team, Some(&area), &[]);
        assert!(roles.contains(CallerRole::CaretakerOfProjectLead));
        assert!(roles.contains(CallerRole::CaretakerOfBusinessAreaLead));
        assert!(roles.contains(CallerRole::CaretakerOfAdmin));
        assert!(roles.contains(CallerRole::CaretakerOfMember));
        assert!(!roles.contains(CallerRole::ProjectLead));
        assert!(roles.can_act_on(Stage::Directorate));
    }

    #[test]
    fn test_stage_roles() {
        let ba_lead = CallerRoles::new().with(CallerRole::BusinessAreaLead);
        assert!(ba_lead.can_act_on(Stage::ProjectLead));
        assert!(ba_lead.can_act_on(Stage::BusinessAreaLead));
        assert!(!ba_lead.can_act_on(Stage::Directorate));

        let member = CallerRoles::new().with(CallerRole::TeamMember);
        assert!(Stage::ALL.iter().all(|stage| !member.can_act_on(*stage)));
    }

    #[test]
    fn test_parse_role_names() {
        assert_eq!(CallerRole::parse("ba-lead"), None);
        assert_eq!(CallerRole::parse("business-area-lead"), Some(CallerRole::BusinessAreaLead));
        assert_eq!(CallerRole::parse("caretaker-of-admin"), Some(CallerRole::CaretakerOfAdmin));
    }
}
