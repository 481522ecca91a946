// Team ordering
//
// Reordering is a pure move-and-renumber over the team list; the leader is
// always pinned to position 1 regardless of where the move places them.

use thiserror::Error;

use crate::domain::{CallerRole, CallerRoles, ProjectMember};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TeamError {
    #[error("team has no members")]
    EmptyTeam,
    #[error("index {index} is out of range for a team of {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("team must have exactly one leader, found {count}")]
    LeaderCount { count: usize },
    #[error("member {member} has time allocation {value}, expected a fraction between 0 and 1")]
    InvalidTimeAllocation { member: u64, value: f64 },
    #[error("user {user} is not a member of this team")]
    MemberNotFound { user: u64 },
}

/// Check the team invariants: one leader, sane time allocations.
pub fn validate_team(team: &[ProjectMember]) -> Result<(), TeamError> {
    if team.is_empty() {
        return Err(TeamError::EmptyTeam);
    }

    let leaders = team.iter().filter(|member| member.is_leader).count();
    if leaders != 1 {
        return Err(TeamError::LeaderCount { count: leaders });
    }

    if let Some(member) = team
        .iter()
        .find(|member| !(0.0..=1.0).contains(&member.time_allocation))
    {
        return Err(TeamError::InvalidTimeAllocation {
            member: member.pk,
            value: member.time_allocation,
        });
    }

    Ok(())
}

/// Team members in display order.
pub fn sorted_by_position(team: &[ProjectMember]) -> Vec<ProjectMember> {
    let mut sorted = team.to_vec();
    sorted.sort_by_key(|member| member.position);
    sorted
}

/// Move the member at `from` to `to` (indices into display order) and renumber 1..N.
pub fn reorder(
    team: &[ProjectMember],
    from: usize,
    to: usize,
) -> Result<Vec<ProjectMember>, TeamError> {
    validate_team(team)?;
    let len = team.len();
    for index in [from, to] {
        if index >= len {
            return Err(TeamError::IndexOutOfRange { index, len });
        }
    }

    let mut members = sorted_by_position(team);
    let moved = members.remove(from);
    members.insert(to, moved);

    pin_leader_and_renumber(&mut members);
    tracing::debug!(from, to, len, "Reordered team");
    Ok(members)
}

/// Make `user_pk` the sole leader and move them to position 1.
pub fn promote_leader(
    team: &[ProjectMember],
    user_pk: u64,
) -> Result<Vec<ProjectMember>, TeamError> {
    if !team.iter().any(|member| member.user.pk == user_pk) {
        return Err(TeamError::MemberNotFound { user: user_pk });
    }

    let mut members = sorted_by_position(team);
    for member in members.iter_mut() {
        member.is_leader = member.user.pk == user_pk;
    }
    pin_leader_and_renumber(&mut members);
    Ok(members)
}

/// Whether the caller may rearrange the team.
pub fn can_manage_team(roles: &CallerRoles) -> bool {
    roles.any_of(&[
        CallerRole::Superuser,
        CallerRole::CaretakerOfAdmin,
        CallerRole::ProjectLead,
        CallerRole::CaretakerOfProjectLead,
        CallerRole::BusinessAreaLead,
        CallerRole::CaretakerOfBusinessAreaLead,
    ])
}

fn pin_leader_and_renumber(members: &mut Vec<ProjectMember>) {
    if let Some(leader_index) = members.iter().position(|member| member.is_leader) {
        let leader = members.remove(leader_index);
        members.insert(0, leader);
    }
    for (index, member) in members.iter_mut().enumerate() {
        member.position = index as u32 + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectRole, UserSummary};

    fn team(size: u64, leader: u64) -> Vec<ProjectMember> {
        (1..=size)
            .map(|pk| ProjectMember {
                pk,
                project: 1,
                user: UserSummary {
                    pk: pk * 10,
                    ..Default::default()
                },
                role: ProjectRole::Research,
                time_allocation: 0.2,
                position: pk as u32,
                is_leader: pk == leader,
                short_code: None,
            })
            .collect()
    }

    fn order(members: &[ProjectMember]) -> Vec<u64> {
        members.iter().map(|member| member.pk).collect()
    }

    #[test]
    fn test_move_down() {
        let result = reorder(&team(4, 1), 1, 3).unwrap();
        assert_eq!(order(&result), vec![1, 3, 4, 2]);
        assert_eq!(
            result.iter().map(|m| m.position).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_leader_stays_first_when_displaced() {
        // Dropping a member onto the leader's slot must not unseat the leader.
        let result = reorder(&team(3, 1), 2, 0).unwrap();
        assert_eq!(order(&result), vec![1, 3, 2]);
        assert!(result[0].is_leader);
    }

    #[test]
    fn test_leader_dragged_down_is_pinned_back() {
        let result = reorder(&team(3, 1), 0, 2).unwrap();
        assert_eq!(order(&result), vec![1, 2, 3]);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            reorder(&team(2, 1), 0, 5),
            Err(TeamError::IndexOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn test_rejects_teams_without_single_leader() {
        assert_eq!(
            reorder(&team(3, 0), 0, 1),
            Err(TeamError::LeaderCount { count: 0 })
        );
        let mut two_leaders = team(3, 1);
        two_leaders[2].is_leader = true;
        assert_eq!(
            validate_team(&two_leaders),
            Err(TeamError::LeaderCount { count: 2 })
        );
    }

    #[test]
    fn test_rejects_bad_time_allocation() {
        let mut members = team(2, 1);
        members[1].time_allocation = 1.5;
        assert!(matches!(
            validate_team(&members),
            Err(TeamError::InvalidTimeAllocation { member: 2, .. })
        ));
    }

    #[test]
    fn test_promote_leader() {
        let result = promote_leader(&team(3, 1), 30).unwrap();
        assert_eq!(order(&result), vec![3, 1, 2]);
        assert_eq!(result.iter().filter(|m| m.is_leader).count(), 1);
        assert_eq!(result[0].position, 1);

        assert_eq!(
            promote_leader(&team(3, 1), 999),
            Err(TeamError::MemberNotFound { user: 999 })
        );
    }

    #[test]
    fn test_can_manage_team() {
        assert!(can_manage_team(&CallerRoles::new().with(CallerRole::CaretakerOfProjectLead)));
        assert!(!can_manage_team(&CallerRoles::new().with(CallerRole::TeamMember)));
        assert!(!can_manage_team(&CallerRoles::new().with(CallerRole::Directorate)));
    }
}
