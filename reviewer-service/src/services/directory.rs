use reviewer_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{PullRequestShort, Team, TeamMember, User};
use crate::store::{constraints, Store, StoreError};

/// Creates a team and moves every listed member into it in one transaction.
/// Members that already exist have their username and activity overwritten.
pub fn create_team<S: Store>(
    store: &S,
    team_name: &str,
    members: &[TeamMember],
) -> AppResult<Team> {
    let team = store.transaction(|repo| {
        repo.insert_team(team_name).map_err(|e| match e {
            StoreError::Conflict { constraint } if constraint == constraints::TEAMS_PKEY => {
                AppError::new(ErrorCode::TeamExists, format!("{team_name} already exists"))
            }
            other => other.into(),
        })?;

        for member in members {
            repo.upsert_user(&User {
                user_id: member.user_id.clone(),
                username: member.username.clone(),
                team_name: Some(team_name.to_string()),
                is_active: member.is_active,
            })?;
        }

        let members = repo.list_team_members(team_name)?;
        Ok(Team {
            team_name: team_name.to_string(),
            members: members.iter().map(User::member).collect(),
        })
    })?;

    tracing::info!(team_name = %team.team_name, members = team.members.len(), "team created");
    Ok(team)
}

pub fn get_team<S: Store>(store: &S, team_name: &str) -> AppResult<Team> {
    store.transaction(|repo| {
        if !repo.team_exists(team_name)? {
            return Err(AppError::not_found("team not found"));
        }
        let members = repo.list_team_members(team_name)?;
        Ok(Team {
            team_name: team_name.to_string(),
            members: members.iter().map(User::member).collect(),
        })
    })
}

/// Sets one user's activity flag. Open pull requests are left as they are.
pub fn set_user_active<S: Store>(store: &S, user_id: &str, is_active: bool) -> AppResult<User> {
    let user = store.transaction(|repo| {
        repo.set_user_active(user_id, is_active)?
            .ok_or_else(|| AppError::not_found("user not found"))
    })?;

    tracing::info!(user_id = %user_id, is_active, "user activity updated");
    Ok(user)
}

pub fn reviews_for_user<S: Store>(store: &S, user_id: &str) -> AppResult<Vec<PullRequestShort>> {
    store.transaction(|repo| Ok(repo.list_reviews_for_user(user_id)?))
}
