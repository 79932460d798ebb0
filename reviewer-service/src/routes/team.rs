use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use reviewer_shared::errors::AppResult;
use reviewer_shared::middleware::{ValidatedJson, ValidatedQuery};

use crate::models::{Team, TeamMember};
use crate::services::directory;
use crate::store::{run_blocking, Store};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TeamMemberRequest {
    #[validate(length(min = 1, max = 255))]
    pub user_id: String,
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddTeamRequest {
    #[validate(length(min = 1, max = 255))]
    pub team_name: String,
    #[serde(default)]
    #[validate]
    pub members: Vec<TeamMemberRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TeamQuery {
    #[validate(length(min = 1))]
    pub team_name: String,
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub team: Team,
}

pub async fn add_team<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedJson(req): ValidatedJson<AddTeamRequest>,
) -> AppResult<(StatusCode, Json<TeamResponse>)> {
    let members: Vec<TeamMember> = req
        .members
        .into_iter()
        .map(|m| TeamMember {
            user_id: m.user_id,
            username: m.username,
            is_active: m.is_active,
        })
        .collect();

    let store = state.store.clone();
    let team =
        run_blocking(move || directory::create_team(&*store, &req.team_name, &members)).await?;

    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

pub async fn get_team<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedQuery(query): ValidatedQuery<TeamQuery>,
) -> AppResult<Json<Team>> {
    let store = state.store.clone();
    let team = run_blocking(move || directory::get_team(&*store, &query.team_name)).await?;
    Ok(Json(team))
}
