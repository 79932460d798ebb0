use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use reviewer_shared::errors::AppResult;
use reviewer_shared::middleware::{ValidatedJson, ValidatedQuery};

use crate::models::{DeactivationOutcome, PullRequestShort, User};
use crate::services::{assignment, directory};
use crate::store::{run_blocking, Store};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SetIsActiveRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

pub async fn set_is_active<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedJson(req): ValidatedJson<SetIsActiveRequest>,
) -> AppResult<Json<UserResponse>> {
    let store = state.store.clone();
    let user = run_blocking(move || {
        directory::set_user_active(&*store, &req.user_id, req.is_active)
    })
    .await?;
    Ok(Json(UserResponse { user }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewQuery {
    #[validate(length(min = 1))]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}

/// Every pull request, open or merged, that lists the user as a reviewer.
pub async fn get_review<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedQuery(query): ValidatedQuery<ReviewQuery>,
) -> AppResult<Json<ReviewsResponse>> {
    let store = state.store.clone();
    let user_id = query.user_id.clone();
    let pull_requests = run_blocking(move || directory::reviews_for_user(&*store, &user_id)).await?;
    Ok(Json(ReviewsResponse {
        user_id: query.user_id,
        pull_requests,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeactivateRequest {
    #[validate(length(min = 1))]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub outcome: DeactivationOutcome,
}

pub async fn deactivate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedJson(req): ValidatedJson<DeactivateRequest>,
) -> AppResult<Json<DeactivateResponse>> {
    let store = state.store.clone();
    let outcome = run_blocking(move || assignment::deactivate_users(&*store, &req.user_ids)).await?;
    Ok(Json(DeactivateResponse {
        status: "completed",
        outcome,
    }))
}
