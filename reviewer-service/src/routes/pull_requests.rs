use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use reviewer_shared::errors::AppResult;
use reviewer_shared::middleware::ValidatedJson;

use crate::models::{PullRequest, Reassignment};
use crate::services::assignment;
use crate::store::{run_blocking, Store};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PullRequestResponse {
    pub pr: PullRequest,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePullRequest {
    #[validate(length(min = 1, max = 255))]
    pub pull_request_id: String,
    #[validate(length(min = 1, max = 255))]
    pub pull_request_name: String,
    #[validate(length(min = 1, max = 255))]
    pub author_id: String,
}

pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedJson(req): ValidatedJson<CreatePullRequest>,
) -> AppResult<(StatusCode, Json<PullRequestResponse>)> {
    let store = state.store.clone();
    let pr = run_blocking(move || {
        assignment::create_pull_request(
            &*store,
            &req.pull_request_id,
            &req.pull_request_name,
            &req.author_id,
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(PullRequestResponse { pr })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct MergePullRequest {
    #[validate(length(min = 1))]
    pub pull_request_id: String,
}

pub async fn merge<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedJson(req): ValidatedJson<MergePullRequest>,
) -> AppResult<Json<PullRequestResponse>> {
    let store = state.store.clone();
    let pr =
        run_blocking(move || assignment::merge_pull_request(&*store, &req.pull_request_id)).await?;
    Ok(Json(PullRequestResponse { pr }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReassignReviewer {
    #[validate(length(min = 1))]
    pub pull_request_id: String,
    #[validate(length(min = 1))]
    pub old_user_id: String,
}

pub async fn reassign<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedJson(req): ValidatedJson<ReassignReviewer>,
) -> AppResult<Json<Reassignment>> {
    let store = state.store.clone();
    let reassignment = run_blocking(move || {
        assignment::reassign_reviewer(&*store, &req.pull_request_id, &req.old_user_id)
    })
    .await?;
    Ok(Json(reassignment))
}
