use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use reviewer_shared::errors::AppResult;

use crate::models::UserAssignmentStats;
use crate::services::stats;
use crate::store::{run_blocking, Store};
use crate::AppState;

pub async fn assignments<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> AppResult<Json<Vec<UserAssignmentStats>>> {
    let store = state.store.clone();
    let rows = run_blocking(move || stats::assignment_stats(&*store)).await?;
    Ok(Json(rows))
}
