use reviewer_shared::errors::AppResult;

use crate::models::UserAssignmentStats;
use crate::store::Store;

/// Review assignment counts for every known user, busiest first.
///
/// Counts cover open and merged pull requests alike; users with no
/// assignments are reported with zero.
pub fn assignment_stats<S: Store>(store: &S) -> AppResult<Vec<UserAssignmentStats>> {
    store.transaction(|repo| Ok(repo.count_review_assignments()?))
}
