//! Persistence abstraction for teams, users and pull requests.
//!
//! The engine never talks to a driver directly. It receives a [`Store`],
//! opens a transaction, and works against the [`Repository`] handed to it.
//! `PgStore` backs production; `InMemoryStore` backs tests.

mod memory;
mod pg;

pub use memory::InMemoryStore;
pub use pg::PgStore;

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use reviewer_shared::errors::{AppError, AppResult};

use crate::models::{
    AuthoredPr, NewPullRequest, PullRequest, PullRequestShort, User, UserAssignmentStats,
};

/// Failures a repository reports, independent of the driver underneath.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {constraint}")]
    Conflict { constraint: String },

    /// The transaction ran past its deadline and was rolled back.
    #[error("transaction deadline exceeded")]
    DeadlineExceeded,

    #[error("store failure: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        // Conflicts that matter are mapped by the caller; anything that
        // reaches this point is unexpected.
        AppError::Internal(anyhow::Error::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Transaction budget used when none is configured.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Wall-clock bound on one transaction, measured from its start.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Fails once the deadline has passed. Stores call this before every
    /// statement and once more right before commit.
    pub fn check(&self) -> StoreResult<()> {
        if Instant::now() >= self.expires_at {
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Constraint names reported in [`StoreError::Conflict`].
pub mod constraints {
    pub const TEAMS_PKEY: &str = "teams_pkey";
    pub const PULL_REQUESTS_PKEY: &str = "pull_requests_pkey";
}

/// Operations available inside one transaction.
pub trait Repository {
    fn ping(&mut self) -> StoreResult<()>;

    // --- Teams and users ---

    fn insert_team(&mut self, team_name: &str) -> StoreResult<()>;

    fn team_exists(&mut self, team_name: &str) -> StoreResult<bool>;

    /// Insert the user or overwrite username, team and activity flag.
    fn upsert_user(&mut self, user: &User) -> StoreResult<()>;

    /// Members of a team ordered by `user_id`.
    fn list_team_members(&mut self, team_name: &str) -> StoreResult<Vec<User>>;

    fn get_user(&mut self, user_id: &str) -> StoreResult<Option<User>>;

    fn set_user_active(&mut self, user_id: &str, is_active: bool) -> StoreResult<Option<User>>;

    /// Active members of `team_name` other than `exclude_user_id`.
    fn list_active_teammates(
        &mut self,
        team_name: &str,
        exclude_user_id: &str,
    ) -> StoreResult<Vec<String>>;

    /// Flip every currently active id to inactive; returns the ids that changed.
    fn deactivate_users(&mut self, user_ids: &[String]) -> StoreResult<Vec<String>>;

    // --- Pull requests ---

    fn insert_pull_request(&mut self, pr: &NewPullRequest) -> StoreResult<PullRequest>;

    fn get_pull_request(&mut self, pull_request_id: &str) -> StoreResult<Option<PullRequest>>;

    /// Like [`Repository::get_pull_request`], holding a row lock until the
    /// transaction ends.
    fn lock_pull_request(&mut self, pull_request_id: &str) -> StoreResult<Option<PullRequest>>;

    /// Transition OPEN to MERGED. A merged row is left untouched.
    fn mark_merged(&mut self, pull_request_id: &str, merged_at: DateTime<Utc>) -> StoreResult<()>;

    fn update_reviewers(&mut self, pull_request_id: &str, reviewers: &[String]) -> StoreResult<()>;

    /// OPEN pull requests authored by any of `author_ids`, locked for update.
    fn find_open_prs_by_authors(&mut self, author_ids: &[String]) -> StoreResult<Vec<AuthoredPr>>;

    fn list_reviews_for_user(&mut self, user_id: &str) -> StoreResult<Vec<PullRequestShort>>;

    /// Per-user review assignment counts over all pull requests, ordered by
    /// count descending then username ascending.
    fn count_review_assignments(&mut self) -> StoreResult<Vec<UserAssignmentStats>>;
}

/// A transactional store handle, shared across requests.
pub trait Store: Send + Sync + 'static {
    /// Run `work` atomically: commit when it returns `Ok` within the store's
    /// transaction timeout, roll back otherwise.
    fn transaction<T, F>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&mut dyn Repository) -> AppResult<T>;
}

/// Run blocking store work off the async runtime.
///
/// The caller always waits for the work to finish, so the response reflects
/// whether the transaction committed.
pub async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::internal(format!("store task failed: {e}")))?
}
