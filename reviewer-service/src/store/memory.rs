//! In-memory implementation of [`Store`].
//!
//! All state lives behind one mutex. A transaction runs against a clone of
//! the current state and replaces it only when the work succeeds, which gives
//! the same all-or-nothing behaviour as a database transaction. Work that
//! overruns the transaction timeout is discarded the same way.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use reviewer_shared::errors::{AppError, AppResult};

use super::{
    constraints, Deadline, Repository, Store, StoreError, StoreResult, DEFAULT_TRANSACTION_TIMEOUT,
};
use crate::models::{
    AuthoredPr, NewPullRequest, PrStatus, PullRequest, PullRequestShort, User,
    UserAssignmentStats,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    teams: BTreeSet<String>,
    users: BTreeMap<String, User>,
    pull_requests: BTreeMap<String, PullRequest>,
}

#[derive(Debug)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    transaction_timeout: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_transaction_timeout(DEFAULT_TRANSACTION_TIMEOUT)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction_timeout(transaction_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            transaction_timeout,
        }
    }
}

impl Store for InMemoryStore {
    fn transaction<T, F>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&mut dyn Repository) -> AppResult<T>,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::internal("in-memory store lock poisoned"))?;

        let deadline = Deadline::after(self.transaction_timeout);
        let mut draft = state.clone();
        let value = work(&mut MemoryRepository { state: &mut draft })?;
        deadline.check()?;
        *state = draft;
        Ok(value)
    }
}

struct MemoryRepository<'a> {
    state: &'a mut MemoryState,
}

impl MemoryRepository<'_> {
    fn pull_request_mut(&mut self, pull_request_id: &str) -> StoreResult<&mut PullRequest> {
        self.state
            .pull_requests
            .get_mut(pull_request_id)
            .ok_or_else(|| StoreError::Backend(format!("pull request {pull_request_id} vanished")))
    }
}

impl Repository for MemoryRepository<'_> {
    fn ping(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn insert_team(&mut self, team_name: &str) -> StoreResult<()> {
        if !self.state.teams.insert(team_name.to_string()) {
            return Err(StoreError::Conflict {
                constraint: constraints::TEAMS_PKEY.into(),
            });
        }
        Ok(())
    }

    fn team_exists(&mut self, team_name: &str) -> StoreResult<bool> {
        Ok(self.state.teams.contains(team_name))
    }

    fn upsert_user(&mut self, user: &User) -> StoreResult<()> {
        self.state.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    fn list_team_members(&mut self, team_name: &str) -> StoreResult<Vec<User>> {
        Ok(self
            .state
            .users
            .values()
            .filter(|u| u.team_name.as_deref() == Some(team_name))
            .cloned()
            .collect())
    }

    fn get_user(&mut self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.state.users.get(user_id).cloned())
    }

    fn set_user_active(&mut self, user_id: &str, is_active: bool) -> StoreResult<Option<User>> {
        Ok(self.state.users.get_mut(user_id).map(|user| {
            user.is_active = is_active;
            user.clone()
        }))
    }

    fn list_active_teammates(
        &mut self,
        team_name: &str,
        exclude_user_id: &str,
    ) -> StoreResult<Vec<String>> {
        Ok(self
            .state
            .users
            .values()
            .filter(|u| {
                u.is_active
                    && u.user_id != exclude_user_id
                    && u.team_name.as_deref() == Some(team_name)
            })
            .map(|u| u.user_id.clone())
            .collect())
    }

    fn deactivate_users(&mut self, user_ids: &[String]) -> StoreResult<Vec<String>> {
        let mut changed = Vec::new();
        for user_id in user_ids {
            if let Some(user) = self.state.users.get_mut(user_id) {
                if user.is_active {
                    user.is_active = false;
                    changed.push(user.user_id.clone());
                }
            }
        }
        Ok(changed)
    }

    fn insert_pull_request(&mut self, pr: &NewPullRequest) -> StoreResult<PullRequest> {
        if self.state.pull_requests.contains_key(&pr.pull_request_id) {
            return Err(StoreError::Conflict {
                constraint: constraints::PULL_REQUESTS_PKEY.into(),
            });
        }
        let stored = PullRequest {
            pull_request_id: pr.pull_request_id.clone(),
            pull_request_name: pr.pull_request_name.clone(),
            author_id: pr.author_id.clone(),
            status: pr.status.parse().map_err(StoreError::Backend)?,
            assigned_reviewers: pr.assigned_reviewers.clone(),
            created_at: pr.created_at,
            merged_at: None,
        };
        self.state
            .pull_requests
            .insert(stored.pull_request_id.clone(), stored.clone());
        Ok(stored)
    }

    fn get_pull_request(&mut self, pull_request_id: &str) -> StoreResult<Option<PullRequest>> {
        Ok(self.state.pull_requests.get(pull_request_id).cloned())
    }

    fn lock_pull_request(&mut self, pull_request_id: &str) -> StoreResult<Option<PullRequest>> {
        // The store mutex already serialises transactions.
        self.get_pull_request(pull_request_id)
    }

    fn mark_merged(&mut self, pull_request_id: &str, merged_at: DateTime<Utc>) -> StoreResult<()> {
        let pr = self.pull_request_mut(pull_request_id)?;
        if pr.status == PrStatus::Open {
            pr.status = PrStatus::Merged;
            pr.merged_at = Some(merged_at);
        }
        Ok(())
    }

    fn update_reviewers(&mut self, pull_request_id: &str, reviewers: &[String]) -> StoreResult<()> {
        self.pull_request_mut(pull_request_id)?.assigned_reviewers = reviewers.to_vec();
        Ok(())
    }

    fn find_open_prs_by_authors(&mut self, author_ids: &[String]) -> StoreResult<Vec<AuthoredPr>> {
        Ok(self
            .state
            .pull_requests
            .values()
            .filter(|pr| pr.status == PrStatus::Open && author_ids.contains(&pr.author_id))
            .map(|pr| AuthoredPr {
                pull_request_id: pr.pull_request_id.clone(),
                author_id: pr.author_id.clone(),
            })
            .collect())
    }

    fn list_reviews_for_user(&mut self, user_id: &str) -> StoreResult<Vec<PullRequestShort>> {
        Ok(self
            .state
            .pull_requests
            .values()
            .filter(|pr| pr.assigned_reviewers.iter().any(|r| r == user_id))
            .map(PullRequestShort::from)
            .collect())
    }

    fn count_review_assignments(&mut self) -> StoreResult<Vec<UserAssignmentStats>> {
        let mut stats: Vec<UserAssignmentStats> = self
            .state
            .users
            .values()
            .map(|user| UserAssignmentStats {
                user_id: user.user_id.clone(),
                username: user.username.clone(),
                assigned_pr_count: self
                    .state
                    .pull_requests
                    .values()
                    .flat_map(|pr| pr.assigned_reviewers.iter())
                    .filter(|r| **r == user.user_id)
                    .count() as i64,
            })
            .collect();

        stats.sort_by(|a, b| {
            b.assigned_pr_count
                .cmp(&a.assigned_pr_count)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(stats)
    }
}
