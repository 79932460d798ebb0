//! PostgreSQL implementation of [`Store`] on top of diesel and r2d2.

use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use reviewer_shared::clients::db::DbPool;
use reviewer_shared::errors::{AppError, AppResult};

use super::{Deadline, Repository, Store, StoreError, StoreResult};
use crate::models::{
    AuthoredPr, NewPullRequest, NewTeam, PrStatus, PullRequest, PullRequestRow,
    PullRequestShort, User, UserAssignmentStats,
};
use crate::schema::{pull_requests, teams, users};

pub struct PgStore {
    pool: DbPool,
    statement_timeout: Duration,
    transaction_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, statement_timeout: Duration, transaction_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
            transaction_timeout,
        }
    }
}

impl Store for PgStore {
    fn transaction<T, F>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&mut dyn Repository) -> AppResult<T>,
    {
        let mut pooled = self
            .pool
            .get()
            .map_err(|e| AppError::internal(format!("db pool error: {e}")))?;
        let conn: &mut PgConnection = &mut pooled;

        let deadline = Deadline::after(self.transaction_timeout);
        let statement_timeout = self.statement_timeout;
        conn.transaction::<T, AppError, _>(|conn| {
            // No single statement may outlive the transaction budget.
            let timeout_ms = statement_timeout.min(deadline.remaining()).as_millis().max(1);
            diesel::sql_query(format!("SET LOCAL statement_timeout = {timeout_ms}"))
                .execute(conn)?;

            let value = work(&mut PgRepository { conn, deadline })?;
            deadline.check()?;
            Ok(value)
        })
    }
}

struct PgRepository<'a> {
    conn: &'a mut PgConnection,
    deadline: Deadline,
}

impl PgRepository<'_> {
    /// The connection, provided the transaction is still within its deadline.
    fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        self.deadline.check()?;
        Ok(&mut *self.conn)
    }
}

fn store_error(err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StoreError::Conflict {
                constraint: info.constraint_name().unwrap_or("unknown").to_string(),
            }
        }
        other => StoreError::Backend(other.to_string()),
    }
}

fn into_pull_request(row: PullRequestRow) -> StoreResult<PullRequest> {
    PullRequest::try_from(row).map_err(StoreError::Backend)
}

impl Repository for PgRepository<'_> {
    fn ping(&mut self) -> StoreResult<()> {
        diesel::sql_query("SELECT 1")
            .execute(self.conn()?)
            .map_err(store_error)?;
        Ok(())
    }

    fn insert_team(&mut self, team_name: &str) -> StoreResult<()> {
        diesel::insert_into(teams::table)
            .values(&NewTeam { team_name })
            .execute(self.conn()?)
            .map_err(store_error)?;
        Ok(())
    }

    fn team_exists(&mut self, team_name: &str) -> StoreResult<bool> {
        diesel::select(diesel::dsl::exists(
            teams::table.filter(teams::team_name.eq(team_name)),
        ))
        .get_result::<bool>(self.conn()?)
        .map_err(store_error)
    }

    fn upsert_user(&mut self, user: &User) -> StoreResult<()> {
        diesel::insert_into(users::table)
            .values(user)
            .on_conflict(users::user_id)
            .do_update()
            .set((
                users::username.eq(&user.username),
                users::team_name.eq(&user.team_name),
                users::is_active.eq(user.is_active),
            ))
            .execute(self.conn()?)
            .map_err(store_error)?;
        Ok(())
    }

    fn list_team_members(&mut self, team_name: &str) -> StoreResult<Vec<User>> {
        users::table
            .filter(users::team_name.eq(team_name))
            .order(users::user_id.asc())
            .select(User::as_select())
            .load(self.conn()?)
            .map_err(store_error)
    }

    fn get_user(&mut self, user_id: &str) -> StoreResult<Option<User>> {
        users::table
            .find(user_id)
            .select(User::as_select())
            .first(self.conn()?)
            .optional()
            .map_err(store_error)
    }

    fn set_user_active(&mut self, user_id: &str, is_active: bool) -> StoreResult<Option<User>> {
        diesel::update(users::table.find(user_id))
            .set(users::is_active.eq(is_active))
            .returning(User::as_returning())
            .get_result(self.conn()?)
            .optional()
            .map_err(store_error)
    }

    fn list_active_teammates(
        &mut self,
        team_name: &str,
        exclude_user_id: &str,
    ) -> StoreResult<Vec<String>> {
        users::table
            .filter(users::team_name.eq(team_name))
            .filter(users::is_active.eq(true))
            .filter(users::user_id.ne(exclude_user_id))
            .order(users::user_id.asc())
            .select(users::user_id)
            .load::<String>(self.conn()?)
            .map_err(store_error)
    }

    fn deactivate_users(&mut self, user_ids: &[String]) -> StoreResult<Vec<String>> {
        diesel::update(
            users::table
                .filter(users::user_id.eq_any(user_ids))
                .filter(users::is_active.eq(true)),
        )
        .set(users::is_active.eq(false))
        .returning(users::user_id)
        .get_results::<String>(self.conn()?)
        .map_err(store_error)
    }

    fn insert_pull_request(&mut self, pr: &NewPullRequest) -> StoreResult<PullRequest> {
        let row = diesel::insert_into(pull_requests::table)
            .values(pr)
            .returning(PullRequestRow::as_returning())
            .get_result(self.conn()?)
            .map_err(store_error)?;
        into_pull_request(row)
    }

    fn get_pull_request(&mut self, pull_request_id: &str) -> StoreResult<Option<PullRequest>> {
        pull_requests::table
            .find(pull_request_id)
            .select(PullRequestRow::as_select())
            .get_result(self.conn()?)
            .optional()
            .map_err(store_error)?
            .map(into_pull_request)
            .transpose()
    }

    fn lock_pull_request(&mut self, pull_request_id: &str) -> StoreResult<Option<PullRequest>> {
        pull_requests::table
            .find(pull_request_id)
            .select(PullRequestRow::as_select())
            .for_update()
            .get_result(self.conn()?)
            .optional()
            .map_err(store_error)?
            .map(into_pull_request)
            .transpose()
    }

    fn mark_merged(&mut self, pull_request_id: &str, merged_at: DateTime<Utc>) -> StoreResult<()> {
        diesel::update(
            pull_requests::table
                .filter(pull_requests::pull_request_id.eq(pull_request_id))
                .filter(pull_requests::status.eq(PrStatus::Open.as_str())),
        )
        .set((
            pull_requests::status.eq(PrStatus::Merged.as_str()),
            pull_requests::merged_at.eq(Some(merged_at)),
        ))
        .execute(self.conn()?)
        .map_err(store_error)?;
        Ok(())
    }

    fn update_reviewers(&mut self, pull_request_id: &str, reviewers: &[String]) -> StoreResult<()> {
        diesel::update(pull_requests::table.find(pull_request_id))
            .set(pull_requests::assigned_reviewers.eq(reviewers))
            .execute(self.conn()?)
            .map_err(store_error)?;
        Ok(())
    }

    fn find_open_prs_by_authors(&mut self, author_ids: &[String]) -> StoreResult<Vec<AuthoredPr>> {
        pull_requests::table
            .filter(pull_requests::author_id.eq_any(author_ids))
            .filter(pull_requests::status.eq(PrStatus::Open.as_str()))
            .order(pull_requests::pull_request_id.asc())
            .select((pull_requests::pull_request_id, pull_requests::author_id))
            .for_update()
            .load::<AuthoredPr>(self.conn()?)
            .map_err(store_error)
    }

    fn list_reviews_for_user(&mut self, user_id: &str) -> StoreResult<Vec<PullRequestShort>> {
        let rows = pull_requests::table
            .filter(pull_requests::assigned_reviewers.contains(vec![user_id.to_string()]))
            .order(pull_requests::created_at.asc())
            .select((
                pull_requests::pull_request_id,
                pull_requests::pull_request_name,
                pull_requests::author_id,
                pull_requests::status,
            ))
            .load::<(String, String, String, String)>(self.conn()?)
            .map_err(store_error)?;

        rows.into_iter()
            .map(|(pull_request_id, pull_request_name, author_id, status)| {
                Ok(PullRequestShort {
                    pull_request_id,
                    pull_request_name,
                    author_id,
                    status: status.parse().map_err(StoreError::Backend)?,
                })
            })
            .collect()
    }

    fn count_review_assignments(&mut self) -> StoreResult<Vec<UserAssignmentStats>> {
        diesel::sql_query(
            "SELECT u.user_id, u.username, COUNT(r.reviewer_id) AS assigned_pr_count \
             FROM users u \
             LEFT JOIN (SELECT unnest(assigned_reviewers) AS reviewer_id FROM pull_requests) r \
                 ON r.reviewer_id = u.user_id \
             GROUP BY u.user_id, u.username \
             ORDER BY assigned_pr_count DESC, u.username ASC",
        )
        .load::<UserAssignmentStats>(self.conn()?)
        .map_err(store_error)
    }
}
