//! Assignment engine: initial reviewer assignment, single-slot reassignment,
//! merge, and the deactivation cascade.
//!
//! Every operation runs inside one store transaction, so a failure at any
//! step leaves no partial state behind.

use chrono::Utc;
use metrics::{counter, describe_counter};

use reviewer_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    AuthoredPr, DeactivationOutcome, NewPullRequest, PullRequest, Reassignment,
    ReassignmentDetail,
};
use crate::services::selection::{self, MAX_REVIEWERS};
use crate::store::{constraints, Repository, Store, StoreError};

pub const PRS_CREATED_TOTAL: &str = "reviewer_prs_created_total";
pub const REASSIGNMENTS_TOTAL: &str = "reviewer_reassignments_total";
pub const DEACTIVATIONS_TOTAL: &str = "reviewer_deactivations_total";
pub const CASCADE_REASSIGNMENTS_TOTAL: &str = "reviewer_cascade_reassignments_total";

/// Registers help text for the engine counters with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(PRS_CREATED_TOTAL, "Pull requests created");
    describe_counter!(REASSIGNMENTS_TOTAL, "Single reviewer reassignments");
    describe_counter!(DEACTIVATIONS_TOTAL, "Users deactivated through the bulk endpoint");
    describe_counter!(
        CASCADE_REASSIGNMENTS_TOTAL,
        "Open pull requests handed to a new reviewer after their author was deactivated"
    );
}

/// Create an OPEN pull request with up to two reviewers from the author's team.
pub fn create_pull_request<S: Store>(
    store: &S,
    pull_request_id: &str,
    pull_request_name: &str,
    author_id: &str,
) -> AppResult<PullRequest> {
    let pr = store.transaction(|repo| {
        let author = repo
            .get_user(author_id)?
            .ok_or_else(|| AppError::not_found("author not found"))?;
        let team_name = author
            .team_name
            .ok_or_else(|| AppError::not_found("author has no team"))?;

        let pool = selection::candidates(repo, &team_name, &[author_id])?;
        let reviewers =
            selection::select_reviewers(&pool, MAX_REVIEWERS, &mut rand::thread_rng());

        let new_pr = NewPullRequest::open(pull_request_id, pull_request_name, author_id, reviewers);
        repo.insert_pull_request(&new_pr).map_err(|e| match e {
            StoreError::Conflict { constraint }
                if constraint == constraints::PULL_REQUESTS_PKEY =>
            {
                AppError::new(ErrorCode::PrExists, "PR id already exists")
            }
            other => other.into(),
        })
    })?;

    counter!(PRS_CREATED_TOTAL).increment(1);
    tracing::info!(
        pull_request_id = %pr.pull_request_id,
        author_id = %pr.author_id,
        reviewers = ?pr.assigned_reviewers,
        "pull request created"
    );

    Ok(pr)
}

/// Mark a pull request MERGED. Merging twice returns the same state.
pub fn merge_pull_request<S: Store>(store: &S, pull_request_id: &str) -> AppResult<PullRequest> {
    store.transaction(|repo| {
        let pr = repo
            .lock_pull_request(pull_request_id)?
            .ok_or_else(|| AppError::not_found("PR not found"))?;
        if pr.is_merged() {
            return Ok(pr);
        }

        repo.mark_merged(pull_request_id, Utc::now())?;
        let merged = repo
            .get_pull_request(pull_request_id)?
            .ok_or_else(|| AppError::internal("merged PR disappeared"))?;

        tracing::info!(pull_request_id = %pull_request_id, "pull request merged");
        Ok(merged)
    })
}

/// Replace `old_user_id` in its slot with another active teammate.
///
/// Checks run in order: PR exists, PR is open, `old_user_id` is assigned,
/// a replacement exists. The replacement is never the author, the reviewer
/// being replaced, or someone already on the PR.
pub fn reassign_reviewer<S: Store>(
    store: &S,
    pull_request_id: &str,
    old_user_id: &str,
) -> AppResult<Reassignment> {
    let reassignment = store.transaction(|repo| {
        let pr = repo
            .lock_pull_request(pull_request_id)?
            .ok_or_else(|| AppError::not_found("PR not found"))?;
        if pr.is_merged() {
            return Err(AppError::new(ErrorCode::PrMerged, "cannot reassign on merged PR"));
        }
        let slot = pr
            .assigned_reviewers
            .iter()
            .position(|id| id == old_user_id)
            .ok_or_else(|| {
                AppError::new(ErrorCode::NotAssigned, "reviewer is not assigned to this PR")
            })?;

        let old_reviewer = repo
            .get_user(old_user_id)?
            .ok_or_else(|| AppError::not_found("reviewer not found"))?;

        let replacement = match old_reviewer.team_name {
            Some(team_name) => {
                let mut exclude = vec![old_user_id, pr.author_id.as_str()];
                exclude.extend(pr.assigned_reviewers.iter().map(String::as_str));
                let pool = selection::candidates(repo, &team_name, &exclude)?;
                selection::select_replacement(&pool, &mut rand::thread_rng())
            }
            None => None,
        }
        .ok_or_else(|| {
            AppError::new(ErrorCode::NoCandidate, "no active replacement candidate in team")
        })?;

        let mut reviewers = pr.assigned_reviewers.clone();
        reviewers[slot] = replacement.clone();
        repo.update_reviewers(pull_request_id, &reviewers)?;

        Ok(Reassignment {
            pr: PullRequest {
                assigned_reviewers: reviewers,
                ..pr
            },
            replaced_by: replacement,
        })
    })?;

    counter!(REASSIGNMENTS_TOTAL).increment(1);
    tracing::info!(
        pull_request_id = %pull_request_id,
        old_reviewer_id = %old_user_id,
        new_reviewer_id = %reassignment.replaced_by,
        "reviewer reassigned"
    );

    Ok(reassignment)
}

/// Deactivate users and hand every OPEN pull request they authored to a
/// single new reviewer from the author's team.
///
/// Unknown or already inactive ids are skipped. If any affected pull request
/// has no candidate, nothing is committed.
pub fn deactivate_users<S: Store>(
    store: &S,
    user_ids: &[String],
) -> AppResult<DeactivationOutcome> {
    let outcome = store.transaction(|repo| {
        let deactivated = repo.deactivate_users(user_ids)?;
        if deactivated.is_empty() {
            return Ok(DeactivationOutcome {
                deactivated_users: deactivated,
                reassigned_prs_count: 0,
                reassignment_details: Vec::new(),
            });
        }

        let affected = repo.find_open_prs_by_authors(&deactivated)?;
        let mut details = Vec::with_capacity(affected.len());
        for pr in affected {
            let new_reviewer_id = cascade_reviewer(repo, &pr)?;
            repo.update_reviewers(&pr.pull_request_id, std::slice::from_ref(&new_reviewer_id))?;
            details.push(ReassignmentDetail {
                pull_request_id: pr.pull_request_id,
                old_author_id: pr.author_id,
                new_reviewer_id,
            });
        }

        Ok(DeactivationOutcome {
            deactivated_users: deactivated,
            reassigned_prs_count: details.len(),
            reassignment_details: details,
        })
    })?;

    counter!(DEACTIVATIONS_TOTAL).increment(outcome.deactivated_users.len() as u64);
    counter!(CASCADE_REASSIGNMENTS_TOTAL).increment(outcome.reassigned_prs_count as u64);
    tracing::info!(
        requested = user_ids.len(),
        deactivated = outcome.deactivated_users.len(),
        reassigned_prs = outcome.reassigned_prs_count,
        "users deactivated"
    );

    Ok(outcome)
}

fn cascade_reviewer(repo: &mut dyn Repository, pr: &AuthoredPr) -> AppResult<String> {
    let no_candidate = || {
        AppError::with_details(
            ErrorCode::NoCandidate,
            format!("no active replacement candidate for PR {}", pr.pull_request_id),
            serde_json::json!({ "pull_request_id": pr.pull_request_id }),
        )
    };

    let team_name = repo
        .get_user(&pr.author_id)?
        .and_then(|author| author.team_name)
        .ok_or_else(no_candidate)?;

    let pool = selection::candidates(repo, &team_name, &[pr.author_id.as_str()])?;
    selection::select_replacement(&pool, &mut rand::thread_rng()).ok_or_else(no_candidate)
}
