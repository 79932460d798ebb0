//! Reviewer selection policy.
//!
//! Candidates are the active members of a team minus an exclusion set. Picks
//! are uniformly random so the first teammate in storage order does not
//! absorb every review.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::store::{Repository, StoreResult};

/// Reviewers assigned when a pull request is created.
pub const MAX_REVIEWERS: usize = 2;

/// Active members of `team_name` that are not in `exclude`.
///
/// `exclude[0]` is the pivot handed to the store; the rest are filtered here.
pub fn candidates(
    repo: &mut dyn Repository,
    team_name: &str,
    exclude: &[&str],
) -> StoreResult<Vec<String>> {
    let pivot = exclude.first().copied().unwrap_or_default();
    let mut pool = repo.list_active_teammates(team_name, pivot)?;
    pool.retain(|id| !exclude.contains(&id.as_str()));
    Ok(pool)
}

/// Up to `max_count` distinct candidates, sampled uniformly without replacement.
///
/// An empty pool yields an empty list: a pull request may legitimately start
/// with no reviewers.
pub fn select_reviewers<R: Rng + ?Sized>(
    candidates: &[String],
    max_count: usize,
    rng: &mut R,
) -> Vec<String> {
    candidates
        .choose_multiple(rng, max_count)
        .cloned()
        .collect()
}

/// One uniformly chosen candidate, or `None` when the pool is empty.
pub fn select_replacement<R: Rng + ?Sized>(candidates: &[String], rng: &mut R) -> Option<String> {
    candidates.choose(rng).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{HashMap, HashSet};

    use crate::models::User;
    use crate::store::{InMemoryStore, Store};

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_pool_yields_no_reviewers() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(select_reviewers(&[], MAX_REVIEWERS, &mut rng).is_empty());
        assert!(select_replacement(&[], &mut rng).is_none());
    }

    #[test]
    fn never_exceeds_max_or_repeats() {
        let mut rng = StdRng::seed_from_u64(11);
        let pool = ids(&["u2", "u3", "u4", "u5"]);
        for _ in 0..200 {
            let picked = select_reviewers(&pool, MAX_REVIEWERS, &mut rng);
            assert_eq!(picked.len(), MAX_REVIEWERS);
            let unique: HashSet<_> = picked.iter().collect();
            assert_eq!(unique.len(), picked.len());
            assert!(picked.iter().all(|id| pool.contains(id)));
        }
    }

    #[test]
    fn small_pool_returns_everyone() {
        let mut rng = StdRng::seed_from_u64(3);
        let picked = select_reviewers(&ids(&["u2"]), MAX_REVIEWERS, &mut rng);
        assert_eq!(picked, ids(&["u2"]));
    }

    #[test]
    fn picks_are_spread_across_the_pool() {
        let mut rng = StdRng::seed_from_u64(42);
        let pool = ids(&["u2", "u3", "u4", "u5"]);
        let mut seen: HashMap<String, usize> = HashMap::new();
        for _ in 0..400 {
            let id = select_replacement(&pool, &mut rng).unwrap();
            *seen.entry(id).or_default() += 1;
        }
        // Positional selection would put all 400 on "u2".
        assert_eq!(seen.len(), pool.len());
        assert!(seen.values().all(|&n| n > 40));
    }

    #[test]
    fn candidates_honour_every_exclusion() {
        let store = InMemoryStore::new();
        let pool = store
            .transaction(|repo| {
                for (id, active) in [("u1", true), ("u2", true), ("u3", true), ("u4", false)] {
                    repo.upsert_user(&User {
                        user_id: id.into(),
                        username: id.into(),
                        team_name: Some("backend".into()),
                        is_active: active,
                    })?;
                }
                Ok(candidates(repo, "backend", &["u2", "u1"])?)
            })
            .unwrap();
        assert_eq!(pool, ids(&["u3"]));
    }
}
