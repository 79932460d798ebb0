//! Runs against a migrated database:
//! `REVIEWER__DATABASE_URL=postgres://... cargo test -- --ignored`

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;

use reviewer_service::models::{PrStatus, TeamMember};
use reviewer_service::services::{assignment, directory, stats};
use reviewer_service::store::{PgStore, Store};
use reviewer_shared::clients::db::{create_pool, PoolSettings};
use reviewer_shared::errors::ErrorCode;

fn store_with(transaction_timeout: Duration) -> PgStore {
    let url = std::env::var("REVIEWER__DATABASE_URL").expect("REVIEWER__DATABASE_URL must be set");
    let pool = create_pool(&url, PoolSettings::default()).expect("pool");
    PgStore::new(pool, Duration::from_secs(5), transaction_timeout)
}

fn store() -> PgStore {
    store_with(Duration::from_secs(10))
}

/// Per-run prefix so repeated runs do not collide on primary keys.
fn prefix() -> String {
    format!("t{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn member(id: &str) -> TeamMember {
    TeamMember {
        user_id: id.to_string(),
        username: format!("name-{id}"),
        is_active: true,
    }
}

#[test]
#[ignore]
fn pull_request_lifecycle() {
    let store = store();
    let p = prefix();
    let team = format!("{p}-team");
    let (u1, u2, u3) = (format!("{p}-u1"), format!("{p}-u2"), format!("{p}-u3"));
    let pr_id = format!("{p}-pr");

    directory::create_team(&store, &team, &[member(&u1), member(&u2), member(&u3)]).unwrap();
    let err = directory::create_team(&store, &team, &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::TeamExists);

    let pr = assignment::create_pull_request(&store, &pr_id, "lifecycle", &u1).unwrap();
    assert_eq!(pr.assigned_reviewers.len(), 2);
    assert!(!pr.assigned_reviewers.contains(&u1));

    let err = assignment::create_pull_request(&store, &pr_id, "dup", &u2).unwrap_err();
    assert_eq!(err.code(), ErrorCode::PrExists);

    // Both teammates are already assigned, so there is nobody left.
    let err = assignment::reassign_reviewer(&store, &pr_id, &pr.assigned_reviewers[0]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoCandidate);

    let reviews = directory::reviews_for_user(&store, &u2).unwrap();
    assert!(reviews.iter().any(|r| r.pull_request_id == pr_id));

    let merged = assignment::merge_pull_request(&store, &pr_id).unwrap();
    assert_eq!(merged.status, PrStatus::Merged);
    assert!(merged.merged_at.is_some());
    assert_eq!(assignment::merge_pull_request(&store, &pr_id).unwrap(), merged);

    let err = assignment::reassign_reviewer(&store, &pr_id, &u2).unwrap_err();
    assert_eq!(err.code(), ErrorCode::PrMerged);

    let rows = stats::assignment_stats(&store).unwrap();
    let u2_row = rows.iter().find(|r| r.user_id == u2).unwrap();
    assert_eq!(u2_row.assigned_pr_count, 1);
}

#[test]
#[ignore]
fn failed_cascade_rolls_back() {
    let store = store();
    let p = prefix();
    let (pair, solo) = (format!("{p}-pair"), format!("{p}-solo"));
    let (a1, a2, s1) = (format!("{p}-a1"), format!("{p}-a2"), format!("{p}-s1"));

    directory::create_team(&store, &pair, &[member(&a1), member(&a2)]).unwrap();
    directory::create_team(&store, &solo, &[member(&s1)]).unwrap();
    assignment::create_pull_request(&store, &format!("{p}-pr1"), "x", &a1).unwrap();
    assignment::create_pull_request(&store, &format!("{p}-pr2"), "y", &s1).unwrap();

    let err = assignment::deactivate_users(&store, &[a1.clone(), s1.clone()]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoCandidate);

    let still_active = store
        .transaction(|repo| Ok(repo.get_user(&a1)?.map(|u| u.is_active)))
        .unwrap();
    assert_eq!(still_active, Some(true));

    let outcome = assignment::deactivate_users(&store, &[a1.clone()]).unwrap();
    assert_eq!(outcome.deactivated_users, vec![a1.clone()]);
    assert_eq!(outcome.reassignment_details[0].new_reviewer_id, a2);
}

#[test]
#[ignore]
fn transaction_past_its_deadline_rolls_back() {
    let store = store_with(Duration::from_millis(200));
    let team = format!("{}-late", prefix());

    let err = store
        .transaction(|repo| {
            repo.insert_team(&team)?;
            std::thread::sleep(Duration::from_millis(400));
            Ok(repo.team_exists(&team)?)
        })
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InternalError);

    let exists = store.transaction(|repo| Ok(repo.team_exists(&team)?)).unwrap();
    assert!(!exists);
}

#[test]
#[ignore]
fn concurrent_reassignments_on_one_pr_serialize() {
    let store = store();
    let p = prefix();
    let author = format!("{p}-a");
    let others: Vec<String> = (1..=4).map(|i| format!("{p}-r{i}")).collect();
    let mut members = vec![member(&author)];
    members.extend(others.iter().map(|id| member(id)));
    directory::create_team(&store, &format!("{p}-team"), &members).unwrap();

    let pr_id = format!("{p}-pr");
    let created = assignment::create_pull_request(&store, &pr_id, "race", &author).unwrap();
    let (first, second) = (
        created.assigned_reviewers[0].clone(),
        created.assigned_reviewers[1].clone(),
    );

    // The row lock makes whichever call runs second see the first one's write.
    let (a, b) = std::thread::scope(|scope| {
        let a = scope.spawn(|| assignment::reassign_reviewer(&store, &pr_id, &first));
        let b = scope.spawn(|| assignment::reassign_reviewer(&store, &pr_id, &second));
        (a.join().unwrap(), b.join().unwrap())
    });
    let (a, b) = (a.unwrap(), b.unwrap());

    let reviewers = store
        .transaction(|repo| Ok(repo.get_pull_request(&pr_id)?))
        .unwrap()
        .unwrap()
        .assigned_reviewers;
    assert_eq!(reviewers.len(), 2);
    let unique: HashSet<_> = reviewers.iter().collect();
    assert_eq!(unique.len(), 2);
    // Each call owns its slot, whichever order the lock granted them in.
    assert_eq!(reviewers, vec![a.replaced_by.clone(), b.replaced_by.clone()]);
    assert_ne!(a.replaced_by, first);
    assert_ne!(b.replaced_by, second);
    for id in &reviewers {
        assert_ne!(id, &author);
        assert!(others.contains(id));
    }
}
