mod common;

use chrono::Utc;
use common::{backdate_fetched, fetch_job_row, insert_job, setup_db};
use taskmill::jobs::{Capability, Dispatcher, JobsRepo};

#[tokio::test]
async fn concurrent_pollers_claim_exactly_once() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let _id = insert_job(&pool, "send_mail").await;

    let mut dispatcher_a = Dispatcher::new(repo.clone());
    let mut dispatcher_b = Dispatcher::new(repo.clone());
    let caps = [Capability::new("send_mail", 60, 2)];

    let (a, b) = tokio::join!(
        dispatcher_a.request_job(&caps, None),
        dispatcher_b.request_job(&caps, None),
    );

    let got_a = a.unwrap().is_some();
    let got_b = b.unwrap().is_some();

    assert!(
        got_a ^ got_b,
        "expected exactly one poller to win the claim, got_a={got_a}, got_b={got_b}"
    );
}

#[tokio::test]
async fn lost_claim_race_returns_none_not_a_stale_row() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    insert_job(&pool, "send_mail").await;

    let capability = Capability::new("send_mail", 60, 2);
    let caps = [&capability];
    let now = Utc::now();
    let candidate = repo
        .find_candidate(&caps, None, now)
        .await
        .unwrap()
        .expect("candidate expected");

    // First claimant wins.
    let won = repo.claim(&candidate, "worker-a", now).await.unwrap();
    assert!(won.is_some());

    // A second claim against the same observed snapshot must fail the CAS.
    let lost = repo.claim(&candidate, "worker-b", now).await.unwrap();
    assert!(lost.is_none());

    let (_, _, _, worker_key) = fetch_job_row(&pool, candidate.id).await;
    assert_eq!(worker_key.as_deref(), Some("worker-a"));
}

#[tokio::test]
async fn timed_out_claim_is_reclaimed_with_failure_count() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let id = insert_job(&pool, "send_mail").await;

    let caps = [Capability::new("send_mail", 60, 2)];

    let mut dispatcher_a = Dispatcher::new(repo.clone());
    let first = dispatcher_a
        .request_job(&caps, None)
        .await
        .unwrap()
        .expect("initial claim");
    assert_eq!(first.failed, 0);
    let key_a = dispatcher_a.worker_key().to_string();

    // Claim is fresh: nobody else may take it.
    let mut dispatcher_b = Dispatcher::new(repo.clone());
    assert!(dispatcher_b.request_job(&caps, None).await.unwrap().is_none());

    // Worker A dies; its claim goes stale past the capability timeout.
    backdate_fetched(&pool, id, 61).await;

    let reclaimed = dispatcher_b
        .request_job(&caps, None)
        .await
        .unwrap()
        .expect("stale claim should be reclaimable");

    assert_eq!(reclaimed.id, id);
    assert_eq!(reclaimed.failed, 1);
    assert_eq!(
        reclaimed.failure_message.as_deref(),
        Some("Restart after timeout")
    );
    assert_ne!(reclaimed.worker_key.as_deref(), Some(key_a.as_str()));
    assert_eq!(
        reclaimed.worker_key.as_deref(),
        Some(dispatcher_b.worker_key())
    );
}

#[tokio::test]
async fn retry_budget_bounds_reclaims() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());
    let mut dispatcher = Dispatcher::new(repo.clone());

    let id = insert_job(&pool, "send_mail").await;

    // retries = 1: eligible while failed is 0 or 1, ineligible at 2.
    let caps = [Capability::new("send_mail", 60, 1)];

    let first = dispatcher.request_job(&caps, None).await.unwrap().unwrap();
    assert_eq!(first.failed, 0);

    backdate_fetched(&pool, id, 61).await;
    let second = dispatcher.request_job(&caps, None).await.unwrap().unwrap();
    assert_eq!(second.failed, 1);

    backdate_fetched(&pool, id, 61).await;
    let third = dispatcher.request_job(&caps, None).await.unwrap().unwrap();
    assert_eq!(third.failed, 2);

    backdate_fetched(&pool, id, 61).await;
    assert!(dispatcher.request_job(&caps, None).await.unwrap().is_none());

    // The exhausted row is kept, not deleted.
    let (_, failed, _, _) = fetch_job_row(&pool, id).await;
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn worker_key_is_reused_across_claims() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());
    let mut dispatcher = Dispatcher::new(repo.clone());

    insert_job(&pool, "send_mail").await;
    insert_job(&pool, "send_mail").await;

    let caps = [Capability::new("send_mail", 60, 2)];
    let a = dispatcher.request_job(&caps, None).await.unwrap().unwrap();
    let b = dispatcher.request_job(&caps, None).await.unwrap().unwrap();

    assert_eq!(a.worker_key, b.worker_key);

    // Clearing the identity forces a fresh key for later claims.
    let old_key = a.worker_key.clone().unwrap();
    dispatcher.clear_worker_key();
    assert_ne!(dispatcher.worker_key(), old_key);
}
