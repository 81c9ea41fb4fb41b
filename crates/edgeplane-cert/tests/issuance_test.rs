//! ACME issuance against the in-process mock directory

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use edgeplane_cert::{CertError, ManagerConfig};
use edgeplane_db::{
    entities::{
        acme_account::AccountStatus,
        certificate::{CertificateSource, RenewMode},
        certificate_request::RequestStatus,
    },
    store::{AcmeAccountStore, CertificateRequestStore, CertificateStore},
    Owner,
};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_issuance_end_to_end() {
    let harness = Harness::new(
        MockBehavior {
            pending_polls: 1,
            ..Default::default()
        },
        fast_config(),
    )
    .await;
    seed_zone(&harness.db, "example.com").await;
    let account_id = seed_account(&harness.db).await;

    let cancel = CancellationToken::new();
    let worker = harness.spawn_worker(cancel.clone());

    let request = harness
        .manager
        .request_certificate(account_id, &names(&["Example.com", "*.example.com"]))
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);

    tokio::time::timeout(
        Duration::from_secs(20),
        harness.manager.process(request.id, CancellationToken::new()),
    )
    .await
    .expect("issuance should finish");

    let request = harness.db.find_request(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Success, "{:?}", request.last_error);
    let certificate_id = request.result_certificate_id.unwrap();

    let certificate = harness
        .db
        .find_certificate(certificate_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(certificate.source, CertificateSource::Acme);
    assert_eq!(certificate.renew_mode, RenewMode::Auto);
    assert_eq!(certificate.provider, "mock-ca");
    assert_eq!(certificate.acme_account_id, Some(account_id));
    assert_eq!(
        certificate.renew_at,
        Some(certificate.expire_at - chrono::Duration::days(30))
    );
    assert_eq!(
        harness.db.certificate_domains(certificate_id).await.unwrap(),
        vec!["example.com", "*.example.com"]
    );

    // Both challenges were signalled, then cleaned up locally and remotely
    assert_eq!(harness.directory.ready_urls().len(), 2);
    assert!(harness
        .records
        .records_of(Owner::AcmeChallenge(request.id))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(harness.provider.deleted().len(), 2);

    // First use registered the account
    let (account, _) = harness.db.find_acme_account(account_id).await.unwrap().unwrap();
    assert_eq!(account.status, AccountStatus::Active);
    assert!(account.credentials_json.is_some());
    assert_eq!(harness.directory.registrations.load(Ordering::SeqCst), 1);

    cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_budget_exhaustion_fails_request() {
    let harness = Harness::new(
        MockBehavior::default(),
        ManagerConfig {
            poll_max_attempts: 2,
            ..fast_config()
        },
    )
    .await;
    seed_zone(&harness.db, "example.com").await;
    let account_id = seed_account(&harness.db).await;

    // No reconciliation worker: challenge records never turn active
    let request = harness
        .manager
        .request_certificate(account_id, &names(&["www.example.com"]))
        .await
        .unwrap();
    harness
        .manager
        .process(request.id, CancellationToken::new())
        .await;

    let request = harness.db.find_request(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Failed);
    assert_eq!(request.attempts, 2);
    assert!(request
        .last_error
        .as_deref()
        .unwrap()
        .contains("waiting for challenge records"));
    assert!(request.result_certificate_id.is_none());
    assert!(harness
        .records
        .records_of(Owner::AcmeChallenge(request.id))
        .await
        .unwrap()
        .is_empty());
    assert!(harness.directory.ready_urls().is_empty());
}

#[tokio::test]
async fn test_invalid_order_fails_request() {
    let harness = Harness::new(
        MockBehavior {
            invalid: true,
            ..Default::default()
        },
        fast_config(),
    )
    .await;
    seed_zone(&harness.db, "example.com").await;
    let account_id = seed_account(&harness.db).await;

    let cancel = CancellationToken::new();
    let worker = harness.spawn_worker(cancel.clone());

    let request = harness
        .manager
        .request_certificate(account_id, &names(&["www.example.com"]))
        .await
        .unwrap();
    harness
        .manager
        .process(request.id, CancellationToken::new())
        .await;

    let request = harness.db.find_request(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Failed);
    assert!(request.last_error.as_deref().unwrap().contains("invalid"));
    assert!(harness.db.list_certificates().await.unwrap().is_empty());

    cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_transport_failure_is_retried() {
    let harness = Harness::new(
        MockBehavior {
            transport_failures: 1,
            ..Default::default()
        },
        fast_config(),
    )
    .await;
    seed_zone(&harness.db, "example.com").await;
    let account_id = seed_account(&harness.db).await;

    let cancel = CancellationToken::new();
    let worker = harness.spawn_worker(cancel.clone());

    let request = harness
        .manager
        .request_certificate(account_id, &names(&["www.example.com"]))
        .await
        .unwrap();
    harness
        .manager
        .process(request.id, CancellationToken::new())
        .await;

    let request = harness.db.find_request(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Success, "{:?}", request.last_error);
    assert_eq!(harness.directory.open_calls.load(Ordering::SeqCst), 2);

    cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_cancel_returns_request_to_pending() {
    let harness = Harness::new(
        MockBehavior {
            never_ready: true,
            ..Default::default()
        },
        ManagerConfig {
            poll_max_attempts: 100,
            ..fast_config()
        },
    )
    .await;
    seed_zone(&harness.db, "example.com").await;
    let account_id = seed_account(&harness.db).await;

    let worker_cancel = CancellationToken::new();
    let worker = harness.spawn_worker(worker_cancel.clone());

    let request = harness
        .manager
        .request_certificate(account_id, &names(&["www.example.com"]))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let manager = harness.manager.clone();
    let request_id = request.id;
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move { manager.process(request_id, task_cancel).await });

    tokio::time::sleep(Duration::from_millis(2500)).await;
    cancel.cancel();
    task.await.unwrap();

    let request = harness.db.find_request(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.attempts, 0);
    assert!(harness
        .records
        .records_of(Owner::AcmeChallenge(request.id))
        .await
        .unwrap()
        .is_empty());

    worker_cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_challenge_outside_every_zone_fails() {
    let harness = Harness::new(MockBehavior::default(), fast_config()).await;
    seed_zone(&harness.db, "example.com").await;
    let account_id = seed_account(&harness.db).await;

    let request = harness
        .manager
        .request_certificate(account_id, &names(&["shop.example.org"]))
        .await
        .unwrap();
    harness
        .manager
        .process(request.id, CancellationToken::new())
        .await;

    let request = harness.db.find_request(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Failed);
    assert!(request.last_error.as_deref().unwrap().contains("no zone"));
}

#[tokio::test]
async fn test_request_validation() {
    let harness = Harness::new(MockBehavior::default(), fast_config()).await;
    let account_id = seed_account(&harness.db).await;

    let unknown = harness
        .manager
        .request_certificate(account_id + 100, &names(&["www.example.com"]))
        .await;
    assert!(matches!(unknown, Err(CertError::NotFound(_))));

    let bad = harness
        .manager
        .request_certificate(account_id, &names(&["localhost"]))
        .await;
    assert!(matches!(bad, Err(CertError::Validation(_))));

    assert!(harness.db.pending_request_ids(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_dispatches_queued_requests() {
    let harness = Harness::new(MockBehavior::default(), fast_config()).await;
    seed_zone(&harness.db, "example.com").await;
    let account_id = seed_account(&harness.db).await;

    let cancel = CancellationToken::new();
    let worker = harness.spawn_worker(cancel.clone());
    let dispatcher = harness.manager.clone().spawn(cancel.clone());

    let request = harness
        .manager
        .request_certificate(account_id, &names(&["www.example.com"]))
        .await
        .unwrap();

    let mut status = RequestStatus::Pending;
    for _ in 0..100 {
        status = harness
            .db
            .find_request(request.id)
            .await
            .unwrap()
            .unwrap()
            .status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(status, RequestStatus::Success);
    assert_eq!(harness.db.list_certificates().await.unwrap().len(), 1);

    cancel.cancel();
    dispatcher.await.unwrap();
    worker.await.unwrap();
}
