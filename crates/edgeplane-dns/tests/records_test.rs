//! Record service: declarations, edits and deletes

mod common;

use std::sync::Arc;

use common::{seed_zone, setup_test_db, Call, MockFactory, MockProvider};
use edgeplane_db::{
    entities::dns_record::{RecordStatus, RecordType},
    store::DnsRecordStore,
    Owner,
};
use edgeplane_dns::{
    CreateRecord, DnsError, DnsRecordService, ReconciliationConfig, ReconciliationWorker,
};
use sea_orm::DatabaseConnection;

fn service(db: &DatabaseConnection, provider: &Arc<MockProvider>) -> DnsRecordService {
    DnsRecordService::new(db.clone(), Arc::new(MockFactory(provider.clone())))
}

fn request(domain_id: i32, name: &str) -> CreateRecord {
    CreateRecord {
        domain_id,
        record_type: RecordType::Cname,
        name: name.to_string(),
        value: "lg.example.com".to_string(),
        ttl: None,
        proxied: false,
        owner: Owner::WebsiteDomain(3),
    }
}

async fn sync(db: &DatabaseConnection, provider: &Arc<MockProvider>) {
    ReconciliationWorker::new(
        db.clone(),
        Arc::new(MockFactory(provider.clone())),
        ReconciliationConfig::default(),
    )
    .tick()
    .await
    .unwrap();
}

#[tokio::test]
async fn test_create_normalises_name_and_defaults_ttl() {
    let db = setup_test_db().await;
    let provider = Arc::new(MockProvider::default());
    let zone_id = seed_zone(&db, "example.com").await;
    let records = service(&db, &provider);

    let fqdn = records.create(request(zone_id, "www.example.com")).await.unwrap();
    assert_eq!(fqdn.name, "www");
    assert_eq!(fqdn.ttl, 120);
    assert_eq!(fqdn.status, RecordStatus::Pending);

    let apex = records.create(request(zone_id, "example.com.")).await.unwrap();
    assert_eq!(apex.name, "@");

    let relative = records.create(request(zone_id, "Shop")).await.unwrap();
    assert_eq!(relative.name, "shop");
}

#[tokio::test]
async fn test_create_rejects_duplicates_and_foreign_names() {
    let db = setup_test_db().await;
    let provider = Arc::new(MockProvider::default());
    let zone_id = seed_zone(&db, "example.com").await;
    let records = service(&db, &provider);

    records.create(request(zone_id, "www")).await.unwrap();
    let duplicate = records.create(request(zone_id, "www.example.com")).await;
    assert!(matches!(duplicate, Err(DnsError::Conflict)));

    let foreign = records.create(request(zone_id, "www.example.org.")).await;
    assert!(matches!(foreign, Err(DnsError::Validation(_))));

    let missing_zone = records.create(request(999, "www")).await;
    assert!(matches!(missing_zone, Err(DnsError::NotFound(_))));

    let mut empty = request(zone_id, "api");
    empty.value = "  ".to_string();
    assert!(matches!(records.create(empty).await, Err(DnsError::Validation(_))));
}

#[tokio::test]
async fn test_update_content_requeues_and_drops_old_provider_record() {
    let db = setup_test_db().await;
    let provider = Arc::new(MockProvider::default());
    let zone_id = seed_zone(&db, "example.com").await;
    let records = service(&db, &provider);

    let record = records.create(request(zone_id, "www")).await.unwrap();
    sync(&db, &provider).await;
    let synced = db.find_record(record.id).await.unwrap().unwrap();
    assert_eq!(synced.provider_record_id.as_deref(), Some("rec-1"));

    let updated = records
        .update_content(record.id, None, Some(300), Some(true))
        .await
        .unwrap();
    assert_eq!(updated.status, RecordStatus::Pending);
    assert!(updated.provider_record_id.is_none());
    assert_eq!(updated.ttl, 300);
    assert!(updated.proxied);
    assert_eq!(updated.value, "lg.example.com");

    assert!(provider
        .calls()
        .contains(&Call::Delete {
            zone_id: "cf-example.com".to_string(),
            record_id: "rec-1".to_string(),
        }));

    let missing = records.update_content(999, None, Some(60), None).await;
    assert!(matches!(missing, Err(DnsError::NotFound(_))));
}

#[tokio::test]
async fn test_update_content_rejects_identity_of_another_record() {
    let db = setup_test_db().await;
    let provider = Arc::new(MockProvider::default());
    let zone_id = seed_zone(&db, "example.com").await;
    let records = service(&db, &provider);

    let first = records.create(request(zone_id, "www")).await.unwrap();
    let mut other = request(zone_id, "www");
    other.value = "lg2.example.com".to_string();
    let second = records.create(other).await.unwrap();

    let clash = records
        .update_content(second.id, Some("lg.example.com".to_string()), None, None)
        .await;
    assert!(matches!(clash, Err(DnsError::Conflict)));

    let unchanged = db.find_record(second.id).await.unwrap().unwrap();
    assert_eq!(unchanged.value, "lg2.example.com");

    // Re-saving a record with its own value is not a conflict
    let same = records
        .update_content(first.id, Some("lg.example.com".to_string()), Some(120), None)
        .await
        .unwrap();
    assert_eq!(same.ttl, 120);
}

#[tokio::test]
async fn test_delete_removes_row_and_provider_record() {
    let db = setup_test_db().await;
    let provider = Arc::new(MockProvider::default());
    let zone_id = seed_zone(&db, "example.com").await;
    let records = service(&db, &provider);

    let synced = records.create(request(zone_id, "www")).await.unwrap();
    sync(&db, &provider).await;
    let unsynced = records.create(request(zone_id, "api")).await.unwrap();

    records.delete(synced.id).await.unwrap();
    records.delete(unsynced.id).await.unwrap();

    assert!(db.find_record(synced.id).await.unwrap().is_none());
    assert!(db.find_record(unsynced.id).await.unwrap().is_none());

    let deletes: Vec<_> = provider
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Delete { .. }))
        .collect();
    assert_eq!(deletes.len(), 1, "only the synced record exists at the provider");

    assert!(matches!(records.delete(synced.id).await, Err(DnsError::NotFound(_))));
}

#[tokio::test]
async fn test_provider_delete_failure_does_not_fail_delete() {
    let db = setup_test_db().await;
    let provider = Arc::new(MockProvider::default());
    let zone_id = seed_zone(&db, "example.com").await;
    let records = service(&db, &provider);

    let record = records.create(request(zone_id, "www")).await.unwrap();
    sync(&db, &provider).await;
    provider.fail_with("provider down");

    records.delete(record.id).await.unwrap();
    assert!(db.find_record(record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_trigger_sync() {
    let db = setup_test_db().await;
    let provider = Arc::new(MockProvider::default());
    let zone_id = seed_zone(&db, "example.com").await;
    let records = service(&db, &provider);

    provider.fail_with("boom");
    let a = records.create(request(zone_id, "a")).await.unwrap();
    let b = records.create(request(zone_id, "b")).await.unwrap();
    sync(&db, &provider).await;

    assert_eq!(records.trigger_sync(Some(a.id)).await.unwrap(), 1);
    let a = db.find_record(a.id).await.unwrap().unwrap();
    assert_eq!(a.status, RecordStatus::Pending);
    assert_eq!(a.retry_count, 0);

    assert_eq!(records.trigger_sync(None).await.unwrap(), 1);
    let b = db.find_record(b.id).await.unwrap().unwrap();
    assert_eq!(b.status, RecordStatus::Pending);
    assert!(b.next_retry_at.is_none());

    assert!(matches!(
        records.trigger_sync(Some(999)).await,
        Err(DnsError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_owned_inside_transaction() {
    use sea_orm::TransactionTrait;

    let db = setup_test_db().await;
    let provider = Arc::new(MockProvider::default());
    let zone_id = seed_zone(&db, "example.com").await;
    let records = service(&db, &provider);

    records.create(request(zone_id, "www")).await.unwrap();
    records.create(request(zone_id, "api")).await.unwrap();
    sync(&db, &provider).await;

    let txn = db.begin().await.unwrap();
    let deleted = DnsRecordService::delete_owned(&txn, Owner::WebsiteDomain(3))
        .await
        .unwrap();
    txn.commit().await.unwrap();
    assert_eq!(deleted.len(), 2);

    records.purge_from_provider(&deleted).await;
    let deletes = provider
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Delete { .. }))
        .count();
    assert_eq!(deletes, 2);
    assert!(records
        .records_of(Owner::WebsiteDomain(3))
        .await
        .unwrap()
        .is_empty());
}
