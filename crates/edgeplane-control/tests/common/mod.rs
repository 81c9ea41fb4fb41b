//! Shared fixtures for control plane tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use edgeplane_control::TopologyService;
use edgeplane_db::{
    connect,
    entities::provider_credential,
    migrate,
    store::{TopologyStore, ZoneStore},
};
use edgeplane_dns::{
    DnsProvider, DnsRecordService, ProviderFactory, ProviderResult, RecordSpec,
    ReconciliationConfig, ReconciliationWorker,
};
use sea_orm::DatabaseConnection;

/// Accepts everything and remembers which provider records were deleted
#[derive(Default)]
pub struct RecordingProvider {
    next_id: AtomicU64,
    deleted: Mutex<Vec<String>>,
}

impl RecordingProvider {
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsProvider for RecordingProvider {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn create_record(&self, _zone_id: &str, _record: &RecordSpec) -> ProviderResult<String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("rec-{}", id))
    }

    async fn update_record(
        &self,
        _zone_id: &str,
        provider_record_id: &str,
        _record: &RecordSpec,
    ) -> ProviderResult<String> {
        Ok(provider_record_id.to_string())
    }

    async fn delete_record(&self, _zone_id: &str, provider_record_id: &str) -> ProviderResult<()> {
        self.deleted
            .lock()
            .unwrap()
            .push(provider_record_id.to_string());
        Ok(())
    }
}

pub struct RecordingFactory(pub Arc<RecordingProvider>);

impl ProviderFactory for RecordingFactory {
    fn build(
        &self,
        _provider: &str,
        _credential: &provider_credential::Model,
    ) -> ProviderResult<Arc<dyn DnsProvider>> {
        Ok(self.0.clone())
    }
}

pub struct Harness {
    pub db: DatabaseConnection,
    pub provider: Arc<RecordingProvider>,
    pub topology: TopologyService,
}

impl Harness {
    pub async fn new() -> Self {
        let db = setup_test_db().await;
        let provider = Arc::new(RecordingProvider::default());
        let records = DnsRecordService::new(db.clone(), Arc::new(RecordingFactory(provider.clone())));
        let topology = TopologyService::new(db.clone(), records);
        Self {
            db,
            provider,
            topology,
        }
    }

    /// Push every pending record to the recording provider
    pub async fn sync(&self) {
        ReconciliationWorker::new(
            self.db.clone(),
            Arc::new(RecordingFactory(self.provider.clone())),
            ReconciliationConfig::default(),
        )
        .tick()
        .await
        .unwrap();
    }
}

pub async fn setup_test_db() -> DatabaseConnection {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    migrate(&db).await.expect("Failed to run migrations");
    db
}

/// Zone bound to a provider with an active credential; returns the zone id
pub async fn seed_zone(db: &DatabaseConnection, name: &str) -> i32 {
    let zone = db.insert_zone(name).await.unwrap();
    let credential = db
        .insert_credential(&format!("{}-token", name), "cloudflare", "secret")
        .await
        .unwrap();
    db.bind_zone_provider(zone.id, "cloudflare", &format!("cf-{}", name), credential.id)
        .await
        .unwrap();
    zone.id
}

/// One node with the given sub-IPs; returns (node id, sub-IP ids)
pub async fn seed_node(db: &DatabaseConnection, ips: &[(&str, bool)]) -> (i32, Vec<i32>) {
    let node = db.insert_node("edge-1", "192.0.2.1").await.unwrap();
    let mut ids = Vec::new();
    for (ip, enabled) in ips {
        ids.push(db.insert_node_sub_ip(node.id, ip, *enabled).await.unwrap().id);
    }
    (node.id, ids)
}
