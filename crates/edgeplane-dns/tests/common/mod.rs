//! Shared fixtures: in-memory database and a scriptable provider

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use edgeplane_db::{connect, entities::provider_credential, migrate, store::ZoneStore};
use edgeplane_dns::{DnsProvider, ProviderError, ProviderFactory, ProviderResult, RecordSpec};
use sea_orm::DatabaseConnection;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { zone_id: String, record: RecordSpec },
    Update { zone_id: String, record_id: String, record: RecordSpec },
    Delete { zone_id: String, record_id: String },
}

/// Provider that remembers every call and fails on demand
#[derive(Default)]
pub struct MockProvider {
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl MockProvider {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self) -> ProviderResult<()> {
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(ProviderError::Api(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DnsProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_record(&self, zone_id: &str, record: &RecordSpec) -> ProviderResult<String> {
        self.calls.lock().unwrap().push(Call::Create {
            zone_id: zone_id.to_string(),
            record: record.clone(),
        });
        self.check()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("rec-{}", id))
    }

    async fn update_record(
        &self,
        zone_id: &str,
        provider_record_id: &str,
        record: &RecordSpec,
    ) -> ProviderResult<String> {
        self.calls.lock().unwrap().push(Call::Update {
            zone_id: zone_id.to_string(),
            record_id: provider_record_id.to_string(),
            record: record.clone(),
        });
        self.check()?;
        Ok(provider_record_id.to_string())
    }

    async fn delete_record(&self, zone_id: &str, provider_record_id: &str) -> ProviderResult<()> {
        self.calls.lock().unwrap().push(Call::Delete {
            zone_id: zone_id.to_string(),
            record_id: provider_record_id.to_string(),
        });
        self.check()
    }
}

/// Hands out the same mock for every zone
pub struct MockFactory(pub Arc<MockProvider>);

impl ProviderFactory for MockFactory {
    fn build(
        &self,
        _provider: &str,
        _credential: &provider_credential::Model,
    ) -> ProviderResult<Arc<dyn DnsProvider>> {
        Ok(self.0.clone())
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
