//! Shared fixtures for certificate tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edgeplane_cert::{
    challenge_record_name, AccountKey, AcmeDirectory, AcmeError, AcmeOrder, CertificateManager,
    CertificateService, DnsChallenge, ManagerConfig, OpenedOrder, OrderProgress,
};
use edgeplane_control::TopologyService;
use edgeplane_db::{
    connect,
    entities::{
        certificate::{self, CertificateSource, RenewMode},
        provider_credential,
    },
    migrate,
    store::{AcmeAccountStore, CertificateStore, NewCertificate, TopologyStore, ZoneStore},
};
use edgeplane_dns::{
    DnsProvider, DnsRecordService, ProviderFactory, ProviderResult, RecordSpec,
    ReconciliationConfig, ReconciliationWorker,
};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

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

/// How the mock CA behaves
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// `Pending` answers before the order turns `Ready`
    pub pending_polls: usize,
    /// Order stays `Pending` forever
    pub never_ready: bool,
    /// Order turns `Invalid` on the first poll
    pub invalid: bool,
    /// `open_order` fails with a transport error this many times first
    pub transport_failures: usize,
}

/// In-process ACME directory issuing self-signed certificates
#[derive(Default)]
pub struct MockDirectory {
    behavior: MockBehavior,
    transport_failures: AtomicUsize,
    pub open_calls: AtomicUsize,
    pub registrations: AtomicUsize,
    pub ready: Arc<Mutex<Vec<String>>>,
}

impl MockDirectory {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            transport_failures: AtomicUsize::new(behavior.transport_failures),
            behavior,
            ..Default::default()
        }
    }

    pub fn ready_urls(&self) -> Vec<String> {
        self.ready.lock().unwrap().clone()
    }
}

#[async_trait]
impl AcmeDirectory for MockDirectory {
    async fn open_order(
        &self,
        account: &AccountKey,
        domains: &[String],
    ) -> Result<OpenedOrder, AcmeError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.transport_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transport_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AcmeError::Transport("connection reset".to_string()));
        }

        let new_credentials = match account.credentials_json {
            Some(_) => None,
            None => {
                self.registrations.fetch_add(1, Ordering::SeqCst);
                Some(format!("{{\"account\":\"{}\"}}", account.email))
            }
        };

        Ok(OpenedOrder {
            order: Box::new(MockOrder {
                domains: domains.to_vec(),
                behavior: self.behavior.clone(),
                polls: 0,
                finalized: false,
                ready: self.ready.clone(),
            }),
            new_credentials,
        })
    }
}

struct MockOrder {
    domains: Vec<String>,
    behavior: MockBehavior,
    polls: usize,
    finalized: bool,
    ready: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AcmeOrder for MockOrder {
    async fn dns_challenges(&mut self) -> Result<Vec<DnsChallenge>, AcmeError> {
        Ok(self
            .domains
            .iter()
            .map(|domain| DnsChallenge {
                domain: domain.trim_start_matches("*.").to_string(),
                record_name: challenge_record_name(domain),
                value: format!("digest-of-{}", domain),
                url: format!("https://acme.test/challenge/{}", domain),
            })
            .collect())
    }

    async fn set_ready(&mut self, challenge: &DnsChallenge) -> Result<(), AcmeError> {
        self.ready.lock().unwrap().push(challenge.url.clone());
        Ok(())
    }

    async fn poll(&mut self) -> Result<OrderProgress, AcmeError> {
        if self.behavior.invalid {
            return Ok(OrderProgress::Invalid);
        }
        if self.behavior.never_ready || self.polls < self.behavior.pending_polls {
            self.polls += 1;
            return Ok(OrderProgress::Pending);
        }
        Ok(OrderProgress::Ready)
    }

    async fn finalize(&mut self, csr_der: &[u8]) -> Result<(), AcmeError> {
        if csr_der.is_empty() {
            return Err(AcmeError::Finalization("empty CSR".to_string()));
        }
        self.finalized = true;
        Ok(())
    }

    async fn certificate_chain(&mut self) -> Result<Option<String>, AcmeError> {
        if !self.finalized {
            return Ok(None);
        }
        let (pem, _) = self_signed(&self.domains, None);
        Ok(Some(pem))
    }
}

/// Self-signed certificate for `domains`; CN is the first domain
pub fn self_signed(domains: &[String], not_after: Option<DateTime<Utc>>) -> (String, String) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(domains.to_vec()).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, domains[0].as_str());
    if let Some(not_after) = not_after {
        params.not_before = time::OffsetDateTime::from_unix_timestamp(
            (not_after - chrono::Duration::days(90)).timestamp(),
        )
        .unwrap();
        params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();
    }
    let cert = params.self_signed(&key).unwrap();
    (cert.pem(), key.serialize_pem())
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Poll settings short enough for tests
pub fn fast_config() -> ManagerConfig {
    ManagerConfig {
        workers: 2,
        queue_capacity: 16,
        scan_interval: Duration::from_secs(3600),
        task_timeout: Duration::from_secs(30),
        max_retries: 2,
        retry_delay: Duration::from_millis(10),
        poll_interval_secs: 1,
        poll_max_attempts: 10,
        ..Default::default()
    }
}

pub struct Harness {
    pub db: DatabaseConnection,
    pub provider: Arc<RecordingProvider>,
    pub records: DnsRecordService,
    pub directory: Arc<MockDirectory>,
    pub manager: CertificateManager,
    pub service: CertificateService,
    pub topology: TopologyService,
}

impl Harness {
    pub async fn new(behavior: MockBehavior, config: ManagerConfig) -> Self {
        let db = setup_test_db().await;
        let provider = Arc::new(RecordingProvider::default());
        let records =
            DnsRecordService::new(db.clone(), Arc::new(RecordingFactory(provider.clone())));
        let directory = Arc::new(MockDirectory::new(behavior));
        let manager =
            CertificateManager::new(db.clone(), records.clone(), directory.clone(), config);
        let service = CertificateService::new(db.clone());
        let topology = TopologyService::new(db.clone(), records.clone());
        Self {
            db,
            provider,
            records,
            directory,
            manager,
            service,
            topology,
        }
    }

    /// Reconciliation loop ticking every 100ms
    pub fn spawn_worker(&self, cancel: CancellationToken) -> JoinHandle<()> {
        ReconciliationWorker::new(
            self.db.clone(),
            Arc::new(RecordingFactory(self.provider.clone())),
            ReconciliationConfig {
                interval: Duration::from_millis(100),
                ..Default::default()
            },
        )
        .spawn(cancel)
    }

    /// Website serving `domains`, through the full topology chain
    pub async fn seed_website(&self, zone_id: i32, domains: &[&str]) -> i32 {
        let node = self.db.insert_node("edge-1", "192.0.2.1").await.unwrap();
        let ip = self
            .db
            .insert_node_sub_ip(node.id, "192.0.2.10", true)
            .await
            .unwrap();
        let node_group = self
            .topology
            .create_node_group("ng", zone_id, &[ip.id])
            .await
            .unwrap();
        let line_group = self
            .topology
            .create_line_group("lg", zone_id, node_group.id)
            .await
            .unwrap();
        let (website, _) = self
            .topology
            .create_website(line_group.id, &names(domains))
            .await
            .unwrap();
        website.id
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

/// Account under a directory named `mock-ca`; returns the account id
pub async fn seed_account(db: &DatabaseConnection) -> i32 {
    let provider = db
        .insert_acme_provider("mock-ca", "https://acme.test/directory", None)
        .await
        .unwrap();
    db.insert_acme_account(provider.id, "ops@example.com")
        .await
        .unwrap()
        .id
}

/// Stored ACME certificate with explicit lifecycle fields
pub async fn seed_acme_certificate(
    db: &DatabaseConnection,
    account_id: Option<i32>,
    domains: &[&str],
    expire_at: DateTime<Utc>,
    renew_mode: RenewMode,
    renew_at: Option<DateTime<Utc>>,
) -> certificate::Model {
    let domains = names(domains);
    let (pem, key) = self_signed(&domains, Some(expire_at));
    let parsed = edgeplane_cert::parse_certificate_pem(&pem).unwrap();
    db.insert_certificate(
        NewCertificate {
            provider: "mock-ca".to_string(),
            source: CertificateSource::Acme,
            acme_account_id: account_id,
            fingerprint: parsed.fingerprint,
            issue_at: parsed.not_before,
            expire_at,
            renew_mode,
            renew_at,
            certificate_pem: pem,
            private_key_pem: key,
        },
        &domains,
    )
    .await
    .unwrap()
}
