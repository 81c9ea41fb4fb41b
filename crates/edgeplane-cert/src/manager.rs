//! ACME issuance and renewal
//!
//! Requests travel through a bounded queue to a dispatcher that runs at most
//! `workers` issuances at once. Each issuance is supervised: transient
//! failures are retried, the whole run is bounded by `task_timeout`, and a
//! cancelled run puts its request back to `pending`.
//!
//! Challenge TXT records are declared through [`DnsRecordService`] and
//! pushed by the reconciliation worker; issuance waits until every one of
//! them is `active` before telling the CA to validate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use edgeplane_control::ConfigLedger;
use edgeplane_db::{
    entities::{
        acme_account::AccountStatus,
        certificate::{CertificateSource, RenewMode},
        certificate_request,
        dns_record::{RecordStatus, RecordType},
    },
    is_unique_violation,
    store::{
        AcmeAccountStore, BindingStore, CertificateRequestStore, CertificateStore,
        NewCertificate, NewCertificateRequest,
    },
    Owner,
};
use edgeplane_dns::{worker::truncate_error, zone, CreateRecord, DnsError, DnsRecordService};
use rcgen::{CertificateParams, KeyPair};
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acme::{
    AccountKey, AcmeDirectory, AcmeError, DnsChallenge, ExternalAccount, OrderProgress,
};
use crate::error::CertError;
use crate::pem::{parse_certificate_pem, ParsedCertificate};

/// TTL of challenge TXT records
const CHALLENGE_TTL: i32 = 120;

/// Manager configuration
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Concurrent issuances
    pub workers: usize,
    pub queue_capacity: usize,
    pub scan_interval: Duration,
    /// Upper bound for one issuance, waits included
    pub task_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Certificates are renewed and flagged `expiring` this long before expiry
    pub renewal_window: Duration,
    /// Poll settings stamped on new requests
    pub poll_interval_secs: i32,
    pub poll_max_attempts: i32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
            scan_interval: Duration::from_secs(300),
            task_timeout: Duration::from_secs(1800),
            max_retries: 3,
            retry_delay: Duration::from_secs(30),
            renewal_window: Duration::from_secs(30 * 24 * 60 * 60),
            poll_interval_secs: 40,
            poll_max_attempts: 10,
        }
    }
}

/// Outcome of one periodic scan
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub expiring: u64,
    pub expired: u64,
    /// Renewal requests created
    pub renewals: usize,
    /// Pending requests handed to the queue
    pub enqueued: usize,
}

/// Attempt counter shared by every wait of one issuance
struct PollBudget {
    attempts: i32,
    max_attempts: i32,
    interval: Duration,
}

#[derive(Clone)]
pub struct CertificateManager {
    inner: Arc<Inner>,
}

struct Inner {
    db: DatabaseConnection,
    records: DnsRecordService,
    directory: Arc<dyn AcmeDirectory>,
    config: ManagerConfig,
    sender: mpsc::Sender<i32>,
    receiver: Mutex<Option<mpsc::Receiver<i32>>>,
    /// Requests currently owned by a task
    in_flight: Mutex<HashSet<i32>>,
}

impl CertificateManager {
    pub fn new(
        db: DatabaseConnection,
        records: DnsRecordService,
        directory: Arc<dyn AcmeDirectory>,
        config: ManagerConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                db,
                records,
                directory,
                config,
                sender,
                receiver: Mutex::new(Some(receiver)),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Queue an ACME issuance for `domains` under `account_id`
    pub async fn request_certificate(
        &self,
        account_id: i32,
        domains: &[String],
    ) -> Result<certificate_request::Model, CertError> {
        let domains = normalize_domains(domains)?;

        let (account, _) = self
            .inner
            .db
            .find_acme_account(account_id)
            .await?
            .ok_or_else(|| CertError::NotFound(format!("ACME account {}", account_id)))?;
        if account.status == AccountStatus::Disabled {
            return Err(CertError::Validation(format!(
                "ACME account {} is disabled",
                account_id
            )));
        }

        let request = self
            .inner
            .db
            .insert_request(NewCertificateRequest {
                acme_account_id: account_id,
                domains,
                poll_interval_secs: self.inner.config.poll_interval_secs,
                poll_max_attempts: self.inner.config.poll_max_attempts,
                renews_certificate_id: None,
            })
            .await?;

        info!(request_id = request.id, account_id, "Certificate request queued");
        self.enqueue(request.id);
        Ok(request)
    }

    /// Hand a request to the dispatcher; a full queue leaves it for the next scan
    pub fn enqueue(&self, request_id: i32) -> bool {
        match self.inner.sender.try_send(request_id) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(request_id, "Issuance queue full, request left for the next scan");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(request_id, "Issuance queue closed");
                false
            }
        }
    }

    /// Refresh statuses, open due renewals and re-enqueue pending requests
    pub async fn scan(&self) -> Result<ScanReport, CertError> {
        let db = &self.inner.db;
        let now = Utc::now();
        let window = self.renewal_window();

        let (expiring, expired) = db.refresh_certificate_statuses(now, window).await?;
        let mut report = ScanReport {
            expiring,
            expired,
            ..Default::default()
        };

        for certificate in db.certificates_due_for_renewal(now).await? {
            if db.open_renewal_exists(certificate.id).await? {
                continue;
            }
            let Some(account_id) = certificate.acme_account_id else {
                debug!(certificate_id = certificate.id, "Due certificate has no ACME account");
                continue;
            };
            let domains = db.certificate_domains(certificate.id).await?;
            if domains.is_empty() {
                continue;
            }

            let request = db
                .insert_request(NewCertificateRequest {
                    acme_account_id: account_id,
                    domains,
                    poll_interval_secs: self.inner.config.poll_interval_secs,
                    poll_max_attempts: self.inner.config.poll_max_attempts,
                    renews_certificate_id: Some(certificate.id),
                })
                .await?;
            info!(
                certificate_id = certificate.id,
                request_id = request.id,
                "Renewal requested"
            );
            report.renewals += 1;
        }

        let limit = self.inner.config.queue_capacity.max(1) as u64;
        for request_id in db.pending_request_ids(limit).await? {
            if !self.is_in_flight(request_id) && self.enqueue(request_id) {
                report.enqueued += 1;
            }
        }

        Ok(report)
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Dispatcher loop; returns once `cancel` fires and in-flight tasks settle
    pub async fn run(&self, cancel: CancellationToken) {
        let receiver = self
            .inner
            .receiver
            .lock()
            .ok()
            .and_then(|mut receiver| receiver.take());
        let Some(mut receiver) = receiver else {
            warn!("Certificate manager already running");
            return;
        };

        match self.inner.db.reset_running_requests().await {
            Ok(0) => {}
            Ok(count) => info!(count, "Interrupted certificate requests returned to pending"),
            Err(e) => warn!(error = %e, "Failed to reset running certificate requests"),
        }

        let config = &self.inner.config;
        let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut ticker = interval(config.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            workers = config.workers,
            scan_interval_secs = config.scan_interval.as_secs(),
            "Certificate manager started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.scan().await {
                        Ok(report) if report != ScanReport::default() => info!(
                            expiring = report.expiring,
                            expired = report.expired,
                            renewals = report.renewals,
                            enqueued = report.enqueued,
                            "Certificate scan"
                        ),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Certificate scan failed"),
                    }
                }
                Some(request_id) = receiver.recv() => {
                    if !self.mark_in_flight(request_id) {
                        debug!(request_id, "Request already in flight");
                        continue;
                    }
                    let permit = tokio::select! {
                        _ = cancel.cancelled() => {
                            self.clear_in_flight(request_id);
                            break;
                        }
                        permit = semaphore.clone().acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => break,
                        },
                    };

                    let manager = self.clone();
                    let token = cancel.child_token();
                    tasks.spawn(async move {
                        let _permit = permit;
                        manager.process(request_id, token).await;
                        manager.clear_in_flight(request_id);
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Issuance task ended abnormally");
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "Certificate manager stopping");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Issuance task ended abnormally");
            }
        }
    }

    /// Run one request to a terminal state, or back to `pending` on cancel
    pub async fn process(&self, request_id: i32, cancel: CancellationToken) {
        let config = &self.inner.config;
        let mut retries = 0;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(CertError::Cancelled),
                result = timeout(config.task_timeout, self.issue(request_id)) => {
                    result.unwrap_or(Err(CertError::Timeout(config.task_timeout)))
                }
            };

            match result {
                Ok(_) => return,
                Err(CertError::Cancelled) => {
                    info!(request_id, "Issuance cancelled, request returned to pending");
                    self.release(request_id, "cancelled").await;
                    return;
                }
                Err(e) if e.is_transient() && retries < config.max_retries => {
                    retries += 1;
                    warn!(request_id, retries, error = %e, "Issuance failed, retrying");
                    self.release(request_id, &e.to_string()).await;
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = sleep(config.retry_delay) => {}
                    }
                }
                Err(e) => {
                    self.fail(request_id, &e).await;
                    return;
                }
            }
        }
    }

    /// Returns `false` when another worker owns the request
    async fn issue(&self, request_id: i32) -> Result<bool, CertError> {
        let db = &self.inner.db;

        if !db.claim_request(request_id).await? {
            debug!(request_id, "Request not claimable");
            return Ok(false);
        }

        let request = db
            .find_request(request_id)
            .await?
            .ok_or_else(|| CertError::NotFound(format!("Certificate request {}", request_id)))?;
        let domains = request.domains();
        if domains.is_empty() {
            return Err(CertError::Validation("request names no domain".to_string()));
        }

        let (account, provider) = db
            .find_acme_account(request.acme_account_id)
            .await?
            .ok_or_else(|| {
                CertError::NotFound(format!("ACME account {}", request.acme_account_id))
            })?;
        if account.status == AccountStatus::Disabled {
            return Err(CertError::Validation(format!(
                "ACME account {} is disabled",
                account.id
            )));
        }

        let key = AccountKey {
            directory_url: provider.directory_url.clone(),
            email: account.email.clone(),
            external_account: match (provider.eab_kid.clone(), provider.eab_hmac_key.clone()) {
                (Some(kid), Some(hmac_key)) => Some(ExternalAccount { kid, hmac_key }),
                _ => None,
            },
            credentials_json: account.credentials_json.clone(),
        };

        info!(request_id, domains = ?domains, provider = %provider.name, "Starting certificate issuance");

        let opened = match self.inner.directory.open_order(&key, &domains).await {
            Ok(opened) => opened,
            Err(AcmeError::Transport(message)) => return Err(CertError::Transient(message)),
            Err(e) => {
                if matches!(e, AcmeError::Account(_)) {
                    db.mark_account_error(account.id, &truncate_error(&e.to_string()))
                        .await?;
                }
                return Err(e.into());
            }
        };
        if let Some(credentials) = &opened.new_credentials {
            db.store_account_credentials(account.id, credentials).await?;
            info!(account_id = account.id, "ACME account registered");
        }
        let mut order = opened.order;

        let challenges = order.dns_challenges().await?;
        self.publish_challenges(request_id, &challenges).await?;

        let mut budget = PollBudget {
            attempts: request.attempts,
            max_attempts: request.poll_max_attempts.max(1),
            interval: Duration::from_secs(request.poll_interval_secs.max(1) as u64),
        };

        while !self.challenges_active(request_id).await? {
            self.spend(request_id, &mut budget, "waiting for challenge records")
                .await?;
        }
        for challenge in &challenges {
            order.set_ready(challenge).await?;
        }
        debug!(request_id, count = challenges.len(), "Challenges signalled ready");

        loop {
            match order.poll().await? {
                OrderProgress::Ready | OrderProgress::Valid => break,
                OrderProgress::Invalid => return Err(AcmeError::OrderInvalid.into()),
                OrderProgress::Pending | OrderProgress::Processing => {
                    self.spend(request_id, &mut budget, "waiting for order validation")
                        .await?
                }
            }
        }

        let key_pair =
            KeyPair::generate().map_err(|e| AcmeError::Finalization(e.to_string()))?;
        let params = CertificateParams::new(domains.clone())
            .map_err(|e| AcmeError::Finalization(e.to_string()))?;
        let csr = params
            .serialize_request(&key_pair)
            .map_err(|e| AcmeError::Finalization(e.to_string()))?;
        order.finalize(csr.der().as_ref()).await?;

        let chain = loop {
            if let Some(chain) = order.certificate_chain().await? {
                break chain;
            }
            self.spend(request_id, &mut budget, "waiting for certificate")
                .await?;
        };

        let parsed = parse_certificate_pem(&chain)?;
        let certificate_id = self
            .store_issued(
                &request,
                &provider.name,
                parsed,
                chain,
                key_pair.serialize_pem(),
                &domains,
            )
            .await?;

        self.cleanup_challenges(request_id).await;
        info!(request_id, certificate_id, "Certificate issued");
        Ok(true)
    }

    async fn publish_challenges(
        &self,
        request_id: i32,
        challenges: &[DnsChallenge],
    ) -> Result<(), CertError> {
        for challenge in challenges {
            let zone = zone::find_zone_for(&self.inner.db, &challenge.record_name)
                .await?
                .ok_or_else(|| {
                    CertError::Validation(format!(
                        "no zone configured for {}",
                        challenge.record_name
                    ))
                })?;

            match self
                .inner
                .records
                .create(CreateRecord {
                    domain_id: zone.id,
                    record_type: RecordType::Txt,
                    name: format!("{}.", challenge.record_name),
                    value: challenge.value.clone(),
                    ttl: Some(CHALLENGE_TTL),
                    proxied: false,
                    owner: Owner::AcmeChallenge(request_id),
                })
                .await
            {
                Ok(record) => debug!(
                    request_id,
                    record_id = record.id,
                    name = %challenge.record_name,
                    "Challenge record declared"
                ),
                Err(DnsError::Conflict) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn challenges_active(&self, request_id: i32) -> Result<bool, CertError> {
        let records = self
            .inner
            .records
            .records_of(Owner::AcmeChallenge(request_id))
            .await?;
        Ok(records.iter().all(|r| r.status == RecordStatus::Active))
    }

    /// Count one wait cycle, then sleep; fails once the budget is spent
    async fn spend(
        &self,
        request_id: i32,
        budget: &mut PollBudget,
        stage: &'static str,
    ) -> Result<(), CertError> {
        budget.attempts += 1;
        self.inner
            .db
            .record_request_attempt(request_id, budget.attempts)
            .await?;
        if budget.attempts >= budget.max_attempts {
            return Err(CertError::PollingExhausted {
                attempts: budget.attempts,
                stage,
            });
        }
        debug!(request_id, attempts = budget.attempts, stage, "Waiting");
        sleep(budget.interval).await;
        Ok(())
    }

    async fn store_issued(
        &self,
        request: &certificate_request::Model,
        provider_name: &str,
        parsed: ParsedCertificate,
        certificate_pem: String,
        private_key_pem: String,
        domains: &[String],
    ) -> Result<i32, CertError> {
        let txn = self.inner.db.begin().await?;

        let certificate = txn
            .insert_certificate(
                NewCertificate {
                    provider: provider_name.to_string(),
                    source: CertificateSource::Acme,
                    acme_account_id: Some(request.acme_account_id),
                    fingerprint: parsed.fingerprint.clone(),
                    issue_at: parsed.not_before,
                    expire_at: parsed.not_after,
                    renew_mode: RenewMode::Auto,
                    renew_at: Some(renewal_time(&parsed, self.renewal_window())),
                    certificate_pem,
                    private_key_pem,
                },
                domains,
            )
            .await?;
        txn.complete_request(request.id, certificate.id).await?;

        if let Some(previous) = request.renews_certificate_id {
            txn.clear_renew_at(previous).await?;
            let moved = hand_over_bindings(&txn, previous, certificate.id).await?;
            if moved > 0 {
                let version = ConfigLedger::bump(&txn, "cert:renew").await?;
                info!(
                    previous_certificate_id = previous,
                    certificate_id = certificate.id,
                    moved,
                    version,
                    "Bindings moved to renewed certificate"
                );
            }
        }

        txn.commit().await?;
        Ok(certificate.id)
    }

    async fn release(&self, request_id: i32, note: &str) {
        if let Err(e) = self
            .inner
            .db
            .release_request(request_id, &truncate_error(note))
            .await
        {
            warn!(request_id, error = %e, "Failed to release certificate request");
        }
        self.cleanup_challenges(request_id).await;
    }

    async fn fail(&self, request_id: i32, error: &CertError) {
        warn!(request_id, error = %error, "Certificate issuance failed");
        if let Err(e) = self
            .inner
            .db
            .fail_request(request_id, &truncate_error(&error.to_string()))
            .await
        {
            warn!(request_id, error = %e, "Failed to mark certificate request failed");
        }
        self.cleanup_challenges(request_id).await;
    }

    async fn cleanup_challenges(&self, request_id: i32) {
        match DnsRecordService::delete_owned(&self.inner.db, Owner::AcmeChallenge(request_id))
            .await
        {
            Ok(deleted) => self.inner.records.purge_from_provider(&deleted).await,
            Err(e) => warn!(request_id, error = %e, "Failed to remove challenge records"),
        }
    }

    fn renewal_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.inner.config.renewal_window)
            .unwrap_or_else(|_| chrono::Duration::days(30))
    }

    fn mark_in_flight(&self, request_id: i32) -> bool {
        self.inner
            .in_flight
            .lock()
            .map(|mut set| set.insert(request_id))
            .unwrap_or(false)
    }

    fn clear_in_flight(&self, request_id: i32) {
        if let Ok(mut set) = self.inner.in_flight.lock() {
            set.remove(&request_id);
        }
    }

    fn is_in_flight(&self, request_id: i32) -> bool {
        self.inner
            .in_flight
            .lock()
            .map(|set| set.contains(&request_id))
            .unwrap_or(false)
    }
}

/// `not_after` minus the window; `not_before` when that falls out of range
fn renewal_time(parsed: &ParsedCertificate, window: chrono::Duration) -> DateTime<Utc> {
    parsed
        .not_after
        .checked_sub_signed(window)
        .unwrap_or(parsed.not_before)
}

/// Point every active binding of `from` at `to`
///
/// A target rebound elsewhere in the meantime keeps its new certificate.
async fn hand_over_bindings(
    txn: &DatabaseTransaction,
    from: i32,
    to: i32,
) -> Result<usize, DbErr> {
    let mut moved = 0;
    for binding in txn.active_bindings_for_certificate(from).await? {
        let savepoint = txn.begin().await?;
        if !savepoint.deactivate_binding(binding.id).await? {
            savepoint.rollback().await?;
            continue;
        }
        match savepoint
            .insert_binding(to, binding.bind_type, binding.bind_id)
            .await
        {
            Ok(_) => {
                savepoint.commit().await?;
                moved += 1;
            }
            Err(e) if is_unique_violation(&e) => {
                savepoint.rollback().await?;
                debug!(
                    bind_id = binding.bind_id,
                    "Target rebound concurrently, binding left in place"
                );
            }
            Err(e) => return Err(e),
        }
    }
    Ok(moved)
}

/// Lower-case, drop the root dot, de-duplicate; `*.` only as the first label
fn normalize_domains(domains: &[String]) -> Result<Vec<String>, CertError> {
    let mut normalized: Vec<String> = Vec::new();
    for domain in domains {
        let domain = zone::normalize(domain);
        let base = domain.strip_prefix("*.").unwrap_or(&domain);
        if base.is_empty()
            || !base.contains('.')
            || base.contains('*')
            || base.contains("..")
            || base.chars().any(char::is_whitespace)
        {
            return Err(CertError::Validation(format!("invalid domain '{}'", domain)));
        }
        if !normalized.contains(&domain) {
            normalized.push(domain);
        }
    }
    if normalized.is_empty() {
        return Err(CertError::Validation("no domain requested".to_string()));
    }
    Ok(normalized)
}
