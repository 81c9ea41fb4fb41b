//! DNS reconciliation worker
//!
//! Pushes desired records in `pending`/`error` state to the provider.
//!
//! # Architecture
//!
//! The worker:
//! 1. Runs on a fixed interval (default: 30 seconds), first tick immediately
//! 2. Fetches at most one batch (default: 100) of due records, oldest first
//! 3. Syncs them strictly one after another
//! 4. On failure bumps `retry_count` and schedules the next attempt with a
//!    linear backoff of 60s per consecutive failure
//!
//! Ticks never overlap: the loop awaits each tick before the next one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use edgeplane_db::{entities::dns_record, store::DnsRecordStore};
use sea_orm::{DatabaseConnection, DbErr};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DnsError;
use crate::factory::{resolve_target, ProviderFactory, ZoneTarget};
use crate::provider::RecordSpec;
use crate::zone;

/// Longest error message stored on a record
pub const MAX_ERROR_LEN: usize = 255;

/// Retry delay after consecutive failures
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay added per consecutive failure
    pub step: Duration,
    /// Upper bound on the delay; `None` keeps growing linearly
    pub max_delay: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(60),
            max_delay: None,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the next attempt after `retry_count` consecutive failures
    pub fn delay(&self, retry_count: i32) -> Duration {
        let factor = retry_count.max(1) as u32;
        let delay = self.step.saturating_mul(factor);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// Configuration for the reconciliation worker
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// Interval between ticks (default: 30 seconds)
    pub interval: Duration,
    /// Maximum records per tick (default: 100)
    pub batch_size: u64,
    pub backoff: BackoffPolicy,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 100,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub synced: usize,
    pub failed: usize,
}

pub struct ReconciliationWorker {
    db: DatabaseConnection,
    providers: Arc<dyn ProviderFactory>,
    config: ReconciliationConfig,
}

impl ReconciliationWorker {
    pub fn new(
        db: DatabaseConnection,
        providers: Arc<dyn ProviderFactory>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            db,
            providers,
            config,
        }
    }

    /// Run the loop on its own task until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Main loop
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "DNS reconciliation worker started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("DNS reconciliation worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) if report.synced + report.failed > 0 => {
                            info!(synced = report.synced, failed = report.failed, "DNS reconciliation tick finished");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Failed to fetch DNS records to sync"),
                    }
                }
            }
        }
    }

    /// Sync one batch of due records
    pub async fn tick(&self) -> Result<TickReport, DbErr> {
        let records = self
            .db
            .find_due_records(Utc::now(), self.config.batch_size)
            .await?;

        if records.is_empty() {
            return Ok(TickReport::default());
        }

        debug!(count = records.len(), "Found DNS records to sync");

        let mut report = TickReport::default();
        let mut targets: HashMap<i32, ZoneTarget> = HashMap::new();

        for record in records {
            match self.sync_record(&record, &mut targets).await {
                Ok(provider_record_id) => {
                    debug!(
                        record_id = record.id,
                        provider_record_id = %provider_record_id,
                        "DNS record synced"
                    );
                    if let Err(e) = self
                        .db
                        .mark_record_synced(record.id, &provider_record_id)
                        .await
                    {
                        warn!(record_id = record.id, error = %e, "Failed to mark DNS record synced");
                    }
                    report.synced += 1;
                }
                Err(e) => {
                    self.mark_failed(&record, &e.to_string()).await;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn sync_record(
        &self,
        record: &dns_record::Model,
        targets: &mut HashMap<i32, ZoneTarget>,
    ) -> Result<String, DnsError> {
        let target = match targets.get(&record.domain_id) {
            Some(target) => target.clone(),
            None => {
                let target =
                    resolve_target(&self.db, self.providers.as_ref(), record.domain_id).await?;
                targets.insert(record.domain_id, target.clone());
                target
            }
        };

        let spec = RecordSpec {
            record_type: record.record_type,
            name: zone::fqdn(&record.name, &target.zone.domain),
            value: record.value.clone(),
            ttl: record.ttl.max(1) as u32,
            proxied: record.proxied,
        };

        let provider_record_id = match record.provider_record_id.as_deref() {
            Some(existing) => {
                debug!(record_id = record.id, provider_record_id = %existing, "Updating provider record");
                target
                    .provider
                    .update_record(&target.provider_zone_id, existing, &spec)
                    .await?
            }
            None => {
                debug!(record_id = record.id, name = %spec.name, "Creating provider record");
                target
                    .provider
                    .create_record(&target.provider_zone_id, &spec)
                    .await?
            }
        };

        Ok(provider_record_id)
    }

    async fn mark_failed(&self, record: &dns_record::Model, error: &str) {
        let retry_count = record.retry_count + 1;
        let delay = self.config.backoff.delay(retry_count);
        let next_retry_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(1));

        warn!(
            record_id = record.id,
            retry_count,
            retry_in_secs = delay.as_secs(),
            error = %error,
            "DNS record sync failed"
        );

        if let Err(e) = self
            .db
            .mark_record_failed(record.id, retry_count, &truncate_error(error), next_retry_at)
            .await
        {
            warn!(record_id = record.id, error = %e, "Failed to mark DNS record failed");
        }
    }
}

/// Cut an error message to fit the column: 252 characters and `...`
pub fn truncate_error(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(MAX_ERROR_LEN - 3).collect();
    truncated.push_str("...");
    truncated
}
