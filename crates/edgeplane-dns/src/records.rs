//! Desired-state record declarations
//!
//! Writes here only touch the database. Pushing to the provider is the
//! reconciliation worker's job; the one exception is the best-effort
//! provider delete that follows a local delete.

use std::sync::Arc;

use edgeplane_db::{
    entities::dns_record::{self, RecordType},
    store::{DnsRecordStore, NewDnsRecord, ZoneStore},
    Owner,
};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::{debug, info, warn};

use crate::error::DnsError;
use crate::factory::{resolve_target, ProviderFactory};
use crate::zone;

/// TTL applied when the caller does not pick one
pub const DEFAULT_TTL: i32 = 120;

/// A record to declare
#[derive(Debug, Clone)]
pub struct CreateRecord {
    pub domain_id: i32,
    pub record_type: RecordType,
    /// Zone-relative name, `@`, or a fully qualified name inside the zone
    pub name: String,
    pub value: String,
    pub ttl: Option<i32>,
    pub proxied: bool,
    pub owner: Owner,
}

/// Declares, edits and removes desired DNS records
#[derive(Clone)]
pub struct DnsRecordService {
    db: DatabaseConnection,
    providers: Arc<dyn ProviderFactory>,
}

impl DnsRecordService {
    pub fn new(db: DatabaseConnection, providers: Arc<dyn ProviderFactory>) -> Self {
        Self { db, providers }
    }

    /// Declare a record in `pending` state
    pub async fn create(&self, request: CreateRecord) -> Result<dns_record::Model, DnsError> {
        Self::create_in(&self.db, request).await
    }

    /// Declare a record on the caller's connection or transaction
    pub async fn create_in<C>(
        conn: &C,
        request: CreateRecord,
    ) -> Result<dns_record::Model, DnsError>
    where
        C: ConnectionTrait + Send,
    {
        let zone = conn
            .find_zone(request.domain_id)
            .await?
            .ok_or_else(|| DnsError::NotFound(format!("Zone {}", request.domain_id)))?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(DnsError::Validation("record name is empty".to_string()));
        }

        let relative = if name == "@" {
            "@".to_string()
        } else if let Some(relative) = zone::relative_name(name, &zone.domain) {
            relative
        } else if name.ends_with('.') {
            return Err(DnsError::Validation(format!(
                "{} does not belong to zone {}",
                name, zone.domain
            )));
        } else {
            zone::normalize(name)
        };

        let value = request.value.trim();
        if value.is_empty() {
            return Err(DnsError::Validation("record value is empty".to_string()));
        }

        let ttl = match request.ttl {
            None | Some(0) => DEFAULT_TTL,
            Some(ttl) if ttl < 0 => {
                return Err(DnsError::Validation(format!("invalid TTL {}", ttl)));
            }
            Some(ttl) => ttl,
        };

        let new = NewDnsRecord {
            domain_id: zone.id,
            record_type: request.record_type,
            name: relative,
            value: value.to_string(),
            ttl,
            proxied: request.proxied,
            owner: request.owner,
        };

        if conn.find_record_by_identity(&new).await?.is_some() {
            return Err(DnsError::Conflict);
        }

        let record = conn.insert_record(new).await?;
        debug!(
            record_id = record.id,
            zone = %zone.domain,
            name = %record.name,
            record_type = %record.record_type,
            owner = %record.owner(),
            "DNS record declared"
        );
        Ok(record)
    }

    /// Edit value/ttl/proxied; the record is re-queued and the previous
    /// provider record removed
    pub async fn update_content(
        &self,
        id: i32,
        value: Option<String>,
        ttl: Option<i32>,
        proxied: Option<bool>,
    ) -> Result<dns_record::Model, DnsError> {
        let existing = self
            .db
            .find_record(id)
            .await?
            .ok_or_else(|| DnsError::NotFound(format!("DNS record {}", id)))?;

        let value = match value {
            Some(value) if value.trim().is_empty() => {
                return Err(DnsError::Validation("record value is empty".to_string()));
            }
            Some(value) => value.trim().to_string(),
            None => existing.value.clone(),
        };
        let ttl = match ttl {
            Some(ttl) if ttl <= 0 => {
                return Err(DnsError::Validation(format!("invalid TTL {}", ttl)));
            }
            Some(ttl) => ttl,
            None => existing.ttl,
        };
        let proxied = proxied.unwrap_or(existing.proxied);

        let edited = NewDnsRecord {
            domain_id: existing.domain_id,
            record_type: existing.record_type,
            name: existing.name.clone(),
            value: value.clone(),
            ttl,
            proxied,
            owner: existing.owner(),
        };
        if let Some(other) = self.db.find_record_by_identity(&edited).await? {
            if other.id != id {
                return Err(DnsError::Conflict);
            }
        }

        let updated = self
            .db
            .update_record_content(id, value, ttl, proxied)
            .await?
            .ok_or_else(|| DnsError::NotFound(format!("DNS record {}", id)))?;

        self.purge_from_provider(std::slice::from_ref(&existing)).await;

        info!(record_id = id, "DNS record updated, queued for sync");
        Ok(updated)
    }

    /// Delete locally, then best-effort at the provider
    pub async fn delete(&self, id: i32) -> Result<(), DnsError> {
        let deleted = self
            .db
            .delete_record_row(id)
            .await?
            .ok_or_else(|| DnsError::NotFound(format!("DNS record {}", id)))?;

        self.purge_from_provider(std::slice::from_ref(&deleted)).await;
        Ok(())
    }

    /// Delete every record of `owner` inside the caller's transaction
    ///
    /// Returns the deleted rows; hand them to [`Self::purge_from_provider`]
    /// once the transaction has committed.
    pub async fn delete_owned<C>(
        conn: &C,
        owner: Owner,
    ) -> Result<Vec<dns_record::Model>, DnsError>
    where
        C: ConnectionTrait + Send,
    {
        let deleted = conn.delete_records_by_owner(owner).await?;
        debug!(owner = %owner, count = deleted.len(), "DNS records deleted by owner");
        Ok(deleted)
    }

    /// Remove records from the provider; failures are logged, never retried
    pub async fn purge_from_provider(&self, records: &[dns_record::Model]) {
        for record in records {
            let Some(provider_record_id) = record.provider_record_id.as_deref() else {
                continue;
            };

            let target = match resolve_target(&self.db, self.providers.as_ref(), record.domain_id)
                .await
            {
                Ok(target) => target,
                Err(e) => {
                    warn!(record_id = record.id, error = %e, "Cannot delete provider record");
                    continue;
                }
            };

            match target
                .provider
                .delete_record(&target.provider_zone_id, provider_record_id)
                .await
            {
                Ok(()) => debug!(
                    record_id = record.id,
                    provider_record_id = %provider_record_id,
                    "Provider record deleted"
                ),
                Err(e) => warn!(
                    record_id = record.id,
                    provider_record_id = %provider_record_id,
                    error = %e,
                    "Failed to delete provider record"
                ),
            }
        }
    }

    /// Re-queue one record, or every record in `error` when `id` is `None`
    pub async fn trigger_sync(&self, id: Option<i32>) -> Result<u64, DnsError> {
        match id {
            Some(id) => {
                if !self.db.reset_record_sync(id).await? {
                    return Err(DnsError::NotFound(format!("DNS record {}", id)));
                }
                Ok(1)
            }
            None => {
                let count = self.db.reset_failed_records().await?;
                info!(count, "Failed DNS records re-queued");
                Ok(count)
            }
        }
    }

    pub async fn records_of(&self, owner: Owner) -> Result<Vec<dns_record::Model>, DnsError> {
        Ok(self.db.find_records_by_owner(owner).await?)
    }
}
