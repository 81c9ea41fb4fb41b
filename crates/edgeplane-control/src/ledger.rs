//! Config version ledger
//!
//! Append-only, strictly increasing. Agents compare the head against the
//! version they last applied and re-fetch the full config when it moved.

use chrono::{DateTime, Utc};
use edgeplane_db::{entities::config_version, store::ConfigVersionStore};
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr};
use serde::Serialize;
use tracing::debug;

/// Current head of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerHead {
    /// 0 when nothing has been recorded yet
    pub version: i64,
    pub reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl LedgerHead {
    fn empty() -> Self {
        Self {
            version: 0,
            reason: None,
            created_at: None,
        }
    }
}

impl From<config_version::Model> for LedgerHead {
    fn from(row: config_version::Model) -> Self {
        Self {
            version: row.version,
            reason: Some(row.reason),
            created_at: Some(row.created_at),
        }
    }
}

#[derive(Clone)]
pub struct ConfigLedger {
    db: DatabaseConnection,
}

impl ConfigLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Append `max + 1` inside the caller's transaction
    ///
    /// Two concurrent bumps race on the unique version index; the loser's
    /// transaction fails and rolls back with everything it wrote.
    pub async fn bump(txn: &DatabaseTransaction, reason: &str) -> Result<i64, DbErr> {
        let next = txn
            .latest_config_version()
            .await?
            .map(|row| row.version + 1)
            .unwrap_or(1);

        txn.insert_config_version(next, reason).await?;
        debug!(version = next, reason = %reason, "Config version bumped");
        Ok(next)
    }

    pub async fn latest(&self) -> Result<LedgerHead, DbErr> {
        Ok(self
            .db
            .latest_config_version()
            .await?
            .map(LedgerHead::from)
            .unwrap_or_else(LedgerHead::empty))
    }

    /// Newest first; `page` starts at 0
    pub async fn history(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<config_version::Model>, u64), DbErr> {
        self.db.config_version_page(page, page_size).await
    }
}
