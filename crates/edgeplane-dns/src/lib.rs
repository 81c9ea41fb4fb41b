//! DNS desired-state synchronisation
//!
//! Records are declared locally through [`DnsRecordService`] and pushed to
//! the authoritative provider by the [`ReconciliationWorker`]. Zone
//! membership follows one rule everywhere: the longest configured zone that
//! equals the name or is a dot-separated suffix of it wins.

pub mod cloudflare;
pub mod error;
pub mod factory;
pub mod provider;
pub mod records;
pub mod worker;
pub mod zone;

pub use cloudflare::CloudflareProvider;
pub use error::DnsError;
pub use factory::{resolve_target, HttpProviderFactory, ProviderFactory, ZoneTarget};
pub use provider::{DnsProvider, ProviderError, ProviderResult, RecordSpec};
pub use records::{CreateRecord, DnsRecordService, DEFAULT_TTL};
pub use worker::{BackoffPolicy, ReconciliationConfig, ReconciliationWorker, TickReport};
