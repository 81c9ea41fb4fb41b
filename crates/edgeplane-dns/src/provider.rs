//! DNS provider trait
//!
//! Defines the interface an authoritative DNS API must implement for the
//! reconciliation worker to push desired records.

use async_trait::async_trait;
use edgeplane_db::entities::dns_record::RecordType;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors returned by a DNS provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication failed with the provider
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The provider answered but refused the operation
    #[error("Provider API error: {0}")]
    Api(String),

    /// Transport-level failure
    #[error("API request failed: {0}")]
    Request(String),

    /// Request timeout
    #[error("Request timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// No adapter exists for this provider kind
    #[error("Unsupported DNS provider '{0}'")]
    Unsupported(String),
}

/// A record as sent to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    pub record_type: RecordType,
    /// Fully qualified name
    pub name: String,
    pub value: String,
    pub ttl: u32,
    pub proxied: bool,
}

/// Authoritative DNS API
///
/// Implementations must be thread-safe; one adapter is built per zone sync
/// and may be shared across tasks.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Provider kind (e.g. "cloudflare")
    fn name(&self) -> &'static str;

    /// Create a record, returning the provider's id for it
    async fn create_record(&self, zone_id: &str, record: &RecordSpec) -> ProviderResult<String>;

    /// Replace an existing record, returning the id it is now known by
    async fn update_record(
        &self,
        zone_id: &str,
        provider_record_id: &str,
        record: &RecordSpec,
    ) -> ProviderResult<String>;

    /// Delete a record; a record that no longer exists is not an error
    async fn delete_record(&self, zone_id: &str, provider_record_id: &str) -> ProviderResult<()>;
}
