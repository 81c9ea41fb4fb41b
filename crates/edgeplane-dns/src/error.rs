use sea_orm::DbErr;
use thiserror::Error;

use crate::provider::ProviderError;

/// Errors surfaced by the record service
///
/// Provider failures during reconciliation are recorded on the row and never
/// reach the caller that declared the record.
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("DNS record already exists")]
    Conflict,

    #[error("{0} not found")]
    NotFound(String),

    /// The zone cannot be pushed to a provider (no binding, disabled credential)
    #[error("{0}")]
    Unsynchronizable(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}
