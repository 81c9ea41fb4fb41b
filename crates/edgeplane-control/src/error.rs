use edgeplane_dns::DnsError;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Dns(#[from] DnsError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}
