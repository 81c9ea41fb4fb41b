use chrono::{DateTime, Utc};
use edgeplane_dns::DnsError;
use sea_orm::DbErr;
use thiserror::Error;

use crate::acme::AcmeError;

/// Certificate lifecycle errors
#[derive(Debug, Error)]
pub enum CertError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid PEM: {0}")]
    InvalidPem(String),

    #[error("Certificate expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("Certificate does not cover domain {domain}")]
    DomainNotCovered { domain: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Polling budget exhausted after {attempts} attempts while {stage}")]
    PollingExhausted { attempts: i32, stage: &'static str },

    /// Worth another try after a delay
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Issuance cancelled")]
    Cancelled,

    #[error("Issuance timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Acme(#[from] AcmeError),

    #[error(transparent)]
    Dns(#[from] DnsError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl CertError {
    /// Failures the issuance supervisor retries
    pub fn is_transient(&self) -> bool {
        matches!(self, CertError::Transient(_) | CertError::Database(_))
    }
}
