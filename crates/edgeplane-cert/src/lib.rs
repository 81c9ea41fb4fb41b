//! Certificate lifecycle
//!
//! Certificates enter the system two ways: a synchronous manual upload, or an
//! ACME DNS-01 issuance driven by the [`CertificateManager`]. Challenge TXT
//! records go through the regular desired-state DNS pipeline, so issuance
//! waits for the reconciliation worker to publish them.

pub mod acme;
pub mod coverage;
pub mod error;
pub mod manager;
pub mod pem;
pub mod service;

pub use acme::{
    challenge_record_name, AccountKey, AcmeDirectory, AcmeError, AcmeOrder, DnsChallenge,
    ExternalAccount, InstantAcmeDirectory, OpenedOrder, OrderProgress,
};
pub use coverage::{covers, first_uncovered};
pub use error::CertError;
pub use manager::{CertificateManager, ManagerConfig, ScanReport};
pub use pem::{parse_certificate_pem, validate_private_key, ParsedCertificate};
pub use service::CertificateService;
