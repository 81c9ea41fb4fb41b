//! PEM parsing for uploaded and issued certificates

use chrono::{DateTime, Utc};
use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};
use x509_parser::extensions::GeneralName;
use x509_parser::time::ASN1Time;

use crate::error::CertError;

/// Facts extracted from the leaf certificate of a chain
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    /// Lower-case hex sha256 of the leaf DER
    pub fingerprint: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// DNS SANs then CN, lower-cased, first occurrence kept
    pub domains: Vec<String>,
}

/// Parse the first `CERTIFICATE` block of `pem`
pub fn parse_certificate_pem(pem: &str) -> Result<ParsedCertificate, CertError> {
    let leaf: CertificateDer<'static> = rustls_pemfile::certs(&mut pem.as_bytes())
        .next()
        .ok_or_else(|| CertError::InvalidPem("no CERTIFICATE block found".to_string()))?
        .map_err(|e| CertError::InvalidPem(format!("failed to read certificate: {}", e)))?;

    let (_, cert) = x509_parser::parse_x509_certificate(leaf.as_ref())
        .map_err(|e| CertError::InvalidPem(format!("failed to parse certificate: {}", e)))?;

    let mut domains: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim().trim_end_matches('.').to_ascii_lowercase();
        if !name.is_empty() && !domains.contains(&name) {
            domains.push(name);
        }
    };

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for general_name in &san.value.general_names {
            if let GeneralName::DNSName(name) = general_name {
                push(name);
            }
        }
    }
    for cn in cert.subject().iter_common_name() {
        if let Ok(cn) = cn.as_str() {
            push(cn);
        }
    }

    Ok(ParsedCertificate {
        fingerprint: fingerprint(leaf.as_ref()),
        not_before: asn1_to_utc(cert.validity().not_before)?,
        not_after: asn1_to_utc(cert.validity().not_after)?,
        domains,
    })
}

/// Check that `pem` holds a private key rustls can sign with
pub fn validate_private_key(pem: &str) -> Result<(), CertError> {
    let key = rustls_pemfile::private_key(&mut pem.as_bytes())
        .map_err(|e| CertError::InvalidPem(format!("failed to read private key: {}", e)))?
        .ok_or_else(|| CertError::InvalidPem("no private key found".to_string()))?;

    rustls::crypto::ring::sign::any_supported_type(&key)
        .map_err(|e| CertError::InvalidPem(format!("unusable private key: {}", e)))?;
    Ok(())
}

fn fingerprint(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

fn asn1_to_utc(time: ASN1Time) -> Result<DateTime<Utc>, CertError> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| CertError::InvalidPem("validity timestamp out of range".to_string()))
}
