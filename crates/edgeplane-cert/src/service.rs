//! Synchronous certificate operations: upload, bind, unbind, delete

use chrono::Utc;
use edgeplane_control::ConfigLedger;
use edgeplane_db::{
    entities::{
        certificate::{self, CertificateSource, CertificateStatus, RenewMode},
        certificate_binding::{self, BindType},
    },
    is_unique_violation,
    store::{BindingStore, CertificateStore, NewCertificate, WebsiteStore},
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::info;

use crate::coverage::first_uncovered;
use crate::error::CertError;
use crate::pem::{parse_certificate_pem, validate_private_key};

#[derive(Clone)]
pub struct CertificateService {
    db: DatabaseConnection,
}

impl CertificateService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Store an operator-provided certificate and key
    pub async fn upload(
        &self,
        certificate_pem: &str,
        private_key_pem: &str,
    ) -> Result<(certificate::Model, Vec<String>), CertError> {
        let parsed = parse_certificate_pem(certificate_pem)?;
        validate_private_key(private_key_pem)?;

        if parsed.not_after <= Utc::now() {
            return Err(CertError::Expired(parsed.not_after));
        }
        if parsed.domains.is_empty() {
            return Err(CertError::Validation(
                "certificate names no DNS domain".to_string(),
            ));
        }
        if self
            .db
            .find_certificate_by_fingerprint(&parsed.fingerprint)
            .await?
            .is_some()
        {
            return Err(CertError::Conflict(format!(
                "certificate {} already uploaded",
                parsed.fingerprint
            )));
        }

        let txn = self.db.begin().await?;
        let stored = txn
            .insert_certificate(
                NewCertificate {
                    provider: "manual".to_string(),
                    source: CertificateSource::Manual,
                    acme_account_id: None,
                    fingerprint: parsed.fingerprint,
                    issue_at: parsed.not_before,
                    expire_at: parsed.not_after,
                    renew_mode: RenewMode::Manual,
                    renew_at: None,
                    certificate_pem: certificate_pem.to_string(),
                    private_key_pem: private_key_pem.to_string(),
                },
                &parsed.domains,
            )
            .await?;
        txn.commit().await?;

        info!(
            certificate_id = stored.id,
            domains = ?parsed.domains,
            expire_at = %stored.expire_at,
            "Certificate uploaded"
        );
        Ok((stored, parsed.domains))
    }

    pub async fn get(&self, id: i32) -> Result<(certificate::Model, Vec<String>), CertError> {
        let certificate = self
            .db
            .find_certificate(id)
            .await?
            .ok_or_else(|| CertError::NotFound(format!("Certificate {}", id)))?;
        let domains = self.db.certificate_domains(id).await?;
        Ok((certificate, domains))
    }

    pub async fn list(&self) -> Result<Vec<certificate::Model>, CertError> {
        Ok(self.db.list_certificates().await?)
    }

    /// Serve `website_id` with `certificate_id`, replacing any previous binding
    pub async fn bind(
        &self,
        certificate_id: i32,
        website_id: i32,
    ) -> Result<certificate_binding::Model, CertError> {
        let (certificate, names) = self.get(certificate_id).await?;
        if matches!(
            certificate.status,
            CertificateStatus::Expired | CertificateStatus::Revoked
        ) {
            return Err(CertError::Validation(format!(
                "certificate {} is {:?}",
                certificate_id, certificate.status
            )));
        }

        self.db
            .find_website(website_id)
            .await?
            .ok_or_else(|| CertError::NotFound(format!("Website {}", website_id)))?;
        let hosts: Vec<String> = self
            .db
            .website_domains(website_id)
            .await?
            .into_iter()
            .map(|d| d.domain)
            .collect();

        if let Some(domain) = first_uncovered(&names, &hosts) {
            return Err(CertError::DomainNotCovered {
                domain: domain.to_string(),
            });
        }

        let txn = self.db.begin().await?;
        txn.deactivate_bindings(BindType::Website, website_id)
            .await?;
        let binding = txn
            .insert_binding(certificate_id, BindType::Website, website_id)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CertError::Conflict(format!(
                        "website {} was bound concurrently",
                        website_id
                    ))
                } else {
                    CertError::Database(e)
                }
            })?;
        let version = ConfigLedger::bump(&txn, "cert:bind").await?;
        txn.commit().await?;

        info!(certificate_id, website_id, version, "Certificate bound");
        Ok(binding)
    }

    pub async fn unbind(&self, website_id: i32) -> Result<(), CertError> {
        let txn = self.db.begin().await?;
        let deactivated = txn
            .deactivate_bindings(BindType::Website, website_id)
            .await?;
        if deactivated == 0 {
            return Err(CertError::NotFound(format!(
                "Active binding of website {}",
                website_id
            )));
        }
        let version = ConfigLedger::bump(&txn, "cert:unbind").await?;
        txn.commit().await?;

        info!(website_id, version, "Certificate unbound");
        Ok(())
    }

    /// Certificate currently serving the website, if any
    pub async fn website_certificate(
        &self,
        website_id: i32,
    ) -> Result<Option<certificate::Model>, CertError> {
        match self
            .db
            .active_binding(BindType::Website, website_id)
            .await?
        {
            Some(binding) => Ok(self.db.find_certificate(binding.certificate_id).await?),
            None => Ok(None),
        }
    }

    /// Refused while the certificate still serves a website
    pub async fn delete(&self, id: i32) -> Result<(), CertError> {
        let txn = self.db.begin().await?;
        txn.find_certificate(id)
            .await?
            .ok_or_else(|| CertError::NotFound(format!("Certificate {}", id)))?;

        let active = txn.active_bindings_for_certificate(id).await?;
        if !active.is_empty() {
            return Err(CertError::Conflict(format!(
                "certificate {} is bound to {} website(s)",
                id,
                active.len()
            )));
        }

        txn.delete_certificate_row(id).await?;
        txn.commit().await?;

        info!(certificate_id = id, "Certificate deleted");
        Ok(())
    }
}

