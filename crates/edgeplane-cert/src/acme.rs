//! ACME directory access
//!
//! The lifecycle manager talks to a CA through [`AcmeDirectory`] and
//! [`AcmeOrder`]. [`InstantAcmeDirectory`] is the production implementation
//! on top of `instant-acme`.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use instant_acme::{
    Account, AccountCredentials, AuthorizationStatus, ChallengeType, ExternalAccountKey,
    Identifier, NewAccount, NewOrder, Order, OrderStatus,
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

/// Label DNS-01 challenge records live under
pub const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// ACME errors
#[derive(Debug, Error)]
pub enum AcmeError {
    #[error("Failed to create ACME account: {0}")]
    Account(String),

    /// The CA answered with a problem document
    #[error("ACME protocol error: {0}")]
    Protocol(String),

    /// The CA could not be reached
    #[error("ACME transport error: {0}")]
    Transport(String),

    #[error("No DNS-01 challenge offered for domain '{0}'")]
    NoDns01Challenge(String),

    #[error("Challenge not found for URL: {0}")]
    ChallengeNotFound(String),

    #[error("Order became invalid")]
    OrderInvalid,

    #[error("Failed to finalize certificate: {0}")]
    Finalization(String),
}

impl From<instant_acme::Error> for AcmeError {
    fn from(e: instant_acme::Error) -> Self {
        match e {
            instant_acme::Error::Api(problem) => AcmeError::Protocol(problem.to_string()),
            other => AcmeError::Transport(other.to_string()),
        }
    }
}

/// External account binding handed out by the CA
#[derive(Debug, Clone)]
pub struct ExternalAccount {
    pub kid: String,
    /// Base64url-encoded HMAC key
    pub hmac_key: String,
}

/// Everything needed to act as one ACME account
#[derive(Debug, Clone)]
pub struct AccountKey {
    pub directory_url: String,
    pub email: String,
    pub external_account: Option<ExternalAccount>,
    /// Stored credentials; `None` registers a new account
    pub credentials_json: Option<String>,
}

/// Pending DNS-01 challenge of one authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsChallenge {
    /// Identifier without wildcard prefix
    pub domain: String,
    /// `_acme-challenge.<domain>`
    pub record_name: String,
    /// TXT record content
    pub value: String,
    /// Challenge URL, used to signal readiness
    pub url: String,
}

/// Order state as far as issuance cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderProgress {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

pub struct OpenedOrder {
    pub order: Box<dyn AcmeOrder>,
    /// Set when the account was registered by this call
    pub new_credentials: Option<String>,
}

#[async_trait]
pub trait AcmeDirectory: Send + Sync {
    /// Open an order for `domains`, registering the account first if needed
    async fn open_order(
        &self,
        account: &AccountKey,
        domains: &[String],
    ) -> Result<OpenedOrder, AcmeError>;
}

#[async_trait]
pub trait AcmeOrder: Send {
    /// DNS-01 challenges of every authorization not yet valid
    async fn dns_challenges(&mut self) -> Result<Vec<DnsChallenge>, AcmeError>;

    /// Tell the CA the challenge record is in place
    async fn set_ready(&mut self, challenge: &DnsChallenge) -> Result<(), AcmeError>;

    async fn poll(&mut self) -> Result<OrderProgress, AcmeError>;

    async fn finalize(&mut self, csr_der: &[u8]) -> Result<(), AcmeError>;

    /// PEM chain once issued
    async fn certificate_chain(&mut self) -> Result<Option<String>, AcmeError>;
}

/// `_acme-challenge.<domain>` with any wildcard prefix stripped
pub fn challenge_record_name(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    let base = domain.strip_prefix("*.").unwrap_or(&domain);
    format!("{}.{}", ACME_CHALLENGE_LABEL, base)
}

/// TXT value for a key authorization: base64url(sha256(key_authorization))
pub fn dns01_value(key_authorization: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(key_authorization.as_bytes()))
}

/// `instant-acme` backed directory
#[derive(Debug, Default, Clone)]
pub struct InstantAcmeDirectory;

impl InstantAcmeDirectory {
    pub fn new() -> Self {
        Self
    }

    async fn account(&self, key: &AccountKey) -> Result<(Account, Option<String>), AcmeError> {
        if let Some(json) = &key.credentials_json {
            let credentials: AccountCredentials = serde_json::from_str(json).map_err(|e| {
                AcmeError::Account(format!("Failed to deserialize credentials: {}", e))
            })?;
            let account = Account::builder()
                .map_err(|e| AcmeError::Account(e.to_string()))?
                .from_credentials(credentials)
                .await?;
            debug!(email = %key.email, "ACME account restored");
            return Ok((account, None));
        }

        let external_account = match &key.external_account {
            Some(eab) => {
                let hmac = URL_SAFE_NO_PAD.decode(eab.hmac_key.trim()).map_err(|e| {
                    AcmeError::Account(format!("EAB HMAC key is not base64url: {}", e))
                })?;
                Some(ExternalAccountKey::new(eab.kid.clone(), &hmac))
            }
            None => None,
        };

        info!(email = %key.email, directory = %key.directory_url, "Creating new ACME account");

        let contact = format!("mailto:{}", key.email);
        let (account, credentials) = Account::builder()
            .map_err(|e| AcmeError::Account(e.to_string()))?
            .create(
                &NewAccount {
                    contact: &[&contact],
                    terms_of_service_agreed: true,
                    only_return_existing: false,
                },
                key.directory_url.clone(),
                external_account.as_ref(),
            )
            .await?;

        let credentials_json = serde_json::to_string(&credentials)
            .map_err(|e| AcmeError::Account(format!("Failed to serialize credentials: {}", e)))?;

        Ok((account, Some(credentials_json)))
    }
}

#[async_trait]
impl AcmeDirectory for InstantAcmeDirectory {
    async fn open_order(
        &self,
        key: &AccountKey,
        domains: &[String],
    ) -> Result<OpenedOrder, AcmeError> {
        let (account, new_credentials) = self.account(key).await?;

        let identifiers: Vec<Identifier> =
            domains.iter().map(|d| Identifier::Dns(d.clone())).collect();

        info!(domains = ?domains, "Creating certificate order with DNS-01 challenges");
        let order = account.new_order(&NewOrder::new(&identifiers)).await?;

        Ok(OpenedOrder {
            order: Box::new(InstantAcmeOrder { order }),
            new_credentials,
        })
    }
}

struct InstantAcmeOrder {
    order: Order,
}

#[async_trait]
impl AcmeOrder for InstantAcmeOrder {
    async fn dns_challenges(&mut self) -> Result<Vec<DnsChallenge>, AcmeError> {
        let mut authorizations = self.order.authorizations();
        let mut challenges = Vec::new();

        while let Some(result) = authorizations.next().await {
            let mut authz = result?;

            let identifier = authz.identifier();
            let domain = match &identifier.identifier {
                Identifier::Dns(domain) => domain.clone(),
                _ => continue,
            };

            if authz.status == AuthorizationStatus::Valid {
                debug!(domain = %domain, "Authorization already valid");
                continue;
            }

            let challenge = authz
                .challenge(ChallengeType::Dns01)
                .ok_or_else(|| AcmeError::NoDns01Challenge(domain.clone()))?;

            let key_authorization = challenge.key_authorization();
            challenges.push(DnsChallenge {
                record_name: challenge_record_name(&domain),
                value: dns01_value(key_authorization.as_str()),
                url: challenge.url.clone(),
                domain,
            });
        }

        Ok(challenges)
    }

    async fn set_ready(&mut self, challenge: &DnsChallenge) -> Result<(), AcmeError> {
        let mut authorizations = self.order.authorizations();
        while let Some(result) = authorizations.next().await {
            let mut authz = result?;

            let matching_type = authz
                .challenges
                .iter()
                .find(|c| c.url == challenge.url)
                .map(|c| c.r#type.clone());

            if let Some(challenge_type) = matching_type {
                if let Some(mut handle) = authz.challenge(challenge_type) {
                    handle.set_ready().await?;
                    return Ok(());
                }
            }
        }

        Err(AcmeError::ChallengeNotFound(challenge.url.clone()))
    }

    async fn poll(&mut self) -> Result<OrderProgress, AcmeError> {
        let state = self.order.refresh().await?;
        Ok(match state.status {
            OrderStatus::Pending => OrderProgress::Pending,
            OrderStatus::Ready => OrderProgress::Ready,
            OrderStatus::Processing => OrderProgress::Processing,
            OrderStatus::Valid => OrderProgress::Valid,
            OrderStatus::Invalid => OrderProgress::Invalid,
        })
    }

    async fn finalize(&mut self, csr_der: &[u8]) -> Result<(), AcmeError> {
        self.order
            .finalize_csr(csr_der)
            .await
            .map_err(|e| AcmeError::Finalization(e.to_string()))
    }

    async fn certificate_chain(&mut self) -> Result<Option<String>, AcmeError> {
        Ok(self.order.certificate().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_record_name_strips_wildcard() {
        assert_eq!(
            challenge_record_name("*.Example.com"),
            "_acme-challenge.example.com"
        );
        assert_eq!(
            challenge_record_name("www.example.com."),
            "_acme-challenge.www.example.com"
        );
    }

    #[test]
    fn test_dns01_value() {
        // RFC 8555 digest encoding: 43 chars, no padding
        let value = dns01_value("token.thumbprint");
        assert_eq!(value.len(), 43);
        assert!(!value.contains('='));
        assert!(!value.contains('+') && !value.contains('/'));
    }
}
