//! Builds provider adapters from stored zone bindings

use std::sync::Arc;
use std::time::Duration;

use edgeplane_db::{
    entities::{domain, provider_credential, provider_credential::CredentialStatus},
    store::ZoneStore,
};

use crate::cloudflare::{CloudflareProvider, CLOUDFLARE_API_BASE, DEFAULT_TIMEOUT};
use crate::error::DnsError;
use crate::provider::{DnsProvider, ProviderError, ProviderResult};

/// Turns a zone's provider kind and credential into an adapter
pub trait ProviderFactory: Send + Sync {
    fn build(
        &self,
        provider: &str,
        credential: &provider_credential::Model,
    ) -> ProviderResult<Arc<dyn DnsProvider>>;
}

/// Factory for the HTTP-backed providers
#[derive(Debug, Clone)]
pub struct HttpProviderFactory {
    timeout: Duration,
    cloudflare_base_url: String,
}

impl HttpProviderFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cloudflare_base_url: CLOUDFLARE_API_BASE.to_string(),
        }
    }

    pub fn with_cloudflare_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.cloudflare_base_url = base_url.into();
        self
    }
}

impl Default for HttpProviderFactory {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn build(
        &self,
        provider: &str,
        credential: &provider_credential::Model,
    ) -> ProviderResult<Arc<dyn DnsProvider>> {
        match provider.to_ascii_lowercase().as_str() {
            "cloudflare" => Ok(Arc::new(CloudflareProvider::with_base_url(
                &credential.api_token,
                self.timeout,
                &self.cloudflare_base_url,
            )?)),
            other => Err(ProviderError::Unsupported(other.to_string())),
        }
    }
}

/// Everything needed to push records of one zone
#[derive(Clone)]
pub struct ZoneTarget {
    pub zone: domain::Model,
    /// Zone id on the provider side
    pub provider_zone_id: String,
    pub provider: Arc<dyn DnsProvider>,
}

/// Look up the zone, its provider binding and credential, and build the adapter
pub async fn resolve_target<C>(
    db: &C,
    factory: &dyn ProviderFactory,
    domain_id: i32,
) -> Result<ZoneTarget, DnsError>
where
    C: ZoneStore + ?Sized,
{
    let zone = db
        .find_zone(domain_id)
        .await?
        .ok_or_else(|| DnsError::Unsynchronizable(format!("zone {} not found", domain_id)))?;

    let (binding, credential) = db.find_zone_provider(domain_id).await?.ok_or_else(|| {
        DnsError::Unsynchronizable(format!("DNS provider not configured for {}", zone.domain))
    })?;

    let credential = credential.ok_or_else(|| {
        DnsError::Unsynchronizable(format!("API credential missing for {}", zone.domain))
    })?;
    if credential.status != CredentialStatus::Active {
        return Err(DnsError::Unsynchronizable(format!(
            "API credential '{}' is inactive",
            credential.name
        )));
    }

    let provider = factory.build(&binding.provider, &credential)?;

    Ok(ZoneTarget {
        zone,
        provider_zone_id: binding.provider_zone_id,
        provider,
    })
}
