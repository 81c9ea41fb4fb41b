//! Cloudflare DNS provider implementation
//!
//! Uses the Cloudflare v4 API to manage zone records.
//! API documentation: <https://developers.cloudflare.com/api/resources/dns/>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{DnsProvider, ProviderError, ProviderResult, RecordSpec};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for provider calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare DNS provider
#[derive(Debug, Clone)]
pub struct CloudflareProvider {
    client: Client,
    token: String,
    base_url: String,
    timeout: Duration,
}

impl CloudflareProvider {
    /// Create a provider talking to the public Cloudflare API
    pub fn new(token: &str, timeout: Duration) -> ProviderResult<Self> {
        Self::with_base_url(token, timeout, CLOUDFLARE_API_BASE)
    }

    /// Create a provider against another endpoint (API gateways, tests)
    pub fn with_base_url(token: &str, timeout: Duration, base_url: &str) -> ProviderResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone_id)
    }

    fn record_url(&self, zone_id: &str, record_id: &str) -> String {
        format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id)
    }

    /// Send a request; authentication failures are mapped here
    async fn execute(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> ProviderResult<(StatusCode, String)> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        elapsed_secs: self.timeout.as_secs(),
                    }
                } else {
                    ProviderError::Request(format!("Failed to {}: {}", action, e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let detail = serde_json::from_str::<Envelope>(&body)
                .map(|envelope| envelope.error_summary())
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(ProviderError::Authentication(detail));
        }

        Ok((status, body))
    }

    /// Unwrap the Cloudflare envelope
    fn parse(status: StatusCode, body: &str, action: &str) -> ProviderResult<Envelope> {
        match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) if envelope.success && status.is_success() => Ok(envelope),
            Ok(envelope) => Err(ProviderError::Api(format!(
                "Failed to {}: HTTP {} - {}",
                action,
                status.as_u16(),
                envelope.error_summary()
            ))),
            Err(_) => Err(ProviderError::Api(format!(
                "Failed to {}: HTTP {} - {}",
                action,
                status.as_u16(),
                body
            ))),
        }
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn create_record(&self, zone_id: &str, record: &RecordSpec) -> ProviderResult<String> {
        debug!(zone_id = %zone_id, name = %record.name, record_type = %record.record_type, "Creating DNS record");

        let request = self
            .client
            .post(self.records_url(zone_id))
            .json(&RecordBody::from(record));
        let (status, body) = self.execute(request, "create record").await?;
        let envelope = Self::parse(status, &body, "create record")?;

        let record_id = envelope
            .result
            .and_then(|result| result.id)
            .ok_or_else(|| ProviderError::Api("record ID not found in response".to_string()))?;

        debug!(record_id = %record_id, "DNS record created");
        Ok(record_id)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        provider_record_id: &str,
        record: &RecordSpec,
    ) -> ProviderResult<String> {
        debug!(zone_id = %zone_id, record_id = %provider_record_id, name = %record.name, "Updating DNS record");

        let request = self
            .client
            .put(self.record_url(zone_id, provider_record_id))
            .json(&RecordBody::from(record));
        let (status, body) = self.execute(request, "update record").await?;
        let envelope = Self::parse(status, &body, "update record")?;

        Ok(envelope
            .result
            .and_then(|result| result.id)
            .unwrap_or_else(|| provider_record_id.to_string()))
    }

    async fn delete_record(&self, zone_id: &str, provider_record_id: &str) -> ProviderResult<()> {
        debug!(zone_id = %zone_id, record_id = %provider_record_id, "Deleting DNS record");

        let request = self.client.delete(self.record_url(zone_id, provider_record_id));
        let (status, body) = self.execute(request, "delete record").await?;

        // 404 is fine - record might already be deleted
        if status == StatusCode::NOT_FOUND {
            debug!(record_id = %provider_record_id, "Record already deleted");
            return Ok(());
        }

        Self::parse(status, &body, "delete record")?;
        Ok(())
    }
}

// Cloudflare API types

#[derive(Debug, Serialize)]
struct RecordBody<'a> {
    r#type: &'static str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

impl<'a> From<&'a RecordSpec> for RecordBody<'a> {
    fn from(record: &'a RecordSpec) -> Self {
        Self {
            r#type: record.record_type.as_str(),
            name: &record.name,
            content: &record.value,
            ttl: record.ttl,
            proxied: record.proxied,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<RecordResult>,
}

impl Envelope {
    fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "unknown error".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("[{}] {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RecordResult {
    id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgeplane_db::entities::dns_record::RecordType;

    #[test]
    fn test_record_body_uses_cloudflare_field_names() {
        let spec = RecordSpec {
            record_type: RecordType::Cname,
            name: "www.example.com".to_string(),
            value: "abcd1234.example.com".to_string(),
            ttl: 120,
            proxied: true,
        };

        let json = serde_json::to_value(RecordBody::from(&spec)).unwrap();
        assert_eq!(json["type"], "CNAME");
        assert_eq!(json["name"], "www.example.com");
        assert_eq!(json["content"], "abcd1234.example.com");
        assert_eq!(json["ttl"], 120);
        assert_eq!(json["proxied"], true);
    }

    #[test]
    fn test_error_summary() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"success":false,"errors":[{"code":81057,"message":"Record already exists."}],"result":null}"#,
        )
        .unwrap();
        assert_eq!(envelope.error_summary(), "[81057] Record already exists.");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let provider =
            CloudflareProvider::with_base_url("token", DEFAULT_TIMEOUT, "http://localhost:9000/")
                .unwrap();
        assert_eq!(
            provider.record_url("zone", "rec"),
            "http://localhost:9000/zones/zone/dns_records/rec"
        );
    }
}
