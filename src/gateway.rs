//! Content-addressed blob retrieval through redundant HTTP gateways.
//!
//! A content reference is appended to each configured gateway base URL in
//! order. The first gateway answering `200 OK` within the timeout wins; any
//! other status, a timeout, or a connection error moves on to the next
//! gateway. A gateway is never retried, so the worst case for one fetch is
//! `gateways × timeout`.
//!
//! # Configuration
//!
//! ```toml
//! [gateways]
//! urls = ["https://ipfs.io/ipfs/", "https://dweb.link/ipfs/"]
//! timeout_secs = 10
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::RecoveryError;
use crate::models::FetchedBlob;

/// Anything that can resolve a content reference to bytes.
///
/// [`GatewayFetcher`] is the production implementation; tests and embedders
/// can supply their own.
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, content_ref: &str) -> Result<FetchedBlob, RecoveryError>;
}

/// Ordered list of gateway base URLs sharing one HTTP client.
pub struct GatewayFetcher {
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl GatewayFetcher {
    /// Build a fetcher. Fails if `endpoints` is empty.
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Result<Self> {
        if endpoints.is_empty() {
            bail!("no gateways configured");
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoints, client })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::new(
            config.urls.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn try_endpoint(&self, base_url: &str, content_ref: &str) -> Result<Vec<u8>, String> {
        let url = format!("{}{}", base_url, content_ref);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| describe_reqwest_error(&e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| describe_reqwest_error(&e))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl BlobFetcher for GatewayFetcher {
    async fn fetch(&self, content_ref: &str) -> Result<FetchedBlob, RecoveryError> {
        let mut last_error = String::from("no gateways configured");

        for base_url in &self.endpoints {
            match self.try_endpoint(base_url, content_ref).await {
                Ok(bytes) => {
                    debug!(endpoint = %base_url, content_ref, size = bytes.len(), "gateway served blob");
                    return Ok(FetchedBlob {
                        endpoint: base_url.clone(),
                        bytes,
                    });
                }
                Err(cause) => {
                    warn!(endpoint = %base_url, content_ref, %cause, "gateway failed, trying next");
                    last_error = format!("{}: {}", base_url, cause);
                }
            }
        }

        Err(RecoveryError::FetchExhausted {
            content_ref: content_ref.to_string(),
            attempts: self.endpoints.len(),
            last_error,
        })
    }
}

fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_endpoint_list_is_a_configuration_error() {
        let err = GatewayFetcher::new(vec![], Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(err.to_string().contains("no gateways"));
    }

    #[test]
    fn endpoints_keep_configured_order() {
        let fetcher = GatewayFetcher::new(
            vec!["https://b/".into(), "https://a/".into()],
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(fetcher.endpoints(), &["https://b/", "https://a/"]);
    }

    #[tokio::test]
    async fn unreachable_gateways_exhaust() {
        // Port 9 (discard) on localhost is closed in test environments.
        let fetcher = GatewayFetcher::new(
            vec!["http://127.0.0.1:9/ipfs/".into()],
            Duration::from_secs(2),
        )
        .unwrap();
        let err = fetcher.fetch("QmMissing").await.unwrap_err();
        assert_eq!(err.code(), "fetch_exhausted");
        assert!(err.to_string().contains("QmMissing"));
    }
}
