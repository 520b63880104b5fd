//! HTTP health endpoint check

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::errors::DeployError;
use crate::probe::poll::Attempt;

/// Health path of the server, relative to its base URL
pub const HEALTH_PATH: &str = "/api/system/state";

/// Full health endpoint for a server base URL
pub fn health_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH)
}

/// One request against a health endpoint
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Issue a single request; only a 2xx status counts as ready.
    ///
    /// Never fatal: connection, DNS and timeout failures are all `Pending`.
    async fn check(&self, url: &str, timeout: Duration) -> Attempt;
}

/// Health check over reqwest
#[derive(Debug, Clone)]
pub struct HttpHealthCheck {
    client: Client,
}

impl HttpHealthCheck {
    pub fn new() -> Result<Self, DeployError> {
        // Local clusters serve self-signed certificates
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthCheck for HttpHealthCheck {
    async fn check(&self, url: &str, timeout: Duration) -> Attempt {
        debug!("GET {}", url);
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => Attempt::Ready,
            Ok(response) => Attempt::Pending(format!("status {}", response.status())),
            Err(e) => Attempt::Pending(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url_joins_path() {
        assert_eq!(
            health_url("https://che-che.192.168.64.34.nip.io/"),
            "https://che-che.192.168.64.34.nip.io/api/system/state"
        );
    }

    #[tokio::test]
    async fn test_malformed_url_is_pending() {
        let check = HttpHealthCheck::new().unwrap();
        let attempt = check.check("not a url", Duration::from_millis(100)).await;
        assert!(matches!(attempt, Attempt::Pending(_)));
    }
}
