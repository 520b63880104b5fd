//! Readiness prober for the server's health endpoint

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::probe::clock::Clock;
use crate::probe::health::{health_url, HealthCheck};
use crate::probe::poll::{poll_until, PollPolicy, ProbeResult};

/// Default pause between two failed attempts. Retries go back-to-back, paced only
/// by the latency of each request.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::ZERO;

/// Polls a health endpoint until it answers 2xx or the budget runs out
pub struct ReadinessProber {
    health: Arc<dyn HealthCheck>,
    clock: Arc<dyn Clock>,
    retry_interval: Duration,
}

impl ReadinessProber {
    pub fn new(health: Arc<dyn HealthCheck>, clock: Arc<dyn Clock>) -> Self {
        Self {
            health,
            clock,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Poll `endpoint` and report the terminal outcome
    pub async fn poll(
        &self,
        endpoint: &str,
        attempt_timeout: Duration,
        overall_timeout: Duration,
    ) -> ProbeResult {
        let health = self.health.clone();
        poll_until(
            self.clock.as_ref(),
            PollPolicy::new(overall_timeout, self.retry_interval),
            || {
                let health = health.clone();
                async move { health.check(endpoint, attempt_timeout).await }
            },
        )
        .await
    }

    /// Whether `endpoint` answered 2xx within `overall_timeout`
    pub async fn probe(
        &self,
        endpoint: &str,
        attempt_timeout: Duration,
        overall_timeout: Duration,
    ) -> bool {
        match self.poll(endpoint, attempt_timeout, overall_timeout).await {
            ProbeResult::Ready => {
                info!("{} is ready", endpoint);
                true
            }
            ProbeResult::TimedOut => {
                warn!("{} not ready after {:?}", endpoint, overall_timeout);
                false
            }
            ProbeResult::Error(cause) => {
                warn!("Probing {} failed: {}", endpoint, cause);
                false
            }
        }
    }

    /// Probe the health path of a server base URL
    pub async fn probe_server(
        &self,
        base_url: &str,
        attempt_timeout: Duration,
        overall_timeout: Duration,
    ) -> bool {
        self.probe(&health_url(base_url), attempt_timeout, overall_timeout)
            .await
    }
}
