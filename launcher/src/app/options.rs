//! Options of one `server start` run

use std::path::PathBuf;
use std::time::Duration;

use crate::exec::runner::DEFAULT_COMMAND_TIMEOUT;
use crate::logs::LogOptions;
use crate::pipeline::reporter::Renderer;
use crate::probe::readiness::DEFAULT_RETRY_INTERVAL;

/// Everything one start run can be told
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Namespace the server is deployed into
    pub namespace: String,

    /// Server container image
    pub image: String,

    /// Directory holding the Helm chart, operator manifests and addon
    pub templates: PathBuf,

    /// How long the server may take to answer its health endpoint
    pub server_boot_timeout: Duration,

    pub multiuser: bool,
    pub tls: bool,

    /// Installer override, empty to pick one from platform and mode
    pub installer: String,

    /// Ingress domain, empty to discover it during preflight
    pub domain: String,

    pub platform: String,

    /// Name of the server deployment object
    pub deployment_name: String,

    pub renderer: Renderer,

    pub probe: ProbeOptions,

    pub lifecycle: LifecycleOptions,

    /// Timeout of a single external command
    pub command_timeout: Duration,

    pub log: LogOptions,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            namespace: "che".to_string(),
            image: "eclipse/che-server:nightly".to_string(),
            templates: PathBuf::from("templates"),
            server_boot_timeout: Duration::from_millis(40_000),
            multiuser: false,
            tls: false,
            installer: String::new(),
            domain: String::new(),
            platform: "minikube".to_string(),
            deployment_name: "che".to_string(),
            renderer: Renderer::default(),
            probe: ProbeOptions::default(),
            lifecycle: LifecycleOptions::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            log: LogOptions::default(),
        }
    }
}

impl StartOptions {
    /// Domain given by the operator, if any
    pub fn domain(&self) -> Option<&str> {
        let domain = self.domain.trim();
        (!domain.is_empty()).then_some(domain)
    }
}

/// Readiness probe options
#[derive(Debug, Clone, Copy)]
pub struct ProbeOptions {
    /// Timeout of a single health request
    pub attempt_timeout: Duration,

    /// Pause between two failed requests
    pub retry_interval: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(5),
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Pod lifecycle wait options, one timeout per stage
#[derive(Debug, Clone, Copy)]
pub struct LifecycleOptions {
    /// Until a pod is accepted by the scheduler
    pub scheduled_timeout: Duration,

    /// Until images are pulled and a container runs
    pub running_timeout: Duration,

    /// Until a pod passes its readiness check
    pub ready_timeout: Duration,

    pub poll_interval: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            scheduled_timeout: Duration::from_secs(300), // 5 minutes
            running_timeout: Duration::from_secs(600),   // image pulls can be slow
            ready_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
        }
    }
}
