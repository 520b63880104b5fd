//! Settings file
//!
//! Every field is optional: a value present in the file replaces the built-in
//! default and is itself replaced by environment variables and flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::options::StartOptions;
use crate::errors::DeployError;
use crate::logs::LogLevel;
use crate::pipeline::reporter::Renderer;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub namespace: Option<String>,
    pub image: Option<String>,
    pub templates: Option<PathBuf>,
    pub server_boot_timeout_ms: Option<u64>,
    pub multiuser: Option<bool>,
    pub tls: Option<bool>,
    pub installer: Option<String>,
    pub domain: Option<String>,
    pub platform: Option<String>,
    pub deployment_name: Option<String>,
    pub renderer: Option<Renderer>,
    pub command_timeout_secs: Option<u64>,

    pub probe: ProbeSettings,
    pub lifecycle: LifecycleSettings,
    pub log: LogSettings,
}

/// Readiness probe settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSettings {
    pub attempt_timeout_ms: Option<u64>,
    pub retry_interval_ms: Option<u64>,
}

/// Pod lifecycle wait settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleSettings {
    pub scheduled_timeout_secs: Option<u64>,
    pub running_timeout_secs: Option<u64>,
    pub ready_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: Option<LogLevel>,
    pub json: Option<bool>,
    pub dir: Option<PathBuf>,
}

impl Settings {
    /// Read a JSON settings file
    pub async fn load(path: &Path) -> Result<Self, DeployError> {
        debug!("Reading settings from {}", path.display());
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DeployError::ConfigError(format!("Unable to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            DeployError::ConfigError(format!("Invalid settings file {}: {}", path.display(), e))
        })
    }

    /// Overlay the values present in the file onto `options`
    pub fn apply(&self, options: &mut StartOptions) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut options.namespace, &self.namespace);
        set(&mut options.image, &self.image);
        set(&mut options.templates, &self.templates);
        set(&mut options.multiuser, &self.multiuser);
        set(&mut options.tls, &self.tls);
        set(&mut options.installer, &self.installer);
        set(&mut options.domain, &self.domain);
        set(&mut options.platform, &self.platform);
        set(&mut options.deployment_name, &self.deployment_name);
        set(&mut options.renderer, &self.renderer);
        set(&mut options.log.log_level, &self.log.level);
        set(&mut options.log.json_format, &self.log.json);
        if let Some(dir) = &self.log.dir {
            options.log.log_dir = Some(dir.clone());
        }

        if let Some(ms) = self.server_boot_timeout_ms {
            options.server_boot_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = self.command_timeout_secs {
            options.command_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.probe.attempt_timeout_ms {
            options.probe.attempt_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.probe.retry_interval_ms {
            options.probe.retry_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = self.lifecycle.scheduled_timeout_secs {
            options.lifecycle.scheduled_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.lifecycle.running_timeout_secs {
            options.lifecycle.running_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.lifecycle.ready_timeout_secs {
            options.lifecycle.ready_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.lifecycle.poll_interval_ms {
            options.lifecycle.poll_interval = Duration::from_millis(ms);
        }
    }
}
