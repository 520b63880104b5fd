//! Error types for the launcher

use std::time::Duration;

use thiserror::Error;

/// Main error type for a start run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Required binary not found: {0}")]
    MissingPrerequisite(String),

    #[error("Platform not ready: {0}")]
    PlatformNotReady(String),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error(
        "Command \"{command}\" timed out after {}ms\nstderr: {stderr}\nstdout: {stdout}",
        timeout.as_millis()
    )]
    CommandTimeout {
        command: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("Command \"{command}\" failed with return code {code}\nstderr: {stderr}\nstdout: {stdout}")]
    CommandFailed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Server at {url} did not become ready within {}ms", timeout.as_millis())]
    ProbeTimeout { url: String, timeout: Duration },

    #[error(
        "Pods matching \"{selector}\" did not reach stage {stage} within {}ms",
        timeout.as_millis()
    )]
    LifecycleTimeout {
        selector: String,
        stage: String,
        timeout: Duration,
    },

    #[error("Cluster API error: {0}")]
    ClusterApi(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Stable diagnostic code printed next to the message
    pub fn code(&self) -> &'static str {
        match self {
            DeployError::MissingPrerequisite(_) => "E_REQUISITE_NOT_FOUND",
            DeployError::PlatformNotReady(_) => "E_PLATFORM_NOT_READY",
            DeployError::UnsupportedConfiguration(_) => "E_UNSUPPORTED_CONFIGURATION",
            DeployError::CommandTimeout { .. } => "E_TIMEOUT",
            DeployError::CommandFailed { .. } => "E_COMMAND_FAILED",
            DeployError::ProbeTimeout { .. } => "E_PROBE_TIMEOUT",
            DeployError::LifecycleTimeout { .. } => "E_POD_TIMEOUT",
            DeployError::ClusterApi(_) => "E_CLUSTER_API",
            DeployError::IoError(_) => "E_IO",
            DeployError::JsonError(_) => "E_BAD_JSON",
            DeployError::HttpError(_) => "E_HTTP",
            DeployError::ConfigError(_) => "E_BAD_CONFIG",
            DeployError::Internal(_) => "E_INTERNAL",
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
