//! Progress rendering for pipeline runs

use std::sync::Arc;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::DeployError;

/// How task progress is shown to the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    /// Colored task list on stdout
    #[default]
    Default,

    /// Nothing on stdout
    Silent,

    /// Every event as a log line
    Verbose,
}

impl std::str::FromStr for Renderer {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Renderer::Default),
            "silent" => Ok(Renderer::Silent),
            "verbose" => Ok(Renderer::Verbose),
            other => Err(DeployError::UnsupportedConfiguration(format!(
                "Renderer {} is not supported. Valid values are \"default\", \"silent\" and \"verbose\"",
                other
            ))),
        }
    }
}

impl Renderer {
    pub fn reporter(&self) -> Arc<dyn Reporter> {
        match self {
            Renderer::Default => Arc::new(ConsoleReporter),
            Renderer::Silent => Arc::new(SilentReporter),
            Renderer::Verbose => Arc::new(TracingReporter),
        }
    }
}

/// Receives pipeline progress events
pub trait Reporter: Send + Sync {
    fn phase_started(&self, _title: &str) {}

    fn phase_skipped(&self, _title: &str) {}

    fn task_started(&self, _title: &str) {}

    fn task_done(&self, _title: &str, _note: Option<&str>) {}

    fn task_skipped(&self, _title: &str) {}

    fn task_failed(&self, _title: &str, _error: &DeployError, _tolerated: bool) {}
}

/// Colored checklist on stdout
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn phase_started(&self, title: &str) {
        println!("{}", title.bold());
    }

    fn task_done(&self, title: &str, note: Option<&str>) {
        match note {
            Some(note) => println!("  {} {}...{}", "✔".green(), title, note),
            None => println!("  {} {}", "✔".green(), title),
        }
    }

    fn task_skipped(&self, title: &str) {
        println!("  {} {}", "↓".dimmed(), format!("{} [skipped]", title).dimmed());
    }

    fn task_failed(&self, title: &str, error: &DeployError, tolerated: bool) {
        if tolerated {
            println!("  {} {}...{}", "⚠".yellow(), title, error.to_string().yellow());
        } else {
            println!("  {} {}", "✖".red(), title.red());
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {}

/// Forwards events to the log
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn phase_started(&self, title: &str) {
        info!("[started] {}", title);
    }

    fn phase_skipped(&self, title: &str) {
        info!("[skipped] {}", title);
    }

    fn task_started(&self, title: &str) {
        info!("[started] {}", title);
    }

    fn task_done(&self, title: &str, note: Option<&str>) {
        match note {
            Some(note) => info!("[completed] {}...{}", title, note),
            None => info!("[completed] {}", title),
        }
    }

    fn task_skipped(&self, title: &str) {
        info!("[skipped] {}", title);
    }

    fn task_failed(&self, title: &str, error: &DeployError, tolerated: bool) {
        if tolerated {
            warn!("[tolerated] {}: {}", title, error);
        } else {
            warn!("[failed] {}: {}", title, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_renderer() {
        assert_eq!("silent".parse::<Renderer>().unwrap(), Renderer::Silent);
        let err = "fancy".parse::<Renderer>().unwrap_err();
        assert!(matches!(err, DeployError::UnsupportedConfiguration(_)));
    }
}
