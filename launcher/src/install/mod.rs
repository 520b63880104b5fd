//! Installer strategies
//!
//! The orchestrator only sees the [`Phase`] each strategy builds; which
//! strategy runs is decided once by [`selector::select_installer`].

pub mod helm;
pub mod minishift_addon;
pub mod operator;
pub mod selector;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::options::StartOptions;
use crate::app::state::Collaborators;
use crate::errors::DeployError;
use crate::pipeline::context::ContextDelta;
use crate::pipeline::phase::Phase;
use crate::pipeline::task::Task;

pub use selector::{select_installer, Selection};

/// Upper bound for a single install command (chart install, manifest apply)
pub const INSTALL_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Closed set of installation mechanisms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallerKind {
    /// Package-manager install (Helm chart)
    Helm,

    /// Operator plus custom resource
    Operator,

    /// Platform addon (minishift only)
    MinishiftAddon,
}

impl InstallerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallerKind::Helm => "helm",
            InstallerKind::Operator => "operator",
            InstallerKind::MinishiftAddon => "minishift-addon",
        }
    }
}

impl std::fmt::Display for InstallerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstallerKind {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "helm" => Ok(InstallerKind::Helm),
            "operator" => Ok(InstallerKind::Operator),
            "minishift-addon" => Ok(InstallerKind::MinishiftAddon),
            other => Err(DeployError::UnsupportedConfiguration(format!(
                "Installer {} is not supported. Valid values are \"helm\", \"operator\" and \"minishift-addon\"",
                other
            ))),
        }
    }
}

/// Builds the install phase of one strategy
pub trait Installer: Send + Sync {
    fn kind(&self) -> InstallerKind;

    /// The phase to run when nothing is deployed yet
    fn phase(&self, env: &Collaborators, options: &StartOptions) -> Phase;
}

/// Strategy implementation for `kind`
pub fn installer_for(kind: InstallerKind) -> Box<dyn Installer> {
    match kind {
        InstallerKind::Helm => Box::new(helm::HelmInstaller),
        InstallerKind::Operator => Box::new(operator::OperatorInstaller),
        InstallerKind::MinishiftAddon => Box::new(minishift_addon::MinishiftAddonInstaller),
    }
}

/// Task failing when a templates path is missing
pub(crate) fn verify_templates(path: PathBuf) -> Task {
    Task::new(format!("Verify templates at {}", path.display()), move |_ctx| {
        let path = path.clone();
        async move {
            match tokio::fs::metadata(&path).await {
                Ok(_) => Ok(ContextDelta::none()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(DeployError::ConfigError(format!(
                        "Templates not found at {}. Use --templates to point to them",
                        path.display()
                    )))
                }
                Err(e) => Err(e.into()),
            }
        }
    })
}

/// Split an image reference into repository and tag (`latest` when absent)
pub fn split_image(image: &str) -> (String, String) {
    match image.rsplit_once(':') {
        // A colon followed by a path is a registry port, not a tag
        Some((repo, tag)) if !tag.contains('/') => (repo.to_string(), tag.to_string()),
        _ => (image.to_string(), "latest".to_string()),
    }
}
