//! Target cluster platforms and their preflight checks

pub mod minikube;
pub mod minishift;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::app::options::StartOptions;
use crate::app::state::Collaborators;
use crate::cluster::api::ObjectKind;
use crate::errors::DeployError;
use crate::exec::runner::CommandRunner;
use crate::pipeline::context::ContextDelta;
use crate::pipeline::phase::Phase;
use crate::pipeline::task::Task;

/// Supported cluster platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Local Kubernetes
    Minikube,

    /// Local OpenShift (derivative platform)
    Minishift,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Minikube => "minikube",
            Platform::Minishift => "minishift",
        }
    }

    /// Whether DeploymentConfigs and routes exist on this platform
    pub fn is_openshift(&self) -> bool {
        matches!(self, Platform::Minishift)
    }

    /// Object kinds the server may be deployed as, in lookup order
    pub fn object_kinds(&self) -> &'static [ObjectKind] {
        match self {
            Platform::Minikube => &[ObjectKind::Deployment],
            Platform::Minishift => &[ObjectKind::Deployment, ObjectKind::DeploymentConfig],
        }
    }

    /// Preflight checks for this platform
    pub fn preflight_phase(&self, env: &Collaborators, options: &StartOptions) -> Phase {
        match self {
            Platform::Minikube => minikube::preflight_phase(env, options),
            Platform::Minishift => minishift::preflight_phase(env, options),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minikube" => Ok(Platform::Minikube),
            "minishift" => Ok(Platform::Minishift),
            other => Err(DeployError::UnsupportedConfiguration(format!(
                "Platform {} is not supported yet. Valid values are \"minikube\" and \"minishift\"",
                other
            ))),
        }
    }
}

/// Task failing with `MissingPrerequisite` when `program` is not on the path
pub fn verify_installed(commands: Arc<dyn CommandRunner>, program: &'static str) -> Task {
    Task::new(format!("Verify if {} is installed", program), move |_ctx| {
        let commands = commands.clone();
        async move {
            if commands.is_available(program) {
                Ok(ContextDelta::none())
            } else {
                Err(DeployError::MissingPrerequisite(program.to_string()))
            }
        }
    })
}

/// `<ip>.nip.io` wildcard domain for a cluster IP
pub fn nip_io_domain(ip: &str) -> String {
    format!("{}.nip.io", ip.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform() {
        assert_eq!("minishift".parse::<Platform>().unwrap(), Platform::Minishift);
        let err = "docker-desktop".parse::<Platform>().unwrap_err();
        assert!(matches!(err, DeployError::UnsupportedConfiguration(_)));
        assert!(err.to_string().contains("docker-desktop"));
    }

    #[test]
    fn test_only_openshift_has_deployment_configs() {
        assert!(!Platform::Minikube.object_kinds().contains(&ObjectKind::DeploymentConfig));
        assert!(Platform::Minishift.object_kinds().contains(&ObjectKind::DeploymentConfig));
    }

    #[test]
    fn test_nip_io_domain_trims_output() {
        assert_eq!(nip_io_domain("192.168.64.34\n"), "192.168.64.34.nip.io");
    }
}
