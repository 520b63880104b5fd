//! State threaded through one start run

use serde::{Deserialize, Serialize};

use crate::cluster::api::ObjectKind;
use crate::install::selector::Selection;
use crate::install::InstallerKind;
use crate::platform::Platform;

/// Where the server deployment stands on the cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "kind", rename_all = "lowercase")]
pub enum DeploymentState {
    /// Nothing deployed yet
    #[default]
    Absent,

    /// Deployed with at least one replica
    Running(ObjectKind),

    /// Deployed but scaled to zero
    Stopped(ObjectKind),
}

impl DeploymentState {
    pub fn exists(&self) -> bool {
        !matches!(self, DeploymentState::Absent)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, DeploymentState::Running(_))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, DeploymentState::Stopped(_))
    }

    pub fn kind(&self) -> Option<ObjectKind> {
        match self {
            DeploymentState::Absent => None,
            DeploymentState::Running(kind) | DeploymentState::Stopped(kind) => Some(*kind),
        }
    }
}

/// Auxiliary components found next to the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auxiliaries {
    /// Relational datastore
    pub postgres: bool,

    /// Identity service
    pub keycloak: bool,
}

/// Facts discovered and derived during one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub namespace: String,
    pub deployment_name: String,
    pub platform: Platform,
    pub installer: InstallerKind,
    pub multiuser: bool,
    pub tls: bool,

    pub deployment: DeploymentState,
    pub auxiliaries: Auxiliaries,

    /// A stopped deployment was scaled back up during this run
    pub scaled_up: bool,

    /// Minikube ingress addon state, as found by preflight
    pub ingress_addon_enabled: bool,

    /// Externally reachable server URL
    pub server_url: Option<String>,

    /// Domain used for ingress hosts
    pub domain: Option<String>,
}

impl RunContext {
    pub fn new(namespace: &str, deployment_name: &str, selection: Selection, tls: bool) -> Self {
        Self {
            namespace: namespace.to_string(),
            deployment_name: deployment_name.to_string(),
            platform: selection.platform,
            installer: selection.installer,
            multiuser: selection.multiuser,
            tls,
            deployment: DeploymentState::Absent,
            auxiliaries: Auxiliaries::default(),
            scaled_up: false,
            ingress_addon_enabled: false,
            server_url: None,
            domain: None,
        }
    }

    /// The server lives in a Deployment
    pub fn deployment_exists(&self) -> bool {
        self.deployment.kind() == Some(ObjectKind::Deployment)
    }

    /// The server lives in a DeploymentConfig
    pub fn deployment_config_exists(&self) -> bool {
        self.deployment.kind() == Some(ObjectKind::DeploymentConfig)
    }

    pub fn is_stopped(&self) -> bool {
        self.deployment.is_stopped()
    }

    pub fn postgres_exists(&self) -> bool {
        self.auxiliaries.postgres
    }

    pub fn keycloak_exists(&self) -> bool {
        self.auxiliaries.keycloak
    }
}

/// Changes a task asks the runner to make to the context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextDelta {
    pub deployment: Option<DeploymentState>,
    pub auxiliaries: Option<Auxiliaries>,
    pub scaled_up: Option<bool>,
    pub ingress_addon_enabled: Option<bool>,
    pub server_url: Option<String>,
    pub domain: Option<String>,

    /// Appended to the task title when reported
    pub note: Option<String>,
}

impl ContextDelta {
    /// No change
    pub fn none() -> Self {
        Self::default()
    }

    /// No change, with a note for the report
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Apply to `ctx`, returning the note
    pub fn apply(self, ctx: &mut RunContext) -> Option<String> {
        if let Some(deployment) = self.deployment {
            ctx.deployment = deployment;
        }
        if let Some(auxiliaries) = self.auxiliaries {
            ctx.auxiliaries = auxiliaries;
        }
        if let Some(scaled_up) = self.scaled_up {
            ctx.scaled_up = scaled_up;
        }
        if let Some(enabled) = self.ingress_addon_enabled {
            ctx.ingress_addon_enabled = enabled;
        }
        if let Some(url) = self.server_url {
            ctx.server_url = Some(url);
        }
        if let Some(domain) = self.domain {
            ctx.domain = Some(domain);
        }
        self.note
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RunContext {
        RunContext::new(
            "che",
            "che",
            Selection {
                platform: Platform::Minikube,
                installer: InstallerKind::Helm,
                multiuser: false,
            },
            false,
        )
    }

    #[test]
    fn test_legacy_flags_follow_state() {
        let mut ctx = context();
        assert!(!ctx.deployment_exists());
        assert!(!ctx.is_stopped());

        ctx.deployment = DeploymentState::Stopped(ObjectKind::DeploymentConfig);
        assert!(ctx.deployment_config_exists());
        assert!(!ctx.deployment_exists());
        assert!(ctx.is_stopped());
    }

    #[test]
    fn test_delta_applies_only_set_fields() {
        let mut ctx = context();
        ctx.domain = Some("192.168.64.34.nip.io".to_string());

        let note = ContextDelta {
            server_url: Some("http://che-che.192.168.64.34.nip.io".to_string()),
            ..ContextDelta::none()
        }
        .with_note("resolved")
        .apply(&mut ctx);

        assert_eq!(note.as_deref(), Some("resolved"));
        assert_eq!(ctx.server_url.as_deref(), Some("http://che-che.192.168.64.34.nip.io"));
        assert_eq!(ctx.domain.as_deref(), Some("192.168.64.34.nip.io"));
        assert_eq!(ctx.deployment, DeploymentState::Absent);
    }

    #[test]
    fn test_context_serializes() {
        let mut ctx = context();
        ctx.deployment = DeploymentState::Running(ObjectKind::Deployment);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["deployment"]["state"], "running");
        assert_eq!(json["deployment"]["kind"], "deployment");
        let back: RunContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }
}
