//! Classify what is already deployed in a namespace

use std::sync::Arc;

use tracing::debug;

use crate::cluster::api::{ClusterApi, ObjectKind};
use crate::errors::DeployError;
use crate::pipeline::context::{Auxiliaries, DeploymentState};
use crate::platform::Platform;

/// Relational datastore deployment name
pub const POSTGRES: &str = "postgres";

/// Identity service deployment name
pub const KEYCLOAK: &str = "keycloak";

/// Deployment state and auxiliaries found in a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedState {
    pub deployment: DeploymentState,
    pub auxiliaries: Auxiliaries,
}

impl std::fmt::Display for DetectedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.deployment {
            DeploymentState::Absent => write!(f, "not found")?,
            DeploymentState::Running(kind) => write!(f, "{} running", kind)?,
            DeploymentState::Stopped(kind) => write!(f, "{} stopped", kind)?,
        }
        if self.auxiliaries.postgres {
            write!(f, ", {} found", POSTGRES)?;
        }
        if self.auxiliaries.keycloak {
            write!(f, ", {} found", KEYCLOAK)?;
        }
        Ok(())
    }
}

/// Read-only state detection
pub struct StateDetector {
    cluster: Arc<dyn ClusterApi>,
}

impl StateDetector {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Where `name` stands in `namespace`.
    ///
    /// Object kinds are looked up in the platform's order; the first one holding
    /// `name` wins. Auxiliaries are looked up as the same kind as the server, or
    /// as any kind when the server is absent. Not-found is never an error.
    pub async fn detect(
        &self,
        namespace: &str,
        name: &str,
        platform: Platform,
    ) -> Result<DetectedState, DeployError> {
        let kinds = platform.object_kinds();

        let mut deployment = DeploymentState::Absent;
        for kind in kinds {
            if let Some(replicas) = self.cluster.replicas(*kind, name, namespace).await? {
                debug!("Found {} {} with {} replicas", kind, name, replicas);
                deployment = if replicas == 0 {
                    DeploymentState::Stopped(*kind)
                } else {
                    DeploymentState::Running(*kind)
                };
                break;
            }
        }

        let aux_kinds: Vec<ObjectKind> = match deployment.kind() {
            Some(kind) => vec![kind],
            None => kinds.to_vec(),
        };
        let auxiliaries = Auxiliaries {
            postgres: self.exists_as_any(&aux_kinds, POSTGRES, namespace).await?,
            keycloak: self.exists_as_any(&aux_kinds, KEYCLOAK, namespace).await?,
        };

        Ok(DetectedState {
            deployment,
            auxiliaries,
        })
    }

    async fn exists_as_any(
        &self,
        kinds: &[ObjectKind],
        name: &str,
        namespace: &str,
    ) -> Result<bool, DeployError> {
        for kind in kinds {
            if self.cluster.replicas(*kind, name, namespace).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
