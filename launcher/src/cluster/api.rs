//! Cluster API collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cluster::models::{Pod, PodCondition};
use crate::errors::DeployError;

/// The two deployment-style object kinds the server may live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Deployment,
    /// Only exists on OpenShift-family clusters
    DeploymentConfig,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Deployment => write!(f, "Deployment"),
            ObjectKind::DeploymentConfig => write!(f, "DeploymentConfig"),
        }
    }
}

/// Pod lifecycle phase as reported by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn parse(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// What the lifecycle waiter needs to know about one pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSummary {
    pub name: String,
    pub phase: PodPhase,
    pub ready: bool,
}

impl PodSummary {
    pub fn new(name: impl Into<String>, phase: PodPhase, ready: bool) -> Self {
        Self {
            name: name.into(),
            phase,
            ready,
        }
    }
}

impl From<Pod> for PodSummary {
    fn from(pod: Pod) -> Self {
        let ready = pod
            .status
            .conditions
            .iter()
            .any(|c: &PodCondition| c.condition_type == "Ready" && c.status == "True");
        Self {
            name: pod.metadata.name.unwrap_or_default(),
            phase: PodPhase::parse(pod.status.phase.as_deref()),
            ready,
        }
    }
}

/// Externally reachable host of an ingress or route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub tls: bool,
}

impl Endpoint {
    pub fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}", scheme, self.host)
    }
}

/// Read and scale operations against the cluster.
///
/// "Not found" is never an error here: it is reported as `None`. Every other
/// failure propagates as an error.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Desired replica count of a named object, `None` when it does not exist
    async fn replicas(
        &self,
        kind: ObjectKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<i32>, DeployError>;

    /// Set the replica count of a named object
    async fn scale(
        &self,
        kind: ObjectKind,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), DeployError>;

    /// Pods matching a label selector
    async fn list_pods(
        &self,
        selector: &str,
        namespace: &str,
    ) -> Result<Vec<PodSummary>, DeployError>;

    /// Host of a named ingress, `None` when it does not exist
    async fn ingress(&self, name: &str, namespace: &str) -> Result<Option<Endpoint>, DeployError>;

    /// Host of a named route, `None` when it does not exist
    async fn route(&self, name: &str, namespace: &str) -> Result<Option<Endpoint>, DeployError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_summary_from_wire_pod() {
        let pod: Pod = serde_json::from_value(serde_json::json!({
            "metadata": { "name": "che-1" },
            "status": {
                "phase": "Running",
                "conditions": [
                    { "type": "PodScheduled", "status": "True" },
                    { "type": "Ready", "status": "False" }
                ]
            }
        }))
        .unwrap();
        let summary = PodSummary::from(pod);
        assert_eq!(summary.name, "che-1");
        assert_eq!(summary.phase, PodPhase::Running);
        assert!(!summary.ready);
    }

    #[test]
    fn test_endpoint_url_scheme() {
        let plain = Endpoint { host: "che-che.192.168.64.34.nip.io".to_string(), tls: false };
        assert_eq!(plain.url(), "http://che-che.192.168.64.34.nip.io");
        let secure = Endpoint { tls: true, ..plain };
        assert!(secure.url().starts_with("https://"));
    }
}
