//! Cluster API over the kubectl and oc command line clients

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cluster::api::{ClusterApi, Endpoint, ObjectKind, PodSummary};
use crate::cluster::models::{Deployment, Ingress, PodList, Route};
use crate::errors::DeployError;
use crate::exec::runner::{CommandRunner, CommandSpec, DEFAULT_COMMAND_TIMEOUT};

const KUBECTL: &str = "kubectl";
const OC: &str = "oc";

/// Whether a failed command's stderr means the object (or its kind) is absent.
///
/// Only the server's `(NotFound)` reason counts; client-side errors such as a
/// missing kubeconfig context also say "not found" and must propagate.
pub fn is_not_found(stderr: &str) -> bool {
    stderr.contains("(NotFound)") || stderr.contains("doesn't have a resource type")
}

/// Cluster API client shelling out to kubectl/oc
pub struct KubectlCluster {
    commands: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl KubectlCluster {
    pub fn new(commands: Arc<dyn CommandRunner>) -> Self {
        Self {
            commands,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn client_for(kind: ObjectKind) -> (&'static str, &'static str) {
        match kind {
            ObjectKind::Deployment => (KUBECTL, "deployment"),
            ObjectKind::DeploymentConfig => (OC, "deploymentconfig"),
        }
    }

    /// `get <resource> <name> -o json`, mapping "not found" to `None`
    async fn get_json<T: DeserializeOwned>(
        &self,
        program: &str,
        args: Vec<String>,
    ) -> Result<Option<T>, DeployError> {
        let spec = CommandSpec::new(program, args).with_timeout(self.timeout);
        let output = self.commands.run(&spec).await?;

        if output.timed_out {
            return output.ensure_success(&spec).map(|_| None);
        }
        if output.success() {
            return Ok(Some(serde_json::from_str(&output.stdout)?));
        }
        if is_not_found(&output.stderr) {
            debug!("Not found: {}", spec.command_line());
            return Ok(None);
        }
        Err(DeployError::ClusterApi(format!(
            "{} failed: {}",
            spec.command_line(),
            output.stderr
        )))
    }
}

fn get_args(resource: &str, name: &str, namespace: &str) -> Vec<String> {
    vec![
        "get".to_string(),
        resource.to_string(),
        name.to_string(),
        "--namespace".to_string(),
        namespace.to_string(),
        "-o".to_string(),
        "json".to_string(),
    ]
}

#[async_trait]
impl ClusterApi for KubectlCluster {
    async fn replicas(
        &self,
        kind: ObjectKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<i32>, DeployError> {
        let (program, resource) = Self::client_for(kind);
        let deployment: Option<Deployment> = self
            .get_json(program, get_args(resource, name, namespace))
            .await?;
        // An unset replica count defaults to one on the cluster side
        Ok(deployment.map(|d| d.spec.replicas.unwrap_or(1)))
    }

    async fn scale(
        &self,
        kind: ObjectKind,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), DeployError> {
        let (program, resource) = Self::client_for(kind);
        let spec = CommandSpec::new(
            program,
            [
                "scale".to_string(),
                format!("{}/{}", resource, name),
                format!("--replicas={}", replicas),
                "--namespace".to_string(),
                namespace.to_string(),
            ],
        )
        .with_timeout(self.timeout);
        self.commands.run_checked(&spec).await?;
        Ok(())
    }

    async fn list_pods(
        &self,
        selector: &str,
        namespace: &str,
    ) -> Result<Vec<PodSummary>, DeployError> {
        let args = vec![
            "get".to_string(),
            "pods".to_string(),
            "--selector".to_string(),
            selector.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "-o".to_string(),
            "json".to_string(),
        ];
        let spec = CommandSpec::new(KUBECTL, args).with_timeout(self.timeout);
        let output = self.commands.run(&spec).await?;
        if !output.success() {
            if output.timed_out {
                return output.ensure_success(&spec).map(|_| Vec::new());
            }
            return Err(DeployError::ClusterApi(format!(
                "{} failed: {}",
                spec.command_line(),
                output.stderr
            )));
        }
        let pods: PodList = serde_json::from_str(&output.stdout)?;
        Ok(pods.items.into_iter().map(PodSummary::from).collect())
    }

    async fn ingress(&self, name: &str, namespace: &str) -> Result<Option<Endpoint>, DeployError> {
        let ingress: Option<Ingress> = self
            .get_json(KUBECTL, get_args("ingress", name, namespace))
            .await?;
        Ok(ingress.and_then(|i| {
            let tls = !i.spec.tls.is_empty();
            i.spec
                .rules
                .into_iter()
                .find_map(|r| r.host)
                .map(|host| Endpoint { host, tls })
        }))
    }

    async fn route(&self, name: &str, namespace: &str) -> Result<Option<Endpoint>, DeployError> {
        let route: Option<Route> = self.get_json(OC, get_args("route", name, namespace)).await?;
        Ok(route.and_then(|r| {
            let tls = r.spec.tls.as_ref().is_some_and(|t| !t.is_null());
            r.spec.host.map(|host| Endpoint { host, tls })
        }))
    }
}
