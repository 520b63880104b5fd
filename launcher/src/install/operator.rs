//! Operator installer: operator manifests, then the cluster custom resource

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::app::options::StartOptions;
use crate::app::state::Collaborators;
use crate::errors::DeployError;
use crate::exec::runner::{CommandRunner, CommandSpec};
use crate::install::{
    split_image, verify_templates, Installer, InstallerKind, INSTALL_COMMAND_TIMEOUT,
};
use crate::pipeline::context::{ContextDelta, RunContext};
use crate::pipeline::phase::Phase;
use crate::pipeline::task::Task;

/// Name of the custom resource created from the bundled template
pub const CHE_CLUSTER: &str = "eclipse-che";

/// Operator manifests, applied in this order
pub const OPERATOR_MANIFESTS: &[&str] = &[
    "service_account.yaml",
    "role.yaml",
    "role_binding.yaml",
    "crds/org_v1_che_crd.yaml",
    "operator.yaml",
];

const CUSTOM_RESOURCE: &str = "crds/org_v1_che_cr.yaml";

#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorInstaller;

fn client(ctx: &RunContext) -> &'static str {
    if ctx.platform.is_openshift() {
        "oc"
    } else {
        "kubectl"
    }
}

/// Merge patch applied to the custom resource after creation
pub fn cluster_patch(image: &str, ctx: &RunContext) -> serde_json::Value {
    let (repo, tag) = split_image(image);
    let mut patch = json!({
        "spec": {
            "server": {
                "cheImage": repo,
                "cheImageTag": tag,
                "tlsSupport": ctx.tls,
                "selfSignedCert": ctx.tls,
            }
        }
    });
    if let Some(domain) = &ctx.domain {
        patch["spec"]["k8s"] = json!({ "ingressDomain": domain });
    }
    patch
}

async fn apply(
    commands: &dyn CommandRunner,
    program: &str,
    file: &Path,
    namespace: &str,
) -> Result<(), DeployError> {
    let spec = CommandSpec::new(
        program,
        [
            "apply".to_string(),
            "-f".to_string(),
            file.display().to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ],
    )
    .with_timeout(INSTALL_COMMAND_TIMEOUT);
    commands.run_checked(&spec).await?;
    Ok(())
}

impl Installer for OperatorInstaller {
    fn kind(&self) -> InstallerKind {
        InstallerKind::Operator
    }

    fn phase(&self, env: &Collaborators, options: &StartOptions) -> Phase {
        let commands: Arc<dyn CommandRunner> = env.commands.clone();
        let timeout = options.command_timeout;
        let dir: PathBuf = options.templates.join("che-operator");
        let image = options.image.clone();

        let namespace = {
            let commands = commands.clone();
            Task::new("Create namespace", move |ctx| {
                let commands = commands.clone();
                async move {
                    let args = ["create", "namespace", ctx.namespace.as_str()];
                    let spec = CommandSpec::new(client(&ctx), args).with_timeout(timeout);
                    let output = commands.run(&spec).await?;
                    if !output.success() && output.stderr.contains("AlreadyExists") {
                        debug!("Namespace {} already exists", ctx.namespace);
                        return Ok(ContextDelta::note("already exists."));
                    }
                    output.ensure_success(&spec)?;
                    Ok(ContextDelta::note("done."))
                }
            })
        };

        let manifests = {
            let commands = commands.clone();
            let dir = dir.clone();
            Task::new("Create Che operator resources", move |ctx| {
                let commands = commands.clone();
                let dir = dir.clone();
                async move {
                    for manifest in OPERATOR_MANIFESTS {
                        let path = dir.join(manifest);
                        apply(commands.as_ref(), client(&ctx), &path, &ctx.namespace).await?;
                    }
                    Ok(ContextDelta::note("done."))
                }
            })
        };

        let cluster = {
            let commands = commands.clone();
            let dir = dir.clone();
            Task::new("Create Che cluster resource", move |ctx| {
                let commands = commands.clone();
                let cr = dir.join(CUSTOM_RESOURCE);
                let patch = cluster_patch(&image, &ctx).to_string();
                async move {
                    let program = client(&ctx);
                    apply(commands.as_ref(), program, &cr, &ctx.namespace).await?;
                    info!("Configuring {} in {}", CHE_CLUSTER, ctx.namespace);
                    let spec = CommandSpec::new(
                        program,
                        [
                            "patch".to_string(),
                            format!("checluster/{}", CHE_CLUSTER),
                            "--type".to_string(),
                            "merge".to_string(),
                            "-p".to_string(),
                            patch,
                            "--namespace".to_string(),
                            ctx.namespace.clone(),
                        ],
                    )
                    .with_timeout(timeout);
                    commands.run_checked(&spec).await?;
                    Ok(ContextDelta::note("done."))
                }
            })
        };

        Phase::new("🏃‍  Running the Che operator")
            .task(verify_templates(dir))
            .task(namespace)
            .task(manifests)
            .task(cluster)
    }
}
