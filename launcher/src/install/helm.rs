//! Helm chart installer

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::app::options::StartOptions;
use crate::app::state::Collaborators;
use crate::exec::runner::{CommandRunner, CommandSpec};
use crate::install::{verify_templates, Installer, InstallerKind, INSTALL_COMMAND_TIMEOUT};
use crate::pipeline::context::{ContextDelta, RunContext};
use crate::pipeline::phase::Phase;
use crate::pipeline::task::Task;
use crate::platform::verify_installed;

const RELEASE: &str = "che";

/// Installs the server chart with `helm upgrade --install`
#[derive(Debug, Clone, Copy, Default)]
pub struct HelmInstaller;

/// Arguments of the release install for one run
pub fn install_args(chart: &Path, image: &str, ctx: &RunContext) -> Vec<String> {
    let mut args = vec![
        "upgrade".to_string(),
        "--install".to_string(),
        RELEASE.to_string(),
        chart.display().to_string(),
        "--namespace".to_string(),
        ctx.namespace.clone(),
        "--create-namespace".to_string(),
        "--set".to_string(),
        format!("cheImage={}", image),
        "--set".to_string(),
        format!("global.cheWorkspacesNamespace={}", ctx.namespace),
        "--set".to_string(),
        format!("global.multiuser={}", ctx.multiuser),
    ];
    if let Some(domain) = &ctx.domain {
        args.push("--set".to_string());
        args.push(format!("global.ingressDomain={}", domain));
    }
    if ctx.tls {
        args.push("--set".to_string());
        args.push("global.tls.enabled=true".to_string());
    }
    args
}

impl Installer for HelmInstaller {
    fn kind(&self) -> InstallerKind {
        InstallerKind::Helm
    }

    fn phase(&self, env: &Collaborators, options: &StartOptions) -> Phase {
        let commands: Arc<dyn CommandRunner> = env.commands.clone();
        let chart = options.templates.join("kubernetes").join("helm").join("che");
        let image = options.image.clone();

        let release = {
            let commands = commands.clone();
            let chart = chart.clone();
            Task::new("Create Che Helm release", move |ctx| {
                let commands = commands.clone();
                let spec = CommandSpec::new("helm", install_args(&chart, &image, &ctx))
                    .with_timeout(INSTALL_COMMAND_TIMEOUT);
                async move {
                    info!("Installing Helm release {} into {}", RELEASE, ctx.namespace);
                    commands.run_checked(&spec).await?;
                    Ok(ContextDelta::note("done."))
                }
            })
        };

        Phase::new("🏃‍  Running Helm to install Che")
            .task(verify_installed(commands, "helm"))
            .task(verify_templates(chart))
            .task(release)
    }
}
