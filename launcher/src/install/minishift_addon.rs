//! Minishift addon installer

use std::sync::Arc;

use tracing::debug;

use crate::app::options::StartOptions;
use crate::app::state::Collaborators;
use crate::exec::runner::{CommandRunner, CommandSpec};
use crate::install::{
    split_image, verify_templates, Installer, InstallerKind, INSTALL_COMMAND_TIMEOUT,
};
use crate::pipeline::context::{ContextDelta, RunContext};
use crate::pipeline::phase::Phase;
use crate::pipeline::task::Task;

const ADDON: &str = "che";

#[derive(Debug, Clone, Copy, Default)]
pub struct MinishiftAddonInstaller;

/// Arguments of `minishift addons apply` for one run
pub fn apply_args(image: &str, ctx: &RunContext) -> Vec<String> {
    let (repo, tag) = split_image(image);
    vec![
        "addons".to_string(),
        "apply".to_string(),
        ADDON.to_string(),
        "--addon-env".to_string(),
        format!("NAMESPACE={}", ctx.namespace),
        "--addon-env".to_string(),
        format!("CHE_IMAGE_REPO={}", repo),
        "--addon-env".to_string(),
        format!("CHE_IMAGE_TAG={}", tag),
    ]
}

impl Installer for MinishiftAddonInstaller {
    fn kind(&self) -> InstallerKind {
        InstallerKind::MinishiftAddon
    }

    fn phase(&self, env: &Collaborators, options: &StartOptions) -> Phase {
        let commands: Arc<dyn CommandRunner> = env.commands.clone();
        let timeout = options.command_timeout;
        let dir = options.templates.join("minishift-addon").join(ADDON);
        let image = options.image.clone();

        let install = {
            let commands = commands.clone();
            let dir = dir.clone();
            Task::new("Install Che minishift addon", move |_ctx| {
                let commands = commands.clone();
                let args = ["addons".to_string(), "install".to_string(), dir.display().to_string()];
                let spec = CommandSpec::new("minishift", args).with_timeout(timeout);
                async move {
                    let output = commands.run(&spec).await?;
                    let already = output.stdout.contains("already installed")
                        || output.stderr.contains("already installed");
                    if !output.success() && already {
                        debug!("Addon {} already installed", ADDON);
                        return Ok(ContextDelta::note("already installed."));
                    }
                    output.ensure_success(&spec)?;
                    Ok(ContextDelta::note("done."))
                }
            })
        };

        let apply = Task::new("Apply Che minishift addon", move |ctx| {
            let commands = commands.clone();
            let spec = CommandSpec::new("minishift", apply_args(&image, &ctx))
                .with_timeout(INSTALL_COMMAND_TIMEOUT);
            async move {
                commands.run_checked(&spec).await?;
                Ok(ContextDelta::note("done."))
            }
        });

        Phase::new("🏃‍  Running the Che minishift addon")
            .task(verify_templates(dir))
            .task(install)
            .task(apply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::Selection;
    use crate::platform::Platform;

    #[test]
    fn test_apply_args_pass_namespace_and_image() {
        let ctx = RunContext::new(
            "eclipse-che",
            "che",
            Selection {
                platform: Platform::Minishift,
                installer: InstallerKind::MinishiftAddon,
                multiuser: false,
            },
            false,
        );
        assert_eq!(
            apply_args("eclipse/che-server:nightly", &ctx).join(" "),
            concat!(
                "addons apply che --addon-env NAMESPACE=eclipse-che ",
                "--addon-env CHE_IMAGE_REPO=eclipse/che-server --addon-env CHE_IMAGE_TAG=nightly",
            )
        );
    }
}
