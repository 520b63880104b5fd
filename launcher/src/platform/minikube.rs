//! Minikube preflight checklist

use std::time::Duration;

use tracing::debug;

use crate::app::options::StartOptions;
use crate::app::state::Collaborators;
use crate::errors::DeployError;
use crate::exec::runner::{CommandRunner, CommandSpec};
use crate::pipeline::context::{ContextDelta, RunContext};
use crate::pipeline::phase::Phase;
use crate::pipeline::task::Task;
use crate::platform::{nip_io_domain, verify_installed};

const MINIKUBE: &str = "minikube";

const NOT_RUNNING_HINT: &str = concat!(
    "minikube is not running\n",
    "To start minikube run the following command:\n",
    "  minikube start --memory=4096 --cpus=4 --disk-size=50g",
);

/// Whether `minikube status` exits successfully
pub async fn is_running(
    commands: &dyn CommandRunner,
    timeout: Duration,
) -> Result<bool, DeployError> {
    let spec = CommandSpec::new(MINIKUBE, ["status"]).with_timeout(timeout);
    let output = commands.run(&spec).await?;
    if output.timed_out {
        return output.ensure_success(&spec).map(|_| false);
    }
    Ok(output.success())
}

/// Whether the ingress addon is listed as enabled
pub async fn is_ingress_addon_enabled(
    commands: &dyn CommandRunner,
    timeout: Duration,
) -> Result<bool, DeployError> {
    let spec = CommandSpec::new(MINIKUBE, ["addons", "list"]).with_timeout(timeout);
    let output = commands.run_checked(&spec).await?;
    Ok(output.stdout.contains("ingress: enabled"))
}

pub async fn enable_ingress_addon(
    commands: &dyn CommandRunner,
    timeout: Duration,
) -> Result<(), DeployError> {
    let spec = CommandSpec::new(MINIKUBE, ["addons", "enable", "ingress"]).with_timeout(timeout);
    commands.run_checked(&spec).await?;
    Ok(())
}

pub async fn ip(commands: &dyn CommandRunner, timeout: Duration) -> Result<String, DeployError> {
    let spec = CommandSpec::new(MINIKUBE, ["ip"]).with_timeout(timeout);
    let output = commands.run_checked(&spec).await?;
    Ok(output.stdout.trim().to_string())
}

pub fn preflight_phase(env: &Collaborators, options: &StartOptions) -> Phase {
    let timeout = options.command_timeout;
    let commands = env.commands.clone();

    let running = {
        let commands = commands.clone();
        Task::new("Verify if minikube is running", move |_ctx| {
            let commands = commands.clone();
            async move {
                if is_running(commands.as_ref(), timeout).await? {
                    Ok(ContextDelta::none())
                } else {
                    Err(DeployError::PlatformNotReady(NOT_RUNNING_HINT.to_string()))
                }
            }
        })
    };

    let addon_check = {
        let commands = commands.clone();
        Task::new("Verify if minikube ingress addon is enabled", move |_ctx| {
            let commands = commands.clone();
            async move {
                let enabled = is_ingress_addon_enabled(commands.as_ref(), timeout).await?;
                debug!("Ingress addon enabled: {}", enabled);
                Ok(ContextDelta {
                    ingress_addon_enabled: Some(enabled),
                    ..ContextDelta::none()
                })
            }
        })
        // When the listing fails the addon is enabled anyway
        .best_effort()
    };

    let addon_enable = {
        let commands = commands.clone();
        Task::new("Enable minikube ingress addon", move |_ctx| {
            let commands = commands.clone();
            async move {
                enable_ingress_addon(commands.as_ref(), timeout).await?;
                Ok(ContextDelta {
                    ingress_addon_enabled: Some(true),
                    ..ContextDelta::none()
                })
            }
        })
        .enabled_when(|ctx| !ctx.ingress_addon_enabled)
    };

    let domain = {
        let commands = commands.clone();
        Task::new("Retrieving minikube IP and domain for ingress URLs", move |_ctx: RunContext| {
            let commands = commands.clone();
            async move {
                let domain = nip_io_domain(&ip(commands.as_ref(), timeout).await?);
                Ok(ContextDelta {
                    domain: Some(domain.clone()),
                    ..ContextDelta::none()
                }
                .with_note(format!("{}.", domain)))
            }
        })
        .enabled_when(|ctx| ctx.domain.is_none())
    };

    Phase::new("✈️  Minikube preflight checklist")
        .task(verify_installed(commands.clone(), "kubectl"))
        .task(verify_installed(commands, MINIKUBE))
        .task(running)
        .task(addon_check)
        .task(addon_enable)
        .task(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::runner::CommandOutput;
    use crate::testing::ScriptedCommands;

    const TIMEOUT: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_is_running_follows_exit_code() {
        let commands = ScriptedCommands::new();
        commands.on("minikube status", CommandOutput::exited(7, "host: Stopped", ""));
        assert!(!is_running(&commands, TIMEOUT).await.unwrap());

        let commands = ScriptedCommands::new();
        commands.on("minikube status", CommandOutput::exited(0, "host: Running", ""));
        assert!(is_running(&commands, TIMEOUT).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_timeout_is_an_error() {
        let commands = ScriptedCommands::new();
        commands.on(
            "minikube status",
            CommandOutput {
                timed_out: true,
                ..Default::default()
            },
        );
        let err = is_running(&commands, TIMEOUT).await.unwrap_err();
        assert_eq!(err.code(), "E_TIMEOUT");
    }

    #[tokio::test]
    async fn test_ingress_addon_detection() {
        let commands = ScriptedCommands::new();
        commands.on(
            "minikube addons list",
            CommandOutput::exited(0, "- dashboard: disabled\n- ingress: enabled\n", ""),
        );
        assert!(is_ingress_addon_enabled(&commands, TIMEOUT).await.unwrap());
    }
}
