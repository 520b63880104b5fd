//! Minishift preflight checklist

use std::time::Duration;

use crate::app::options::StartOptions;
use crate::app::state::Collaborators;
use crate::errors::DeployError;
use crate::exec::runner::{CommandRunner, CommandSpec};
use crate::pipeline::context::ContextDelta;
use crate::pipeline::phase::Phase;
use crate::pipeline::task::Task;
use crate::platform::{nip_io_domain, verify_installed};

const MINISHIFT: &str = "minishift";

const NOT_RUNNING_HINT: &str = concat!(
    "minishift is not running\n",
    "To start minishift run the following command:\n",
    "  minishift start --memory=8GB --cpus=4 --disk-size=50g",
);

/// Whether `minishift status` reports a running cluster
pub async fn is_running(
    commands: &dyn CommandRunner,
    timeout: Duration,
) -> Result<bool, DeployError> {
    let spec = CommandSpec::new(MINISHIFT, ["status"]).with_timeout(timeout);
    let output = commands.run(&spec).await?;
    if output.timed_out {
        return output.ensure_success(&spec).map(|_| false);
    }
    Ok(output.success()
        && output
            .stdout
            .lines()
            .any(|l| l.starts_with("Minishift:") && l.contains("Running")))
}

pub async fn ip(commands: &dyn CommandRunner, timeout: Duration) -> Result<String, DeployError> {
    let spec = CommandSpec::new(MINISHIFT, ["ip"]).with_timeout(timeout);
    let output = commands.run_checked(&spec).await?;
    Ok(output.stdout.trim().to_string())
}

pub fn preflight_phase(env: &Collaborators, options: &StartOptions) -> Phase {
    let timeout = options.command_timeout;
    let commands = env.commands.clone();

    let running = {
        let commands = commands.clone();
        Task::new("Verify if minishift is running", move |_ctx| {
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

    let domain = {
        let commands = commands.clone();
        Task::new("Retrieving minishift IP and domain for routes URLs", move |_ctx| {
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

    Phase::new("✈️  Minishift preflight checklist")
        .task(verify_installed(commands.clone(), "oc"))
        .task(verify_installed(commands, MINISHIFT))
        .task(running)
        .task(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::runner::CommandOutput;
    use crate::testing::ScriptedCommands;

    #[tokio::test]
    async fn test_is_running_reads_status_line() {
        let commands = ScriptedCommands::new();
        commands.on(
            "minishift status",
            CommandOutput::exited(
                0,
                "Minishift:  Running\nProfile:    minishift\nOpenShift:  Running",
                "",
            ),
        );
        assert!(is_running(&commands, Duration::from_secs(60)).await.unwrap());

        let commands = ScriptedCommands::new();
        commands.on("minishift status", CommandOutput::exited(0, "Minishift:  Stopped", ""));
        assert!(!is_running(&commands, Duration::from_secs(60)).await.unwrap());
    }
}
