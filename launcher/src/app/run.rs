//! Entry point of `server start`

use tracing::{error, info};

use crate::app::options::StartOptions;
use crate::app::state::Collaborators;
use crate::deploy::orchestrator::{Orchestrator, StartOutcome};
use crate::errors::DeployError;

/// Start the server with real collaborators
pub async fn run(options: StartOptions) -> Result<StartOutcome, DeployError> {
    info!(
        "Starting Che in namespace {} on {} (installer: {})",
        options.namespace,
        options.platform,
        if options.installer.is_empty() { "auto" } else { options.installer.as_str() }
    );

    let env = Collaborators::system(&options)?;
    let reporter = options.renderer.reporter();
    let orchestrator = Orchestrator::new(env, options, reporter);

    match orchestrator.start().await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            error!("Start failed: {}", e);
            Err(e)
        }
    }
}
