//! Collaborators shared by every phase of a run

use std::sync::Arc;

use crate::app::options::StartOptions;
use crate::cluster::api::ClusterApi;
use crate::cluster::kubectl::KubectlCluster;
use crate::errors::DeployError;
use crate::exec::runner::{CommandRunner, SystemCommandRunner};
use crate::probe::clock::{Clock, SystemClock};
use crate::probe::health::{HealthCheck, HttpHealthCheck};

/// External systems a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub commands: Arc<dyn CommandRunner>,
    pub cluster: Arc<dyn ClusterApi>,
    pub health: Arc<dyn HealthCheck>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Real subprocesses, kubectl, reqwest and wall-clock time
    pub fn system(options: &StartOptions) -> Result<Self, DeployError> {
        let commands: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        let cluster = KubectlCluster::new(commands.clone()).with_timeout(options.command_timeout);
        Ok(Self {
            commands,
            cluster: Arc::new(cluster),
            health: Arc::new(HttpHealthCheck::new()?),
            clock: Arc::new(SystemClock),
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
