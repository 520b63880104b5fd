//! Staged wait on the pods of a resource group

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::app::options::LifecycleOptions;
use crate::cluster::api::{ClusterApi, PodPhase, PodSummary};
use crate::errors::DeployError;
use crate::probe::clock::Clock;
use crate::probe::poll::{poll_until, Attempt, PollPolicy, ProbeResult};

/// Stages a resource group goes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleStage {
    /// Accepted by the scheduler
    Scheduled,

    /// Images pulled, a container is running
    Running,

    /// Readiness check passing
    Ready,
}

impl LifecycleStage {
    pub const ALL: [LifecycleStage; 3] = [
        LifecycleStage::Scheduled,
        LifecycleStage::Running,
        LifecycleStage::Ready,
    ];

    /// Label used in task titles
    pub fn title(&self) -> &'static str {
        match self {
            LifecycleStage::Scheduled => "scheduling",
            LifecycleStage::Running => "downloading images",
            LifecycleStage::Ready => "starting",
        }
    }

    /// Whether `pod` has reached at least this stage
    pub fn reached_by(&self, pod: &PodSummary) -> bool {
        match self {
            LifecycleStage::Scheduled => matches!(
                pod.phase,
                PodPhase::Pending | PodPhase::Running | PodPhase::Succeeded
            ),
            LifecycleStage::Running => matches!(pod.phase, PodPhase::Running | PodPhase::Succeeded),
            LifecycleStage::Ready => pod.ready,
        }
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleStage::Scheduled => "Scheduled",
            LifecycleStage::Running => "Running",
            LifecycleStage::Ready => "Ready",
        };
        f.write_str(name)
    }
}

// Failed pods are leftovers of an earlier rollout (evicted, crashed) and only
// count as not there yet; a replacement may still come up before the timeout.
fn assess(stage: LifecycleStage, pods: &[PodSummary]) -> Attempt {
    if pods.iter().any(|pod| stage.reached_by(pod)) {
        return Attempt::Ready;
    }
    let failed = pods.iter().filter(|pod| pod.phase == PodPhase::Failed).count();
    if pods.is_empty() {
        Attempt::Pending("no pods yet".to_string())
    } else if failed > 0 {
        Attempt::Pending(format!("{} pods ({} failed), none {}", pods.len(), failed, stage))
    } else {
        Attempt::Pending(format!("{} pods, none {}", pods.len(), stage))
    }
}

/// Polls the pods matching a selector through the lifecycle stages
pub struct LifecycleWaiter {
    cluster: Arc<dyn ClusterApi>,
    clock: Arc<dyn Clock>,
    options: LifecycleOptions,
}

impl LifecycleWaiter {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        clock: Arc<dyn Clock>,
        options: LifecycleOptions,
    ) -> Self {
        Self {
            cluster,
            clock,
            options,
        }
    }

    pub fn timeout_for(&self, stage: LifecycleStage) -> Duration {
        match stage {
            LifecycleStage::Scheduled => self.options.scheduled_timeout,
            LifecycleStage::Running => self.options.running_timeout,
            LifecycleStage::Ready => self.options.ready_timeout,
        }
    }

    /// Poll until one pod reaches `stage`
    pub async fn poll_stage(
        &self,
        selector: &str,
        namespace: &str,
        stage: LifecycleStage,
    ) -> ProbeResult {
        let policy = PollPolicy::new(self.timeout_for(stage), self.options.poll_interval);
        let cluster = self.cluster.clone();
        poll_until(self.clock.as_ref(), policy, || {
            let cluster = cluster.clone();
            async move {
                match cluster.list_pods(selector, namespace).await {
                    Ok(pods) => assess(stage, &pods),
                    Err(e) => Attempt::Fatal(e.to_string()),
                }
            }
        })
        .await
    }

    /// Wait for one stage, mapping the outcome to an error
    pub async fn wait_for(
        &self,
        selector: &str,
        namespace: &str,
        stage: LifecycleStage,
    ) -> Result<(), DeployError> {
        debug!("Waiting for {} pods to be {}", selector, stage);
        match self.poll_stage(selector, namespace, stage).await {
            ProbeResult::Ready => {
                info!("{} pods {}", selector, stage);
                Ok(())
            }
            ProbeResult::TimedOut => Err(DeployError::LifecycleTimeout {
                selector: selector.to_string(),
                stage: stage.to_string(),
                timeout: self.timeout_for(stage),
            }),
            // Only a failed pod listing ends the poll early
            ProbeResult::Error(cause) => Err(DeployError::ClusterApi(cause)),
        }
    }

    /// Wait through every stage in order
    pub async fn wait_all(&self, selector: &str, namespace: &str) -> Result<(), DeployError> {
        for stage in LifecycleStage::ALL {
            self.wait_for(selector, namespace, stage).await?;
        }
        Ok(())
    }
}
