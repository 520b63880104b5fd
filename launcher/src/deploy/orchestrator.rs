//! Start orchestration: preflight, detection, install, verification

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::app::options::StartOptions;
use crate::app::state::Collaborators;
use crate::cluster::api::ObjectKind;
use crate::deploy::lifecycle::{LifecycleStage, LifecycleWaiter};
use crate::deploy::state::{StateDetector, KEYCLOAK, POSTGRES};
use crate::deploy::url::resolve_server_url;
use crate::errors::DeployError;
use crate::install::{installer_for, select_installer, InstallerKind};
use crate::pipeline::context::{ContextDelta, DeploymentState, RunContext};
use crate::pipeline::phase::Phase;
use crate::pipeline::reporter::Reporter;
use crate::pipeline::runner::{PipelineReport, PipelineRunner};
use crate::pipeline::task::Task;
use crate::probe::health::health_url;
use crate::probe::readiness::ReadinessProber;

pub const DETECTION_PHASE: &str = "👀  Looking for an already existing Che instance";
pub const VERIFICATION_PHASE: &str = "✅  Post installation checklist";

pub const CHE_SELECTOR: &str = "app=che";
pub const POSTGRES_SELECTOR: &str = "app=postgres";
pub const KEYCLOAK_SELECTOR: &str = "app=keycloak";

/// How the server came to be running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartStatus {
    /// Found running, nothing done
    AlreadyRunning,

    /// Found scaled to zero and scaled back up
    Resumed,

    /// Installed from scratch
    Installed,
}

impl std::fmt::Display for StartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartStatus::AlreadyRunning => write!(f, "already running"),
            StartStatus::Resumed => write!(f, "resumed"),
            StartStatus::Installed => write!(f, "installed"),
        }
    }
}

/// Result of a successful start
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub server_url: String,
    pub status: StartStatus,
    pub context: RunContext,
    pub report: PipelineReport,
}

fn needs_postgres(ctx: &RunContext) -> bool {
    ctx.multiuser || ctx.postgres_exists()
}

fn needs_keycloak(ctx: &RunContext) -> bool {
    ctx.multiuser || ctx.keycloak_exists()
}

fn always(_: &RunContext) -> bool {
    true
}

/// Builds and runs the start pipeline
pub struct Orchestrator {
    env: Collaborators,
    options: StartOptions,
    runner: PipelineRunner,
}

impl Orchestrator {
    pub fn new(env: Collaborators, options: StartOptions, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            env,
            options,
            runner: PipelineRunner::new(reporter),
        }
    }

    /// Context before anything is looked at.
    ///
    /// Fails on an unknown platform or installer, before any cluster call.
    pub fn initial_context(&self) -> Result<RunContext, DeployError> {
        // TLS is only offered in multi-user mode
        let multiuser = self.options.multiuser || self.options.tls;
        let selection =
            select_installer(&self.options.platform, multiuser, &self.options.installer)?;
        let mut ctx = RunContext::new(
            &self.options.namespace,
            &self.options.deployment_name,
            selection,
            self.options.tls,
        );
        ctx.domain = self.options.domain().map(str::to_string);
        Ok(ctx)
    }

    /// The four phases, in run order
    pub fn pipeline(&self, ctx: &RunContext) -> Vec<Phase> {
        vec![
            ctx.platform.preflight_phase(&self.env, &self.options),
            self.detection_phase(),
            self.install_phase(ctx.installer),
            self.verification_phase(),
        ]
    }

    pub async fn start(&self) -> Result<StartOutcome, DeployError> {
        let mut ctx = self.initial_context()?;
        info!(
            "Platform {}, installer {}, multiuser {}",
            ctx.platform, ctx.installer, ctx.multiuser
        );

        let phases = self.pipeline(&ctx);
        let report = self.runner.run(&phases, &mut ctx).await?;

        let status = match ctx.deployment {
            DeploymentState::Running(_) => StartStatus::AlreadyRunning,
            DeploymentState::Stopped(_) => StartStatus::Resumed,
            DeploymentState::Absent => StartStatus::Installed,
        };
        let server_url = ctx
            .server_url
            .clone()
            .ok_or_else(|| DeployError::Internal("Server URL was not resolved".to_string()))?;
        info!("Che {} at {}", status, server_url);

        Ok(StartOutcome {
            server_url,
            status,
            context: ctx,
            report,
        })
    }

    fn detection_phase(&self) -> Phase {
        let detector = Arc::new(StateDetector::new(self.env.cluster.clone()));
        let detect = Task::new("Check for an existing Che deployment", move |ctx| {
            let detector = detector.clone();
            async move {
                let found = detector
                    .detect(&ctx.namespace, &ctx.deployment_name, ctx.platform)
                    .await?;
                Ok(ContextDelta {
                    deployment: Some(found.deployment),
                    auxiliaries: Some(found.auxiliaries),
                    ..ContextDelta::none()
                }
                .with_note(found.to_string()))
            }
        });

        let cluster = self.env.cluster.clone();
        let running = Task::new(
            format!("Che is already running in namespace \"{}\"", self.options.namespace),
            move |ctx| {
                let cluster = cluster.clone();
                async move {
                    let url =
                        resolve_server_url(cluster.as_ref(), ctx.platform, &ctx.namespace).await?;
                    Ok(ContextDelta {
                        server_url: Some(url.clone()),
                        ..ContextDelta::none()
                    }
                    .with_note(format!("its URL is {}", url)))
                }
            },
        )
        .enabled_when(|ctx| ctx.deployment.is_running());

        Phase::new(DETECTION_PHASE)
            .task(detect)
            .task(self.scale_up_task(ObjectKind::Deployment))
            .task(self.scale_up_task(ObjectKind::DeploymentConfig))
            .task(running)
    }

    /// Scale auxiliaries, then the server, back to one replica
    fn scale_up_task(&self, kind: ObjectKind) -> Task {
        let cluster = self.env.cluster.clone();
        Task::new(format!("Scaling up Che {}", kind), move |ctx| {
            let cluster = cluster.clone();
            async move {
                let mut scaled = Vec::new();
                if ctx.postgres_exists() {
                    scaled.push(POSTGRES);
                }
                if ctx.keycloak_exists() {
                    scaled.push(KEYCLOAK);
                }
                scaled.push(ctx.deployment_name.as_str());

                for name in &scaled {
                    info!("Scaling {} {} to 1 replica", kind, name);
                    cluster.scale(kind, name, &ctx.namespace, 1).await?;
                }
                Ok(ContextDelta {
                    scaled_up: Some(true),
                    ..ContextDelta::none()
                }
                .with_note(format!("{} scaled.", scaled.join(", "))))
            }
        })
        .enabled_when(move |ctx| ctx.deployment == DeploymentState::Stopped(kind))
    }

    fn install_phase(&self, kind: InstallerKind) -> Phase {
        installer_for(kind)
            .phase(&self.env, &self.options)
            .enabled_when(|ctx| !ctx.deployment.exists())
    }

    fn verification_phase(&self) -> Phase {
        let waiter = Arc::new(LifecycleWaiter::new(
            self.env.cluster.clone(),
            self.env.clock.clone(),
            self.options.lifecycle,
        ));

        let groups: [(&str, &'static str, fn(&RunContext) -> bool); 3] = [
            ("PostgreSQL", POSTGRES_SELECTOR, needs_postgres),
            ("Keycloak", KEYCLOAK_SELECTOR, needs_keycloak),
            ("Che", CHE_SELECTOR, always),
        ];

        let mut phase =
            Phase::new(VERIFICATION_PHASE).enabled_when(|ctx| !ctx.deployment.is_running());
        for (label, selector, enabled) in groups {
            for stage in LifecycleStage::ALL {
                let waiter = waiter.clone();
                let title = format!("{} pod bootstrap: {}", label, stage.title());
                let task = Task::new(title, move |ctx| {
                    let waiter = waiter.clone();
                    async move {
                        waiter.wait_for(selector, &ctx.namespace, stage).await?;
                        Ok(ContextDelta::note("done."))
                    }
                })
                .enabled_when(enabled);
                phase = phase.task(task);
            }
        }

        let cluster = self.env.cluster.clone();
        let url = Task::new("Retrieving Che Server URL", move |ctx| {
            let cluster = cluster.clone();
            async move {
                let url =
                    resolve_server_url(cluster.as_ref(), ctx.platform, &ctx.namespace).await?;
                Ok(ContextDelta {
                    server_url: Some(url.clone()),
                    ..ContextDelta::none()
                }
                .with_note(url))
            }
        });

        let prober = Arc::new(
            ReadinessProber::new(self.env.health.clone(), self.env.clock.clone())
                .with_retry_interval(self.options.probe.retry_interval),
        );
        let attempt_timeout = self.options.probe.attempt_timeout;
        let boot_timeout = self.options.server_boot_timeout;
        let status = Task::new("Che status check", move |ctx| {
            let prober = prober.clone();
            async move {
                let url = ctx.server_url.ok_or_else(|| {
                    DeployError::Internal("Server URL was not resolved".to_string())
                })?;
                if prober.probe_server(&url, attempt_timeout, boot_timeout).await {
                    Ok(ContextDelta::note("RUNNING"))
                } else {
                    Err(DeployError::ProbeTimeout {
                        url: health_url(&url),
                        timeout: boot_timeout,
                    })
                }
            }
        });

        phase.task(url).task(status)
    }
}
