//! Sequential phase runner

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::errors::DeployError;
use crate::pipeline::context::RunContext;
use crate::pipeline::phase::Phase;
use crate::pipeline::reporter::{Reporter, SilentReporter};

/// What happened to one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Done,
    Skipped,
    /// Failed, but the task was best-effort
    Tolerated,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub phase: String,
    pub title: String,
    pub status: TaskStatus,
}

/// Record of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tasks: Vec<TaskRecord>,
    pub skipped_phases: Vec<String>,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            tasks: Vec::new(),
            skipped_phases: Vec::new(),
        }
    }

    /// Tasks of `phase` that ran to completion
    pub fn executed_in(&self, phase: &str) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.phase == phase && t.status == TaskStatus::Done)
            .count()
    }

    /// Status of the first task titled `title`
    pub fn status_of(&self, title: &str) -> Option<TaskStatus> {
        self.tasks.iter().find(|t| t.title == title).map(|t| t.status)
    }

    pub fn phase_skipped(&self, phase: &str) -> bool {
        self.skipped_phases.iter().any(|p| p == phase)
    }
}

/// Runs phases strictly in order, tasks strictly in order within a phase.
///
/// Each task's future is awaited to completion before the next task is even
/// evaluated. The first non-tolerated failure aborts the run; nothing is rolled back.
pub struct PipelineRunner {
    reporter: Arc<dyn Reporter>,
}

impl PipelineRunner {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(SilentReporter))
    }

    /// Run `phases` against `ctx`
    pub async fn run(
        &self,
        phases: &[Phase],
        ctx: &mut RunContext,
    ) -> Result<PipelineReport, DeployError> {
        let mut report = PipelineReport::new();
        for phase in phases {
            self.run_phase(phase, ctx, &mut report).await?;
        }
        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    async fn run_phase(
        &self,
        phase: &Phase,
        ctx: &mut RunContext,
        report: &mut PipelineReport,
    ) -> Result<(), DeployError> {
        if !phase.is_enabled(ctx) {
            debug!("Skipping phase: {}", phase.title());
            self.reporter.phase_skipped(phase.title());
            report.skipped_phases.push(phase.title().to_string());
            return Ok(());
        }

        debug!("Running phase: {} ({} tasks)", phase.title(), phase.len());
        self.reporter.phase_started(phase.title());

        for task in phase.iter() {
            let status = if !task.is_enabled(ctx) {
                debug!("Skipping task: {}", task.title());
                self.reporter.task_skipped(task.title());
                TaskStatus::Skipped
            } else {
                self.reporter.task_started(task.title());
                match task.start(ctx.clone()).await {
                    Ok(delta) => {
                        let note = delta.apply(ctx);
                        self.reporter.task_done(task.title(), note.as_deref());
                        TaskStatus::Done
                    }
                    Err(e) if task.is_best_effort() => {
                        warn!("Task \"{}\" failed, continuing: {}", task.title(), e);
                        self.reporter.task_failed(task.title(), &e, true);
                        TaskStatus::Tolerated
                    }
                    Err(e) => {
                        error!("Task \"{}\" failed: {}", task.title(), e);
                        self.reporter.task_failed(task.title(), &e, false);
                        return Err(e);
                    }
                }
            };

            report.tasks.push(TaskRecord {
                phase: phase.title().to_string(),
                title: task.title().to_string(),
                status,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::selector::Selection;
    use crate::install::InstallerKind;
    use crate::pipeline::context::ContextDelta;
    use crate::pipeline::task::Task;
    use crate::platform::Platform;

    fn context() -> RunContext {
        RunContext::new(
            "che",
            "che",
            Selection {
                platform: Platform::Minikube,
                installer: InstallerKind::Helm,
                multiuser: false,
            },
            false,
        )
    }

    #[tokio::test]
    async fn test_disabled_task_never_runs() {
        let phase = Phase::new("guarded").task(
            Task::new("sets url", |_ctx| async {
                Ok(ContextDelta {
                    server_url: Some("http://touched".to_string()),
                    ..ContextDelta::none()
                })
            })
            .enabled_when(|_ctx| false),
        );

        let mut ctx = context();
        let before = ctx.clone();
        let report = PipelineRunner::silent().run(&[phase], &mut ctx).await.unwrap();

        assert_eq!(ctx, before);
        assert_eq!(report.status_of("sets url"), Some(TaskStatus::Skipped));
    }

    #[tokio::test]
    async fn test_later_tasks_see_earlier_deltas() {
        let phase = Phase::new("chain")
            .task(Task::new("discover domain", |_ctx| async {
                Ok(ContextDelta {
                    domain: Some("192.168.64.34.nip.io".to_string()),
                    ..ContextDelta::none()
                })
            }))
            .task(
                Task::new("use domain", |ctx: RunContext| async move {
                    let domain = ctx.domain.unwrap_or_default();
                    Ok(ContextDelta {
                        server_url: Some(format!("http://che-che.{}", domain)),
                        ..ContextDelta::none()
                    })
                })
                .enabled_when(|ctx| ctx.domain.is_some()),
            );

        let mut ctx = context();
        PipelineRunner::silent().run(&[phase], &mut ctx).await.unwrap();
        assert_eq!(ctx.server_url.as_deref(), Some("http://che-che.192.168.64.34.nip.io"));
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_phases() {
        let failing = Phase::new("first").task(Task::new("boom", |_ctx| async {
            Err::<ContextDelta, _>(DeployError::ClusterApi("forbidden".to_string()))
        }));
        let never = Phase::new("second").task(Task::new("after", |_ctx| async {
            Ok(ContextDelta {
                scaled_up: Some(true),
                ..ContextDelta::none()
            })
        }));

        let mut ctx = context();
        let err = PipelineRunner::silent()
            .run(&[failing, never], &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::ClusterApi(_)));
        assert!(!ctx.scaled_up);
    }

    #[tokio::test]
    async fn test_best_effort_failure_continues() {
        let phase = Phase::new("tolerant")
            .task(
                Task::new("optional", |_ctx| async {
                    Err::<ContextDelta, _>(DeployError::Internal("meh".to_string()))
                })
                .best_effort(),
            )
            .task(Task::new("required", |_ctx| async { Ok(ContextDelta::note("ok")) }));

        let mut ctx = context();
        let report = PipelineRunner::silent().run(&[phase], &mut ctx).await.unwrap();
        assert_eq!(report.status_of("optional"), Some(TaskStatus::Tolerated));
        assert_eq!(report.status_of("required"), Some(TaskStatus::Done));
    }

    #[tokio::test]
    async fn test_disabled_phase_is_skipped() {
        let phase = Phase::new("install")
            .enabled_when(|ctx| !ctx.deployment.exists())
            .task(Task::new("install", |_ctx| async { Ok(ContextDelta::none()) }));

        let mut ctx = context();
        ctx.deployment = crate::pipeline::context::DeploymentState::Running(
            crate::cluster::api::ObjectKind::Deployment,
        );
        let report = PipelineRunner::silent().run(&[phase], &mut ctx).await.unwrap();
        assert!(report.phase_skipped("install"));
        assert_eq!(report.executed_in("install"), 0);
    }
}
