//! A single unit of orchestrated work

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::errors::DeployError;
use crate::pipeline::context::{ContextDelta, RunContext};

/// Future returned by a task action
pub type TaskFuture = BoxFuture<'static, Result<ContextDelta, DeployError>>;

type Action = Box<dyn Fn(RunContext) -> TaskFuture + Send + Sync>;
type Predicate = Box<dyn Fn(&RunContext) -> bool + Send + Sync>;

/// Titled action with an optional enablement guard.
///
/// The action receives a snapshot of the context and returns the changes to make;
/// it never touches the live context itself.
pub struct Task {
    title: String,
    enabled: Option<Predicate>,
    action: Action,
    best_effort: bool,
}

impl Task {
    pub fn new<F, Fut>(title: impl Into<String>, action: F) -> Self
    where
        F: Fn(RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ContextDelta, DeployError>> + Send + 'static,
    {
        Self {
            title: title.into(),
            enabled: None,
            action: Box::new(move |ctx| action(ctx).boxed()),
            best_effort: false,
        }
    }

    /// Only run when `predicate` holds for the context at that point
    pub fn enabled_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&RunContext) -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Box::new(predicate));
        self
    }

    /// A failure is reported but does not abort the phase
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_best_effort(&self) -> bool {
        self.best_effort
    }

    pub fn is_enabled(&self, ctx: &RunContext) -> bool {
        self.enabled.as_ref().map_or(true, |p| p(ctx))
    }

    pub(crate) fn start(&self, ctx: RunContext) -> TaskFuture {
        (self.action)(ctx)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("title", &self.title)
            .field("guarded", &self.enabled.is_some())
            .field("best_effort", &self.best_effort)
            .finish()
    }
}
