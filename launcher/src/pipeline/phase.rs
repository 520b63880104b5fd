//! Ordered group of tasks

use crate::pipeline::context::RunContext;
use crate::pipeline::task::Task;

type Predicate = Box<dyn Fn(&RunContext) -> bool + Send + Sync>;

/// Tasks run in declaration order; the first failure fails the phase
pub struct Phase {
    title: String,
    enabled: Option<Predicate>,
    tasks: Vec<Task>,
}

impl Phase {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            enabled: None,
            tasks: Vec::new(),
        }
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Skip the whole phase unless `predicate` holds when it is reached
    pub fn enabled_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&RunContext) -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Box::new(predicate));
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_enabled(&self, ctx: &RunContext) -> bool {
        self.enabled.as_ref().map_or(true, |p| p(ctx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Debug for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phase")
            .field("title", &self.title)
            .field("tasks", &self.tasks)
            .finish()
    }
}
