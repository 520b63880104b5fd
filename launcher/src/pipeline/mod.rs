//! Phase pipeline: run context, tasks, phases and the sequential runner

pub mod context;
pub mod phase;
pub mod reporter;
pub mod runner;
pub mod task;

pub use context::{Auxiliaries, ContextDelta, DeploymentState, RunContext};
pub use phase::Phase;
pub use reporter::{Renderer, Reporter};
pub use runner::{PipelineReport, PipelineRunner, TaskStatus};
pub use task::Task;
