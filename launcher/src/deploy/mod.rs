//! Deployment state detection, lifecycle waits and start orchestration

pub mod lifecycle;
pub mod orchestrator;
pub mod state;
pub mod url;

pub use lifecycle::{LifecycleStage, LifecycleWaiter};
pub use orchestrator::{Orchestrator, StartOutcome, StartStatus};
pub use state::{DetectedState, StateDetector};
pub use url::resolve_server_url;
