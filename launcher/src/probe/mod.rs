//! Bounded polling: clock, polling state machine and readiness prober

pub mod clock;
pub mod fsm;
pub mod health;
pub mod poll;
pub mod readiness;

pub use clock::{Clock, ManualClock, SystemClock};
pub use health::{HealthCheck, HttpHealthCheck};
pub use poll::{poll_until, Attempt, PollPolicy, ProbeResult};
pub use readiness::ReadinessProber;
