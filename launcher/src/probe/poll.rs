//! Deadline-driven retry loop

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace};

use crate::probe::clock::Clock;
use crate::probe::fsm::{PollEvent, PollFsm};

/// Outcome of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// The awaited condition holds
    Ready,

    /// Not yet; try again while time remains
    Pending(String),

    /// Stop polling, the condition can no longer be reached
    Fatal(String),
}

/// Terminal outcome of a polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Ready,
    TimedOut,
    Error(String),
}

impl ProbeResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeResult::Ready)
    }
}

/// How long to keep trying, and how long to pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Issue attempts until one is ready, one is fatal, or the deadline passes.
///
/// The first attempt is always issued. An attempt in flight is never cut short:
/// the deadline is only checked once it concludes, and an attempt concluding past
/// the deadline counts as a timeout whatever its outcome. Pauses are fixed (no
/// backoff) and never extend past the deadline.
pub async fn poll_until<F, Fut>(
    clock: &dyn Clock,
    policy: PollPolicy,
    mut attempt: F,
) -> ProbeResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt>,
{
    let deadline = clock.now() + policy.timeout;
    let mut fsm = PollFsm::new();
    if let Err(e) = fsm.process(PollEvent::Start) {
        return ProbeResult::Error(e);
    }

    loop {
        let event = match attempt().await {
            // A success that lands after the deadline does not count
            Attempt::Ready if clock.now() > deadline => PollEvent::DeadlineExceeded,
            Attempt::Ready => PollEvent::Succeeded,
            Attempt::Fatal(cause) => PollEvent::Fatal(cause),
            Attempt::Pending(reason) => {
                trace!("Attempt {} pending: {}", fsm.attempts() + 1, reason);
                let now = clock.now();
                if now >= deadline {
                    PollEvent::DeadlineExceeded
                } else {
                    let pause = policy.interval.min(deadline - now);
                    if !pause.is_zero() {
                        clock.sleep(pause).await;
                    }
                    PollEvent::AttemptPending
                }
            }
        };

        if let Err(e) = fsm.process(event) {
            return ProbeResult::Error(e);
        }
        if let Some(result) = fsm.result() {
            debug!("Polling finished after {} attempts: {:?}", fsm.attempts(), result);
            return result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::clock::ManualClock;

    #[tokio::test]
    async fn test_ready_on_nth_attempt() {
        let clock = ManualClock::new();
        let mut calls = 0;
        let result = poll_until(
            &clock,
            PollPolicy::new(Duration::from_secs(10), Duration::from_secs(1)),
            || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 4 {
                        Attempt::Pending(format!("attempt {}", n))
                    } else {
                        Attempt::Ready
                    }
                }
            },
        )
        .await;
        assert_eq!(result, ProbeResult::Ready);
        assert_eq!(calls, 4);
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_times_out_at_deadline() {
        let clock = ManualClock::new();
        let result = poll_until(
            &clock,
            PollPolicy::new(Duration::from_millis(2500), Duration::from_secs(1)),
            || async { Attempt::Pending("not yet".to_string()) },
        )
        .await;
        assert_eq!(result, ProbeResult::TimedOut);
        // Pauses are clamped to the remaining budget
        assert_eq!(clock.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let clock = ManualClock::new();
        let result = poll_until(
            &clock,
            PollPolicy::new(Duration::from_secs(10), Duration::from_secs(1)),
            || async { Attempt::Fatal("pod failed".to_string()) },
        )
        .await;
        assert_eq!(result, ProbeResult::Error("pod failed".to_string()));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_zero_budget_still_tries_once() {
        let clock = ManualClock::new();
        let mut calls = 0;
        let policy = PollPolicy::new(Duration::ZERO, Duration::from_secs(1));
        let result = poll_until(&clock, policy, || {
            calls += 1;
            async { Attempt::Pending("slow".to_string()) }
        })
        .await;
        assert_eq!(result, ProbeResult::TimedOut);
        assert_eq!(calls, 1);
    }
}
