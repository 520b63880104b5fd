//! Finite state machine for a single polling loop

use serde::{Deserialize, Serialize};

use crate::probe::poll::ProbeResult;

/// Polling state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    /// Not started
    Idle,

    /// Attempts are being issued
    Polling,

    /// An attempt succeeded
    Ready,

    /// The deadline passed without success
    TimedOut,

    /// An attempt reported an unrecoverable error
    Failed,
}

/// Polling event
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// Begin polling
    Start,

    /// An attempt did not succeed yet
    AttemptPending,

    /// An attempt succeeded
    Succeeded,

    /// The deadline passed
    DeadlineExceeded,

    /// An attempt failed for good
    Fatal(String),
}

/// Polling FSM
#[derive(Debug, Clone)]
pub struct PollFsm {
    state: PollState,
    attempts: u32,
    error: Option<String>,
}

impl PollFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: PollState::Idle,
            attempts: 0,
            error: None,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Number of attempts that concluded
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: PollEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (PollState::Idle, PollEvent::Start) => PollState::Polling,

            (PollState::Polling, PollEvent::AttemptPending) => {
                self.attempts += 1;
                PollState::Polling
            }
            (PollState::Polling, PollEvent::Succeeded) => {
                self.attempts += 1;
                PollState::Ready
            }
            (PollState::Polling, PollEvent::DeadlineExceeded) => {
                self.attempts += 1;
                PollState::TimedOut
            }
            (PollState::Polling, PollEvent::Fatal(err)) => {
                self.attempts += 1;
                self.error = Some(err.clone());
                PollState::Failed
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// The terminal outcome, once there is one
    pub fn result(&self) -> Option<ProbeResult> {
        match self.state {
            PollState::Ready => Some(ProbeResult::Ready),
            PollState::TimedOut => Some(ProbeResult::TimedOut),
            PollState::Failed => Some(ProbeResult::Error(
                self.error.clone().unwrap_or_default(),
            )),
            PollState::Idle | PollState::Polling => None,
        }
    }
}

impl Default for PollFsm {
    fn default() -> Self {
        Self::new()
    }
}

