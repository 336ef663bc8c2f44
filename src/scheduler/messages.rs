use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::scheduler::CycleReport;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Failed to persist interval: {0}")]
    Persistence(String),

    #[error("Scheduler unavailable")]
    ServiceUnavailable,
}

/// Where the poll loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started yet.
    Idle,
    Running,
    Sleeping,
    /// Stopped for good.
    Cancelled,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Sleeping => "sleeping",
            SchedulerState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct PollStatus {
    pub state: SchedulerState,
    pub interval: Duration,
    /// Cycles run so far, scheduled and manual.
    pub cycles: u64,
    /// Time left until the next scheduled cycle.
    pub next_run_in: Duration,
    pub last_report: Option<CycleReport>,
}

pub enum SchedulerMessage {
    /// Run one cycle now, outside the timer.
    Trigger {
        reply: oneshot::Sender<CycleReport>,
    },

    /// Validate, persist and apply a new interval.
    SetInterval {
        interval: Duration,
        reply: oneshot::Sender<Result<(), SchedulerError>>,
    },

    /// Re-read the persisted interval.
    ReloadInterval {
        reply: oneshot::Sender<Result<Duration, SchedulerError>>,
    },

    Status {
        reply: oneshot::Sender<PollStatus>,
    },
}
