use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use super::messages::{PollStatus, SchedulerError, SchedulerMessage, SchedulerState};
use crate::scheduler::CycleReport;

/// Cloneable interface to a running [`Scheduler`](super::Scheduler).
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerMessage>,
    state: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    pub(super) fn new(
        sender: mpsc::Sender<SchedulerMessage>,
        state: watch::Receiver<SchedulerState>,
    ) -> Self {
        Self { sender, state }
    }

    /// Run one cycle immediately and wait for its report.
    ///
    /// The scheduled timer is left as it was.
    pub async fn trigger(&self) -> Result<CycleReport, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerMessage::Trigger { reply }).await?;
        rx.await.map_err(|_| SchedulerError::ServiceUnavailable)
    }

    /// Change the poll interval. The next cycle is rescheduled from the end
    /// of the last one, so a shorter interval can start it right away.
    pub async fn set_interval(&self, interval: Duration) -> Result<(), SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerMessage::SetInterval { interval, reply })
            .await?;
        rx.await.map_err(|_| SchedulerError::ServiceUnavailable)?
    }

    pub async fn reload_interval(&self) -> Result<Duration, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerMessage::ReloadInterval { reply }).await?;
        rx.await.map_err(|_| SchedulerError::ServiceUnavailable)?
    }

    pub async fn status(&self) -> Result<PollStatus, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerMessage::Status { reply }).await?;
        rx.await.map_err(|_| SchedulerError::ServiceUnavailable)
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    async fn send(&self, message: SchedulerMessage) -> Result<(), SchedulerError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| SchedulerError::ServiceUnavailable)
    }
}
