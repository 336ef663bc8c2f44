use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::handle::SchedulerHandle;
use super::interval::{format_interval, load_interval, save_interval, validate_interval};
use super::messages::{PollStatus, SchedulerError, SchedulerMessage, SchedulerState};
use super::pipeline::{CycleReport, Pipeline};
use crate::store::Store;

/// The poll loop.
///
/// A single task owns the timer and runs every cycle inline, scheduled or
/// manual, so two cycles can never overlap. Commands arrive through a
/// [`SchedulerHandle`]; shutdown goes through the cancellation token.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    store: Arc<dyn Store + Send + Sync>,
    interval: Duration,
    run_on_start: bool,
    receiver: mpsc::Receiver<SchedulerMessage>,
    state: watch::Sender<SchedulerState>,
    cancel: CancellationToken,
    cycles: u64,
    last_report: Option<CycleReport>,
    last_finished: Instant,
    next_run: Instant,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        store: Arc<dyn Store + Send + Sync>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (Self, SchedulerHandle) {
        let (sender, receiver) = mpsc::channel(16);
        let (state, state_rx) = watch::channel(SchedulerState::Idle);
        let now = Instant::now();

        let scheduler = Self {
            pipeline,
            store,
            interval,
            run_on_start: true,
            receiver,
            state,
            cancel,
            cycles: 0,
            last_report: None,
            last_finished: now,
            next_run: now,
        };

        (scheduler, SchedulerHandle::new(sender, state_rx))
    }

    /// Whether the first cycle runs immediately or after one interval.
    pub fn run_on_start(mut self, enabled: bool) -> Self {
        self.run_on_start = enabled;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let now = Instant::now();
        self.last_finished = now;
        self.next_run = if self.run_on_start {
            now
        } else {
            now + self.interval
        };

        tracing::info!(
            "Scheduler started (interval: {})",
            format_interval(self.interval)
        );

        let mut inbox_open = true;
        loop {
            self.set_state(SchedulerState::Sleeping);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                message = self.receiver.recv(), if inbox_open => match message {
                    Some(message) => self.handle_message(message).await,
                    None => inbox_open = false,
                },
                _ = sleep_until(self.next_run) => {
                    self.run_cycle().await;
                    self.last_finished = Instant::now();
                    self.next_run = self.last_finished + self.interval;
                }
            }
        }

        self.set_state(SchedulerState::Cancelled);
        tracing::info!("Scheduler stopped after {} cycles", self.cycles);
    }

    async fn handle_message(&mut self, message: SchedulerMessage) {
        match message {
            SchedulerMessage::Trigger { reply } => {
                tracing::info!("Running manual check");
                let report = self.run_cycle().await;
                let _ = reply.send(report);
            }

            SchedulerMessage::SetInterval { interval, reply } => {
                let _ = reply.send(self.set_interval(interval));
            }

            SchedulerMessage::ReloadInterval { reply } => {
                let result = load_interval(self.store.as_ref(), self.interval)
                    .map_err(|e| SchedulerError::Persistence(e.to_string()))
                    .map(|interval| {
                        self.reschedule(interval);
                        interval
                    });
                let _ = reply.send(result);
            }

            SchedulerMessage::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    async fn run_cycle(&mut self) -> CycleReport {
        self.set_state(SchedulerState::Running);
        let report = self.pipeline.run(&self.cancel).await;
        self.cycles += 1;
        self.last_report = Some(report.clone());
        report
    }

    fn set_interval(&mut self, interval: Duration) -> Result<(), SchedulerError> {
        let interval = validate_interval(interval)
            .map_err(|e| SchedulerError::InvalidInterval(e.to_string()))?;

        save_interval(self.store.as_ref(), interval)
            .map_err(|e| SchedulerError::Persistence(e.to_string()))?;

        self.reschedule(interval);
        Ok(())
    }

    /// Apply `interval` to the pending sleep. If the last cycle finished
    /// longer ago than `interval`, the next one is due immediately.
    fn reschedule(&mut self, interval: Duration) {
        if interval != self.interval {
            tracing::info!(
                "Poll interval changed from {} to {}",
                format_interval(self.interval),
                format_interval(interval)
            );
        }
        self.interval = interval;
        self.next_run = self.last_finished + interval;
    }

    fn status(&self) -> PollStatus {
        PollStatus {
            state: *self.state.borrow(),
            interval: self.interval,
            cycles: self.cycles,
            next_run_in: self.next_run.saturating_duration_since(Instant::now()),
            last_report: self.last_report.clone(),
        }
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }
}
