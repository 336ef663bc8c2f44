//! Poll scheduling.
//!
//! - [`Pipeline`] runs one poll cycle: fetch → filter → enrich → notify → record
//! - [`Scheduler`] owns the timer and drives the pipeline every interval
//! - [`SchedulerHandle`] lets other tasks trigger a cycle, change the
//!   interval or query status while the loop runs
//!
//! ```text
//! Idle ──start──▶ Running ⇄ Sleeping ──cancel──▶ Cancelled
//! ```

mod handle;
mod interval;
mod messages;
mod pipeline;
mod runner;

pub use handle::SchedulerHandle;
pub use interval::{
    format_interval, load_interval, parse_interval, save_interval, validate_interval,
    INTERVAL_KEY, MIN_INTERVAL,
};
pub use messages::{PollStatus, SchedulerError, SchedulerMessage, SchedulerState};
pub use pipeline::{CycleReport, Pipeline};
pub use runner::Scheduler;
