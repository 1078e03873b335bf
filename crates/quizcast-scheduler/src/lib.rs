//! # Quizcast Scheduler
//!
//! Named recurring jobs driven by the wall clock.
//!
//! ## Architecture
//! ```text
//! JobRegistry (name → ScheduledJob, one per name)
//!   ├── "refresh-catalog"      every day at 00:00
//!   ├── "select-and-broadcast" every day at 09:00 (Mon-Fri)
//!   └── "tabulate-editorial"   every day at 19:00
//!
//! CronDriver
//!   ├── one timer task per job  → sleeps until the next firing
//!   └── worker pool (default 1) → runs fired callbacks in order
//! ```
//!
//! Cancelling a job aborts its timer only; a callback already handed to the
//! worker pool runs to completion. Missed firings are never backfilled.

pub mod cron;
pub mod driver;
pub mod registry;

pub use cron::{DailyTrigger, is_weekday};
pub use driver::{CancelHandle, CronDriver, JobFn, ScheduledJob, job_fn};
pub use registry::JobRegistry;
