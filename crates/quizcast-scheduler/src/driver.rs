//! Cron driver: one sleeping timer task per job, a small worker pool to run them.
//! Timers use tokio sleeps, so an idle driver costs nothing between firings.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use futures::future::BoxFuture;
use quizcast_core::error::{QuizError, Result};
use tokio::sync::{Mutex, mpsc};
use tokio::task::AbortHandle;

use crate::cron::DailyTrigger;

/// Zero-argument async callback run on each firing.
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`JobFn`].
pub fn job_fn<F, Fut>(f: F) -> JobFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(f()) })
}

/// A callback handed to the worker pool.
struct Firing {
    name: String,
    run: JobFn,
}

/// Stops future firings of one timer. In-flight executions are not touched.
#[derive(Debug)]
pub struct CancelHandle {
    timer: AbortHandle,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.timer.abort();
    }

    /// The timer task has stopped (cancelled, or the driver went away).
    pub fn is_cancelled(&self) -> bool {
        self.timer.is_finished()
    }
}

/// A job installed on the driver.
pub struct ScheduledJob {
    pub name: String,
    pub trigger: DailyTrigger,
    handle: CancelHandle,
    run: JobFn,
}

impl ScheduledJob {
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn handle(&self) -> &CancelHandle {
        &self.handle
    }

    pub(crate) fn runner(&self) -> JobFn {
        self.run.clone()
    }
}

impl std::fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("cancelled", &self.handle.is_cancelled())
            .finish()
    }
}

/// Runs daily triggers against the wall clock in a fixed UTC offset.
pub struct CronDriver {
    tx: mpsc::UnboundedSender<Firing>,
    offset: FixedOffset,
    workers: usize,
}

impl CronDriver {
    /// Spawn `workers` pool tasks. Must be called inside a tokio runtime.
    pub fn new(workers: usize, offset: FixedOffset) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<Firing>();
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers {
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let firing = { rx.lock().await.recv().await };
                    let Some(firing) = firing else {
                        tracing::debug!("cron worker {worker} stopped");
                        return;
                    };

                    tracing::info!("🔔 Job '{}' started (worker {worker})", firing.name);
                    let started = std::time::Instant::now();
                    // Run in its own task so a panicking job does not take the worker down.
                    match tokio::spawn((firing.run)()).await {
                        Ok(()) => tracing::info!(
                            "✅ Job '{}' finished in {}ms",
                            firing.name,
                            started.elapsed().as_millis()
                        ),
                        Err(e) => tracing::error!("❌ Job '{}' panicked: {e}", firing.name),
                    }
                }
            });
        }

        Self { tx, offset, workers }
    }

    /// Driver with offset given in whole hours east of UTC.
    pub fn with_offset_hours(workers: usize, hours: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(hours * 3600)
            .ok_or_else(|| QuizError::Config(format!("invalid UTC offset: {hours}h")))?;
        Ok(Self::new(workers, offset))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Current wall-clock time in the driver's offset.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Start a timer that hands `run` to the pool every day at `trigger`.
    pub fn schedule_daily(&self, name: &str, trigger: DailyTrigger, run: JobFn) -> ScheduledJob {
        let tx = self.tx.clone();
        let offset = self.offset;
        let job_name = name.to_string();
        let timer_run = run.clone();

        let timer = tokio::spawn(async move {
            let mut last_fired: Option<DateTime<FixedOffset>> = None;
            loop {
                let now = Utc::now().with_timezone(&offset);
                // Never fire the same slot twice if we wake slightly early.
                let from = match last_fired {
                    Some(last) if last > now => last,
                    _ => now,
                };
                let next = trigger.next_after(from);
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::debug!("⏰ Job '{job_name}' next run at {next}");
                tokio::time::sleep(wait).await;
                last_fired = Some(next);

                let firing = Firing {
                    name: job_name.clone(),
                    run: timer_run.clone(),
                };
                if tx.send(firing).is_err() {
                    tracing::warn!("Job '{job_name}' timer stopped: worker pool is gone");
                    return;
                }
            }
        });

        tracing::info!("📅 Job '{name}' scheduled ({trigger}, UTC{offset})");
        ScheduledJob {
            name: name.to_string(),
            trigger,
            handle: CancelHandle {
                timer: timer.abort_handle(),
            },
            run,
        }
    }

    /// Queue one execution of `run` on the pool right away.
    pub fn run_now(&self, name: &str, run: JobFn) -> Result<()> {
        self.tx
            .send(Firing {
                name: name.to_string(),
                run,
            })
            .map_err(|_| QuizError::Other(format!("cannot run '{name}': worker pool is gone")))
    }
}
