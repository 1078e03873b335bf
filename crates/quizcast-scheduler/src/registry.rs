//! Job registry: at most one active job per name.
//! Redefining a name cancels the old timer before the new one is installed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use quizcast_core::error::{QuizError, Result};

use crate::cron::DailyTrigger;
use crate::driver::{CronDriver, JobFn, ScheduledJob};

pub struct JobRegistry {
    driver: CronDriver,
    jobs: Mutex<HashMap<String, ScheduledJob>>,
}

impl JobRegistry {
    pub fn new(driver: CronDriver) -> Self {
        Self {
            driver,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn driver(&self) -> &CronDriver {
        &self.driver
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, ScheduledJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the job built by `factory` under `name`, replacing any previous one.
    pub fn set<F>(&self, name: &str, factory: F)
    where
        F: FnOnce(&CronDriver) -> ScheduledJob,
    {
        let mut jobs = self.jobs();
        if let Some(old) = jobs.remove(name) {
            old.cancel();
            tracing::info!("♻️ Job '{name}' replaced");
        }
        let job = factory(&self.driver);
        jobs.insert(name.to_string(), job);
    }

    /// Shorthand for a plain daily job.
    pub fn set_daily(&self, name: &str, trigger: DailyTrigger, run: JobFn) {
        self.set(name, |driver| driver.schedule_daily(name, trigger, run));
    }

    /// Cancel and remove. Returns whether a job was registered.
    pub fn cancel(&self, name: &str) -> bool {
        match self.jobs().remove(name) {
            Some(job) => {
                job.cancel();
                tracing::info!("🛑 Job '{name}' cancelled");
                true
            }
            None => false,
        }
    }

    /// Run a registered job once, now, on the worker pool.
    pub fn trigger(&self, name: &str) -> Result<()> {
        let run = self
            .jobs()
            .get(name)
            .map(|job| job.runner())
            .ok_or_else(|| QuizError::Other(format!("no job named '{name}'")))?;
        tracing::info!("👆 Job '{name}' triggered manually");
        self.driver.run_now(name, run)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Trigger description for each job, for status output.
    pub fn describe(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .jobs()
            .values()
            .map(|job| (job.name.clone(), job.trigger.to_string()))
            .collect();
        out.sort();
        out
    }

    pub fn cancel_all(&self) {
        let mut jobs = self.jobs();
        for (_, job) in jobs.drain() {
            job.cancel();
        }
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::job_fn;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn registry() -> JobRegistry {
        JobRegistry::new(CronDriver::with_offset_hours(1, 9).unwrap())
    }

    fn counting(counter: Arc<AtomicUsize>) -> JobFn {
        job_fn(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Settle: give any extra execution a chance to show up.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_reregister_keeps_one_active_job() {
        let reg = registry();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let trigger = DailyTrigger::at_hour(9).unwrap();

        reg.set_daily("select-and-broadcast", trigger, counting(first.clone()));
        reg.set_daily("select-and-broadcast", trigger, counting(second.clone()));
        assert_eq!(reg.len(), 1);

        reg.trigger("select-and-broadcast").unwrap();
        wait_for(&second, 1).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_timer_never_fires() {
        let reg = registry();
        let next_hour = (reg.driver().now() + chrono::Duration::hours(1)).format("%H").to_string();
        let trigger = DailyTrigger::at_hour(next_hour.parse().unwrap()).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        reg.set_daily("job", trigger, counting(counter.clone()));
        reg.set_daily("job", trigger, counting(counter.clone()));

        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel() {
        let reg = registry();
        reg.set_daily("a", DailyTrigger::at_hour(0).unwrap(), counting(Arc::new(AtomicUsize::new(0))));
        assert!(reg.cancel("a"));
        assert!(!reg.cancel("a"));
        assert!(reg.is_empty());
        assert!(reg.trigger("a").is_err());
    }

    #[tokio::test]
    async fn test_describe_sorted() {
        let reg = registry();
        let noop = counting(Arc::new(AtomicUsize::new(0)));
        reg.set_daily("tabulate-editorial", DailyTrigger::at_hour(19).unwrap(), noop.clone());
        reg.set_daily("refresh-catalog", DailyTrigger::at_hour(0).unwrap(), noop);
        let described = reg.describe();
        assert_eq!(described[0].0, "refresh-catalog");
        assert_eq!(described[1].1, "every 1 day at 19:00");
    }

    #[tokio::test]
    async fn test_concurrent_set_and_cancel() {
        let reg = Arc::new(registry());
        let mut handles = Vec::new();
        for i in 0..8 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move {
                let run = counting(Arc::new(AtomicUsize::new(0)));
                reg.set_daily("shared", DailyTrigger::at_hour(i).unwrap(), run);
                if i % 2 == 0 {
                    reg.cancel("shared");
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(reg.len() <= 1);
    }
}
