//! Recurring job wiring: three named daily jobs on the registry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use quizcast_core::config::ScheduleConfig;
use quizcast_core::error::Result;
use quizcast_scheduler::{DailyTrigger, JobFn, JobRegistry, job_fn};

use crate::lifecycle::QuizController;

pub const REFRESH_CATALOG: &str = "refresh-catalog";
pub const SELECT_AND_BROADCAST: &str = "select-and-broadcast";
pub const TABULATE_EDITORIAL: &str = "tabulate-editorial";

/// Run one job body under the deadline, logging instead of propagating.
async fn run_logged<T, F>(name: &'static str, deadline: Duration, body: F)
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, body).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!("❌ Job '{name}' failed: {e}"),
        Err(_) => tracing::error!("⏱️ Job '{name}' exceeded its {}s deadline", deadline.as_secs()),
    }
}

fn refresh_catalog_job(controller: Arc<QuizController>, deadline: Duration) -> JobFn {
    job_fn(move || {
        let controller = controller.clone();
        async move { run_logged(REFRESH_CATALOG, deadline, controller.refresh_catalog()).await }
    })
}

fn select_and_broadcast_job(controller: Arc<QuizController>, deadline: Duration) -> JobFn {
    job_fn(move || {
        let controller = controller.clone();
        async move { run_logged(SELECT_AND_BROADCAST, deadline, controller.select_and_broadcast()).await }
    })
}

fn tabulate_editorial_job(controller: Arc<QuizController>, deadline: Duration) -> JobFn {
    job_fn(move || {
        let controller = controller.clone();
        async move { run_logged(TABULATE_EDITORIAL, deadline, controller.tabulate_and_broadcast()).await }
    })
}

/// Install (or reinstall) the three daily jobs. Existing timers under the
/// same names are cancelled first.
pub fn register_jobs(
    registry: &JobRegistry,
    controller: Arc<QuizController>,
    schedule: &ScheduleConfig,
) -> Result<()> {
    let deadline = Duration::from_secs(schedule.job_timeout_secs);

    // Build every trigger before touching the registry so a bad hour installs nothing.
    let refresh = DailyTrigger::at_hour(schedule.refresh_catalog_at)?;
    let mut push_problem = DailyTrigger::at_hour(schedule.push_problem_at)?;
    if schedule.weekdays_only {
        push_problem = push_problem.weekdays_only();
    }
    let push_editorial = DailyTrigger::at_hour(schedule.push_editorial_at)?;

    registry.set_daily(REFRESH_CATALOG, refresh, refresh_catalog_job(controller.clone(), deadline));
    registry.set_daily(
        SELECT_AND_BROADCAST,
        push_problem,
        select_and_broadcast_job(controller.clone(), deadline),
    );
    registry.set_daily(
        TABULATE_EDITORIAL,
        push_editorial,
        tabulate_editorial_job(controller, deadline),
    );

    for (name, trigger) in registry.describe() {
        tracing::info!("📅 {name}: {trigger}");
    }
    Ok(())
}
