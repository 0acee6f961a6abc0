//! Once-a-day runner for the reminder policies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{NaiveDate, Timelike};
use serde::Serialize;
use tokio::sync::broadcast;

use super::policies::{PolicyReport, ReminderScheduler};
use crate::db::settings_repo;
use crate::engine::LifecycleEngine;
use crate::error::EngineError;

/// Settings key holding the date (UTC, `YYYY-MM-DD`) of the last pass in
/// which every policy completed its scan.
pub const LAST_RUN_KEY: &str = "scheduler.last_run_date";

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub run_date: NaiveDate,
    pub policies: Vec<PolicyReport>,
}

/// Runs every policy at most once per calendar day, from `run_hour` (UTC)
/// onwards. Checks on a fixed interval in a background thread and can be
/// woken early through a trigger channel.
pub struct DailyScheduler {
    engine: Arc<LifecycleEngine>,
    run_hour: u32,
    check_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl DailyScheduler {
    pub fn new(engine: Arc<LifecycleEngine>, run_hour: u32, check_interval: Duration) -> Self {
        Self {
            engine,
            run_hour,
            check_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the full pass if today's has not happened yet and the run hour
    /// has been reached. `force` skips both checks; the run is still recorded
    /// so the regular pass does not repeat it later that day.
    ///
    /// A pass in which any policy failed its scan is not recorded, so the
    /// next check the same day runs it again.
    pub fn run_if_due(&self, force: bool) -> Result<Option<DailyReport>, EngineError> {
        run_if_due(&self.engine, self.run_hour, force)
    }

    /// Starts the check loop in a background thread.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.check_interval;
        let run_hour = self.run_hour;

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start scheduler runtime");
                    return;
                }
            };

            rt.block_on(async {
                let mut interval_timer = tokio::time::interval(interval);

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = interval_timer.tick() => {},
                        Ok(()) = trigger_rx.recv() => {
                            tracing::info!("Scheduler check triggered");
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    match run_if_due(&engine, run_hour, false) {
                        Ok(Some(report)) => {
                            let failed: usize = report.policies.iter().map(|p| p.failed).sum();
                            tracing::info!(date = %report.run_date, failed, "Daily pass complete");
                        }
                        Ok(None) => {}
                        Err(e) => tracing::error!(error = %e, "Daily pass failed"),
                    }
                }
            });
        })
    }

    /// Signals the loop to stop after its current wait.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

fn run_if_due(
    engine: &LifecycleEngine,
    run_hour: u32,
    force: bool,
) -> Result<Option<DailyReport>, EngineError> {
    let now = engine.now();
    let today = now.date_naive();

    if !force {
        if now.hour() < run_hour {
            return Ok(None);
        }
        let last_run = engine
            .database()
            .with_conn(|conn| settings_repo::get(conn, LAST_RUN_KEY))?;
        if last_run.as_deref() == Some(today.to_string().as_str()) {
            return Ok(None);
        }
    }

    let _span = tracing::info_span!("daily_pass", date = %today, force).entered();
    let policies = ReminderScheduler::new(engine).run_all(now);

    let scan_failures: Vec<&str> = policies
        .iter()
        .filter(|p| p.error.is_some())
        .map(|p| p.policy.as_str())
        .collect();
    if scan_failures.is_empty() {
        engine
            .database()
            .with_conn(|conn| settings_repo::set(conn, LAST_RUN_KEY, &today.to_string(), now))?;
    } else {
        tracing::warn!(
            policies = ?scan_failures,
            "Daily pass incomplete; it will run again at the next check"
        );
    }

    Ok(Some(DailyReport {
        run_date: today,
        policies,
    }))
}
