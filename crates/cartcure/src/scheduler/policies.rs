//! The reminder policies run by each scheduling pass.
//!
//! Each policy scans the store, handles every matching record on its own
//! and reports counts. A failure on one record is logged and counted; it
//! never stops the scan.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::db::{invoice_repo, job_repo};
use crate::engine::{load_invoice, load_job, Delivery, LifecycleEngine};
use crate::error::EngineError;
use crate::lifecycle::{invoice_machine, job_machine, TransitionContext};
use crate::model::{Invoice, InvoiceStatus, Job, JobStatus};
use crate::notify::templates;
use crate::temporal::{compute_late_fee, days_between, SlaStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicyReport {
    pub policy: String,
    /// Records that matched the policy's selection.
    pub processed: usize,
    /// Notifications delivered.
    pub sent: usize,
    /// Records whose stored state changed.
    pub updated: usize,
    /// Matched records left alone, e.g. no email on file or already notified.
    pub skipped: usize,
    pub failed: usize,
    /// Set when the scan itself could not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PolicyReport {
    fn new(policy: &str) -> Self {
        Self {
            policy: policy.to_string(),
            ..Self::default()
        }
    }

    fn scan_failed(policy: &str, err: &EngineError) -> Self {
        Self {
            policy: policy.to_string(),
            error: Some(err.to_string()),
            ..Self::default()
        }
    }

    fn count(&mut self, delivery: &Delivery) {
        match delivery {
            Delivery::Sent => self.sent += 1,
            Delivery::Skipped(_) => self.skipped += 1,
            Delivery::Failed(_) => self.failed += 1,
        }
    }
}

pub const QUOTE_REMINDERS: &str = "quote_reminders";
pub const PRE_DUE_REMINDERS: &str = "pre_due_reminders";
pub const OVERDUE_NOTICES: &str = "overdue_notices";
pub const SLA_REFRESH: &str = "sla_refresh";

pub struct ReminderScheduler<'a> {
    engine: &'a LifecycleEngine,
}

impl<'a> ReminderScheduler<'a> {
    pub fn new(engine: &'a LifecycleEngine) -> Self {
        Self { engine }
    }

    /// Runs every policy at `now`, SLA refresh first.
    pub fn run_all(&self, now: DateTime<Utc>) -> Vec<PolicyReport> {
        vec![
            self.refresh_sla(now)
                .unwrap_or_else(|e| PolicyReport::scan_failed(SLA_REFRESH, &e)),
            self.run_quote_reminders(now)
                .unwrap_or_else(|e| PolicyReport::scan_failed(QUOTE_REMINDERS, &e)),
            self.run_pre_due_reminders(now)
                .unwrap_or_else(|e| PolicyReport::scan_failed(PRE_DUE_REMINDERS, &e)),
            self.run_overdue_notices(now)
                .unwrap_or_else(|e| PolicyReport::scan_failed(OVERDUE_NOTICES, &e)),
        ]
    }

    /// Reminds clients about quotes sent `quote_reminder_days` or more ago and
    /// moves them to `QuoteReminded`, which takes them out of the selection.
    ///
    /// The reminder goes out before the status is written; if the write then
    /// fails the job is picked up again on the next pass.
    pub fn run_quote_reminders(&self, now: DateTime<Utc>) -> Result<PolicyReport, EngineError> {
        let _span = info_span!("policy", name = QUOTE_REMINDERS).entered();
        let mut report = PolicyReport::new(QUOTE_REMINDERS);
        let threshold = i64::from(self.engine.config().quote_reminder_days);

        let quoted = self
            .engine
            .database()
            .with_conn(|conn| job_repo::list_by_status(conn, JobStatus::Quoted))?;

        for job in quoted {
            let Some(sent_at) = job.quote_sent_at else {
                continue;
            };
            if days_between(sent_at, now) < threshold {
                continue;
            }
            report.processed += 1;

            let delivery = self.engine.notify_client(&job.client, &job.job_number, |to| {
                templates::quote_reminder(to, &job, self.engine.business())
            });
            report.count(&delivery);
            if delivery != Delivery::Sent {
                continue;
            }

            match self.mark_reminded(&job.job_number, now) {
                Ok(true) => {
                    report.updated += 1;
                    self.engine
                        .record_activity("job", &job.job_number, "quote_reminded", None);
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(job = %job.job_number, error = %e, "Failed to record quote reminder");
                }
            }
        }

        log_report(&report);
        Ok(report)
    }

    /// Sends a friendly reminder for `Sent` invoices due within the pre-due
    /// window (1 to `pre_due_window_days` days ahead).
    ///
    /// This policy changes no state, so every run inside the window sends
    /// again. Callers must run it at most once per calendar day;
    /// [`super::DailyScheduler`] enforces that.
    pub fn run_pre_due_reminders(&self, now: DateTime<Utc>) -> Result<PolicyReport, EngineError> {
        let _span = info_span!("policy", name = PRE_DUE_REMINDERS).entered();
        let mut report = PolicyReport::new(PRE_DUE_REMINDERS);
        let window = i64::from(self.engine.config().pre_due_window_days);

        let sent = self
            .engine
            .database()
            .with_conn(|conn| invoice_repo::list_by_statuses(conn, &[InvoiceStatus::Sent]))?;

        for invoice in sent {
            let days_until_due = days_between(now, invoice.due_date);
            if !(1..=window).contains(&days_until_due) {
                continue;
            }
            report.processed += 1;

            let delivery = self
                .engine
                .notify_client(&invoice.client, &invoice.invoice_number, |to| {
                    let business = self.engine.business();
                    templates::pre_due_reminder(to, &invoice, days_until_due, business)
                });
            report.count(&delivery);
            if delivery == Delivery::Sent {
                self.engine.record_activity(
                    "invoice",
                    &invoice.invoice_number,
                    "pre_due_reminder",
                    Some(format!("due in {} day(s)", days_until_due)),
                );
            }
        }

        log_report(&report);
        Ok(report)
    }

    /// Issues overdue notices on the first day overdue and then every
    /// `overdue_notice_interval_days`. The late fee is persisted and a `Sent`
    /// invoice becomes `Overdue` before the notice is sent; the notice is
    /// keyed by invoice and day count so a same-day re-run sends nothing new.
    pub fn run_overdue_notices(&self, now: DateTime<Utc>) -> Result<PolicyReport, EngineError> {
        let _span = info_span!("policy", name = OVERDUE_NOTICES).entered();
        let mut report = PolicyReport::new(OVERDUE_NOTICES);
        let interval = i64::from(self.engine.config().overdue_notice_interval_days.max(1));

        let open = self.engine.database().with_conn(|conn| {
            invoice_repo::list_by_statuses(conn, &[InvoiceStatus::Sent, InvoiceStatus::Overdue])
        })?;

        for invoice in open {
            let days_overdue = days_between(invoice.due_date, now);
            if days_overdue <= 0 || (days_overdue - 1) % interval != 0 {
                continue;
            }
            report.processed += 1;

            let key = format!("overdue:{}:{}", invoice.invoice_number, days_overdue);
            if self.engine.already_notified(&key) {
                report.skipped += 1;
                continue;
            }

            let updated = match self.accrue(&invoice.invoice_number, now) {
                Ok(Some(updated)) => updated,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        invoice = %invoice.invoice_number,
                        error = %e,
                        "Failed to apply late fee"
                    );
                    continue;
                }
            };
            report.updated += 1;
            self.engine.record_activity(
                "invoice",
                &updated.invoice_number,
                "late_fee",
                Some(format!(
                    "{} day(s) overdue, fee {}",
                    updated.days_overdue, updated.late_fee
                )),
            );

            let fee = compute_late_fee(
                updated.total,
                updated.due_date,
                now,
                &self.engine.config().late_fee,
            );
            let delivery = self
                .engine
                .notify_client(&updated.client, &updated.invoice_number, |to| {
                    templates::overdue_notice(to, &updated, &fee, self.engine.business())
                });
            report.count(&delivery);
            if delivery == Delivery::Sent {
                self.engine.remember_notification(&key);
            }
        }

        log_report(&report);
        Ok(report)
    }

    /// Recomputes the stored SLA status of every running job and persists the
    /// ones that changed. Jobs newly past their due date raise an admin alert.
    pub fn refresh_sla(&self, now: DateTime<Utc>) -> Result<PolicyReport, EngineError> {
        let _span = info_span!("policy", name = SLA_REFRESH).entered();
        let mut report = PolicyReport::new(SLA_REFRESH);

        let jobs = self.engine.database().with_conn(job_repo::list_all)?;

        for job in jobs.into_iter().filter(|j| j.status.sla_active()) {
            report.processed += 1;
            let Some(snapshot) = job.sla(now) else {
                report.skipped += 1;
                continue;
            };
            if job.sla_status == Some(snapshot.status) {
                continue;
            }

            match self.store_sla(&job.job_number, snapshot.status, now) {
                Ok(true) => {
                    report.updated += 1;
                    self.engine.record_activity(
                        "job",
                        &job.job_number,
                        "sla_changed",
                        Some(snapshot.status.to_string()),
                    );
                    if snapshot.status == SlaStatus::Overdue {
                        let alert = templates::admin_alert(
                            "Job past its turnaround",
                            &format!(
                                "Job {} is {} day(s) past its promised completion.",
                                job.job_number, -snapshot.days_remaining
                            ),
                            self.engine.business(),
                        );
                        report.count(&self.engine.deliver(&alert));
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(job = %job.job_number, error = %e, "Failed to update SLA status");
                }
            }
        }

        log_report(&report);
        Ok(report)
    }

    /// `Quoted -> QuoteReminded` against the stored job. Returns false when
    /// the job has moved on since it was selected.
    fn mark_reminded(&self, job_number: &str, now: DateTime<Utc>) -> Result<bool, EngineError> {
        let config = self.engine.config();
        self.engine.database().with_transaction(|tx| {
            let job = load_job(tx, job_number)?;
            if job.status != JobStatus::Quoted {
                return Ok(false);
            }
            let ctx = TransitionContext::new(now, config);
            let reminded = job_machine::transition(&job, JobStatus::QuoteReminded, &ctx)?;
            job_repo::update(tx, &reminded)?;
            Ok(true)
        })
    }

    /// Applies today's late fee to the stored invoice. `None` when it has been
    /// settled since it was selected.
    fn accrue(
        &self,
        invoice_number: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invoice>, EngineError> {
        let policy = self.engine.config().late_fee;
        self.engine.database().with_transaction(|tx| {
            let invoice = load_invoice(tx, invoice_number)?;
            if !invoice.status.is_open() {
                return Ok(None);
            }
            let fee = compute_late_fee(invoice.total, invoice.due_date, now, &policy);
            let updated = invoice_machine::apply_late_fee(&invoice, &fee, now)?;
            invoice_repo::update(tx, &updated)?;
            Ok(Some(updated))
        })
    }

    fn store_sla(
        &self,
        job_number: &str,
        status: SlaStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        self.engine.database().with_transaction(|tx| {
            let mut job: Job = load_job(tx, job_number)?;
            if !job.status.sla_active() {
                return Ok(false);
            }
            job.sla_status = Some(status);
            job.last_updated_at = now;
            job_repo::update(tx, &job)?;
            Ok(true)
        })
    }
}

fn log_report(report: &PolicyReport) {
    info!(
        policy = %report.policy,
        processed = report.processed,
        sent = report.sent,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        "Policy run finished"
    );
}
