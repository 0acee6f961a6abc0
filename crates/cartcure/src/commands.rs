//! Entry points for the orchestration layer.
//!
//! Every function wraps one engine operation and returns a
//! [`CommandOutcome`]: a success flag, a plain-language message, the
//! machine-readable error kind on failure, and the resulting data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::engine::{Acceptance, GeneratedInvoice, LifecycleEngine};
use crate::error::{EngineError, ErrorKind};
use crate::intake::Submission;
use crate::lifecycle::Cancellation;
use crate::model::{Invoice, Job};
use crate::scheduler::{PolicyReport, ReminderScheduler};

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> CommandOutcome<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_kind: None,
            data: Some(data),
        }
    }

    /// `AlreadySatisfied` is informational and still counts as success.
    pub fn from_error(err: &EngineError) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::ExternalDependencyFailed {
            tracing::error!(error = %err, "Command failed");
        }
        Self {
            success: kind == ErrorKind::AlreadySatisfied,
            message: err.user_message(),
            error_kind: Some(kind),
            data: None,
        }
    }

    fn from_result(result: Result<T, EngineError>, message: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(data) => Self::ok(message(&data), data),
            Err(err) => Self::from_error(&err),
        }
    }
}

pub fn create_job(engine: &LifecycleEngine, submission: &Submission) -> CommandOutcome<Job> {
    CommandOutcome::from_result(engine.create_job_from_submission(submission), |job| {
        format!("Created job {}.", job.job_number)
    })
}

pub fn send_quote(
    engine: &LifecycleEngine,
    job_number: &str,
    amount_excl_tax: Decimal,
    turnaround_days: Option<u32>,
) -> CommandOutcome<Job> {
    CommandOutcome::from_result(
        engine.send_quote(job_number, amount_excl_tax, turnaround_days),
        |job| {
            format!(
                "Quote for {} sent: ${:.2}, valid until {}.",
                job.job_number,
                job.total_incl_tax,
                job.quote_valid_until
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default()
            )
        },
    )
}

pub fn accept_quote(engine: &LifecycleEngine, job_number: &str) -> CommandOutcome<Acceptance> {
    CommandOutcome::from_result(engine.accept_quote(job_number), |acceptance| {
        match &acceptance.deposit {
            Some(deposit) => format!(
                "Quote {} accepted. Deposit invoice {} for ${:.2} sent.",
                job_number, deposit.invoice_number, deposit.total
            ),
            None => format!("Quote {} accepted.", job_number),
        }
    })
}

pub fn decline_quote(
    engine: &LifecycleEngine,
    job_number: &str,
    reason: &str,
) -> CommandOutcome<Job> {
    CommandOutcome::from_result(engine.decline_quote(job_number, reason), |_| {
        format!("Quote {} declined.", job_number)
    })
}

pub fn start_work(engine: &LifecycleEngine, job_number: &str) -> CommandOutcome<Job> {
    CommandOutcome::from_result(engine.start_work(job_number), |job| {
        format!(
            "Work started on {}. Due {}.",
            job_number,
            job.due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string())
        )
    })
}

pub fn put_on_hold(
    engine: &LifecycleEngine,
    job_number: &str,
    reason: &str,
) -> CommandOutcome<Job> {
    CommandOutcome::from_result(engine.put_on_hold(job_number, reason), |_| {
        format!("Job {} is on hold.", job_number)
    })
}

pub fn resume_work(engine: &LifecycleEngine, job_number: &str) -> CommandOutcome<Job> {
    CommandOutcome::from_result(engine.resume_work(job_number), |job| {
        format!(
            "Work resumed on {}. Due {}.",
            job_number,
            job.due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string())
        )
    })
}

pub fn complete_job(engine: &LifecycleEngine, job_number: &str) -> CommandOutcome<Job> {
    CommandOutcome::from_result(engine.complete_job(job_number), |_| {
        format!("Job {} completed.", job_number)
    })
}

pub fn cancel_job(
    engine: &LifecycleEngine,
    job_number: &str,
    reason: &str,
    refund: bool,
) -> CommandOutcome<Cancellation> {
    CommandOutcome::from_result(engine.cancel_job(job_number, reason, refund), |c| {
        format!(
            "Job {} cancelled; {} open invoice(s) cancelled.",
            job_number,
            c.cancelled_invoices.len()
        )
    })
}

pub fn generate_next_invoice(
    engine: &LifecycleEngine,
    job_number: &str,
) -> CommandOutcome<GeneratedInvoice> {
    CommandOutcome::from_result(engine.generate_next_invoice(job_number), |g| {
        let mut message = format!(
            "Created {} invoice {} for ${:.2}.",
            g.invoice.invoice_type, g.invoice.invoice_number, g.invoice.total
        );
        for warning in &g.warnings {
            message.push_str(&format!(" Note: {}.", warning));
        }
        message
    })
}

pub fn send_invoice(engine: &LifecycleEngine, invoice_number: &str) -> CommandOutcome<Invoice> {
    CommandOutcome::from_result(engine.send_invoice(invoice_number), |invoice| {
        format!(
            "Invoice {} sent, due {}.",
            invoice_number,
            invoice.due_date.format("%Y-%m-%d")
        )
    })
}

pub fn mark_invoice_paid(
    engine: &LifecycleEngine,
    invoice_number: &str,
    method: &str,
    reference: Option<&str>,
) -> CommandOutcome<Invoice> {
    CommandOutcome::from_result(
        engine.mark_invoice_paid(invoice_number, method, reference),
        |invoice| format!("Invoice {} marked paid (${:.2}).", invoice_number, invoice.total),
    )
}

pub fn cancel_invoice(
    engine: &LifecycleEngine,
    invoice_number: &str,
    reason: &str,
) -> CommandOutcome<Invoice> {
    CommandOutcome::from_result(engine.cancel_invoice(invoice_number, reason), |_| {
        format!("Invoice {} cancelled.", invoice_number)
    })
}

pub fn run_quote_reminders(
    engine: &LifecycleEngine,
    now: DateTime<Utc>,
) -> CommandOutcome<PolicyReport> {
    CommandOutcome::from_result(
        ReminderScheduler::new(engine).run_quote_reminders(now),
        summarize,
    )
}

/// Not idempotent within a day; see [`ReminderScheduler::run_pre_due_reminders`].
pub fn run_pre_due_reminders(
    engine: &LifecycleEngine,
    now: DateTime<Utc>,
) -> CommandOutcome<PolicyReport> {
    CommandOutcome::from_result(
        ReminderScheduler::new(engine).run_pre_due_reminders(now),
        summarize,
    )
}

pub fn run_overdue_notices(
    engine: &LifecycleEngine,
    now: DateTime<Utc>,
) -> CommandOutcome<PolicyReport> {
    CommandOutcome::from_result(
        ReminderScheduler::new(engine).run_overdue_notices(now),
        summarize,
    )
}

pub fn refresh_sla(engine: &LifecycleEngine, now: DateTime<Utc>) -> CommandOutcome<PolicyReport> {
    CommandOutcome::from_result(ReminderScheduler::new(engine).refresh_sla(now), summarize)
}

fn summarize(report: &PolicyReport) -> String {
    format!(
        "{}: {} processed, {} sent, {} updated, {} skipped, {} failed.",
        report.policy, report.processed, report.sent, report.updated, report.skipped, report.failed
    )
}
