//! Job status transitions.

use chrono::{DateTime, Utc};

use crate::config::BillingConfig;
use crate::error::EngineError;
use crate::model::{Invoice, InvoiceStatus, Job, JobStatus};
use crate::temporal::{add_days, days_between, SlaStatus};

/// Statuses reachable from `from` in a single step.
pub fn allowed_targets(from: JobStatus) -> &'static [JobStatus] {
    use JobStatus::*;
    match from {
        PendingQuote => &[Quoted, Declined],
        Quoted => &[QuoteReminded, Accepted, Declined],
        QuoteReminded => &[Accepted, Declined],
        Accepted => &[InProgress, OnHold, Cancelled],
        InProgress => &[Completed, OnHold, Cancelled],
        OnHold => &[InProgress, Cancelled],
        Completed | Cancelled | Declined => &[],
    }
}

pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Inputs a transition may need besides the job itself.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub now: DateTime<Utc>,
    pub config: &'a BillingConfig,
    /// Free-text explanation. Required for `OnHold`, recorded for
    /// `Cancelled` and `Declined`.
    pub reason: Option<&'a str>,
    /// The job's existing invoices, used by the deposit guard.
    pub invoices: &'a [Invoice],
}

impl<'a> TransitionContext<'a> {
    pub fn new(now: DateTime<Utc>, config: &'a BillingConfig) -> Self {
        Self {
            now,
            config,
            reason: None,
            invoices: &[],
        }
    }

    pub fn with_reason(mut self, reason: &'a str) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_invoices(mut self, invoices: &'a [Invoice]) -> Self {
        self.invoices = invoices;
        self
    }
}

/// Validates `job.status -> to` and returns the updated job. The input is
/// never modified, so a rejected transition leaves nothing to roll back.
pub fn transition(
    job: &Job,
    to: JobStatus,
    ctx: &TransitionContext<'_>,
) -> Result<Job, EngineError> {
    let from = job.status;
    if !can_transition(from, to) {
        return Err(EngineError::InvalidTransition {
            entity: "Job",
            key: job.job_number.clone(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let now = ctx.now;
    let mut next = job.clone();

    match to {
        JobStatus::Quoted => {
            next.quote_sent_at = Some(now);
            next.quote_valid_until =
                Some(add_days(now, i64::from(ctx.config.quote_validity_days)));
        }
        JobStatus::QuoteReminded => {
            next.append_note(now, "Quote reminder sent");
        }
        JobStatus::Accepted => {
            if next.turnaround_days == 0 {
                next.turnaround_days = ctx.config.default_turnaround_days;
            }
            next.quote_accepted_at = Some(now);
            next.sla_baseline_at = Some(now);
            next.due_date = Some(add_days(now, i64::from(next.turnaround_days)));
            next.sla_status = Some(SlaStatus::OnTrack);
        }
        JobStatus::InProgress => {
            if next.actual_start_at.is_none() {
                if let Some(deposit) = unpaid_deposit(ctx.invoices) {
                    return Err(EngineError::PreconditionFailed(format!(
                        "deposit invoice {} for job {} has not been paid",
                        deposit.invoice_number, job.job_number
                    )));
                }
                next.actual_start_at = Some(now);
            }
            if from == JobStatus::OnHold {
                resume_clock(&mut next, now);
            }
        }
        JobStatus::OnHold => {
            let reason = ctx.reason.map(str::trim).unwrap_or_default();
            if reason.is_empty() {
                return Err(EngineError::PreconditionFailed(
                    "an explanation is required to put a job on hold".to_string(),
                ));
            }
            // Freeze the derived status at the value it had when work stopped.
            if let Some(snapshot) = next.sla(now) {
                next.sla_status = Some(snapshot.status);
            }
            next.hold_started_at = Some(now);
            next.append_note(now, &format!("On hold: {}", reason));
        }
        JobStatus::Completed => {
            next.actual_completion_at = Some(now);
        }
        JobStatus::Cancelled => {
            next.hold_started_at = None;
            next.append_note(now, &with_reason("Cancelled", ctx.reason));
        }
        JobStatus::Declined => {
            next.append_note(now, &with_reason("Quote declined", ctx.reason));
        }
        JobStatus::PendingQuote => {}
    }

    next.status = to;
    if to.is_terminal() {
        next.sla_status = None;
    } else if let Some(snapshot) = next.sla(now) {
        next.sla_status = Some(snapshot.status);
    }
    next.last_updated_at = now;
    Ok(next)
}

/// First deposit invoice on the job that still blocks work from starting.
pub fn unpaid_deposit(invoices: &[Invoice]) -> Option<&Invoice> {
    invoices.iter().find(|i| {
        i.is_deposit() && !i.is_paid() && i.status != InvoiceStatus::Cancelled
    })
}

/// Moves the SLA baseline and due date forward by the whole days spent on
/// hold, so held time never counts against the turnaround promise.
fn resume_clock(job: &mut Job, now: DateTime<Utc>) {
    let Some(hold_started_at) = job.hold_started_at.take() else {
        return;
    };
    let held_days = days_between(hold_started_at, now).max(0);
    if let Some(baseline) = job.sla_baseline_at.or(job.quote_accepted_at) {
        job.sla_baseline_at = Some(add_days(baseline, held_days));
    }
    if let Some(due) = job.due_date {
        job.due_date = Some(add_days(due, held_days));
    }
    job.append_note(
        now,
        &format!(
            "Resumed after {} day{} on hold",
            held_days,
            if held_days == 1 { "" } else { "s" }
        ),
    );
}

fn with_reason(prefix: &str, reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{}: {}", prefix, reason),
        None => prefix.to_string(),
    }
}
