//! Invoice status transitions and the job-side effects they carry.
//!
//! Functions that touch both an invoice and its job return both updated
//! records so the caller can persist them in one transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::model::{Invoice, InvoiceStatus, Job, PaymentDetails, PaymentStatus};
use crate::money::CENT_TOLERANCE;
use crate::temporal::LateFee;

pub fn allowed_targets(from: InvoiceStatus) -> &'static [InvoiceStatus] {
    use InvoiceStatus::*;
    match from {
        Draft => &[Sent, Cancelled],
        Sent => &[Paid, Overdue, Cancelled],
        Overdue => &[Paid, Cancelled],
        Paid | Cancelled => &[],
    }
}

pub fn can_transition(from: InvoiceStatus, to: InvoiceStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Validates `invoice.status -> to` and returns the updated invoice.
///
/// Moving to `Paid` requires `payment`.
pub fn transition(
    invoice: &Invoice,
    to: InvoiceStatus,
    now: DateTime<Utc>,
    payment: Option<&PaymentDetails>,
) -> Result<Invoice, EngineError> {
    if !can_transition(invoice.status, to) {
        return Err(EngineError::InvalidTransition {
            entity: "Invoice",
            key: invoice.invoice_number.clone(),
            from: invoice.status.to_string(),
            to: to.to_string(),
        });
    }

    let mut next = invoice.clone();
    match to {
        InvoiceStatus::Sent => next.sent_at = Some(now),
        InvoiceStatus::Paid => {
            let payment = payment
                .filter(|p| !p.method.trim().is_empty())
                .ok_or_else(|| {
                    EngineError::PreconditionFailed("a payment method is required".to_string())
                })?;
            next.paid_at = Some(now);
            next.payment_method = Some(payment.method.trim().to_string());
            next.payment_reference = payment
                .reference
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
        }
        InvoiceStatus::Draft | InvoiceStatus::Overdue | InvoiceStatus::Cancelled => {}
    }
    next.status = to;
    next.last_updated_at = now;
    Ok(next)
}

/// `Draft -> Sent`, marking the job as invoiced.
pub fn apply_invoice_sent(
    job: &Job,
    invoice: &Invoice,
    now: DateTime<Utc>,
) -> Result<(Job, Invoice), EngineError> {
    let sent = transition(invoice, InvoiceStatus::Sent, now, None)?;
    let mut job = job.clone();
    job.payment_status = PaymentStatus::Invoiced;
    job.last_updated_at = now;
    Ok((job, sent))
}

/// `-> Paid`, copying the payment onto the job.
///
/// `others` are the job's remaining invoices. The job becomes `Paid` once the
/// paid invoices cover its total, otherwise `PartiallyPaid`.
pub fn apply_invoice_paid(
    job: &Job,
    invoice: &Invoice,
    others: &[Invoice],
    payment: &PaymentDetails,
    now: DateTime<Utc>,
) -> Result<(Job, Invoice), EngineError> {
    let paid = transition(invoice, InvoiceStatus::Paid, now, Some(payment))?;

    let paid_total: Decimal = others
        .iter()
        .filter(|i| i.invoice_number != paid.invoice_number && i.is_paid())
        .map(|i| i.total)
        .sum::<Decimal>()
        + paid.total;

    let mut job = job.clone();
    job.payment_status = if paid_total + CENT_TOLERANCE >= job.total_incl_tax {
        PaymentStatus::Paid
    } else {
        PaymentStatus::PartiallyPaid
    };
    job.payment_date = paid.paid_at;
    job.payment_method = paid.payment_method.clone();
    job.payment_reference = paid.payment_reference.clone();
    job.last_updated_at = now;
    Ok((job, paid))
}

/// `-> Cancelled`, noting it on the job and recomputing the job's payment
/// status from the invoices that remain.
pub fn apply_invoice_cancelled(
    job: &Job,
    invoice: &Invoice,
    others: &[Invoice],
    reason: &str,
    now: DateTime<Utc>,
) -> Result<(Job, Invoice), EngineError> {
    let cancelled = transition(invoice, InvoiceStatus::Cancelled, now, None)?;

    let remaining: Vec<&Invoice> = others
        .iter()
        .filter(|i| i.invoice_number != cancelled.invoice_number)
        .collect();

    let mut job = job.clone();
    if job.payment_status == PaymentStatus::Invoiced
        && !remaining.iter().any(|i| i.status.is_open())
    {
        job.payment_status = if remaining.iter().any(|i| i.is_paid()) {
            PaymentStatus::PartiallyPaid
        } else {
            PaymentStatus::Unpaid
        };
    }
    let note = match reason.trim() {
        "" => format!("Invoice {} cancelled", cancelled.invoice_number),
        reason => format!("Invoice {} cancelled: {}", cancelled.invoice_number, reason),
    };
    job.append_note(now, &note);
    job.last_updated_at = now;
    Ok((job, cancelled))
}

/// Records the current late fee on an open invoice and moves a `Sent`
/// invoice to `Overdue`.
pub fn apply_late_fee(
    invoice: &Invoice,
    fee: &LateFee,
    now: DateTime<Utc>,
) -> Result<Invoice, EngineError> {
    if !invoice.status.is_open() {
        return Err(EngineError::InvalidTransition {
            entity: "Invoice",
            key: invoice.invoice_number.clone(),
            from: invoice.status.to_string(),
            to: InvoiceStatus::Overdue.to_string(),
        });
    }
    let mut next = if invoice.status == InvoiceStatus::Sent {
        transition(invoice, InvoiceStatus::Overdue, now, None)?
    } else {
        invoice.clone()
    };
    next.days_overdue = fee.days_overdue;
    next.late_fee = fee.fee;
    next.total_with_fees = fee.total_with_fee;
    next.last_updated_at = now;
    Ok(next)
}
