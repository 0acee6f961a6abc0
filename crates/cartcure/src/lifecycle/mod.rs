//! Job and invoice state machines.
//!
//! Every function here is pure: it takes the current records and returns
//! the updated ones, leaving persistence and notification to the engine.

pub mod invoice_machine;
pub mod job_machine;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BillingConfig;
use crate::error::EngineError;
use crate::model::{Invoice, InvoiceStatus, Job, JobStatus, PaymentStatus};

pub use job_machine::{transition as transition_job, TransitionContext};

/// Outcome of cancelling a job together with its unsettled invoices.
#[derive(Debug, Clone, Serialize)]
pub struct Cancellation {
    pub job: Job,
    pub cancelled_invoices: Vec<Invoice>,
}

/// Cancels `job` and every `Draft`/`Sent`/`Overdue` invoice it has.
///
/// With `refund`, the job's payment status becomes `Refunded` and a note
/// records it. Paid invoices are left untouched.
pub fn cancel_job_with_invoices(
    job: &Job,
    invoices: &[Invoice],
    reason: &str,
    refund: bool,
    now: DateTime<Utc>,
    config: &BillingConfig,
) -> Result<Cancellation, EngineError> {
    let ctx = TransitionContext::new(now, config)
        .with_reason(reason)
        .with_invoices(invoices);
    let mut job = job_machine::transition(job, JobStatus::Cancelled, &ctx)?;

    let mut cancelled_invoices = Vec::new();
    for invoice in invoices.iter().filter(|i| !i.status.is_settled()) {
        cancelled_invoices.push(invoice_machine::transition(
            invoice,
            InvoiceStatus::Cancelled,
            now,
            None,
        )?);
    }

    if refund {
        job.payment_status = PaymentStatus::Refunded;
        job.append_note(now, "Refund issued");
    }

    Ok(Cancellation {
        job,
        cancelled_invoices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClientContact, InvoiceType};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap()
    }

    fn invoice(number: &str, status: InvoiceStatus) -> Invoice {
        Invoice {
            invoice_number: number.into(),
            job_number: "J-0200".into(),
            client: ClientContact {
                name: "Ana".into(),
                email: None,
                phone: None,
            },
            invoice_date: now(),
            due_date: now(),
            amount_excl_tax: Decimal::ONE_HUNDRED,
            tax_amount: Decimal::ZERO,
            total: Decimal::ONE_HUNDRED,
            status,
            invoice_type: InvoiceType::Additional,
            sent_at: None,
            paid_at: None,
            payment_method: None,
            payment_reference: None,
            days_overdue: 0,
            late_fee: Decimal::ZERO,
            total_with_fees: Decimal::ONE_HUNDRED,
            created_at: now(),
            last_updated_at: now(),
        }
    }

    #[test]
    fn test_cancel_sweeps_open_invoices() {
        let mut job = Job::new(
            "J-0200",
            ClientContact {
                name: "Ana".into(),
                email: None,
                phone: None,
            },
            "Migrate store",
            now(),
        );
        job.status = JobStatus::InProgress;
        let invoices = vec![
            invoice("INV-0200", InvoiceStatus::Paid),
            invoice("INV-0200-2", InvoiceStatus::Sent),
            invoice("INV-0200-3", InvoiceStatus::Draft),
            invoice("INV-0200-4", InvoiceStatus::Cancelled),
        ];

        let result = cancel_job_with_invoices(
            &job,
            &invoices,
            "Client changed platform",
            true,
            now(),
            &BillingConfig::default(),
        )
        .unwrap();

        assert_eq!(result.job.status, JobStatus::Cancelled);
        assert_eq!(result.job.payment_status, PaymentStatus::Refunded);
        assert!(result.job.notes.contains("Cancelled: Client changed platform"));
        assert!(result.job.notes.contains("Refund issued"));
        let numbers: Vec<_> = result
            .cancelled_invoices
            .iter()
            .map(|i| i.invoice_number.as_str())
            .collect();
        assert_eq!(numbers, vec!["INV-0200-2", "INV-0200-3"]);
        assert!(result
            .cancelled_invoices
            .iter()
            .all(|i| i.status == InvoiceStatus::Cancelled));
    }

    #[test]
    fn test_cannot_cancel_quote() {
        let job = Job::new(
            "J-0201",
            ClientContact {
                name: "Ana".into(),
                email: None,
                phone: None,
            },
            "Audit",
            now(),
        );
        let err =
            cancel_job_with_invoices(&job, &[], "", false, now(), &BillingConfig::default())
                .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }
}
