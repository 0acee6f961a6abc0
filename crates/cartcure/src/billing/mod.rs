//! Billing decisions and invoice construction.

pub mod decision;
pub mod numbering;

use chrono::{DateTime, Utc};

use crate::model::{Invoice, InvoiceStatus, Job};
use crate::money::round_cents;
use crate::temporal::add_days;

pub use decision::{decide, requires_deposit, BillingDecision, InvoicePlan};
pub use numbering::{invoice_number, next_free_invoice_number};

/// Materializes a plan as a `Draft` invoice. This is the only place plan
/// amounts are rounded.
pub fn build_invoice(
    job: &Job,
    plan: &InvoicePlan,
    invoice_number: String,
    now: DateTime<Utc>,
) -> Invoice {
    let amount_excl_tax = round_cents(plan.amount_excl_tax);
    let tax_amount = round_cents(plan.tax_amount);
    let total = amount_excl_tax + tax_amount;
    Invoice {
        invoice_number,
        job_number: job.job_number.clone(),
        client: job.client.clone(),
        invoice_date: now,
        due_date: add_days(now, i64::from(plan.due_in_days)),
        amount_excl_tax,
        tax_amount,
        total,
        status: InvoiceStatus::Draft,
        invoice_type: plan.invoice_type,
        sent_at: None,
        paid_at: None,
        payment_method: None,
        payment_reference: None,
        days_overdue: 0,
        late_fee: rust_decimal::Decimal::ZERO,
        total_with_fees: total,
        created_at: now,
        last_updated_at: now,
    }
}
