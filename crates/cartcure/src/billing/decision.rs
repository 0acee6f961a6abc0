//! Chooses the next invoice for a job.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::BillingConfig;
use crate::model::{Invoice, InvoiceStatus, InvoiceType, Job};
use crate::money::{percent_of, split_inclusive, CENT_TOLERANCE};

/// Amounts are unrounded; they are rounded when the invoice is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoicePlan {
    pub invoice_type: InvoiceType,
    pub amount_excl_tax: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    /// Days after the invoice date that payment is due. Zero for deposits.
    pub due_in_days: u32,
    /// Non-blocking observations for the operator.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BillingDecision {
    Create(InvoicePlan),
    NothingDue { reason: String },
}

/// Decides the next invoice for `job` given its non-cancelled invoices in
/// creation order.
///
/// 1. No invoices: a `Full` invoice below the deposit threshold, otherwise
///    a `Deposit` for `deposit_percent` of the amount and the tax.
/// 2. One deposit and no balance: a `Balance` for whatever the deposit did
///    not cover.
/// 3. Otherwise an `Additional` invoice for any amount still uninvoiced.
///
/// Because a deposit raised on acceptance is one of `existing`, calling this
/// afterwards goes straight to step 2 instead of raising a second deposit.
pub fn decide(job: &Job, existing: &[Invoice], config: &BillingConfig) -> BillingDecision {
    let existing: Vec<&Invoice> = existing
        .iter()
        .filter(|i| i.status != InvoiceStatus::Cancelled)
        .collect();

    if job.total_incl_tax <= Decimal::ZERO {
        return BillingDecision::NothingDue {
            reason: format!("job {} has no quoted amount", job.job_number),
        };
    }

    if existing.is_empty() {
        return BillingDecision::Create(first_invoice(job, config));
    }

    let deposits: Vec<&&Invoice> = existing.iter().filter(|i| i.is_deposit()).collect();
    let has_balance = existing
        .iter()
        .any(|i| i.invoice_type == InvoiceType::Balance);

    if let ([deposit], false) = (deposits.as_slice(), has_balance) {
        let mut warnings = Vec::new();
        if !deposit.is_paid() {
            warnings.push(format!(
                "deposit invoice {} has not been paid yet",
                deposit.invoice_number
            ));
        }
        return BillingDecision::Create(InvoicePlan {
            invoice_type: InvoiceType::Balance,
            amount_excl_tax: job.quote_amount_excl_tax - deposit.amount_excl_tax,
            tax_amount: job.tax_amount - deposit.tax_amount,
            total: job.total_incl_tax - deposit.total,
            due_in_days: config.payment_terms_days,
            warnings,
        });
    }

    let invoiced: Decimal = existing.iter().map(|i| i.total).sum();
    let remaining = job.total_incl_tax - invoiced;
    if remaining > CENT_TOLERANCE {
        let (amount_excl_tax, tax_amount) = split_inclusive(remaining, config.tax_rate());
        BillingDecision::Create(InvoicePlan {
            invoice_type: InvoiceType::Additional,
            amount_excl_tax,
            tax_amount,
            total: remaining,
            due_in_days: config.payment_terms_days,
            warnings: Vec::new(),
        })
    } else {
        BillingDecision::NothingDue {
            reason: format!("job {} is fully invoiced", job.job_number),
        }
    }
}

/// True when a freshly accepted job needs a deposit before work starts.
pub fn requires_deposit(job: &Job, config: &BillingConfig) -> bool {
    job.total_incl_tax >= config.deposit_threshold
}

fn first_invoice(job: &Job, config: &BillingConfig) -> InvoicePlan {
    if requires_deposit(job, config) {
        let amount_excl_tax = percent_of(job.quote_amount_excl_tax, config.deposit_percent);
        let tax_amount = percent_of(job.tax_amount, config.deposit_percent);
        InvoicePlan {
            invoice_type: InvoiceType::Deposit,
            amount_excl_tax,
            tax_amount,
            total: amount_excl_tax + tax_amount,
            due_in_days: 0,
            warnings: Vec::new(),
        }
    } else {
        InvoicePlan {
            invoice_type: InvoiceType::Full,
            amount_excl_tax: job.quote_amount_excl_tax,
            tax_amount: job.tax_amount,
            total: job.total_incl_tax,
            due_in_days: config.payment_terms_days,
            warnings: Vec::new(),
        }
    }
}
