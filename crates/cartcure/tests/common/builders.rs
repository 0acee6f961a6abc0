//! Builders for jobs and invoices in arbitrary states.
//!
//! Scheduler tests need records that are days or weeks into their life;
//! these insert them directly instead of replaying every operation.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use cartcure::{
    ClientContact, Invoice, InvoiceStatus, InvoiceType, Job, JobStatus, PaymentStatus,
};

use super::harness::{d, CLIENT_EMAIL};

pub struct JobBuilder {
    job_number: String,
    status: JobStatus,
    email: Option<String>,
    amount: Decimal,
    turnaround_days: u32,
    accepted_at: Option<DateTime<Utc>>,
    payment_status: PaymentStatus,
}

impl JobBuilder {
    pub fn new(job_number: &str) -> Self {
        Self {
            job_number: job_number.to_string(),
            status: JobStatus::Accepted,
            email: Some(CLIENT_EMAIL.to_string()),
            amount: d("100.00"),
            turnaround_days: 7,
            accepted_at: None,
            payment_status: PaymentStatus::Unpaid,
        }
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn without_email(mut self) -> Self {
        self.email = None;
        self
    }

    /// Amount excluding tax; tax is left at zero.
    pub fn amount(mut self, amount: &str) -> Self {
        self.amount = d(amount);
        self
    }

    pub fn turnaround_days(mut self, days: u32) -> Self {
        self.turnaround_days = days;
        self
    }

    pub fn accepted_at(mut self, at: DateTime<Utc>) -> Self {
        self.accepted_at = Some(at);
        self
    }

    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = status;
        self
    }

    pub fn build(self, now: DateTime<Utc>) -> Job {
        let client = ClientContact {
            name: "Sarah".to_string(),
            email: self.email,
            phone: None,
        };
        let mut job = Job::new(self.job_number, client, "Theme fixes", now);
        job.status = self.status;
        job.quote_amount_excl_tax = self.amount;
        job.tax_amount = Decimal::ZERO;
        job.total_incl_tax = self.amount;
        job.turnaround_days = self.turnaround_days;
        job.payment_status = self.payment_status;
        if let Some(accepted) = self.accepted_at {
            job.quote_accepted_at = Some(accepted);
            job.sla_baseline_at = Some(accepted);
            job.due_date = Some(accepted + chrono::Duration::days(i64::from(self.turnaround_days)));
        }
        job
    }
}

pub struct InvoiceBuilder {
    invoice_number: String,
    job_number: String,
    email: Option<String>,
    total: Decimal,
    status: InvoiceStatus,
    invoice_type: InvoiceType,
    due_date: Option<DateTime<Utc>>,
}

impl InvoiceBuilder {
    pub fn new(invoice_number: &str, job_number: &str) -> Self {
        Self {
            invoice_number: invoice_number.to_string(),
            job_number: job_number.to_string(),
            email: Some(CLIENT_EMAIL.to_string()),
            total: d("100.00"),
            status: InvoiceStatus::Sent,
            invoice_type: InvoiceType::Full,
            due_date: None,
        }
    }

    pub fn total(mut self, total: &str) -> Self {
        self.total = d(total);
        self
    }

    pub fn status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn invoice_type(mut self, invoice_type: InvoiceType) -> Self {
        self.invoice_type = invoice_type;
        self
    }

    pub fn due(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn without_email(mut self) -> Self {
        self.email = None;
        self
    }

    /// Issued at `issued`, due seven days later unless set.
    pub fn build(self, issued: DateTime<Utc>) -> Invoice {
        let sent_at = match self.status {
            InvoiceStatus::Draft => None,
            _ => Some(issued),
        };
        Invoice {
            invoice_number: self.invoice_number,
            job_number: self.job_number,
            client: ClientContact {
                name: "Sarah".to_string(),
                email: self.email,
                phone: None,
            },
            invoice_date: issued,
            due_date: self
                .due_date
                .unwrap_or(issued + chrono::Duration::days(7)),
            amount_excl_tax: self.total,
            tax_amount: Decimal::ZERO,
            total: self.total,
            status: self.status,
            invoice_type: self.invoice_type,
            sent_at,
            paid_at: None,
            payment_method: None,
            payment_reference: None,
            days_overdue: 0,
            late_fee: Decimal::ZERO,
            total_with_fees: self.total,
            created_at: issued,
            last_updated_at: issued,
        }
    }
}
