//! Job record: one billable unit of work from quote to completion.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::text_enum;
use crate::money::{round_cents, tax_on};
use crate::temporal::{compute_sla_status, SlaSnapshot, SlaStatus};

text_enum! {
    /// Lifecycle status of a job.
    JobStatus {
        PendingQuote => "pending_quote",
        Quoted => "quoted",
        QuoteReminded => "quote_reminded",
        Accepted => "accepted",
        InProgress => "in_progress",
        OnHold => "on_hold",
        Completed => "completed",
        Cancelled => "cancelled",
        Declined => "declined",
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Declined
        )
    }

    /// Statuses in which the turnaround clock is running.
    pub fn sla_active(&self) -> bool {
        matches!(self, JobStatus::Accepted | JobStatus::InProgress)
    }

    /// Statuses in which invoices may be raised.
    pub fn billable(&self) -> bool {
        matches!(
            self,
            JobStatus::Accepted | JobStatus::InProgress | JobStatus::OnHold | JobStatus::Completed
        )
    }
}

text_enum! {
    /// Payment position of a job as a whole.
    PaymentStatus {
        Unpaid => "unpaid",
        Invoiced => "invoiced",
        PartiallyPaid => "partially_paid",
        Paid => "paid",
        Refunded => "refunded",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ClientContact {
    /// The email address, if present and non-blank.
    pub fn email_address(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Immutable once assigned.
    pub job_number: String,
    pub status: JobStatus,
    pub client: ClientContact,
    pub store_reference: Option<String>,
    pub description: String,
    pub category: Option<String>,
    pub quote_amount_excl_tax: Decimal,
    pub tax_amount: Decimal,
    pub total_incl_tax: Decimal,
    pub quote_sent_at: Option<DateTime<Utc>>,
    pub quote_valid_until: Option<DateTime<Utc>>,
    pub quote_accepted_at: Option<DateTime<Utc>>,
    pub turnaround_days: u32,
    pub due_date: Option<DateTime<Utc>>,
    /// Derived; recomputed on demand and on every scheduler pass.
    pub sla_status: Option<SlaStatus>,
    /// Start of the turnaround clock. Equals `quote_accepted_at` until the
    /// job has been on hold, then shifted forward by the time held.
    pub sla_baseline_at: Option<DateTime<Utc>>,
    pub hold_started_at: Option<DateTime<Utc>>,
    pub actual_start_at: Option<DateTime<Utc>>,
    pub actual_completion_at: Option<DateTime<Utc>>,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    /// Append-only free-text log, one entry per line.
    pub notes: String,
    pub source_submission_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Job {
    /// A new job awaiting a quote.
    pub fn new(
        job_number: impl Into<String>,
        client: ClientContact,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_number: job_number.into(),
            status: JobStatus::PendingQuote,
            client,
            store_reference: None,
            description: description.into(),
            category: None,
            quote_amount_excl_tax: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_incl_tax: Decimal::ZERO,
            quote_sent_at: None,
            quote_valid_until: None,
            quote_accepted_at: None,
            turnaround_days: 0,
            due_date: None,
            sla_status: None,
            sla_baseline_at: None,
            hold_started_at: None,
            actual_start_at: None,
            actual_completion_at: None,
            payment_status: PaymentStatus::Unpaid,
            payment_date: None,
            payment_method: None,
            payment_reference: None,
            notes: String::new(),
            source_submission_id: None,
            created_at: now,
            last_updated_at: now,
        }
    }

    /// Sets the quoted amount and derives tax and total from it.
    ///
    /// `tax_rate` of `None` means tax is inactive and the total equals the
    /// exclusive amount.
    pub fn set_quote(&mut self, amount_excl_tax: Decimal, tax_rate: Option<Decimal>) {
        self.quote_amount_excl_tax = round_cents(amount_excl_tax);
        self.tax_amount = round_cents(tax_on(self.quote_amount_excl_tax, tax_rate));
        self.total_incl_tax = self.quote_amount_excl_tax + self.tax_amount;
    }

    /// Appends a timestamped line to the notes log.
    pub fn append_note(&mut self, at: DateTime<Utc>, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes
            .push_str(&format!("[{}] {}", at.format("%Y-%m-%d %H:%M"), text));
    }

    /// Live turnaround position. `None` unless the clock is running.
    pub fn sla(&self, now: DateTime<Utc>) -> Option<SlaSnapshot> {
        if !self.status.sla_active() {
            return None;
        }
        let baseline = self.sla_baseline_at.or(self.quote_accepted_at)?;
        Some(compute_sla_status(baseline, self.turnaround_days, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
    }

    fn job() -> Job {
        Job::new(
            "J-0042",
            ClientContact {
                name: "Sarah Smith".into(),
                email: Some("sarah@example.com".into()),
                phone: None,
            },
            "Add size guide popup",
            now(),
        )
    }

    #[test]
    fn test_set_quote_with_tax() {
        let mut job = job();
        job.set_quote(Decimal::from(200), Some(Decimal::from_str("0.15").unwrap()));
        assert_eq!(job.tax_amount, Decimal::from_str("30.00").unwrap());
        assert_eq!(job.total_incl_tax, Decimal::from_str("230.00").unwrap());
        assert_eq!(job.total_incl_tax, job.quote_amount_excl_tax + job.tax_amount);
    }

    #[test]
    fn test_set_quote_without_tax() {
        let mut job = job();
        job.set_quote(Decimal::from_str("149.999").unwrap(), None);
        assert_eq!(job.quote_amount_excl_tax, Decimal::from_str("150.00").unwrap());
        assert_eq!(job.tax_amount, Decimal::ZERO);
        assert_eq!(job.total_incl_tax, job.quote_amount_excl_tax);
    }

    #[test]
    fn test_notes_are_appended() {
        let mut job = job();
        job.append_note(now(), "Waiting on theme access");
        job.append_note(now(), "   ");
        job.append_note(now() + Duration::hours(2), "Access granted");
        let lines: Vec<&str> = job.notes.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[2026-02-01 09:00] Waiting on theme access");
    }

    #[test]
    fn test_sla_undefined_before_acceptance() {
        let job = job();
        assert!(job.sla(now()).is_none());
    }

    #[test]
    fn test_blank_email_is_treated_as_missing() {
        let mut job = job();
        job.client.email = Some("  ".into());
        assert!(job.client.email_address().is_none());
    }
}
