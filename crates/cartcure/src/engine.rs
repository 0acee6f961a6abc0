//! Lifecycle engine: one entry point per job or invoice operation.
//!
//! Each operation reads the records it needs, applies a pure transition from
//! [`crate::lifecycle`] or [`crate::billing`], and writes the result in a
//! single transaction. Notifications and activity entries follow the commit
//! and never undo it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::billing::{self, BillingDecision};
use crate::clock::Clock;
use crate::config::{BillingConfig, BusinessProfile};
use crate::db::activity_repo::{self, ActivityEntry};
use crate::db::{invoice_repo, job_repo, notification_repo, Database};
use crate::error::EngineError;
use crate::intake::{self, Submission};
use crate::lifecycle::{self, invoice_machine, job_machine, Cancellation, TransitionContext};
use crate::model::{ClientContact, Invoice, InvoiceType, Job, JobStatus, PaymentDetails};
use crate::notify::{templates, Notifier, OutboundEmail};
use crate::sanitize::redact_email;

/// What became of a best-effort notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Delivery {
    Sent,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Acceptance {
    pub job: Job,
    /// Deposit invoice raised and sent on acceptance, if the total required one.
    pub deposit: Option<Invoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedInvoice {
    pub invoice: Invoice,
    pub warnings: Vec<String>,
}

pub struct LifecycleEngine {
    db: Database,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: BillingConfig,
    business: BusinessProfile,
}

impl LifecycleEngine {
    pub fn new(
        db: Database,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: BillingConfig,
        business: BusinessProfile,
    ) -> Self {
        Self {
            db,
            notifier,
            clock,
            config,
            business,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn business(&self) -> &BusinessProfile {
        &self.business
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn job(&self, job_number: &str) -> Result<Job, EngineError> {
        self.db
            .with_conn(|conn| job_repo::find_by_number(conn, job_number))?
            .ok_or_else(|| EngineError::job_not_found(job_number))
    }

    pub fn invoice(&self, invoice_number: &str) -> Result<Invoice, EngineError> {
        self.db
            .with_conn(|conn| invoice_repo::find_by_number(conn, invoice_number))?
            .ok_or_else(|| EngineError::invoice_not_found(invoice_number))
    }

    pub fn invoices_for_job(&self, job_number: &str) -> Result<Vec<Invoice>, EngineError> {
        Ok(self
            .db
            .with_conn(|conn| invoice_repo::list_for_job(conn, job_number))?)
    }

    // ------------------------------------------------------------------
    // Job operations
    // ------------------------------------------------------------------

    /// Creates a `PendingQuote` job for an intake submission.
    pub fn create_job_from_submission(&self, submission: &Submission) -> Result<Job, EngineError> {
        let _span = info_span!(
            "create_job",
            submission = %submission.submission_number
        )
        .entered();

        if submission.description.trim().is_empty() {
            return Err(EngineError::PreconditionFailed(
                "the submission has no description".to_string(),
            ));
        }

        let now = self.clock.now();
        let job = self.db.with_transaction(|tx| {
            let base = intake::base_job_number(&submission.submission_number);
            let number = intake::next_free_job_number(&base, |n| job_repo::exists(tx, n))?;

            let mut job = Job::new(
                number,
                submission.client.clone(),
                submission.description.trim(),
                now,
            );
            job.store_reference = submission.store_reference.clone();
            job.category = submission.category.clone();
            job.source_submission_id = Some(submission.submission_number.clone());
            job_repo::insert(tx, &job)?;
            Ok::<_, EngineError>(job)
        })?;

        info!(job = %job.job_number, "Job created");
        self.record_activity(
            "job",
            &job.job_number,
            "created",
            Some(format!("from submission {}", submission.submission_number)),
        );
        Ok(job)
    }

    /// Prices the job and sends the quote (`PendingQuote -> Quoted`).
    pub fn send_quote(
        &self,
        job_number: &str,
        amount_excl_tax: Decimal,
        turnaround_days: Option<u32>,
    ) -> Result<Job, EngineError> {
        let _span = info_span!("send_quote", job = %job_number).entered();

        if amount_excl_tax <= Decimal::ZERO {
            return Err(EngineError::PreconditionFailed(
                "the quote amount must be greater than zero".to_string(),
            ));
        }

        let now = self.clock.now();
        let job = self.db.with_transaction(|tx| {
            let job = load_job(tx, job_number)?;
            let ctx = TransitionContext::new(now, &self.config);
            let mut quoted = job_machine::transition(&job, JobStatus::Quoted, &ctx)?;
            quoted.set_quote(amount_excl_tax, self.config.tax_rate());
            quoted.turnaround_days = turnaround_days
                .filter(|days| *days > 0)
                .unwrap_or(self.config.default_turnaround_days);
            job_repo::update(tx, &quoted)?;
            Ok::<_, EngineError>(quoted)
        })?;

        info!(total = %job.total_incl_tax, "Quote issued");
        self.record_activity(
            "job",
            job_number,
            "quote_sent",
            Some(format!("total {}", job.total_incl_tax)),
        );
        self.notify_client(&job.client, job_number, |to| {
            templates::quote_sent(to, &job, &self.business)
        });
        Ok(job)
    }

    /// Accepts the quote. When the total meets the deposit threshold the
    /// deposit invoice is raised and sent in the same transaction.
    pub fn accept_quote(&self, job_number: &str) -> Result<Acceptance, EngineError> {
        let _span = info_span!("accept_quote", job = %job_number).entered();

        let now = self.clock.now();
        let acceptance = self.db.with_transaction(|tx| {
            let job = load_job(tx, job_number)?;
            let invoices = invoice_repo::list_for_job(tx, job_number)?;
            let ctx = TransitionContext::new(now, &self.config).with_invoices(&invoices);
            let mut accepted = job_machine::transition(&job, JobStatus::Accepted, &ctx)?;

            let mut deposit = None;
            if billing::requires_deposit(&accepted, &self.config) {
                if let BillingDecision::Create(plan) =
                    billing::decide(&accepted, &invoices, &self.config)
                {
                    if plan.invoice_type == InvoiceType::Deposit {
                        let number = free_invoice_number(tx, &accepted.job_number, invoices.len())?;
                        let draft = billing::build_invoice(&accepted, &plan, number, now);
                        invoice_repo::insert(tx, &draft)?;
                        let (job, sent) =
                            invoice_machine::apply_invoice_sent(&accepted, &draft, now)?;
                        invoice_repo::update(tx, &sent)?;
                        accepted = job;
                        deposit = Some(sent);
                    }
                }
            }

            job_repo::update(tx, &accepted)?;
            Ok::<_, EngineError>(Acceptance {
                job: accepted,
                deposit,
            })
        })?;

        let job = &acceptance.job;
        info!(
            due = ?job.due_date,
            deposit = acceptance.deposit.is_some(),
            "Quote accepted"
        );
        self.record_activity("job", job_number, "quote_accepted", None);
        self.notify_client(&job.client, job_number, |to| {
            templates::quote_accepted(to, job, acceptance.deposit.as_ref(), &self.business)
        });
        if let Some(deposit) = &acceptance.deposit {
            self.record_activity(
                "invoice",
                &deposit.invoice_number,
                "sent",
                Some(format!("deposit {}", deposit.total)),
            );
            self.notify_client(&deposit.client, &deposit.invoice_number, |to| {
                templates::invoice_issued(to, deposit, &self.business)
            });
        }
        Ok(acceptance)
    }

    pub fn decline_quote(&self, job_number: &str, reason: &str) -> Result<Job, EngineError> {
        let _span = info_span!("decline_quote", job = %job_number).entered();

        let (_, job) = self.transition_job(job_number, JobStatus::Declined, Some(reason), None)?;

        self.record_activity("job", job_number, "declined", non_empty(reason));
        self.notify_client(&job.client, job_number, |to| {
            templates::quote_declined(to, &job, &self.business)
        });
        self.alert_admin(
            "Quote declined",
            &format!("Job {} was declined. {}", job_number, reason.trim()),
        );
        Ok(job)
    }

    /// Starts work on an accepted job. Blocked while a deposit is unpaid.
    pub fn start_work(&self, job_number: &str) -> Result<Job, EngineError> {
        let _span = info_span!("start_work", job = %job_number).entered();

        let (from, job) = self.transition_job(job_number, JobStatus::InProgress, None, None)?;

        if from == JobStatus::OnHold {
            self.record_activity("job", job_number, "resumed", None);
            self.notify_client(&job.client, job_number, |to| {
                templates::work_resumed(to, &job, &self.business)
            });
        } else {
            self.record_activity("job", job_number, "started", None);
            self.notify_client(&job.client, job_number, |to| {
                templates::work_started(to, &job, &self.business)
            });
        }
        Ok(job)
    }

    pub fn put_on_hold(&self, job_number: &str, reason: &str) -> Result<Job, EngineError> {
        let _span = info_span!("put_on_hold", job = %job_number).entered();

        let (_, job) = self.transition_job(job_number, JobStatus::OnHold, Some(reason), None)?;

        self.record_activity("job", job_number, "on_hold", non_empty(reason));
        self.notify_client(&job.client, job_number, |to| {
            templates::on_hold(to, &job, reason.trim(), &self.business)
        });
        Ok(job)
    }

    /// `OnHold -> InProgress`, excluding the held days from the SLA.
    pub fn resume_work(&self, job_number: &str) -> Result<Job, EngineError> {
        let _span = info_span!("resume_work", job = %job_number).entered();

        let (_, job) = self.transition_job(
            job_number,
            JobStatus::InProgress,
            None,
            Some(JobStatus::OnHold),
        )?;

        self.record_activity("job", job_number, "resumed", None);
        self.notify_client(&job.client, job_number, |to| {
            templates::work_resumed(to, &job, &self.business)
        });
        Ok(job)
    }

    pub fn complete_job(&self, job_number: &str) -> Result<Job, EngineError> {
        let _span = info_span!("complete_job", job = %job_number).entered();

        let (_, job) = self.transition_job(job_number, JobStatus::Completed, None, None)?;

        self.record_activity("job", job_number, "completed", None);
        self.notify_client(&job.client, job_number, |to| {
            templates::job_completed(to, &job, &self.business)
        });
        Ok(job)
    }

    /// Cancels the job and its unsettled invoices together.
    pub fn cancel_job(
        &self,
        job_number: &str,
        reason: &str,
        refund: bool,
    ) -> Result<Cancellation, EngineError> {
        let _span = info_span!("cancel_job", job = %job_number, refund).entered();

        let now = self.clock.now();
        let cancellation = self.db.with_transaction(|tx| {
            let job = load_job(tx, job_number)?;
            let invoices = invoice_repo::list_for_job(tx, job_number)?;
            let cancellation = lifecycle::cancel_job_with_invoices(
                &job,
                &invoices,
                reason,
                refund,
                now,
                &self.config,
            )?;
            job_repo::update(tx, &cancellation.job)?;
            for invoice in &cancellation.cancelled_invoices {
                invoice_repo::update(tx, invoice)?;
            }
            Ok::<_, EngineError>(cancellation)
        })?;

        info!(
            invoices_cancelled = cancellation.cancelled_invoices.len(),
            "Job cancelled"
        );
        self.record_activity("job", job_number, "cancelled", non_empty(reason));
        for invoice in &cancellation.cancelled_invoices {
            self.record_activity(
                "invoice",
                &invoice.invoice_number,
                "cancelled",
                Some(format!("job {} cancelled", job_number)),
            );
        }

        let job = &cancellation.job;
        self.notify_client(&job.client, job_number, |to| {
            templates::job_cancelled(to, job, reason, refund, &self.business)
        });
        self.alert_admin(
            "Job cancelled",
            &format!(
                "Job {} was cancelled{}. {}",
                job_number,
                if refund { " with a refund" } else { "" },
                reason.trim()
            ),
        );
        Ok(cancellation)
    }

    // ------------------------------------------------------------------
    // Invoice operations
    // ------------------------------------------------------------------

    /// Raises the next invoice the billing rules call for, as a `Draft`.
    ///
    /// Returns `AlreadySatisfied` when nothing more is due.
    pub fn generate_next_invoice(&self, job_number: &str) -> Result<GeneratedInvoice, EngineError> {
        let _span = info_span!("generate_next_invoice", job = %job_number).entered();

        let now = self.clock.now();
        let generated = self.db.with_transaction(|tx| {
            let job = load_job(tx, job_number)?;
            if !job.status.billable() {
                return Err(EngineError::PreconditionFailed(format!(
                    "job {} is {}; invoices can only be raised once the quote is accepted",
                    job_number, job.status
                )));
            }

            let invoices = invoice_repo::list_for_job(tx, job_number)?;
            match billing::decide(&job, &invoices, &self.config) {
                BillingDecision::NothingDue { reason } => {
                    Err(EngineError::AlreadySatisfied(reason))
                }
                BillingDecision::Create(plan) => {
                    let number = free_invoice_number(tx, job_number, invoices.len())?;
                    let invoice = billing::build_invoice(&job, &plan, number, now);
                    invoice_repo::insert(tx, &invoice)?;
                    Ok(GeneratedInvoice {
                        invoice,
                        warnings: plan.warnings,
                    })
                }
            }
        })?;

        for warning in &generated.warnings {
            warn!(invoice = %generated.invoice.invoice_number, "{}", warning);
        }
        info!(
            invoice = %generated.invoice.invoice_number,
            invoice_type = %generated.invoice.invoice_type,
            total = %generated.invoice.total,
            "Invoice created"
        );
        self.record_activity(
            "invoice",
            &generated.invoice.invoice_number,
            "created",
            Some(format!(
                "{} invoice for {}",
                generated.invoice.invoice_type, generated.invoice.total
            )),
        );
        Ok(generated)
    }

    /// `Draft -> Sent`, marking the job as invoiced and emailing the client.
    pub fn send_invoice(&self, invoice_number: &str) -> Result<Invoice, EngineError> {
        let _span = info_span!("send_invoice", invoice = %invoice_number).entered();

        let now = self.clock.now();
        let invoice = self.db.with_transaction(|tx| {
            let invoice = load_invoice(tx, invoice_number)?;
            let job = load_job(tx, &invoice.job_number)?;
            let (job, sent) = invoice_machine::apply_invoice_sent(&job, &invoice, now)?;
            invoice_repo::update(tx, &sent)?;
            job_repo::update(tx, &job)?;
            Ok::<_, EngineError>(sent)
        })?;

        self.record_activity("invoice", invoice_number, "sent", None);
        self.notify_client(&invoice.client, invoice_number, |to| {
            templates::invoice_issued(to, &invoice, &self.business)
        });
        Ok(invoice)
    }

    /// Records payment of an invoice on both the invoice and its job, then
    /// sends a receipt.
    pub fn mark_invoice_paid(
        &self,
        invoice_number: &str,
        method: &str,
        reference: Option<&str>,
    ) -> Result<Invoice, EngineError> {
        let _span = info_span!("mark_invoice_paid", invoice = %invoice_number).entered();

        let payment = PaymentDetails {
            method: method.to_string(),
            reference: reference.map(str::to_string),
        };
        let now = self.clock.now();
        let (job, invoice) = self.db.with_transaction(|tx| {
            let invoice = load_invoice(tx, invoice_number)?;
            let job = load_job(tx, &invoice.job_number)?;
            let all = invoice_repo::list_for_job(tx, &invoice.job_number)?;
            let (job, paid) =
                invoice_machine::apply_invoice_paid(&job, &invoice, &all, &payment, now)?;
            invoice_repo::update(tx, &paid)?;
            job_repo::update(tx, &job)?;
            Ok::<_, EngineError>((job, paid))
        })?;

        info!(job_payment_status = %job.payment_status, "Payment recorded");
        self.record_activity(
            "invoice",
            invoice_number,
            "paid",
            Some(format!("{} via {}", invoice.total, method)),
        );

        let receipt_key = format!("receipt:{}", invoice_number);
        if !self.already_notified(&receipt_key) {
            let delivery = self.notify_client(&invoice.client, invoice_number, |to| {
                templates::payment_receipt(to, &invoice, &self.business)
            });
            if delivery == Delivery::Sent {
                self.remember_notification(&receipt_key);
            }
        }
        self.alert_admin(
            "Payment received",
            &format!(
                "Invoice {} for job {} was paid ({} via {}). Job is now {}.",
                invoice_number, job.job_number, invoice.total, method, job.payment_status
            ),
        );
        Ok(invoice)
    }

    pub fn cancel_invoice(
        &self,
        invoice_number: &str,
        reason: &str,
    ) -> Result<Invoice, EngineError> {
        let _span = info_span!("cancel_invoice", invoice = %invoice_number).entered();

        let now = self.clock.now();
        let invoice = self.db.with_transaction(|tx| {
            let invoice = load_invoice(tx, invoice_number)?;
            let job = load_job(tx, &invoice.job_number)?;
            let all = invoice_repo::list_for_job(tx, &invoice.job_number)?;
            let (job, cancelled) =
                invoice_machine::apply_invoice_cancelled(&job, &invoice, &all, reason, now)?;
            invoice_repo::update(tx, &cancelled)?;
            job_repo::update(tx, &job)?;
            Ok::<_, EngineError>(cancelled)
        })?;

        self.record_activity("invoice", invoice_number, "cancelled", non_empty(reason));
        Ok(invoice)
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    /// Loads, transitions and writes a job in one transaction. Returns the
    /// status the job had before.
    fn transition_job(
        &self,
        job_number: &str,
        to: JobStatus,
        reason: Option<&str>,
        expected_from: Option<JobStatus>,
    ) -> Result<(JobStatus, Job), EngineError> {
        let now = self.clock.now();
        let result = self.db.with_transaction(|tx| {
            let job = load_job(tx, job_number)?;
            if let Some(expected) = expected_from {
                if job.status != expected {
                    return Err(EngineError::InvalidTransition {
                        entity: "Job",
                        key: job_number.to_string(),
                        from: job.status.to_string(),
                        to: to.to_string(),
                    });
                }
            }
            let invoices = invoice_repo::list_for_job(tx, job_number)?;
            let mut ctx = TransitionContext::new(now, &self.config).with_invoices(&invoices);
            if let Some(reason) = reason {
                ctx = ctx.with_reason(reason);
            }
            let next = job_machine::transition(&job, to, &ctx)?;
            job_repo::update(tx, &next)?;
            Ok((job.status, next))
        })?;
        info!(from = %result.0, to = %to, "Job transitioned");
        Ok(result)
    }

    /// Emails a client, skipping with a warning when no address is on file.
    pub(crate) fn notify_client(
        &self,
        client: &ClientContact,
        key: &str,
        build: impl FnOnce(&str) -> OutboundEmail,
    ) -> Delivery {
        match client.email_address() {
            Some(to) => self.deliver(&build(to)),
            None => {
                warn!(key, "No client email on record, notification skipped");
                Delivery::Skipped("no client email on record".to_string())
            }
        }
    }

    pub(crate) fn deliver(&self, email: &OutboundEmail) -> Delivery {
        match self.notifier.send(email) {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                warn!(
                    to = %redact_email(&email.to),
                    subject = %email.subject,
                    error = %e,
                    "Notification failed"
                );
                Delivery::Failed(e.to_string())
            }
        }
    }

    fn alert_admin(&self, subject: &str, detail: &str) {
        self.deliver(&templates::admin_alert(subject, detail, &self.business));
    }

    /// Appends to the activity log. Failures are logged and ignored.
    pub(crate) fn record_activity(
        &self,
        entity_type: &str,
        key: &str,
        action: &str,
        detail: Option<String>,
    ) {
        let entry = ActivityEntry::new(entity_type, key, action, detail, self.clock.now());
        if let Err(e) = self.db.with_conn(|conn| activity_repo::append(conn, &entry)) {
            warn!(entity_type, key, action, error = %e, "Failed to record activity");
        }
    }

    pub(crate) fn already_notified(&self, key: &str) -> bool {
        self.db
            .with_conn(|conn| notification_repo::contains(conn, key))
            .unwrap_or_else(|e| {
                warn!(key, error = %e, "Dedup lookup failed, assuming not sent");
                false
            })
    }

    pub(crate) fn remember_notification(&self, key: &str) {
        let now = self.clock.now();
        if let Err(e) = self
            .db
            .with_conn(|conn| notification_repo::record(conn, key, now))
        {
            warn!(key, error = %e, "Failed to record sent notification");
        }
    }
}

pub(crate) fn load_job(conn: &Connection, job_number: &str) -> Result<Job, EngineError> {
    job_repo::find_by_number(conn, job_number)?
        .ok_or_else(|| EngineError::job_not_found(job_number))
}

pub(crate) fn load_invoice(
    conn: &Connection,
    invoice_number: &str,
) -> Result<Invoice, EngineError> {
    invoice_repo::find_by_number(conn, invoice_number)?
        .ok_or_else(|| EngineError::invoice_not_found(invoice_number))
}

/// Next invoice number for the job that no other job's invoice already holds.
fn free_invoice_number(
    conn: &Connection,
    job_number: &str,
    existing: usize,
) -> Result<String, EngineError> {
    billing::next_free_invoice_number(job_number, existing, |n| {
        Ok::<_, EngineError>(invoice_repo::find_by_number(conn, n)?.is_some())
    })
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
