//! Reminder, late-fee and SLA policies run against stored records.

mod common;

use cartcure::scheduler::policies::{
    OVERDUE_NOTICES, PRE_DUE_REMINDERS, QUOTE_REMINDERS, SLA_REFRESH,
};
use cartcure::temporal::SlaStatus;
use cartcure::{InvoiceStatus, JobStatus, PaymentStatus};
use common::harness::{d, date, ADMIN_EMAIL, CLIENT_EMAIL};
use common::{InvoiceBuilder, JobBuilder, TestHarness};

/// An accepted $100 job with a sent invoice due 10 Jan 2026.
fn harness_with_invoice_due_jan_10() -> TestHarness {
    let h = TestHarness::new();
    let job = JobBuilder::new("J-0100")
        .accepted_at(date(2026, 1, 1))
        .payment_status(PaymentStatus::Invoiced)
        .build(h.now());
    h.insert_job(&job);
    let invoice = InvoiceBuilder::new("INV-0100", "J-0100")
        .total("100.00")
        .due(date(2026, 1, 10))
        .build(date(2026, 1, 3));
    h.insert_invoice(&invoice);
    h
}

#[test]
fn test_overdue_notice_skips_days_off_the_interval() {
    let h = harness_with_invoice_due_jan_10();
    h.set_date(2026, 1, 20);

    let report = h.scheduler().run_overdue_notices(h.now()).unwrap();
    assert_eq!(report.processed, 0);
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.invoice("INV-0100").status, InvoiceStatus::Sent);
}

#[test]
fn test_overdue_notice_applies_fee_and_is_sent_once_per_day() {
    let h = harness_with_invoice_due_jan_10();
    h.set_date(2026, 1, 18);

    let report = h.scheduler().run_overdue_notices(h.now()).unwrap();
    assert_eq!(report.policy, OVERDUE_NOTICES);
    assert_eq!(report.processed, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.sent, 1);

    let invoice = h.invoice("INV-0100");
    assert_eq!(invoice.status, InvoiceStatus::Overdue);
    assert_eq!(invoice.days_overdue, 8);
    assert_eq!(invoice.late_fee, d("16.00"));
    assert_eq!(invoice.total_with_fees, d("116.00"));
    assert_eq!(
        h.subjects_to(CLIENT_EMAIL),
        vec!["Overdue: invoice INV-0100"]
    );

    let rerun = h.scheduler().run_overdue_notices(h.now()).unwrap();
    assert_eq!(rerun.processed, 1);
    assert_eq!(rerun.skipped, 1);
    assert_eq!(rerun.sent, 0);
    assert_eq!(h.emails_to(CLIENT_EMAIL).len(), 1);
}

#[test]
fn test_first_overdue_day_gets_a_notice() {
    let h = harness_with_invoice_due_jan_10();
    h.set_date(2026, 1, 11);

    let report = h.scheduler().run_overdue_notices(h.now()).unwrap();
    assert_eq!(report.sent, 1);
    let invoice = h.invoice("INV-0100");
    assert_eq!(invoice.days_overdue, 1);
    assert_eq!(invoice.late_fee, d("2.00"));
}

#[test]
fn test_paid_invoices_are_never_chased() {
    let h = TestHarness::new();
    h.insert_job(&JobBuilder::new("J-0101").build(h.now()));
    h.insert_invoice(
        &InvoiceBuilder::new("INV-0101", "J-0101")
            .status(InvoiceStatus::Paid)
            .due(date(2026, 1, 10))
            .build(date(2026, 1, 3)),
    );
    h.set_date(2026, 1, 11);

    let report = h.scheduler().run_overdue_notices(h.now()).unwrap();
    assert_eq!(report.processed, 0);
    let invoice = h.invoice("INV-0101");
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.late_fee, d("0"));
}

#[test]
fn test_failed_overdue_notice_is_retried_the_same_day() {
    let h = harness_with_invoice_due_jan_10();
    h.set_date(2026, 1, 11);
    h.notifier.set_failing(true);

    let report = h.scheduler().run_overdue_notices(h.now()).unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.updated, 1);
    // The fee and status are kept even though the email bounced.
    assert_eq!(h.invoice("INV-0100").status, InvoiceStatus::Overdue);

    h.notifier.set_failing(false);
    let retry = h.scheduler().run_overdue_notices(h.now()).unwrap();
    assert_eq!(retry.sent, 1);
    assert_eq!(h.invoice("INV-0100").late_fee, d("2.00"));
}

#[test]
fn test_quote_reminder_sent_once_after_threshold() {
    let h = TestHarness::new();
    h.quoted_job("SUB-0042", "150");
    h.notifier.clear();

    h.set_date(2026, 1, 7);
    let early = h.scheduler().run_quote_reminders(h.now()).unwrap();
    assert_eq!(early.processed, 0);

    h.set_date(2026, 1, 8);
    let report = h.scheduler().run_quote_reminders(h.now()).unwrap();
    assert_eq!(report.policy, QUOTE_REMINDERS);
    assert_eq!(report.sent, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(h.job("J-0042").status, JobStatus::QuoteReminded);
    assert_eq!(h.subjects_to(CLIENT_EMAIL), vec!["Reminder: your quote J-0042"]);

    let rerun = h.scheduler().run_quote_reminders(h.now()).unwrap();
    assert_eq!(rerun.processed, 0);
    assert_eq!(h.emails_to(CLIENT_EMAIL).len(), 1);

    // A reminded quote can still be accepted.
    let acceptance = h.engine.accept_quote("J-0042").unwrap();
    assert_eq!(acceptance.job.status, JobStatus::Accepted);
}

#[test]
fn test_quote_reminder_without_email_leaves_job_quoted() {
    let h = TestHarness::new();
    let job = h
        .engine
        .create_job_from_submission(&h.submission("SUB-0043", None))
        .unwrap();
    h.engine.send_quote(&job.job_number, d("150"), None).unwrap();

    h.set_date(2026, 1, 9);
    let report = h.scheduler().run_quote_reminders(h.now()).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(h.job("J-0043").status, JobStatus::Quoted);
}

#[test]
fn test_pre_due_reminder_window() {
    let h = TestHarness::new();
    h.insert_job(&JobBuilder::new("J-0200").build(h.now()));
    let issued = date(2025, 12, 28);
    for (number, due) in [
        ("INV-0200", date(2026, 1, 3)),
        ("INV-0200-2", date(2026, 1, 4)),
        ("INV-0200-3", date(2026, 1, 1)),
    ] {
        h.insert_invoice(
            &InvoiceBuilder::new(number, "J-0200")
                .due(due)
                .build(issued),
        );
    }
    h.insert_invoice(
        &InvoiceBuilder::new("INV-0200-4", "J-0200")
            .status(InvoiceStatus::Draft)
            .due(date(2026, 1, 2))
            .build(issued),
    );

    let report = h.scheduler().run_pre_due_reminders(h.now()).unwrap();
    assert_eq!(report.policy, PRE_DUE_REMINDERS);
    assert_eq!(report.processed, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(h.subjects_to(CLIENT_EMAIL), vec!["Invoice INV-0200 due soon"]);

    // No state changes, so a second run the same day sends again.
    h.scheduler().run_pre_due_reminders(h.now()).unwrap();
    assert_eq!(h.emails_to(CLIENT_EMAIL).len(), 2);
    assert_eq!(h.invoice("INV-0200").status, InvoiceStatus::Sent);
}

#[test]
fn test_sla_refresh_tracks_turnaround_and_alerts_once() {
    let h = TestHarness::new();
    h.insert_job(
        &JobBuilder::new("J-0300")
            .accepted_at(date(2026, 1, 1))
            .turnaround_days(7)
            .build(h.now()),
    );

    let report = h.scheduler().refresh_sla(h.now()).unwrap();
    assert_eq!(report.policy, SLA_REFRESH);
    assert_eq!(report.updated, 1);
    assert_eq!(h.job("J-0300").sla_status, Some(SlaStatus::OnTrack));

    h.set_date(2026, 1, 6);
    h.scheduler().refresh_sla(h.now()).unwrap();
    assert_eq!(h.job("J-0300").sla_status, Some(SlaStatus::AtRisk));

    h.set_date(2026, 1, 9);
    let overdue = h.scheduler().refresh_sla(h.now()).unwrap();
    assert_eq!(overdue.updated, 1);
    assert_eq!(overdue.sent, 1);
    assert_eq!(h.job("J-0300").sla_status, Some(SlaStatus::Overdue));
    assert_eq!(
        h.subjects_to(ADMIN_EMAIL),
        vec!["[CartCure] Job past its turnaround"]
    );

    let rerun = h.scheduler().refresh_sla(h.now()).unwrap();
    assert_eq!(rerun.updated, 0);
    assert_eq!(h.emails_to(ADMIN_EMAIL).len(), 1);
}

#[test]
fn test_run_all_reports_every_policy_in_order() {
    let h = TestHarness::new();
    let reports = h.scheduler().run_all(h.now());
    let names: Vec<&str> = reports.iter().map(|r| r.policy.as_str()).collect();
    assert_eq!(
        names,
        vec![SLA_REFRESH, QUOTE_REMINDERS, PRE_DUE_REMINDERS, OVERDUE_NOTICES]
    );
    assert!(reports.iter().all(|r| r.error.is_none()));
}
