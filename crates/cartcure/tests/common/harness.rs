//! Test harness for isolated engine runs.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use cartcure::config::{BillingConfig, BusinessProfile};
use cartcure::db::{invoice_repo, job_repo};
use cartcure::{
    Clock, ClientContact, Database, Invoice, Job, LifecycleEngine, ManualClock, MemoryNotifier,
    OutboundEmail, ReminderScheduler, Submission,
};

pub const ADMIN_EMAIL: &str = "admin@cartcure.co.nz";
pub const CLIENT_EMAIL: &str = "sarah@example.com";

/// 09:00 UTC on the given date.
pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap()
}

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub struct TestHarness {
    pub engine: LifecycleEngine,
    pub notifier: Arc<MemoryNotifier>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    /// Default settings with GST switched off so amounts stay round.
    pub fn new() -> Self {
        Self::with_config(BillingConfig {
            gst_registered: false,
            ..BillingConfig::default()
        })
    }

    pub fn with_config(config: BillingConfig) -> Self {
        let notifier = Arc::new(MemoryNotifier::new());
        let clock = Arc::new(ManualClock::new(date(2026, 1, 1)));
        let engine = LifecycleEngine::new(
            Database::open_in_memory().expect("in-memory database"),
            notifier.clone(),
            clock.clone(),
            config,
            BusinessProfile {
                name: "CartCure".to_string(),
                admin_email: ADMIN_EMAIL.to_string(),
                reply_to: Some("hello@cartcure.co.nz".to_string()),
                payment_instructions: Some("Pay to 12-3456-7890123-00".to_string()),
            },
        );
        Self {
            engine,
            notifier,
            clock,
        }
    }

    pub fn set_date(&self, year: i32, month: u32, day: u32) {
        self.clock.set(date(year, month, day));
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn scheduler(&self) -> ReminderScheduler<'_> {
        ReminderScheduler::new(&self.engine)
    }

    pub fn submission(&self, number: &str, email: Option<&str>) -> Submission {
        Submission {
            submission_number: number.to_string(),
            client: ClientContact {
                name: "Sarah Jones".to_string(),
                email: email.map(str::to_string),
                phone: None,
            },
            store_reference: Some("sarahs-shop.myshopify.com".to_string()),
            description: "Fix the cart drawer on mobile".to_string(),
            category: Some("bug".to_string()),
        }
    }

    /// A job quoted today for `amount` (excluding GST).
    pub fn quoted_job(&self, submission: &str, amount: &str) -> Job {
        let job = self
            .engine
            .create_job_from_submission(&self.submission(submission, Some(CLIENT_EMAIL)))
            .expect("create job");
        self.engine
            .send_quote(&job.job_number, d(amount), None)
            .expect("send quote")
    }

    pub fn insert_job(&self, job: &Job) {
        self.engine
            .database()
            .with_conn(|conn| job_repo::insert(conn, job))
            .expect("insert job");
    }

    pub fn insert_invoice(&self, invoice: &Invoice) {
        self.engine
            .database()
            .with_conn(|conn| invoice_repo::insert(conn, invoice))
            .expect("insert invoice");
    }

    pub fn job(&self, job_number: &str) -> Job {
        self.engine.job(job_number).expect("job exists")
    }

    pub fn invoice(&self, invoice_number: &str) -> Invoice {
        self.engine.invoice(invoice_number).expect("invoice exists")
    }

    pub fn emails_to(&self, address: &str) -> Vec<OutboundEmail> {
        self.notifier.sent_to(address)
    }

    pub fn subjects_to(&self, address: &str) -> Vec<String> {
        self.emails_to(address).into_iter().map(|e| e.subject).collect()
    }
}
