pub mod billing;
pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod intake;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod money;
pub mod notify;
pub mod sanitize;
pub mod scheduler;
pub mod secrets;
pub mod temporal;

pub use billing::{BillingDecision, InvoicePlan};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::CommandOutcome;
pub use config::{load_config, AppConfig, BillingConfig, BusinessProfile};
pub use db::{Database, DatabaseError};
pub use engine::{Acceptance, Delivery, GeneratedInvoice, LifecycleEngine};
pub use error::{CartcureError, ConfigError, EngineError, ErrorKind, Result};
pub use intake::Submission;
pub use model::{ClientContact, Invoice, InvoiceStatus, InvoiceType, Job, JobStatus, PaymentStatus};
pub use notify::{LogNotifier, MemoryNotifier, Notifier, OutboundEmail, SmtpNotifier};
pub use scheduler::{DailyScheduler, PolicyReport, ReminderScheduler};
pub use secrets::{resolve_secret, SecretError};
