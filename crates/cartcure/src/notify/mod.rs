//! Outbound email.
//!
//! The engine only sees the [`Notifier`] trait. Production wires in
//! [`SmtpNotifier`]; tests use [`MemoryNotifier`] to inspect what would
//! have been sent.

mod smtp;
pub mod templates;

use std::sync::Mutex;

use thiserror::Error;

use crate::sanitize::redact_email;

pub use smtp::SmtpNotifier;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid email address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// A fully rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub plain_body: String,
    pub reply_to: Option<String>,
}

pub trait Notifier: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError>;
}

/// Writes messages to the log instead of delivering them. Used when no SMTP
/// section is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        tracing::info!(
            to = %redact_email(&email.to),
            subject = %email.subject,
            "Email delivery disabled, message logged only"
        );
        Ok(())
    }
}

/// Records every message in memory. Can be switched into a failing mode to
/// exercise delivery-error paths.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: Mutex<bool>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutboundEmail> {
        self.sent()
            .into_iter()
            .filter(|e| e.to.eq_ignore_ascii_case(address))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        let failing = self.failing.lock().map(|f| *f).unwrap_or(false);
        if failing {
            return Err(NotifyError::Transport("simulated delivery failure".into()));
        }
        self.sent
            .lock()
            .map_err(|_| NotifyError::Transport("outbox lock poisoned".into()))?
            .push(email.clone());
        Ok(())
    }
}
