//! Business parameters read from the key/value settings store.
//!
//! The store is read once into an immutable [`BillingConfig`] that is then
//! passed into every calculator and engine call.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::db::{settings_repo, Database, DatabaseError};
use crate::temporal::LateFeePolicy;

pub const GST_REGISTERED: &str = "gst_registered";
pub const GST_RATE: &str = "gst_rate";
pub const DEFAULT_TURNAROUND_DAYS: &str = "default_turnaround_days";
pub const QUOTE_VALIDITY_DAYS: &str = "quote_validity_days";
pub const PAYMENT_TERMS_DAYS: &str = "payment_terms_days";
pub const DEPOSIT_THRESHOLD: &str = "deposit_threshold";
pub const DEPOSIT_PERCENT: &str = "deposit_percent";
pub const LATE_FEE_DAILY_RATE: &str = "late_fee_daily_rate";
pub const LATE_FEE_GRACE_DAYS: &str = "late_fee_grace_days";
pub const QUOTE_REMINDER_DAYS: &str = "quote_reminder_days";
pub const PRE_DUE_WINDOW_DAYS: &str = "pre_due_window_days";
pub const OVERDUE_NOTICE_INTERVAL_DAYS: &str = "overdue_notice_interval_days";

/// Every key `BillingConfig::load` understands.
pub const KNOWN_KEYS: &[&str] = &[
    GST_REGISTERED,
    GST_RATE,
    DEFAULT_TURNAROUND_DAYS,
    QUOTE_VALIDITY_DAYS,
    PAYMENT_TERMS_DAYS,
    DEPOSIT_THRESHOLD,
    DEPOSIT_PERCENT,
    LATE_FEE_DAILY_RATE,
    LATE_FEE_GRACE_DAYS,
    QUOTE_REMINDER_DAYS,
    PRE_DUE_WINDOW_DAYS,
    OVERDUE_NOTICE_INTERVAL_DAYS,
];

/// Read access to named settings.
pub trait SettingsStore {
    fn get(&self, name: &str) -> Result<Option<String>, DatabaseError>;
}

impl SettingsStore for Database {
    fn get(&self, name: &str) -> Result<Option<String>, DatabaseError> {
        self.with_conn(|conn| settings_repo::get(conn, name))
    }
}

impl SettingsStore for HashMap<String, String> {
    fn get(&self, name: &str) -> Result<Option<String>, DatabaseError> {
        Ok(HashMap::get(self, name).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingConfig {
    pub gst_registered: bool,
    pub gst_rate: Decimal,
    pub default_turnaround_days: u32,
    pub quote_validity_days: u32,
    pub payment_terms_days: u32,
    /// Job totals at or above this are billed deposit-then-balance.
    pub deposit_threshold: Decimal,
    pub deposit_percent: Decimal,
    pub late_fee: LateFeePolicy,
    pub quote_reminder_days: u32,
    pub pre_due_window_days: u32,
    pub overdue_notice_interval_days: u32,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            gst_registered: true,
            gst_rate: Decimal::new(15, 2),
            default_turnaround_days: 7,
            quote_validity_days: 14,
            payment_terms_days: 7,
            deposit_threshold: Decimal::from(200),
            deposit_percent: Decimal::from(50),
            late_fee: LateFeePolicy::default(),
            quote_reminder_days: 7,
            pre_due_window_days: 2,
            overdue_notice_interval_days: 7,
        }
    }
}

impl BillingConfig {
    /// Builds the configuration from the store, falling back to the default
    /// for any missing or unparseable value.
    pub fn load(store: &dyn SettingsStore) -> Result<Self, DatabaseError> {
        let defaults = Self::default();
        Ok(Self {
            gst_registered: read_bool(store, GST_REGISTERED, defaults.gst_registered)?,
            gst_rate: read_parsed(store, GST_RATE, defaults.gst_rate)?,
            default_turnaround_days: read_parsed(
                store,
                DEFAULT_TURNAROUND_DAYS,
                defaults.default_turnaround_days,
            )?,
            quote_validity_days: read_parsed(
                store,
                QUOTE_VALIDITY_DAYS,
                defaults.quote_validity_days,
            )?,
            payment_terms_days: read_parsed(
                store,
                PAYMENT_TERMS_DAYS,
                defaults.payment_terms_days,
            )?,
            deposit_threshold: read_parsed(store, DEPOSIT_THRESHOLD, defaults.deposit_threshold)?,
            deposit_percent: read_parsed(store, DEPOSIT_PERCENT, defaults.deposit_percent)?,
            late_fee: LateFeePolicy {
                daily_rate: read_parsed(store, LATE_FEE_DAILY_RATE, defaults.late_fee.daily_rate)?,
                grace_days: read_parsed(store, LATE_FEE_GRACE_DAYS, defaults.late_fee.grace_days)?,
            },
            quote_reminder_days: read_parsed(
                store,
                QUOTE_REMINDER_DAYS,
                defaults.quote_reminder_days,
            )?,
            pre_due_window_days: read_parsed(
                store,
                PRE_DUE_WINDOW_DAYS,
                defaults.pre_due_window_days,
            )?,
            overdue_notice_interval_days: read_parsed(
                store,
                OVERDUE_NOTICE_INTERVAL_DAYS,
                defaults.overdue_notice_interval_days,
            )?
            .max(1),
        })
    }

    /// The rate to apply, or `None` when the business is not GST registered.
    pub fn tax_rate(&self) -> Option<Decimal> {
        self.gst_registered.then_some(self.gst_rate)
    }
}

fn read_parsed<T>(store: &dyn SettingsStore, name: &str, default: T) -> Result<T, DatabaseError>
where
    T: FromStr + std::fmt::Display + Copy,
{
    match store.get(name)? {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(
                    "Setting '{}' has unparseable value '{}', using default {}",
                    name, raw, default
                );
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

fn read_bool(store: &dyn SettingsStore, name: &str, default: bool) -> Result<bool, DatabaseError> {
    match store.get(name)? {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => {
                warn!(
                    "Setting '{}' has unparseable value '{}', using default {}",
                    name, raw, default
                );
                Ok(default)
            }
        },
        None => Ok(default),
    }
}
