//! Automated reminders: the per-policy passes and the daily runner.

mod daily;
pub mod policies;

pub use daily::{DailyReport, DailyScheduler, LAST_RUN_KEY};
pub use policies::{PolicyReport, ReminderScheduler};
