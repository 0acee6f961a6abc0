//! Pure date arithmetic shared by the SLA clock, late-fee accrual and the
//! reminder policies. All day counts are calendar-day differences in UTC,
//! never elapsed-hour divisions.

pub mod late_fee;
pub mod sla;

use chrono::{DateTime, Duration, Utc};

pub use late_fee::{compute_late_fee, LateFee, LateFeePolicy};
pub use sla::{compute_sla_status, SlaSnapshot, SlaStatus};

/// Calendar days from `from` to `to`; negative when `to` is earlier.
///
/// 23:59 on one day to 00:01 on the next counts as one day.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to.date_naive() - from.date_naive()).num_days()
}

pub fn add_days(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    at + Duration::days(days)
}
