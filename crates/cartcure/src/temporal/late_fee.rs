//! Late-fee accrual: simple daily interest on the invoice total.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::days_between;
use crate::money::round_cents;

/// Accrual parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LateFeePolicy {
    /// Fraction of the total charged per calendar day overdue (0.02 = 2%).
    pub daily_rate: Decimal,
    /// Days overdue that accrue no fee. Zero charges from the first day.
    pub grace_days: u32,
}

impl Default for LateFeePolicy {
    fn default() -> Self {
        Self {
            daily_rate: Decimal::new(2, 2),
            grace_days: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LateFee {
    pub days_overdue: i64,
    pub fee: Decimal,
    pub total_with_fee: Decimal,
}

/// Non-compounding late fee for `total` due at `due_date`, evaluated at `now`.
pub fn compute_late_fee(
    total: Decimal,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &LateFeePolicy,
) -> LateFee {
    let days_overdue = days_between(due_date, now).max(0);
    let chargeable_days = (days_overdue - i64::from(policy.grace_days)).max(0);
    let fee = round_cents(total * policy.daily_rate * Decimal::from(chargeable_days));
    LateFee {
        days_overdue,
        fee,
        total_with_fee: total + fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_ten_days_on_one_hundred() {
        let fee = compute_late_fee(
            Decimal::from(100),
            due(),
            due() + Duration::days(10),
            &LateFeePolicy::default(),
        );
        assert_eq!(fee.days_overdue, 10);
        assert_eq!(fee.fee, Decimal::from_str("20.00").unwrap());
        assert_eq!(fee.total_with_fee, Decimal::from_str("120.00").unwrap());
    }

    #[test]
    fn test_not_yet_due_has_no_fee() {
        let fee = compute_late_fee(
            Decimal::from(100),
            due(),
            due() - Duration::days(3),
            &LateFeePolicy::default(),
        );
        assert_eq!(fee.days_overdue, 0);
        assert_eq!(fee.fee, Decimal::ZERO);
        assert_eq!(fee.total_with_fee, Decimal::from(100));
    }

    #[test]
    fn test_fee_is_rounded_to_cents() {
        let fee = compute_late_fee(
            Decimal::from_str("33.33").unwrap(),
            due(),
            due() + Duration::days(1),
            &LateFeePolicy::default(),
        );
        // 33.33 * 0.02 = 0.6666
        assert_eq!(fee.fee, Decimal::from_str("0.67").unwrap());
    }

    #[test]
    fn test_grace_days_reduce_chargeable_days_only() {
        let policy = LateFeePolicy {
            grace_days: 3,
            ..LateFeePolicy::default()
        };
        let fee = compute_late_fee(
            Decimal::from(100),
            due(),
            due() + Duration::days(10),
            &policy,
        );
        assert_eq!(fee.days_overdue, 10);
        assert_eq!(fee.fee, Decimal::from_str("14.00").unwrap());

        let within_grace =
            compute_late_fee(Decimal::from(100), due(), due() + Duration::days(2), &policy);
        assert_eq!(within_grace.days_overdue, 2);
        assert_eq!(within_grace.fee, Decimal::ZERO);
    }
}
