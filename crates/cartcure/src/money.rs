//! Decimal money helpers.
//!
//! Amounts stay unrounded while a billing decision is being computed and are
//! rounded to cents only when they are about to be persisted.

use rust_decimal::{Decimal, RoundingStrategy};

/// Tolerance used when comparing invoiced totals against a job total.
pub const CENT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Rounds to two decimal places, half away from zero.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Tax on an exclusive amount. `None` means tax is inactive.
pub fn tax_on(amount_excl_tax: Decimal, rate: Option<Decimal>) -> Decimal {
    match rate {
        Some(rate) => amount_excl_tax * rate,
        None => Decimal::ZERO,
    }
}

/// Splits a tax-inclusive amount into (exclusive, tax).
pub fn split_inclusive(total: Decimal, rate: Option<Decimal>) -> (Decimal, Decimal) {
    match rate {
        Some(rate) if rate > Decimal::ZERO => {
            let excl = total / (Decimal::ONE + rate);
            (excl, total - excl)
        }
        _ => (total, Decimal::ZERO),
    }
}

/// `percent` of `amount`, unrounded.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    amount * percent / Decimal::ONE_HUNDRED
}

/// True when `a` and `b` differ by no more than one cent.
pub fn within_cent(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= CENT_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round_cents_half_away_from_zero() {
        assert_eq!(round_cents(d("10.005")), d("10.01"));
        assert_eq!(round_cents(d("10.004")), d("10.00"));
        assert_eq!(round_cents(d("-10.005")), d("-10.01"));
    }

    #[test]
    fn test_cent_tolerance_is_one_cent() {
        assert_eq!(CENT_TOLERANCE, d("0.01"));
        assert!(within_cent(d("100.00"), d("100.01")));
        assert!(!within_cent(d("100.00"), d("100.02")));
    }

    #[test]
    fn test_split_inclusive_with_gst() {
        let (excl, tax) = split_inclusive(d("115"), Some(d("0.15")));
        assert_eq!(round_cents(excl), d("100.00"));
        assert_eq!(round_cents(tax), d("15.00"));
        assert_eq!(excl + tax, d("115"));
    }

    #[test]
    fn test_split_inclusive_without_tax() {
        let (excl, tax) = split_inclusive(d("80"), None);
        assert_eq!(excl, d("80"));
        assert_eq!(tax, Decimal::ZERO);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(d("600"), d("50")), d("300"));
        assert_eq!(tax_on(d("200"), Some(d("0.15"))), d("30.00"));
        assert_eq!(tax_on(d("200"), None), Decimal::ZERO);
    }
}
