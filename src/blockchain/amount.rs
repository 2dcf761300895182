// src/blockchain/amount.rs

//! Conversion between human decimal strings ("1.5") and integer base units.
//!
//! Excess fractional digits are truncated, never rounded.

use ethers_core::types::U256;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount '{0}': expected a non-negative decimal number")]
    Malformed(String),
    #[error("amount '{0}' does not fit in 256 bits")]
    Overflow(String),
}

/// Parses `amount` into base units for a token with `decimals` places.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = amount.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    let well_formed = (!whole.is_empty() || !fraction.is_empty())
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(AmountError::Malformed(amount.to_string()));
    }

    let places = decimals as usize;
    let mut digits = String::with_capacity(whole.len() + places);
    digits.push_str(whole);
    if fraction.len() >= places {
        digits.push_str(&fraction[..places]);
    } else {
        digits.push_str(fraction);
        digits.extend(std::iter::repeat('0').take(places - fraction.len()));
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|_| AmountError::Overflow(amount.to_string()))
}

/// Formats base units as a human decimal string with trailing zeros removed.
pub fn to_human_units(value: U256, decimals: u8) -> String {
    let places = decimals as usize;
    let raw = value.to_string();
    if places == 0 {
        return raw;
    }

    let padded = format!("{:0>width$}", raw, width = places + 1);
    let (whole, fraction) = padded.split_at(padded.len() - places);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(
            to_base_units("1.5", 18).unwrap(),
            U256::from_dec_str("1500000000000000000").unwrap()
        );
        assert_eq!(to_base_units("42", 6).unwrap(), U256::from(42_000_000u64));
        assert_eq!(to_base_units("0.000001", 6).unwrap(), U256::one());
        assert_eq!(to_base_units(".5", 1).unwrap(), U256::from(5u64));
        assert_eq!(to_base_units("7.", 2).unwrap(), U256::from(700u64));
    }

    #[test]
    fn truncates_instead_of_rounding() {
        assert_eq!(to_base_units("1.23456", 2).unwrap(), U256::from(123u64));
        assert_eq!(to_base_units("0.999", 0).unwrap(), U256::zero());
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", ".", "-1", "1e5", "1.2.3", "abc", "1,5", "0x10"] {
            assert!(
                matches!(to_base_units(bad, 18), Err(AmountError::Malformed(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_values_beyond_256_bits() {
        let huge = "9".repeat(80);
        assert!(matches!(
            to_base_units(&huge, 0),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn formats_with_trailing_zeros_stripped() {
        assert_eq!(to_human_units(U256::from(3_200_000_000u64), 6), "3200");
        assert_eq!(to_human_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(to_human_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(to_human_units(U256::zero(), 18), "0");
        assert_eq!(to_human_units(U256::from(123u64), 0), "123");
    }

    #[test]
    fn round_trips_canonical_amounts() {
        let cases = [
            ("0", 0u8),
            ("17", 0),
            ("1.5", 18),
            ("0.000001", 6),
            ("3200", 6),
            ("123.456", 3),
            ("98765.4321", 8),
            ("0.1", 1),
        ];
        for (amount, decimals) in cases {
            let base = to_base_units(amount, decimals).unwrap();
            assert_eq!(to_human_units(base, decimals), amount, "decimals {decimals}");
        }
    }
}
