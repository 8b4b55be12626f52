//! Shared helpers for Decimal conversions.

use rust_decimal::Decimal;

/// Convert an f64 to Decimal, rounded to 1 decimal place.
///
/// Used for weather values (temperature, wind speed, etc.) where 0.1°C / 0.1 m/s
/// precision is sufficient and consistent rounding avoids false uniqueness in dedup.
pub(crate) fn f64_to_decimal_1dp(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!(
            "f64_to_decimal_1dp received non-finite value {}, defaulting to 0",
            v
        );
        return Decimal::ZERO;
    }
    Decimal::from_str_exact(&format!("{:.1}", v)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_f64_to_decimal_1dp_normal() {
        let d = f64_to_decimal_1dp(3.14);
        assert_eq!(d, Decimal::from_str("3.1").unwrap());
    }

    #[test]
    fn test_f64_to_decimal_1dp_rounds() {
        // 3.16 rounded to 1dp → 3.2
        let d = f64_to_decimal_1dp(3.16);
        assert_eq!(d, Decimal::from_str("3.2").unwrap());
    }

    #[test]
    fn test_f64_to_decimal_1dp_nan() {
        assert_eq!(f64_to_decimal_1dp(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn test_f64_to_decimal_1dp_infinity() {
        assert_eq!(f64_to_decimal_1dp(f64::INFINITY), Decimal::ZERO);
    }
}
