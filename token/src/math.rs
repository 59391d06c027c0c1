//! Checked arithmetic for balances and counters.
//!
//! Every mutation of a balance, supply or sale counter goes through these
//! helpers. They never wrap or truncate silently; a value that does not fit
//! is reported as an error and the caller aborts before touching state.

use crate::error::ErrorKind;

/// Smallest-unit amount (token units or native currency units).
pub type Balance = u128;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("division by zero")]
    DivideByZero,
}

impl MathError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Arithmetic
    }
}

#[inline]
pub fn safe_add(a: Balance, b: Balance) -> Result<Balance, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

#[inline]
pub fn safe_sub(a: Balance, b: Balance) -> Result<Balance, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

#[inline]
pub fn safe_mul(a: Balance, b: Balance) -> Result<Balance, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

#[inline]
pub fn safe_div(a: Balance, b: Balance) -> Result<Balance, MathError> {
    a.checked_div(b).ok_or(MathError::DivideByZero)
}

/// `round(a * b / d)` with halves rounded up.
pub fn mul_div_round_half_up(a: Balance, b: Balance, d: Balance) -> Result<Balance, MathError> {
    if d == 0 {
        return Err(MathError::DivideByZero);
    }
    let num = safe_add(safe_mul(a, b)?, d / 2)?;
    safe_div(num, d)
}

/// `10^exp` as a balance multiplier.
pub fn pow10(exp: u32) -> Result<Balance, MathError> {
    10u128.checked_pow(exp).ok_or(MathError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn guards_report_the_failing_operation() {
        assert_eq!(safe_add(u128::MAX, 1), Err(MathError::Overflow));
        assert_eq!(safe_sub(1, 2), Err(MathError::Underflow));
        assert_eq!(safe_mul(u128::MAX, 2), Err(MathError::Overflow));
        assert_eq!(safe_div(7, 0), Err(MathError::DivideByZero));
        assert_eq!(safe_add(2, 3), Ok(5));
        assert_eq!(safe_sub(3, 3), Ok(0));
        assert_eq!(safe_mul(4, 5), Ok(20));
        assert_eq!(safe_div(7, 2), Ok(3));
    }

    #[test]
    fn half_up_rounding() {
        assert_eq!(mul_div_round_half_up(5, 1, 2), Ok(3)); // 2.5
        assert_eq!(mul_div_round_half_up(7, 1, 3), Ok(2)); // 2.33
        assert_eq!(mul_div_round_half_up(8, 1, 3), Ok(3)); // 2.66
        assert_eq!(mul_div_round_half_up(1, 1, 0), Err(MathError::DivideByZero));
        assert_eq!(mul_div_round_half_up(u128::MAX, 2, 3), Err(MathError::Overflow));
    }

    #[test]
    fn pow10_bounds() {
        assert_eq!(pow10(8), Ok(100_000_000));
        assert_eq!(pow10(38).map(|_| ()), Ok(()));
        assert_eq!(pow10(39), Err(MathError::Overflow));
    }

    proptest! {
        #[test]
        fn add_then_sub_is_identity(a in any::<u64>(), b in any::<u64>()) {
            let (a, b) = (a as u128, b as u128);
            let s = safe_add(a, b).unwrap();
            prop_assert_eq!(safe_sub(s, b).unwrap(), a);
        }

        #[test]
        fn rounding_stays_within_half_unit(a in 0u128..1_000_000_000_000, b in 1u128..1_000_000, d in 1u128..1_000_000_000) {
            let r = mul_div_round_half_up(a, b, d).unwrap();
            let exact = a * b;
            // -d/2 < r*d - a*b <= d/2
            prop_assert!(2 * r * d <= 2 * exact + d);
            prop_assert!(2 * r * d + d > 2 * exact);
        }
    }
}
