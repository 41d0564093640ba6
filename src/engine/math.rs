//! Checked proportional arithmetic.
//!
//! Every division floors. Products are formed at 256-bit width before the single
//! final division, so `a * b * c / d` gives exactly the floor of the rational
//! value whenever the 256-bit product does not overflow.

use super::PoolError;
use crate::domain::Amount;
use primitive_types::U256;

/// Narrow a 256-bit quotient back to an amount.
fn narrow(value: U256) -> Option<Amount> {
    Amount::try_from(value).ok()
}

pub fn add(a: Amount, b: Amount, what: &str) -> Result<Amount, PoolError> {
    a.checked_add(b)
        .ok_or_else(|| PoolError::InvariantViolation(format!("{} overflows", what)))
}

pub fn sub(a: Amount, b: Amount, what: &str) -> Result<Amount, PoolError> {
    a.checked_sub(b)
        .ok_or_else(|| PoolError::InvariantViolation(format!("{} underflows", what)))
}

/// `floor(a * b / denom)`.
pub fn mul_div(a: Amount, b: Amount, denom: Amount) -> Result<Amount, PoolError> {
    U256::from(a)
        .checked_mul(U256::from(b))
        .and_then(|p| p.checked_div(U256::from(denom)))
        .and_then(narrow)
        .ok_or_else(|| overflow("mul_div", denom))
}

/// `floor(a * b * c / denom)`, with the product taken at full width.
pub fn mul_mul_div(a: Amount, b: Amount, c: Amount, denom: Amount) -> Result<Amount, PoolError> {
    U256::from(a)
        .checked_mul(U256::from(b))
        .and_then(|p| p.checked_mul(U256::from(c)))
        .and_then(|p| p.checked_div(U256::from(denom)))
        .and_then(narrow)
        .ok_or_else(|| overflow("mul_mul_div", denom))
}

fn overflow(op: &str, denom: Amount) -> PoolError {
    if denom == 0 {
        PoolError::InvariantViolation(format!("{}: division by zero", op))
    } else {
        PoolError::InvariantViolation(format!("{}: arithmetic overflow", op))
    }
}
