use num::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub};

use primitive_types::U256;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("Addition overflowed")]
    AdditionOverflow,
    #[error("Subtraction overflowed")]
    SubtractionOverflow,
    #[error("Multiplication overflowed")]
    MultiplicationOverflow,
    #[error("Division overflowed")]
    DivisionOverflow,
    #[error("Failed to convert a math result from U256 back to its original type")]
    ConversionError,
}

pub fn safe_add<T>(a: T, b: T) -> Result<T, MathError>
where
    T: CheckedAdd,
{
    a.checked_add(&b).ok_or(MathError::AdditionOverflow)
}

pub fn safe_sub<T>(a: T, b: T) -> Result<T, MathError>
where
    T: CheckedSub,
{
    a.checked_sub(&b).ok_or(MathError::SubtractionOverflow)
}

pub fn safe_mul<T>(a: T, b: T) -> Result<T, MathError>
where
    T: CheckedMul,
{
    a.checked_mul(&b).ok_or(MathError::MultiplicationOverflow)
}

pub fn safe_div<T>(a: T, b: T) -> Result<T, MathError>
where
    T: CheckedDiv,
{
    a.checked_div(&b).ok_or(MathError::DivisionOverflow)
}

/// Sums an iterator of values, failing on the first overflow.
pub fn safe_sum<T, I>(values: I) -> Result<T, MathError>
where
    T: CheckedAdd + Default,
    I: IntoIterator<Item = T>,
{
    values
        .into_iter()
        .try_fold(T::default(), |acc, v| safe_add(acc, v))
}

/// `a * b / div` rounded towards zero, computed in 256 bits so the
/// intermediate product cannot overflow.
pub fn mul_div<T>(mul_a: T, mul_b: T, div: T) -> Result<T, MathError>
where
    T: TryFrom<U256>,
    U256: From<T>,
{
    let a = U256::from(mul_a);
    let b = U256::from(mul_b);

    let mul = a.checked_mul(b).ok_or(MathError::MultiplicationOverflow)?;
    let div = U256::from(div);

    let res = mul.checked_div(div).ok_or(MathError::DivisionOverflow)?;

    res.try_into().map_err(|_| MathError::ConversionError)
}

/// `a * b / div` rounded up.
pub fn mul_div_ceil<T>(mul_a: T, mul_b: T, div: T) -> Result<T, MathError>
where
    T: TryFrom<U256>,
    U256: From<T>,
{
    let a = U256::from(mul_a);
    let b = U256::from(mul_b);
    let div = U256::from(div);

    if div.is_zero() {
        return Err(MathError::DivisionOverflow);
    }

    let mul = a.checked_mul(b).ok_or(MathError::MultiplicationOverflow)?;
    let (quotient, remainder) = mul.div_mod(div);
    let res = if remainder.is_zero() {
        quotient
    } else {
        quotient
            .checked_add(U256::one())
            .ok_or(MathError::AdditionOverflow)?
    };

    res.try_into().map_err(|_| MathError::ConversionError)
}

/// `a / b` rounded up.
pub fn ceil_div<T>(a: T, b: T) -> Result<T, MathError>
where
    T: TryFrom<U256>,
    U256: From<T>,
{
    let a = U256::from(a);
    let b = U256::from(b);

    if b.is_zero() {
        return Err(MathError::DivisionOverflow);
    }

    let (quotient, remainder) = a.div_mod(b);
    let res = if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::one()
    };

    res.try_into().map_err(|_| MathError::ConversionError)
}
