//! Equality and ordered comparison across variant kinds (spec section 3.1).

use super::{Variant, VariantData};
use std::cmp::Ordering;

/// The ordered-compare modes spec section 3.1 calls out.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompareMode {
    /// Compare as numbers; non-numeric operands compare as `NaN` (always
    /// `Ordering::Greater` relative to any number, per IEEE total-order
    /// tie-break used here).
    Number,
    /// Lexicographic, case-sensitive string comparison.
    Case,
    /// Lexicographic, case-folded string comparison.
    Caseless,
    /// Numeric if both sides parse as numbers, otherwise falls back to
    /// case-sensitive string comparison.
    Auto,
}

/// Two variants compare equal iff they share the same kind and their
/// payloads compare equal (spec section 3.1's equality invariant).
pub fn equal(a: &Variant, b: &Variant) -> bool {
    use VariantData::*;
    match (a.data(), b.data()) {
        (Undefined, Undefined) | (Null, Null) => true,
        (Boolean(x), Boolean(y)) => x == y,
        (Number(x), Number(y)) => x == y,
        (LongInt(x), LongInt(y)) => x == y,
        (ULongInt(x), ULongInt(y)) => x == y,
        (LongDouble(x), LongDouble(y)) => x == y,
        (BigInt(x), BigInt(y)) => x == y,
        (AtomString(x), AtomString(y)) => x == y,
        (Exception(x), Exception(y)) => x == y,
        (String(x), String(y)) => x == y,
        (BSequence(x), BSequence(y)) => *x.borrow() == *y.borrow(),
        (Array(x), Array(y)) => Rc_ptr_eq_or_deep(x, y, |x, y| x.equal(y)),
        (Object(x), Object(y)) => Rc_ptr_eq_or_deep(x, y, |x, y| x.equal(y)),
        (Set(x), Set(y)) => Rc_ptr_eq_or_deep(x, y, |x, y| x.equal(y)),
        (Tuple(x), Tuple(y)) => Rc_ptr_eq_or_deep(x, y, |x, y| x.equal(y)),
        _ => false,
    }
}

#[allow(non_snake_case)]
fn Rc_ptr_eq_or_deep<T>(
    a: &std::rc::Rc<T>,
    b: &std::rc::Rc<T>,
    deep: impl FnOnce(&T, &T) -> bool,
) -> bool {
    std::rc::Rc::ptr_eq(a, b) || deep(a, b)
}

fn as_number(v: &Variant) -> Option<f64> {
    match v.data() {
        VariantData::Number(n) | VariantData::LongDouble(n) => Some(*n),
        VariantData::LongInt(n) => Some(*n as f64),
        VariantData::ULongInt(n) => Some(*n as f64),
        VariantData::BigInt(b) => b.to_f64(),
        VariantData::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_str(v: &Variant) -> Option<String> {
    match v.data() {
        VariantData::String(s) => Some(s.to_string()),
        VariantData::AtomString(a) => crate::atom::AtomTable::global()
            .to_string(crate::atom::AtomBucket::Def, *a),
        _ => None,
    }
}

/// Orders `a` relative to `b` under `mode`. Non-comparable operands (e.g.
/// comparing a container numerically) order as equal, matching the
/// permissive comparator the original interpreter uses for sorted
/// containers.
pub fn compare(a: &Variant, b: &Variant, mode: CompareMode) -> Ordering {
    match mode {
        CompareMode::Number => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        CompareMode::Case => match (as_str(a), as_str(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        },
        CompareMode::Caseless => match (as_str(a), as_str(b)) {
            (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            _ => Ordering::Equal,
        },
        CompareMode::Auto => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => compare(a, b, CompareMode::Case),
        },
    }
}
