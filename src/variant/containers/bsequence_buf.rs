//! The `bsequence` variant's incremental-build API (spec section 4.2): lets
//! a caller accumulate bytes without a fresh allocation per append.

use crate::error::{fail, PurcError, PurcResult};
use crate::variant::{Variant, VariantData};

fn with_bytes<R>(v: &Variant, f: impl FnOnce(&mut Vec<u8>) -> R) -> PurcResult<R> {
    match v.data() {
        VariantData::BSequence(cell) => Ok(f(&mut cell.borrow_mut())),
        _ => fail(PurcError::WrongDataType),
    }
}

/// Returns a copy of the sequence's current bytes.
pub fn buffer(v: &Variant) -> PurcResult<Vec<u8>> {
    with_bytes(v, |buf| buf.clone())
}

/// Replaces the sequence's contents with `bytes`.
pub fn set_bytes(v: &Variant, bytes: &[u8]) -> PurcResult<()> {
    with_bytes(v, |buf| {
        buf.clear();
        buf.extend_from_slice(bytes);
    })
}

/// Appends `bytes` to the end of the sequence in place, without a fresh
/// allocation per call (spec section 4.2).
pub fn append(v: &Variant, bytes: &[u8]) -> PurcResult<()> {
    with_bytes(v, |buf| buf.extend_from_slice(bytes))
}

/// Drops the first `offset` bytes, shifting the remainder down. An `offset`
/// that is negative or zero empties the sequence entirely (spec section
/// 4.2: "`roll` with a negative or zero offset empties the sequence").
pub fn roll(v: &Variant, offset: i64) -> PurcResult<()> {
    with_bytes(v, |buf| {
        if offset <= 0 {
            buf.clear();
        } else {
            let offset = (offset as usize).min(buf.len());
            buf.drain(0..offset);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantHeap;
    use std::cell::RefCell;

    fn seq(bytes: &[u8]) -> Variant {
        Variant::from(VariantData::BSequence(RefCell::new(bytes.to_vec())))
    }

    #[test]
    fn append_extends_in_place() {
        let v = seq(&[1, 2, 3]);
        append(&v, &[4, 5]).unwrap();
        assert_eq!(buffer(&v).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn set_bytes_replaces_contents() {
        let v = seq(&[1, 2, 3]);
        set_bytes(&v, &[9]).unwrap();
        assert_eq!(buffer(&v).unwrap(), vec![9]);
    }

    #[test]
    fn roll_drops_a_prefix() {
        let v = seq(&[1, 2, 3, 4, 5]);
        roll(&v, 2).unwrap();
        assert_eq!(buffer(&v).unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn roll_with_nonpositive_offset_empties_the_sequence() {
        let v = seq(&[1, 2, 3]);
        roll(&v, 0).unwrap();
        assert!(buffer(&v).unwrap().is_empty());

        let v = seq(&[1, 2, 3]);
        roll(&v, -5).unwrap();
        assert!(buffer(&v).unwrap().is_empty());
    }

    #[test]
    fn operations_on_a_non_bsequence_fail() {
        let heap = VariantHeap::new();
        assert!(buffer(&heap.make_number(1.0)).is_err());
    }
}
