//! The reserved-object cache and allocation statistics described in spec
//! section 4.1. Reuse is meant to be invisible to callers: everything here
//! is reached only through `VariantHeap::make_*`/`VariantHeap::unref`, never
//! by constructing a `Variant` by hand.

use super::{BigIntValue, Variant, VariantData, VariantKind};
use crate::atom::Atom;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Compile-time default cap on the number of freed scalars kept warm for
/// reuse (spec section 4.1: "default 32").
pub const MAX_RESERVED_SCALARS: usize = 32;
pub const MAX_RESERVED_VECTORS: usize = 32;

#[derive(Default, Clone, Copy, Debug)]
pub struct KindStats {
    pub count: u64,
    pub bytes: u64,
}

#[derive(Default)]
pub struct VariantStats {
    by_kind: [KindStats; VariantKind::COUNT],
}

impl VariantStats {
    pub fn get(&self, kind: VariantKind) -> KindStats {
        self.by_kind[kind as usize]
    }

    fn record_alloc(&mut self, kind: VariantKind, bytes: u64) {
        let slot = &mut self.by_kind[kind as usize];
        slot.count += 1;
        slot.bytes += bytes;
    }

    fn record_free(&mut self, kind: VariantKind, bytes: u64) {
        let slot = &mut self.by_kind[kind as usize];
        slot.count = slot.count.saturating_sub(1);
        slot.bytes = slot.bytes.saturating_sub(bytes);
    }
}

fn approx_size(data: &VariantData) -> u64 {
    std::mem::size_of_val(data) as u64
}

fn is_reusable_scalar(data: &VariantData) -> bool {
    matches!(
        data,
        VariantData::Number(_)
            | VariantData::LongInt(_)
            | VariantData::ULongInt(_)
            | VariantData::LongDouble(_)
            | VariantData::Boolean(_)
    )
}

/// Process-local (per runtime instance) heap backing every `make_*`
/// constructor: the four constant singletons, a ring buffer of recently
/// freed scalars, a warm list of freed `Vec` backing stores for container
/// reuse, and allocation statistics (spec section 4.1).
pub struct VariantHeap {
    undefined: Variant,
    null: Variant,
    r#true: Variant,
    r#false: Variant,
    reserved_scalars: RefCell<VecDeque<Rc<VariantData>>>,
    reserved_vectors: RefCell<Vec<Vec<Variant>>>,
    stats: RefCell<VariantStats>,
}

impl VariantHeap {
    pub fn new() -> Self {
        VariantHeap {
            undefined: Variant(Rc::new(VariantData::Undefined)),
            null: Variant(Rc::new(VariantData::Null)),
            r#true: Variant(Rc::new(VariantData::Boolean(true))),
            r#false: Variant(Rc::new(VariantData::Boolean(false))),
            reserved_scalars: RefCell::new(VecDeque::with_capacity(MAX_RESERVED_SCALARS)),
            reserved_vectors: RefCell::new(Vec::with_capacity(MAX_RESERVED_VECTORS)),
            stats: RefCell::new(VariantStats::default()),
        }
    }

    /// The `undefined` constant singleton. Never reaches a strong count of
    /// zero while this heap is alive, since the heap itself always retains
    /// one clone (spec section 4.1's "constant singletons never reach
    /// zero").
    pub fn undefined(&self) -> Variant {
        self.undefined.make_ref()
    }

    pub fn null(&self) -> Variant {
        self.null.make_ref()
    }

    pub fn boolean(&self, b: bool) -> Variant {
        if b {
            self.r#true.make_ref()
        } else {
            self.r#false.make_ref()
        }
    }

    pub fn stats(&self, kind: VariantKind) -> KindStats {
        self.stats.borrow().get(kind)
    }

    fn alloc_scalar(&self, data: VariantData) -> Variant {
        let kind = VariantKind::of(&data);
        let bytes = approx_size(&data);

        let mut ring = self.reserved_scalars.borrow_mut();
        while let Some(slot) = ring.pop_front() {
            if Rc::strong_count(&slot) == 1 {
                let mut slot = slot;
                if let Some(inner) = Rc::get_mut(&mut slot) {
                    *inner = data;
                    self.stats.borrow_mut().record_alloc(kind, bytes);
                    return Variant(slot);
                }
            }
            // Somebody still holds this slot alive (shouldn't happen since
            // we only ever push slots whose count was 1) - drop it and try
            // the next one.
        }
        drop(ring);

        self.stats.borrow_mut().record_alloc(kind, bytes);
        Variant(Rc::new(data))
    }

    pub fn make_number(&self, n: f64) -> Variant {
        self.alloc_scalar(VariantData::Number(n))
    }

    pub fn make_longint(&self, n: i64) -> Variant {
        self.alloc_scalar(VariantData::LongInt(n))
    }

    pub fn make_ulongint(&self, n: u64) -> Variant {
        self.alloc_scalar(VariantData::ULongInt(n))
    }

    pub fn make_longdouble(&self, n: f64) -> Variant {
        self.alloc_scalar(VariantData::LongDouble(n))
    }

    pub fn make_bigint(&self, n: BigIntValue) -> Variant {
        let kind = VariantKind::BigInt;
        self.stats.borrow_mut().record_alloc(kind, 0);
        Variant(Rc::new(VariantData::BigInt(n)))
    }

    pub fn make_atomstring(&self, atom: Atom) -> Variant {
        self.stats
            .borrow_mut()
            .record_alloc(VariantKind::AtomString, 8);
        Variant(Rc::new(VariantData::AtomString(atom)))
    }

    pub fn make_exception(&self, atom: Atom) -> Variant {
        self.stats
            .borrow_mut()
            .record_alloc(VariantKind::Exception, 8);
        Variant(Rc::new(VariantData::Exception(atom)))
    }

    pub fn make_string(&self, s: impl Into<Rc<str>>) -> Variant {
        let s: Rc<str> = s.into();
        self.stats
            .borrow_mut()
            .record_alloc(VariantKind::String, s.len() as u64);
        Variant(Rc::new(VariantData::String(s)))
    }

    /// Takes back a freed container's backing `Vec` for later reuse by
    /// `checkout_vector`, modeling the "linked list of freed vectors kept
    /// warm for reuse" from spec section 4.1.
    pub fn checkin_vector(&self, mut v: Vec<Variant>) {
        v.clear();
        let mut reserved = self.reserved_vectors.borrow_mut();
        if reserved.len() < MAX_RESERVED_VECTORS {
            reserved.push(v);
        }
    }

    pub fn checkout_vector(&self) -> Vec<Variant> {
        self.reserved_vectors
            .borrow_mut()
            .pop()
            .unwrap_or_default()
    }

    /// Releases a variant, routing scalar slots into the reserve if there
    /// is room, and returns the resulting strong count (the `unref`
    /// contract from spec section 4.1).
    pub fn unref(&self, v: Variant) -> usize {
        let remaining = Rc::strong_count(&v.0) - 1;
        if remaining == 0 && is_reusable_scalar(&v.0) {
            let kind = VariantKind::of(&v.0);
            let bytes = approx_size(&v.0);
            let mut ring = self.reserved_scalars.borrow_mut();
            if ring.len() < MAX_RESERVED_SCALARS {
                self.stats.borrow_mut().record_free(kind, bytes);
                ring.push_back(v.0);
                return 0;
            }
        }
        if remaining == 0 && !matches!(*v.0, VariantData::Undefined | VariantData::Null | VariantData::Boolean(_)) {
            let kind = VariantKind::of(&v.0);
            let bytes = approx_size(&v.0);
            self.stats.borrow_mut().record_free(kind, bytes);
        }
        drop(v);
        remaining
    }
}

impl Default for VariantHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantKind {
    const COUNT: usize = 19;

    fn of(data: &VariantData) -> Self {
        match data {
            VariantData::Undefined => VariantKind::Undefined,
            VariantData::Null => VariantKind::Null,
            VariantData::Boolean(_) => VariantKind::Boolean,
            VariantData::Number(_) => VariantKind::Number,
            VariantData::LongInt(_) => VariantKind::LongInt,
            VariantData::ULongInt(_) => VariantKind::ULongInt,
            VariantData::LongDouble(_) => VariantKind::LongDouble,
            VariantData::BigInt(_) => VariantKind::BigInt,
            VariantData::AtomString(_) => VariantKind::AtomString,
            VariantData::Exception(_) => VariantKind::Exception,
            VariantData::String(_) => VariantKind::String,
            VariantData::BSequence(_) => VariantKind::BSequence,
            VariantData::Dynamic(_) => VariantKind::Dynamic,
            VariantData::Native(_) => VariantKind::Native,
            VariantData::Object(_) => VariantKind::Object,
            VariantData::Array(_) => VariantKind::Array,
            VariantData::Set(_) => VariantKind::Set,
            VariantData::Tuple(_) => VariantKind::Tuple,
            VariantData::SortedArray(_) => VariantKind::SortedArray,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_never_drop_to_zero() {
        let heap = VariantHeap::new();
        let u1 = heap.undefined();
        let u2 = heap.undefined();
        assert_eq!(Rc::strong_count(&u1.0), 3); // heap + u1 + u2
        heap.unref(u1);
        heap.unref(u2);
        assert_eq!(Rc::strong_count(&heap.undefined.0), 1);
    }

    #[test]
    fn scalar_reuse_is_invisible() {
        let heap = VariantHeap::new();
        let a = heap.make_number(1.0);
        heap.unref(a);
        let b = heap.make_number(2.0);
        match b.data() {
            VariantData::Number(n) => assert_eq!(*n, 2.0),
            _ => panic!("expected number"),
        }
    }
}
