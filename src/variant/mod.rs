//! The variant value model (spec section 3.1): a single reference-counted
//! type covering scalars, strings, binary sequences, dynamic/native
//! host values and the five container kinds.

pub mod bigint;
pub mod compare;
pub mod containers;
pub mod ejson;
pub mod heap;
pub mod listener;
pub mod numeric;

pub use bigint::BigIntValue;
pub use compare::{compare, equal, CompareMode};
pub use heap::VariantHeap;
pub use listener::{ContainerHeader, Op, OpHandler, ParentLink, Phase};

pub use containers::array::Array;
pub use containers::bsequence_buf::{append as bsequence_append, buffer as bsequence_buffer, roll as bsequence_roll, set_bytes as bsequence_set_bytes};
pub use containers::object::Object;
pub use containers::set::{CrMethod, VariantSet};
pub use containers::sorted_array::SortedArray;
pub use containers::tuple::Tuple;

use crate::atom::Atom;
use std::cell::RefCell;
use std::rc::Rc;

/// A dynamic variant: a getter/setter pair of host closures, used to expose
/// computed values (spec section 3.1's "dynamic" kind).
#[derive(Clone)]
pub struct DynamicData {
    pub getter: Rc<dyn Fn() -> Variant>,
    pub setter: Option<Rc<dyn Fn(Variant) -> crate::error::PurcResult<()>>>,
}

/// Hook the host can attach to a native-backed variant, analogous to the
/// `on_observe`/`on_release` vtable the original interpreter threads through
/// `purc_variant_t` native wrappers.
pub trait NativeOps {
    fn type_name(&self) -> &'static str;
    fn on_release(&self, _entity: &dyn std::any::Any) {}
}

/// A host-owned opaque value plus the vtable that knows how to release it
/// (spec section 3.1's "native" kind).
#[derive(Clone)]
pub struct NativeData {
    pub entity: Rc<dyn std::any::Any>,
    pub ops: Rc<dyn NativeOps>,
}

/// Tag identifying a variant's kind, independent of its payload. Mirrors
/// `purc_variant_type` from the original interpreter.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(usize)]
pub enum VariantKind {
    Undefined = 0,
    Null,
    Boolean,
    Number,
    LongInt,
    ULongInt,
    LongDouble,
    BigInt,
    AtomString,
    Exception,
    String,
    BSequence,
    Dynamic,
    Native,
    Object,
    Array,
    Set,
    Tuple,
    SortedArray,
}

impl VariantKind {
    pub fn name(self) -> &'static str {
        match self {
            VariantKind::Undefined => "undefined",
            VariantKind::Null => "null",
            VariantKind::Boolean => "boolean",
            VariantKind::Number => "number",
            VariantKind::LongInt => "longint",
            VariantKind::ULongInt => "ulongint",
            VariantKind::LongDouble => "longdouble",
            VariantKind::BigInt => "bigint",
            VariantKind::AtomString => "atomstring",
            VariantKind::Exception => "exception",
            VariantKind::String => "string",
            VariantKind::BSequence => "bsequence",
            VariantKind::Dynamic => "dynamic",
            VariantKind::Native => "native",
            VariantKind::Object => "object",
            VariantKind::Array => "array",
            VariantKind::Set => "set",
            VariantKind::Tuple => "tuple",
            VariantKind::SortedArray => "sortedarray",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(
            self,
            VariantKind::Object
                | VariantKind::Array
                | VariantKind::Set
                | VariantKind::Tuple
                | VariantKind::SortedArray
        )
    }
}

/// The payload behind a `Variant`. Containers hold an `Rc` to their own
/// struct rather than being inlined, so that cloning a `Variant` that wraps
/// a container is always a cheap refcount bump shared with every other
/// handle to the same container (spec section 3.1/3.3).
pub enum VariantData {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    LongInt(i64),
    ULongInt(u64),
    LongDouble(f64),
    BigInt(BigIntValue),
    AtomString(Atom),
    Exception(Atom),
    String(Rc<str>),
    BSequence(RefCell<Vec<u8>>),
    Dynamic(DynamicData),
    Native(NativeData),
    Object(Rc<Object>),
    Array(Rc<Array>),
    Set(Rc<VariantSet>),
    Tuple(Rc<Tuple>),
    SortedArray(Rc<SortedArray>),
}

/// A handle to a variant value. Cloning is a refcount bump (`make_ref`);
/// there is no deep-copy constructor, matching the original interpreter's
/// copy-on-write-free, purely refcounted model (spec section 3.1).
pub struct Variant(pub(crate) Rc<VariantData>);

impl Variant {
    pub fn data(&self) -> &VariantData {
        &self.0
    }

    pub fn kind(&self) -> VariantKind {
        match &*self.0 {
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

    /// A fresh `undefined` value, used as the `<nothing>` placeholder slot
    /// in a post-listener's `argv` where the original interpreter has no
    /// prior value to report (spec section 8 scenario 3).
    pub fn nothing() -> Variant {
        Variant::from(VariantData::Undefined)
    }

    /// Bumps the refcount and returns a new handle to the same value
    /// (`purc_variant_ref` in the original interpreter).
    pub fn make_ref(&self) -> Variant {
        Variant(self.0.clone())
    }

    /// Number of live handles to this value, including `self`.
    pub fn refcount(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(*self.0, VariantData::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(*self.0, VariantData::Null)
    }

    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    /// Truthiness used by control-flow constructs that accept a variant as
    /// a condition: undefined, null, `false`, a zero number, an empty
    /// string and an empty container are all falsy.
    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            VariantData::Undefined | VariantData::Null => false,
            VariantData::Boolean(b) => *b,
            VariantData::Number(n) | VariantData::LongDouble(n) => *n != 0.0,
            VariantData::LongInt(n) => *n != 0,
            VariantData::ULongInt(n) => *n != 0,
            VariantData::BigInt(b) => b.to_i64().map(|n| n != 0).unwrap_or(true),
            VariantData::String(s) => !s.is_empty(),
            VariantData::BSequence(b) => !b.borrow().is_empty(),
            VariantData::Array(a) => a.len() != 0,
            VariantData::Object(o) => o.len() != 0,
            VariantData::Set(s) => s.len() != 0,
            VariantData::Tuple(t) => t.len() != 0,
            VariantData::SortedArray(s) => s.len() != 0,
            _ => true,
        }
    }
}

impl Clone for Variant {
    fn clone(&self) -> Self {
        self.make_ref()
    }
}

impl From<VariantData> for Variant {
    fn from(data: VariantData) -> Self {
        Variant(Rc::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_ref_bumps_refcount() {
        let heap = VariantHeap::new();
        let v = heap.make_number(3.0);
        let before = v.refcount();
        let r = v.make_ref();
        assert_eq!(r.refcount(), before + 1);
        assert_eq!(v.refcount(), before + 1);
    }

    #[test]
    fn truthiness_matches_empty_container_rule() {
        let heap = VariantHeap::new();
        assert!(!heap.undefined().is_truthy());
        assert!(!heap.null().is_truthy());
        assert!(!heap.boolean(false).is_truthy());
        assert!(heap.boolean(true).is_truthy());
        assert!(!heap.make_number(0.0).is_truthy());
        assert!(heap.make_number(1.0).is_truthy());
    }
}
