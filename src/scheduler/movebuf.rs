//! Cross-instance variant transfer (spec section 4.5.5). A `Variant` is
//! tied to the `VariantHeap` (and, for `AtomString`s, the `AtomTable`) that
//! created it, so moving a value to another runtime instance means walking
//! its structure into a heap-independent form and reconstructing it against
//! the destination's heap and atom table, re-interning any atoms by string
//! along the way.

use crate::atom::{AtomBucket, AtomTable};
use crate::variant::{Array, Object, Variant, VariantData, VariantHeap};

/// A variant's value, detached from any particular heap or atom table.
pub enum MovedValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    LongInt(i64),
    ULongInt(u64),
    LongDouble(f64),
    AtomString(String),
    String(String),
    Array(Vec<MovedValue>),
    Object(Vec<(String, MovedValue)>),
}

/// Detaches `v` from its heap (spec section 4.5.5's `move_out`). Only the
/// plain eJSON-shaped kinds cross a process boundary; `dynamic`/`native`/
/// `set`/`tuple`/`sortedarray`/`bsequence` members are dropped to
/// `Undefined`, matching the original interpreter restricting cross-
/// instance messages to eJSON-representable data.
pub fn move_out(atoms: &AtomTable, v: &Variant) -> MovedValue {
    match v.data() {
        VariantData::Undefined => MovedValue::Undefined,
        VariantData::Null => MovedValue::Null,
        VariantData::Boolean(b) => MovedValue::Boolean(*b),
        VariantData::Number(n) => MovedValue::Number(*n),
        VariantData::LongInt(n) => MovedValue::LongInt(*n),
        VariantData::ULongInt(n) => MovedValue::ULongInt(*n),
        VariantData::LongDouble(n) => MovedValue::LongDouble(*n),
        VariantData::AtomString(a) => {
            MovedValue::AtomString(atoms.to_string(AtomBucket::Def, *a).unwrap_or_default())
        }
        VariantData::String(s) => MovedValue::String(s.to_string()),
        VariantData::Array(arr) => {
            MovedValue::Array(arr.iter().map(|m| move_out(atoms, &m)).collect())
        }
        VariantData::Object(obj) => MovedValue::Object(
            obj.keys()
                .into_iter()
                .map(|k| {
                    let val = obj.get(&k).expect("key just listed by `keys()`");
                    (k, move_out(atoms, &val))
                })
                .collect(),
        ),
        _ => MovedValue::Undefined,
    }
}

/// Reconstructs a detached value against `heap`/`atoms` (spec section
/// 4.5.5's `move_in`).
pub fn move_in(heap: &VariantHeap, atoms: &AtomTable, v: MovedValue) -> Variant {
    match v {
        MovedValue::Undefined => heap.undefined(),
        MovedValue::Null => heap.null(),
        MovedValue::Boolean(b) => heap.boolean(b),
        MovedValue::Number(n) => heap.make_number(n),
        MovedValue::LongInt(n) => heap.make_longint(n),
        MovedValue::ULongInt(n) => heap.make_ulongint(n),
        MovedValue::LongDouble(n) => heap.make_longdouble(n),
        MovedValue::AtomString(s) => {
            let atom = atoms.from_string(AtomBucket::Def, &s);
            heap.make_atomstring(atom)
        }
        MovedValue::String(s) => heap.make_string(s),
        MovedValue::Array(items) => {
            let arr = Array::new();
            for item in items {
                arr.append(move_in(heap, atoms, item))
                    .expect("freshly built array can't cycle");
            }
            Variant::from(VariantData::Array(arr))
        }
        MovedValue::Object(entries) => {
            let obj = Object::new();
            for (k, val) in entries {
                obj.set(k, move_in(heap, atoms, val))
                    .expect("freshly built object can't cycle");
            }
            Variant::from(VariantData::Object(obj))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomBucket;

    #[test]
    fn round_trips_nested_structure_across_heaps() {
        let src_heap = VariantHeap::new();
        let src_atoms = AtomTable::new();
        let dst_heap = VariantHeap::new();
        let dst_atoms = AtomTable::new();

        let arr = Array::new();
        arr.append(src_heap.make_number(1.0)).unwrap();
        arr.append(src_heap.make_atomstring(src_atoms.from_string(AtomBucket::Def, "tag")))
            .unwrap();
        let original = Variant::from(VariantData::Array(arr));

        let detached = move_out(&src_atoms, &original);
        let rebuilt = move_in(&dst_heap, &dst_atoms, detached);

        match rebuilt.data() {
            VariantData::Array(arr) => {
                assert_eq!(arr.len(), 2);
                match arr.get(1).unwrap().data() {
                    VariantData::AtomString(a) => {
                        assert_eq!(dst_atoms.to_string(AtomBucket::Def, *a).as_deref(), Some("tag"));
                    }
                    _ => panic!("expected atomstring"),
                }
            }
            _ => panic!("expected array"),
        }
    }
}
