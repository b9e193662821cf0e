//! The `set` container (spec section 4.1): an insertion-ordered collection
//! deduplicated by an MD5 fingerprint, either over one or more named keys
//! (a keyed set backing an object array) or over the whole member value.
//!
//! Grounded in the original interpreter's `md5[33]`/`unique_key` fields and
//! its `pcvariant_md5_by_set`/`pcvariant_diff_by_set` helpers.

use super::impl_parent_link;
use crate::error::{fail, PurcError, PurcResult};
use crate::variant::listener::link_child;
use crate::variant::{ContainerHeader, Op, ParentLink, Variant, VariantData};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// How [`VariantSet::add`] resolves a value whose fingerprint already has a
/// member (spec section 4.2's "`add(v, cr_method)` resolves collisions per
/// the chosen policy", mirroring [`super::object::ConflictResolution`]'s
/// three-way split for object merges).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CrMethod {
    /// Keep the existing member, discarding the new value.
    Ignore,
    /// Replace the existing member with the new value.
    Overwrite,
    /// Fail the whole operation with `Duplicated`.
    Complain,
}

#[derive(Default)]
pub struct VariantSet {
    pub(crate) header: ContainerHeader,
    /// Object field names used to compute the fingerprint; empty means
    /// "fingerprint the whole member value".
    unique_keys: Vec<String>,
    /// Whether key projections are case-folded before fingerprinting (spec
    /// section 3.1's "a boolean `caseless` flag").
    caseless: bool,
    members: RefCell<Vec<Variant>>,
    /// fingerprint (32 hex chars) -> index into `members`.
    by_fingerprint: RefCell<HashMap<String, usize>>,
}

impl_parent_link!(VariantSet);

impl VariantSet {
    /// A whole-value-deduplicated, case-sensitive set.
    pub fn new(unique_keys: Vec<String>) -> Rc<VariantSet> {
        Self::new_keyed(unique_keys, false)
    }

    /// A set parameterized by its unique keys and `caseless` flag (spec
    /// section 4.2's "A generic set ... A keyed set is parameterized at
    /// creation by an ordered list of unique keys and a boolean `caseless`
    /// flag").
    pub fn new_keyed(unique_keys: Vec<String>, caseless: bool) -> Rc<VariantSet> {
        Rc::new(VariantSet {
            header: ContainerHeader::default(),
            unique_keys,
            caseless,
            members: RefCell::new(Vec::new()),
            by_fingerprint: RefCell::new(HashMap::new()),
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Vec<Variant> {
        self.members.borrow().iter().map(Variant::make_ref).collect()
    }

    pub fn unique_keys(&self) -> &[String] {
        &self.unique_keys
    }

    pub fn caseless(&self) -> bool {
        self.caseless
    }

    fn fold(&self, text: String) -> String {
        if self.caseless {
            text.to_lowercase()
        } else {
            text
        }
    }

    /// Computes the 32-hex-char fingerprint for `value`, hashing either the
    /// named unique-key fields (pulled out of an object member; a missing
    /// field projects as `undefined`, per spec section 4.2) or the whole
    /// value's canonical text form.
    fn fingerprint(&self, value: &Variant) -> String {
        let text = if self.unique_keys.is_empty() {
            canonical_text(value)
        } else if let VariantData::Object(obj) = value.data() {
            self.unique_keys
                .iter()
                .map(|k| obj.get(k).map(|v| canonical_text(&v)).unwrap_or_else(|| "undefined".to_string()))
                .collect::<Vec<_>>()
                .join("\u{1}")
        } else {
            canonical_text(value)
        };
        self.digest(self.fold(text))
    }

    /// Computes the fingerprint from explicit key values, one per unique
    /// key in order (spec section 4.2's "`remove_member_by_key_values` and
    /// `get_member_by_key_values` accept exactly one argument per unique
    /// key"). A missing trailing value projects as `undefined`.
    fn fingerprint_from_key_values(&self, key_values: &[Variant]) -> String {
        let text = self
            .unique_keys
            .iter()
            .enumerate()
            .map(|(i, _)| {
                key_values
                    .get(i)
                    .map(canonical_text)
                    .unwrap_or_else(|| "undefined".to_string())
            })
            .collect::<Vec<_>>()
            .join("\u{1}");
        self.digest(self.fold(text))
    }

    fn digest(&self, text: String) -> String {
        format!("{:x}", md5::compute(text.as_bytes()))
    }

    pub fn contains_fingerprint(&self, value: &Variant) -> bool {
        self.by_fingerprint.borrow().contains_key(&self.fingerprint(value))
    }

    fn link(self: &Rc<Self>, child: &Variant) -> PurcResult<()> {
        link_child(self.clone(), self.identity(), child)
    }

    /// Adds `value`, resolving a fingerprint collision per `cr` (spec
    /// section 4.2).
    pub fn add(self: &Rc<Self>, value: Variant, cr: CrMethod) -> PurcResult<()> {
        let fp = self.fingerprint(&value);
        if let Some(&idx) = self.by_fingerprint.borrow().get(&fp) {
            return match cr {
                CrMethod::Ignore => Ok(()),
                CrMethod::Complain => fail(PurcError::Duplicated),
                CrMethod::Overwrite => {
                    self.link(&value)?;
                    self.header.dispatch_mutation(
                        Op::Modified,
                        &[value.make_ref()],
                        || self.members.borrow_mut()[idx] = value,
                        &[],
                    );
                    Ok(())
                }
            };
        }
        self.link(&value)?;
        self.header.dispatch_mutation(
            Op::Inflated,
            &[value.make_ref()],
            || {
                let idx = self.members.borrow().len();
                self.members.borrow_mut().push(value);
                self.by_fingerprint.borrow_mut().insert(fp, idx);
            },
            &[],
        );
        Ok(())
    }

    fn remove_at_fingerprint(self: &Rc<Self>, fp: &str, idx: usize) -> Variant {
        self.header.dispatch_mutation(
            Op::Deflated,
            &[],
            || {
                let removed = self.members.borrow_mut().remove(idx);
                self.by_fingerprint.borrow_mut().remove(fp);
                // Every index after `idx` shifted down by one.
                for slot in self.by_fingerprint.borrow_mut().values_mut() {
                    if *slot > idx {
                        *slot -= 1;
                    }
                }
                removed
            },
            &[],
        )
    }

    pub fn remove(self: &Rc<Self>, value: &Variant) -> PurcResult<Variant> {
        let fp = self.fingerprint(value);
        let idx = *self
            .by_fingerprint
            .borrow()
            .get(&fp)
            .ok_or(PurcError::NotExists)?;
        Ok(self.remove_at_fingerprint(&fp, idx))
    }

    /// Looks up a member by its unique-key projections directly, without
    /// needing a whole member value to hash (spec section 4.2). Returns
    /// `None` on a set with no unique keys, since there is nothing to
    /// project key values onto.
    pub fn get_member_by_key_values(&self, key_values: &[Variant]) -> Option<Variant> {
        if self.unique_keys.is_empty() {
            return None;
        }
        let fp = self.fingerprint_from_key_values(key_values);
        self.by_fingerprint
            .borrow()
            .get(&fp)
            .map(|&idx| self.members.borrow()[idx].make_ref())
    }

    /// Removes a member by its unique-key projections (spec section 4.2).
    pub fn remove_member_by_key_values(self: &Rc<Self>, key_values: &[Variant]) -> PurcResult<Variant> {
        if self.unique_keys.is_empty() {
            return fail(PurcError::InvalidValue);
        }
        let fp = self.fingerprint_from_key_values(key_values);
        let idx = *self
            .by_fingerprint
            .borrow()
            .get(&fp)
            .ok_or(PurcError::NotExists)?;
        Ok(self.remove_at_fingerprint(&fp, idx))
    }

    /// Set-equality: ignores order, compares by fingerprint membership.
    pub fn equal(&self, other: &VariantSet) -> bool {
        let a = self.by_fingerprint.borrow();
        let b = other.by_fingerprint.borrow();
        a.len() == b.len() && a.keys().all(|k| b.contains_key(k))
    }
}

impl Drop for VariantSet {
    fn drop(&mut self) {
        self.header.fire_releasing();
    }
}

fn canonical_text(v: &Variant) -> String {
    match v.data() {
        VariantData::Undefined => "undefined".to_string(),
        VariantData::Null => "null".to_string(),
        VariantData::Boolean(b) => b.to_string(),
        VariantData::Number(n) | VariantData::LongDouble(n) => n.to_string(),
        VariantData::LongInt(n) => n.to_string(),
        VariantData::ULongInt(n) => n.to_string(),
        VariantData::BigInt(b) => b.to_decimal_string(),
        VariantData::String(s) => s.to_string(),
        VariantData::AtomString(a) => crate::atom::AtomTable::global()
            .to_string(crate::atom::AtomBucket::Def, *a)
            .unwrap_or_default(),
        VariantData::BSequence(b) => hex_encode(&b.borrow()),
        _ => format!("{:p}", v.data()),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantHeap;

    #[test]
    fn duplicate_by_value_is_rejected() {
        let heap = VariantHeap::new();
        let set = VariantSet::new(vec![]);
        set.add(heap.make_number(1.0), CrMethod::Complain).unwrap();
        assert!(set.add(heap.make_number(1.0), CrMethod::Complain).is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn ignore_keeps_existing_member() {
        let heap = VariantHeap::new();
        let set = VariantSet::new(vec![]);
        set.add(heap.make_number(1.0), CrMethod::Complain).unwrap();
        set.add(heap.make_number(1.0), CrMethod::Ignore).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn keyed_uniqueness_uses_named_fields() {
        let heap = VariantHeap::new();
        let set = VariantSet::new(vec!["id".to_string()]);

        let obj1 = crate::variant::Object::new();
        obj1.set("id", heap.make_number(1.0)).unwrap();
        obj1.set("name", heap.make_string("a")).unwrap();

        let obj2 = crate::variant::Object::new();
        obj2.set("id", heap.make_number(1.0)).unwrap();
        obj2.set("name", heap.make_string("b")).unwrap();

        set.add(Variant::from(VariantData::Object(obj1)), CrMethod::Complain)
            .unwrap();
        assert!(set
            .add(Variant::from(VariantData::Object(obj2)), CrMethod::Complain)
            .is_err());
    }

    /// `make_set(["id"], [{id:1,v:'a'}, {id:2,v:'b'}, {id:1,v:'c'}], OVERWRITE)`
    /// yields a 2-member set whose `id=1` member has `v='c'` (spec section 8
    /// scenario 2).
    #[test]
    fn overwrite_keeps_the_last_insert_for_a_duplicate_key() {
        let heap = VariantHeap::new();
        let set = VariantSet::new(vec!["id".to_string()]);

        let make = |id: f64, v: &str| {
            let obj = crate::variant::Object::new();
            obj.set("id", heap.make_number(id)).unwrap();
            obj.set("v", heap.make_string(v)).unwrap();
            Variant::from(VariantData::Object(obj))
        };

        set.add(make(1.0, "a"), CrMethod::Overwrite).unwrap();
        set.add(make(2.0, "b"), CrMethod::Overwrite).unwrap();
        set.add(make(1.0, "c"), CrMethod::Overwrite).unwrap();

        assert_eq!(set.len(), 2);
        let found = set.get_member_by_key_values(&[heap.make_number(1.0)]).unwrap();
        match found.data() {
            VariantData::Object(obj) => {
                let v = obj.get("v").unwrap();
                match v.data() {
                    VariantData::String(s) => assert_eq!(s.as_ref(), "c"),
                    _ => panic!("expected string"),
                }
            }
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn caseless_set_folds_string_keys() {
        let heap = VariantHeap::new();
        let set = VariantSet::new_keyed(vec![], true);
        set.add(heap.make_string("Hello"), CrMethod::Complain).unwrap();
        assert!(set.add(heap.make_string("hello"), CrMethod::Complain).is_err());
    }

    #[test]
    fn remove_member_by_key_values_drops_the_match() {
        let heap = VariantHeap::new();
        let set = VariantSet::new(vec!["id".to_string()]);
        let obj = crate::variant::Object::new();
        obj.set("id", heap.make_number(7.0)).unwrap();
        set.add(Variant::from(VariantData::Object(obj)), CrMethod::Complain)
            .unwrap();

        set.remove_member_by_key_values(&[heap.make_number(7.0)]).unwrap();
        assert!(set.is_empty());
        assert!(set.remove_member_by_key_values(&[heap.make_number(7.0)]).is_err());
    }
}
