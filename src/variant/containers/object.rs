//! The `object` container (spec section 4.1): an ordered string-keyed map
//! plus the set-algebra merge operations (`unite`, `intersect`, `subtract`,
//! `xor`, `overwrite`).

use super::impl_parent_link;
use crate::error::{fail, PurcError, PurcResult};
use crate::variant::listener::link_child;
use crate::variant::{ContainerHeader, Op, ParentLink, Variant};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// How a merge operation resolves a key present on both sides (spec
/// section 4.2's `IGNORE`/`OVERWRITE`/`COMPLAIN` conflict-resolution
/// policies).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConflictResolution {
    /// Keep the receiver's existing value.
    Ignore,
    /// Replace with the other object's value.
    Overwrite,
    /// Fail the whole operation with `Duplicated`.
    Complain,
}

/// How `overwrite` treats a key present in the patch object but absent from
/// the receiver.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NotFoundPolicy {
    /// Silently skip keys the receiver doesn't already have.
    Ignore,
    /// Insert the key as a new entry.
    Insert,
    /// Fail the whole operation with `NoSuchKey`.
    Fail,
}

#[derive(Default)]
pub struct Object {
    pub(crate) header: ContainerHeader,
    entries: RefCell<BTreeMap<String, Variant>>,
}

impl_parent_link!(Object);

impl Object {
    pub fn new() -> Rc<Object> {
        Rc::new(Object::default())
    }

    pub fn from_entries(entries: BTreeMap<String, Variant>) -> Rc<Object> {
        Rc::new(Object {
            header: ContainerHeader::default(),
            entries: RefCell::new(entries),
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<Variant> {
        self.entries.borrow().get(key).map(Variant::make_ref)
    }

    fn link(self: &Rc<Self>, child: &Variant) -> PurcResult<()> {
        link_child(self.clone(), self.identity(), child)
    }

    pub fn set(self: &Rc<Self>, key: impl Into<String>, value: Variant) -> PurcResult<Option<Variant>> {
        self.link(&value)?;
        let key = key.into();
        let old_snapshot = self.get(&key);
        let op = if old_snapshot.is_some() {
            Op::Modified
        } else {
            Op::Inflated
        };
        let inserted = value.make_ref();
        let old = self.header.dispatch_mutation(
            op,
            &[inserted.make_ref()],
            || self.entries.borrow_mut().insert(key, value),
            &[old_snapshot.unwrap_or_else(Variant::nothing), inserted],
        );
        Ok(old)
    }

    pub fn remove(self: &Rc<Self>, key: &str) -> PurcResult<Variant> {
        if !self.entries.borrow().contains_key(key) {
            return fail(PurcError::NoSuchKey);
        }
        let removed = self.header.dispatch_mutation(
            Op::Deflated,
            &[],
            || self.entries.borrow_mut().remove(key).unwrap(),
            &[],
        );
        Ok(removed)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn equal(&self, other: &Object) -> bool {
        let a = self.entries.borrow();
        let b = other.entries.borrow();
        a.len() == b.len()
            && a.iter().all(|(k, v)| b.get(k).map_or(false, |w| crate::variant::equal(v, w)))
    }

    /// Merges `other`'s entries into `self`, per `resolution` for keys
    /// present on both sides.
    pub fn unite(self: &Rc<Self>, other: &Object, resolution: ConflictResolution) -> PurcResult<()> {
        for (k, v) in other.entries.borrow().iter() {
            let exists = self.entries.borrow().contains_key(k);
            if exists {
                match resolution {
                    ConflictResolution::Ignore => continue,
                    ConflictResolution::Complain => return fail(PurcError::Duplicated),
                    ConflictResolution::Overwrite => {}
                }
            }
            self.set(k.clone(), v.make_ref())?;
        }
        Ok(())
    }

    /// Keeps only keys present in both `self` and `other`.
    pub fn intersect(self: &Rc<Self>, other: &Object) -> PurcResult<()> {
        let to_remove: Vec<String> = self
            .entries
            .borrow()
            .keys()
            .filter(|k| !other.entries.borrow().contains_key(*k))
            .cloned()
            .collect();
        for k in to_remove {
            self.remove(&k)?;
        }
        Ok(())
    }

    /// Removes every key present in `other` from `self`.
    pub fn subtract(self: &Rc<Self>, other: &Object) -> PurcResult<()> {
        let to_remove: Vec<String> = other
            .entries
            .borrow()
            .keys()
            .filter(|k| self.entries.borrow().contains_key(*k))
            .cloned()
            .collect();
        for k in to_remove {
            self.remove(&k)?;
        }
        Ok(())
    }

    /// Keeps keys present in exactly one of `self` and `other`, copying
    /// `other`'s exclusive keys in.
    pub fn xor(self: &Rc<Self>, other: &Object) -> PurcResult<()> {
        let shared: Vec<String> = self
            .entries
            .borrow()
            .keys()
            .filter(|k| other.entries.borrow().contains_key(*k))
            .cloned()
            .collect();
        for k in &shared {
            self.remove(k)?;
        }
        for (k, v) in other.entries.borrow().iter() {
            if !shared.contains(k) {
                self.set(k.clone(), v.make_ref())?;
            }
        }
        Ok(())
    }

    /// Applies `patch`'s values onto `self`; `resolution` decides what
    /// happens to a key `self` already has (`Complain` fails the whole
    /// operation on the first conflict), `not_found` decides what happens to
    /// patch keys `self` lacks.
    pub fn overwrite(
        self: &Rc<Self>,
        patch: &Object,
        resolution: ConflictResolution,
        not_found: NotFoundPolicy,
    ) -> PurcResult<()> {
        for (k, v) in patch.entries.borrow().iter() {
            let exists = self.entries.borrow().contains_key(k);
            if exists {
                match resolution {
                    ConflictResolution::Ignore => continue,
                    ConflictResolution::Complain => return fail(PurcError::Duplicated),
                    ConflictResolution::Overwrite => {}
                }
                self.set(k.clone(), v.make_ref())?;
            } else {
                match not_found {
                    NotFoundPolicy::Ignore => continue,
                    NotFoundPolicy::Insert => {
                        self.set(k.clone(), v.make_ref())?;
                    }
                    NotFoundPolicy::Fail => return fail(PurcError::NoSuchKey),
                }
            }
        }
        Ok(())
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        self.header.fire_releasing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantHeap;

    #[test]
    fn set_and_get() {
        let heap = VariantHeap::new();
        let obj = Object::new();
        obj.set("a", heap.make_number(1.0)).unwrap();
        assert!(crate::variant::equal(&obj.get("a").unwrap(), &heap.make_number(1.0)));
    }

    #[test]
    fn unite_keeps_existing_under_ignore() {
        let heap = VariantHeap::new();
        let a = Object::new();
        a.set("x", heap.make_number(1.0)).unwrap();
        let b = Object::new();
        b.set("x", heap.make_number(2.0)).unwrap();
        b.set("y", heap.make_number(3.0)).unwrap();

        a.unite(&b, ConflictResolution::Ignore).unwrap();
        assert!(crate::variant::equal(&a.get("x").unwrap(), &heap.make_number(1.0)));
        assert!(crate::variant::equal(&a.get("y").unwrap(), &heap.make_number(3.0)));
    }

    #[test]
    fn unite_complains_on_conflicting_key() {
        let heap = VariantHeap::new();
        let a = Object::new();
        a.set("x", heap.make_number(1.0)).unwrap();
        let b = Object::new();
        b.set("x", heap.make_number(2.0)).unwrap();

        assert!(a.unite(&b, ConflictResolution::Complain).is_err());
    }

    #[test]
    fn subtract_removes_shared_keys() {
        let heap = VariantHeap::new();
        let a = Object::new();
        a.set("x", heap.make_number(1.0)).unwrap();
        a.set("y", heap.make_number(2.0)).unwrap();
        let b = Object::new();
        b.set("x", heap.make_number(9.0)).unwrap();

        a.subtract(&b).unwrap();
        assert!(a.get("x").is_none());
        assert!(a.get("y").is_some());
    }
}
