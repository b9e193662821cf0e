//! The `array` container (spec section 4.1): an ordered, growable list of
//! variants.

use super::impl_parent_link;
use crate::error::{fail, PurcError, PurcResult};
use crate::variant::listener::link_child;
use crate::variant::{ContainerHeader, Op, ParentLink, Variant};
use std::rc::Rc;

#[derive(Default)]
pub struct Array {
    pub(crate) header: ContainerHeader,
    items: std::cell::RefCell<Vec<Variant>>,
}

impl_parent_link!(Array);

impl Array {
    pub fn new() -> Rc<Array> {
        Rc::new(Array::default())
    }

    pub fn from_vec(items: Vec<Variant>) -> Rc<Array> {
        Rc::new(Array {
            header: ContainerHeader::default(),
            items: std::cell::RefCell::new(items),
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Variant> {
        self.items.borrow().get(index).map(Variant::make_ref)
    }

    fn link(self: &Rc<Self>, child: &Variant) -> PurcResult<()> {
        link_child(self.clone(), self.identity(), child)
    }

    pub fn append(self: &Rc<Self>, value: Variant) -> PurcResult<()> {
        self.link(&value)?;
        let inserted = value.make_ref();
        self.header.dispatch_mutation(
            Op::Inflated,
            &[inserted.make_ref()],
            || {
                self.items.borrow_mut().push(value);
            },
            &[Variant::nothing(), inserted],
        );
        Ok(())
    }

    pub fn prepend(self: &Rc<Self>, value: Variant) -> PurcResult<()> {
        self.link(&value)?;
        let inserted = value.make_ref();
        self.header.dispatch_mutation(
            Op::Inflated,
            &[inserted.make_ref()],
            || {
                self.items.borrow_mut().insert(0, value);
            },
            &[Variant::nothing(), inserted],
        );
        Ok(())
    }

    pub fn insert_before(self: &Rc<Self>, index: usize, value: Variant) -> PurcResult<()> {
        if index > self.len() {
            return fail(PurcError::NoSuchKey);
        }
        self.link(&value)?;
        let inserted = value.make_ref();
        self.header.dispatch_mutation(
            Op::Inflated,
            &[inserted.make_ref()],
            || {
                self.items.borrow_mut().insert(index, value);
            },
            &[Variant::nothing(), inserted],
        );
        Ok(())
    }

    pub fn insert_after(self: &Rc<Self>, index: usize, value: Variant) -> PurcResult<()> {
        self.insert_before(index + 1, value)
    }

    pub fn set(self: &Rc<Self>, index: usize, value: Variant) -> PurcResult<Variant> {
        if index >= self.len() {
            return fail(PurcError::NoSuchKey);
        }
        self.link(&value)?;
        let old_snapshot = self.get(index).unwrap_or_else(Variant::nothing);
        let inserted = value.make_ref();
        let old = self.header.dispatch_mutation(
            Op::Modified,
            &[inserted.make_ref()],
            || std::mem::replace(&mut self.items.borrow_mut()[index], value),
            &[old_snapshot, inserted],
        );
        Ok(old)
    }

    pub fn remove(self: &Rc<Self>, index: usize) -> PurcResult<Variant> {
        if index >= self.len() {
            return fail(PurcError::NoSuchKey);
        }
        let removed = self.header.dispatch_mutation(
            Op::Deflated,
            &[],
            || self.items.borrow_mut().remove(index),
            &[],
        );
        Ok(removed)
    }

    pub fn clear(self: &Rc<Self>) {
        self.header.dispatch_mutation(
            Op::Deflated,
            &[],
            || self.items.borrow_mut().clear(),
            &[],
        );
    }

    pub fn iter(&self) -> Vec<Variant> {
        self.items.borrow().iter().map(Variant::make_ref).collect()
    }

    pub fn equal(&self, other: &Array) -> bool {
        let a = self.items.borrow();
        let b = other.items.borrow();
        a.len() == b.len()
            && a.iter().zip(b.iter()).all(|(x, y)| crate::variant::equal(x, y))
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        self.header.fire_releasing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantHeap;

    #[test]
    fn append_and_get_roundtrip() {
        let heap = VariantHeap::new();
        let arr = Array::new();
        arr.append(heap.make_number(1.0)).unwrap();
        arr.append(heap.make_number(2.0)).unwrap();
        assert_eq!(arr.len(), 2);
        assert!(crate::variant::equal(&arr.get(1).unwrap(), &heap.make_number(2.0)));
    }

    #[test]
    fn remove_out_of_range_fails() {
        let arr = Array::new();
        assert!(arr.remove(0).is_err());
    }

    #[test]
    fn post_inflated_listener_sees_nothing_then_appended_value() {
        // Spec section 8 scenario 3: after `append(42)`, the post `INFLATED`
        // listener fires once with `argv=[<nothing>, 42]`.
        let heap = VariantHeap::new();
        let arr = Array::new();
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        arr.header().add_listener(
            crate::variant::Phase::Post,
            vec![Op::Inflated],
            Rc::new(move |_, argv| seen2.borrow_mut().push(argv.to_vec())),
        );

        arr.append(heap.make_number(42.0)).unwrap();

        let calls = seen.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
        assert!(calls[0][0].is_undefined());
        assert!(crate::variant::equal(&calls[0][1], &heap.make_number(42.0)));
    }

    #[test]
    fn reverse_update_propagates_to_parent() {
        let heap = VariantHeap::new();
        let inner = Array::new();
        let outer = Array::new();
        outer
            .append(Variant::from(crate::variant::VariantData::Array(inner.clone())))
            .unwrap();

        let notified = Rc::new(std::cell::Cell::new(false));
        let notified2 = notified.clone();
        outer.header().add_listener(
            crate::variant::Phase::Post,
            vec![Op::Modified],
            Rc::new(move |_, _| notified2.set(true)),
        );

        inner.append(heap.make_number(42.0)).unwrap();
        assert!(notified.get());
    }
}
