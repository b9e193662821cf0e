//! The `tuple` container (spec section 4.1): fixed length, null-padded,
//! slots replaceable but never inserted or removed.

use super::impl_parent_link;
use crate::error::{fail, PurcError, PurcResult};
use crate::variant::listener::link_child;
use crate::variant::{ContainerHeader, Op, ParentLink, Variant, VariantData};
use std::rc::Rc;

#[derive(Default)]
pub struct Tuple {
    pub(crate) header: ContainerHeader,
    slots: std::cell::RefCell<Vec<Variant>>,
}

impl_parent_link!(Tuple);

impl Tuple {
    /// Builds a tuple of exactly `size` slots, filling any slots beyond
    /// `items.len()` with `null`.
    pub fn new(size: usize, mut items: Vec<Variant>) -> Rc<Tuple> {
        items.truncate(size);
        while items.len() < size {
            items.push(Variant::from(VariantData::Null));
        }
        Rc::new(Tuple {
            header: ContainerHeader::default(),
            slots: std::cell::RefCell::new(items),
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Variant> {
        self.slots.borrow().get(index).map(Variant::make_ref)
    }

    pub fn set(self: &Rc<Self>, index: usize, value: Variant) -> PurcResult<Variant> {
        if index >= self.len() {
            return fail(PurcError::NoSuchKey);
        }
        link_child(self.clone(), self.identity(), &value)?;
        let old = self.header.dispatch_mutation(
            Op::Modified,
            &[value.make_ref()],
            || std::mem::replace(&mut self.slots.borrow_mut()[index], value),
            &[],
        );
        Ok(old)
    }

    pub fn equal(&self, other: &Tuple) -> bool {
        let a = self.slots.borrow();
        let b = other.slots.borrow();
        a.len() == b.len()
            && a.iter().zip(b.iter()).all(|(x, y)| crate::variant::equal(x, y))
    }
}

impl Drop for Tuple {
    fn drop(&mut self) {
        self.header.fire_releasing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantHeap;

    #[test]
    fn short_initializer_is_null_padded() {
        let heap = VariantHeap::new();
        let t = Tuple::new(3, vec![heap.make_number(1.0)]);
        assert_eq!(t.len(), 3);
        assert!(t.get(1).unwrap().is_null());
        assert!(t.get(2).unwrap().is_null());
    }

    #[test]
    fn set_out_of_range_fails() {
        let t = Tuple::new(2, vec![]);
        let heap = VariantHeap::new();
        assert!(t.set(5, heap.make_number(1.0)).is_err());
    }
}
