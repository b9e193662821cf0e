//! The `sorted-array` container (spec section 4.1): array-shaped storage
//! kept ordered at all times by a caller-supplied comparator, the one
//! container kind modeled on the original interpreter's native-backed
//! variant rather than a plain data structure.

use super::impl_parent_link;
use crate::error::{fail, PurcError, PurcResult};
use crate::variant::listener::link_child;
use crate::variant::{ContainerHeader, Op, ParentLink, Variant};
use std::cmp::Ordering;
use std::rc::Rc;

pub type Comparator = Rc<dyn Fn(&Variant, &Variant) -> Ordering>;

pub struct SortedArray {
    pub(crate) header: ContainerHeader,
    items: std::cell::RefCell<Vec<Variant>>,
    comparator: Comparator,
}

impl_parent_link!(SortedArray);

impl SortedArray {
    pub fn new(comparator: Comparator) -> Rc<SortedArray> {
        Rc::new(SortedArray {
            header: ContainerHeader::default(),
            items: std::cell::RefCell::new(Vec::new()),
            comparator,
        })
    }

    pub fn with_compare_mode(mode: crate::variant::CompareMode) -> Rc<SortedArray> {
        Self::new(Rc::new(move |a, b| crate::variant::compare(a, b, mode)))
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

    /// Inserts `value` at the position its comparator dictates, returning
    /// that position. Fails with `Duplicated` if the comparator already
    /// places an existing member at the same key (spec section 4.2:
    /// "Duplicate keys are not allowed").
    pub fn insert(self: &Rc<Self>, value: Variant) -> PurcResult<usize> {
        let search = {
            let items = self.items.borrow();
            items.binary_search_by(|probe| (self.comparator)(probe, &value))
        };
        let pos = match search {
            Ok(_) => return fail(PurcError::Duplicated),
            Err(e) => e,
        };
        self.link(&value)?;
        let inserted = value.make_ref();
        self.header.dispatch_mutation(
            Op::Inflated,
            &[inserted.make_ref()],
            || self.items.borrow_mut().insert(pos, value),
            &[Variant::nothing(), inserted],
        );
        Ok(pos)
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

    /// Binary-searches for `value` using the same comparator that keeps the
    /// array ordered.
    pub fn find(&self, value: &Variant) -> Option<usize> {
        self.items
            .borrow()
            .binary_search_by(|probe| (self.comparator)(probe, value))
            .ok()
    }

    pub fn equal(&self, other: &SortedArray) -> bool {
        let a = self.items.borrow();
        let b = other.items.borrow();
        a.len() == b.len()
            && a.iter().zip(b.iter()).all(|(x, y)| crate::variant::equal(x, y))
    }
}

impl Drop for SortedArray {
    fn drop(&mut self) {
        self.header.fire_releasing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantHeap;

    #[test]
    fn insert_keeps_ascending_order() {
        let heap = VariantHeap::new();
        let sa = SortedArray::with_compare_mode(crate::variant::CompareMode::Number);
        sa.insert(heap.make_number(3.0)).unwrap();
        sa.insert(heap.make_number(1.0)).unwrap();
        sa.insert(heap.make_number(2.0)).unwrap();

        let vals: Vec<f64> = (0..sa.len())
            .map(|i| match sa.get(i).unwrap().data() {
                crate::variant::VariantData::Number(n) => *n,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(vals, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn find_locates_existing_value() {
        let heap = VariantHeap::new();
        let sa = SortedArray::with_compare_mode(crate::variant::CompareMode::Number);
        sa.insert(heap.make_number(5.0)).unwrap();
        sa.insert(heap.make_number(10.0)).unwrap();
        assert_eq!(sa.find(&heap.make_number(10.0)), Some(1));
        assert_eq!(sa.find(&heap.make_number(99.0)), None);
    }

    #[test]
    fn inserting_a_duplicate_key_fails() {
        let heap = VariantHeap::new();
        let sa = SortedArray::with_compare_mode(crate::variant::CompareMode::Number);
        sa.insert(heap.make_number(1.0)).unwrap();
        assert!(sa.insert(heap.make_number(1.0)).is_err());
        assert_eq!(sa.len(), 1);
    }
}
