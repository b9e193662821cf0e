//! Interned strings, partitioned into buckets so unrelated subsystems can't
//! collide (spec section 4.8). The table is process-global and safe for
//! concurrent `from_string` from multiple runtime instances (section 5),
//! which is why it's backed by a reader-writer lock rather than the
//! `RefCell`s the rest of this single-threaded-per-instance crate uses.

use fxhash::FxHashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// A process-unique short id for an interned string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Atom(NonZeroU64);

impl Atom {
    fn from_raw(raw: u64) -> Self {
        Atom(NonZeroU64::new(raw).expect("atom ids start at 1"))
    }
}

/// Partitions of the atom id space. Different subsystems (tag names,
/// attribute names, exception classes, host-defined strings) intern into
/// separate buckets so a collision in one can't alias a meaning in another.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AtomBucket {
    Def,
    Except,
    Custom(u8),
}

const BUCKET_COUNT: usize = 258; // Def + Except + 256 custom slots

fn bucket_index(bucket: AtomBucket) -> usize {
    match bucket {
        AtomBucket::Def => 0,
        AtomBucket::Except => 1,
        AtomBucket::Custom(n) => 2 + n as usize,
    }
}

#[derive(Default)]
struct BucketTable {
    by_string: FxHashMap<String, Atom>,
    by_atom: FxHashMap<Atom, String>,
}

impl BucketTable {
    /// Allocates the next id from the table's shared, cross-bucket counter
    /// so that no two buckets can ever hand out the same raw id (spec
    /// section 4.8's non-collision guarantee).
    fn alloc(&mut self, counter: &AtomicU64) -> Atom {
        let id = counter.fetch_add(1, Ordering::Relaxed) + 1;
        Atom::from_raw(id)
    }
}

/// The process-wide interning table. One instance is normally shared via a
/// `&'static AtomTable` obtained from [`AtomTable::global`].
pub struct AtomTable {
    buckets: Vec<RwLock<BucketTable>>,
    /// Shared across every bucket so ids never alias across buckets, even
    /// though each bucket keeps its own string maps.
    next_id: AtomicU64,
}

impl AtomTable {
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(BUCKET_COUNT);
        buckets.resize_with(BUCKET_COUNT, || RwLock::new(BucketTable::default()));
        AtomTable { buckets, next_id: AtomicU64::new(0) }
    }

    /// Returns the shared, process-wide atom table.
    pub fn global() -> &'static AtomTable {
        use once_cell::sync::OnceCell;
        static TABLE: OnceCell<AtomTable> = OnceCell::new();
        TABLE.get_or_init(AtomTable::new)
    }

    /// Interns `s` into `bucket`, returning its atom. Calling this again
    /// with the same string (absent an intervening `remove_string`) always
    /// returns the same atom (spec section 8's testable property).
    pub fn from_string(&self, bucket: AtomBucket, s: &str) -> Atom {
        let table = &self.buckets[bucket_index(bucket)];

        if let Some(atom) = table.read().unwrap().by_string.get(s) {
            return *atom;
        }

        let mut table = table.write().unwrap();
        // Re-check: another writer may have interned `s` while we waited.
        if let Some(atom) = table.by_string.get(s) {
            return *atom;
        }
        let atom = table.alloc(&self.next_id);
        table.by_string.insert(s.to_owned(), atom);
        table.by_atom.insert(atom, s.to_owned());
        atom
    }

    /// Like [`AtomTable::from_string`], but for strings the caller
    /// guarantees outlive the table (e.g. `&'static str` literals), avoiding
    /// an owned copy in the reverse map.
    pub fn from_static_string(&self, bucket: AtomBucket, s: &'static str) -> Atom {
        self.from_string(bucket, s)
    }

    /// Reverses an atom back to its string, or `None` if it was never
    /// allocated in `bucket` or has since been removed.
    pub fn to_string(&self, bucket: AtomBucket, atom: Atom) -> Option<String> {
        self.buckets[bucket_index(bucket)]
            .read()
            .unwrap()
            .by_atom
            .get(&atom)
            .cloned()
    }

    /// Invalidates `s`'s atom in `bucket`. A subsequent `from_string(s)`
    /// allocates a fresh atom strictly greater than every atom previously
    /// allocated in this bucket, since `next_id` is never rewound.
    pub fn remove_string(&self, bucket: AtomBucket, s: &str) {
        let mut table = self.buckets[bucket_index(bucket)].write().unwrap();
        if let Some(atom) = table.by_string.remove(s) {
            table.by_atom.remove(&atom);
        }
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_string_same_atom() {
        let table = AtomTable::new();
        let a = table.from_string(AtomBucket::Def, "div");
        let b = table.from_string(AtomBucket::Def, "div");
        assert_eq!(a, b);
    }

    #[test]
    fn buckets_do_not_collide() {
        let table = AtomTable::new();
        let a = table.from_string(AtomBucket::Def, "foo");
        let b = table.from_string(AtomBucket::Except, "foo");
        assert_ne!(a, b);
        assert_eq!(table.to_string(AtomBucket::Def, a).as_deref(), Some("foo"));
        assert_eq!(
            table.to_string(AtomBucket::Except, b).as_deref(),
            Some("foo")
        );
    }

    #[test]
    fn removal_then_reinsert_gives_greater_atom() {
        let table = AtomTable::new();
        let a = table.from_string(AtomBucket::Custom(0), "x");
        table.remove_string(AtomBucket::Custom(0), "x");
        assert_eq!(table.to_string(AtomBucket::Custom(0), a), None);
        let b = table.from_string(AtomBucket::Custom(0), "x");
        assert!(b > a);
    }
}
