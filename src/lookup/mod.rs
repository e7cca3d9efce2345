pub mod ordered;
pub mod random_access;

use serde::{Deserialize, Serialize};

use crate::common::GroupKey;

pub use ordered::Lookup;
pub use random_access::RandomAccessLookup;

/// Traversal state for [`KeyLookup::next_live`]. Opaque to callers; each
/// lookup implementation interprets the fields its own way.
#[derive(Debug, Clone, Default)]
pub struct RangeCursor {
    outer: usize,
    inner: usize,
    generation: Option<u64>,
    end: Option<usize>,
    last_key: Option<GroupKey>,
}

/// A container mapping group keys to per-partition values.
pub trait KeyLookup<V> {
    fn lookup(&self, key: &GroupKey) -> Option<&V>;

    fn lookup_mut(&mut self, key: &GroupKey) -> Option<&mut V>;

    /// Returns the value for `key`, inserting the result of `create` first if
    /// the key is absent.
    fn lookup_or_create<F>(&mut self, key: &GroupKey, create: F) -> &mut V
    where
        F: FnOnce() -> V;

    /// Sets the value for `key`, overwriting any existing value.
    fn set(&mut self, key: GroupKey, value: V);

    /// Removes `key`, returning the value it held.
    fn delete(&mut self, key: &GroupKey) -> Option<V>;

    /// Visits every live entry. The order is deterministic for a given
    /// sequence of operations.
    fn range<F>(&self, f: F)
    where
        F: FnMut(&GroupKey, &V);

    /// Advances `cursor` to the next live entry and returns a copy of it.
    /// Safe to interleave with `set` and `delete`.
    fn next_live(&self, cursor: &mut RangeCursor) -> Option<(GroupKey, V)>
    where
        V: Clone;

    /// Like [`KeyLookup::range`], but the callback gets the lookup back and
    /// may `set` or `delete` entries while the traversal is in progress.
    fn range_mut<F>(&mut self, mut f: F)
    where
        Self: Sized,
        V: Clone,
        F: FnMut(&mut Self, &GroupKey, V),
    {
        let mut cursor = RangeCursor::default();
        while let Some((key, value)) = self.next_live(&mut cursor) {
            f(self, &key, value);
        }
    }

    fn clear(&mut self);

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    /// Sorted lookup tuned for keys arriving mostly in ascending order.
    #[default]
    Ordered,
    /// Hash-indexed lookup for unordered access patterns.
    RandomAccess,
}

/// Either lookup implementation, picked at runtime from a [`LookupKind`].
#[derive(Debug)]
pub enum AnyLookup<V> {
    Ordered(Lookup<V>),
    RandomAccess(RandomAccessLookup<V>),
}

impl<V> AnyLookup<V> {
    pub fn new(kind: LookupKind) -> Self {
        match kind {
            LookupKind::Ordered => AnyLookup::Ordered(Lookup::new()),
            LookupKind::RandomAccess => AnyLookup::RandomAccess(RandomAccessLookup::new()),
        }
    }

    pub fn kind(&self) -> LookupKind {
        match self {
            AnyLookup::Ordered(_) => LookupKind::Ordered,
            AnyLookup::RandomAccess(_) => LookupKind::RandomAccess,
        }
    }
}

impl<V> KeyLookup<V> for AnyLookup<V> {
    fn lookup(&self, key: &GroupKey) -> Option<&V> {
        match self {
            AnyLookup::Ordered(l) => l.lookup(key),
            AnyLookup::RandomAccess(l) => l.lookup(key),
        }
    }

    fn lookup_mut(&mut self, key: &GroupKey) -> Option<&mut V> {
        match self {
            AnyLookup::Ordered(l) => l.lookup_mut(key),
            AnyLookup::RandomAccess(l) => l.lookup_mut(key),
        }
    }

    fn lookup_or_create<F>(&mut self, key: &GroupKey, create: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            AnyLookup::Ordered(l) => l.lookup_or_create(key, create),
            AnyLookup::RandomAccess(l) => l.lookup_or_create(key, create),
        }
    }

    fn set(&mut self, key: GroupKey, value: V) {
        match self {
            AnyLookup::Ordered(l) => l.set(key, value),
            AnyLookup::RandomAccess(l) => l.set(key, value),
        }
    }

    fn delete(&mut self, key: &GroupKey) -> Option<V> {
        match self {
            AnyLookup::Ordered(l) => l.delete(key),
            AnyLookup::RandomAccess(l) => l.delete(key),
        }
    }

    fn range<F>(&self, f: F)
    where
        F: FnMut(&GroupKey, &V),
    {
        match self {
            AnyLookup::Ordered(l) => l.range(f),
            AnyLookup::RandomAccess(l) => l.range(f),
        }
    }

    fn next_live(&self, cursor: &mut RangeCursor) -> Option<(GroupKey, V)>
    where
        V: Clone,
    {
        match self {
            AnyLookup::Ordered(l) => l.next_live(cursor),
            AnyLookup::RandomAccess(l) => l.next_live(cursor),
        }
    }

    fn clear(&mut self) {
        match self {
            AnyLookup::Ordered(l) => l.clear(),
            AnyLookup::RandomAccess(l) => l.clear(),
        }
    }

    fn len(&self) -> usize {
        match self {
            AnyLookup::Ordered(l) => l.len(),
            AnyLookup::RandomAccess(l) => l.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ColType, GroupKeyBuilder};

    fn key(a: &str) -> GroupKey {
        GroupKeyBuilder::new().add("a", ColType::String, a).build().unwrap()
    }

    #[test]
    fn test_any_lookup_dispatch() {
        for kind in [LookupKind::Ordered, LookupKind::RandomAccess] {
            let mut l: AnyLookup<i32> = AnyLookup::new(kind);
            assert_eq!(l.kind(), kind);
            l.set(key("b"), 2);
            l.set(key("a"), 1);
            *l.lookup_or_create(&key("a"), || 0) += 10;
            assert_eq!(l.lookup(&key("a")), Some(&11));

            let mut seen = Vec::new();
            l.range_mut(|l, k, v| {
                l.delete(k);
                seen.push(v);
            });
            seen.sort();
            assert_eq!(seen, vec![2, 11]);
            assert!(l.is_empty());
        }
    }

    #[test]
    fn test_lookup_kind_serde() {
        let kind: LookupKind = serde_json::from_str("\"random_access\"").unwrap();
        assert_eq!(kind, LookupKind::RandomAccess);
        assert_eq!(LookupKind::default(), LookupKind::Ordered);
    }
}
