use std::collections::HashMap;

use crate::common::GroupKey;
use crate::lookup::{KeyLookup, RangeCursor};

#[derive(Debug)]
struct Slot<V> {
    key: GroupKey,
    // None once deleted.
    value: Option<V>,
    // Next slot whose key hashes to the same bucket.
    next: Option<usize>,
}

/// Hash-indexed map from [`GroupKey`] to `V` for keys arriving in no
/// particular order. Keys that collide on the 64-bit hash are chained.
///
/// `range` visits keys in first-insertion order. Deleting leaves the slot in
/// place, so setting a deleted key again revives it at its old position.
#[derive(Debug)]
pub struct RandomAccessLookup<V> {
    slots: Vec<Slot<V>>,
    index: HashMap<u64, usize>,
    hasher: fn(&GroupKey) -> u64,
    len: usize,
}

impl<V> Default for RandomAccessLookup<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RandomAccessLookup<V> {
    pub fn new() -> Self {
        Self::with_hasher(GroupKey::hash64)
    }

    /// Uses `hasher` instead of the key's own hash to pick buckets.
    pub fn with_hasher(hasher: fn(&GroupKey) -> u64) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            hasher,
            len: 0,
        }
    }

    /// Live entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &V)> + '_ {
        self.slots
            .iter()
            .filter_map(|s| s.value.as_ref().map(|v| (&s.key, v)))
    }

    /// Slot holding `key`, deleted or not.
    fn find(&self, key: &GroupKey) -> Option<usize> {
        let mut cur = self.index.get(&(self.hasher)(key)).copied();
        while let Some(i) = cur {
            let slot = &self.slots[i];
            if slot.key == *key {
                return Some(i);
            }
            cur = slot.next;
        }
        None
    }

    /// Slot for `key`, appending an empty one to the bucket chain if needed.
    fn entry(&mut self, key: GroupKey) -> usize {
        let hash = (self.hasher)(&key);
        let Some(&head) = self.index.get(&hash) else {
            let i = self.push(key);
            self.index.insert(hash, i);
            return i;
        };

        let mut cur = head;
        loop {
            if self.slots[cur].key == key {
                return cur;
            }
            match self.slots[cur].next {
                Some(next) => cur = next,
                None => break,
            }
        }
        let i = self.push(key);
        self.slots[cur].next = Some(i);
        i
    }

    fn push(&mut self, key: GroupKey) -> usize {
        self.slots.push(Slot { key, value: None, next: None });
        self.slots.len() - 1
    }
}

impl<V> KeyLookup<V> for RandomAccessLookup<V> {
    fn lookup(&self, key: &GroupKey) -> Option<&V> {
        self.slots[self.find(key)?].value.as_ref()
    }

    fn lookup_mut(&mut self, key: &GroupKey) -> Option<&mut V> {
        let i = self.find(key)?;
        self.slots[i].value.as_mut()
    }

    fn lookup_or_create<F>(&mut self, key: &GroupKey, create: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let i = match self.find(key) {
            Some(i) => i,
            None => self.entry(key.clone()),
        };
        let slot = &mut self.slots[i].value;
        if slot.is_none() {
            self.len += 1;
        }
        slot.get_or_insert_with(create)
    }

    fn set(&mut self, key: GroupKey, value: V) {
        let i = self.entry(key);
        if self.slots[i].value.replace(value).is_none() {
            self.len += 1;
        }
    }

    fn delete(&mut self, key: &GroupKey) -> Option<V> {
        let i = self.find(key)?;
        let value = self.slots[i].value.take()?;
        self.len -= 1;
        Some(value)
    }

    fn range<F>(&self, mut f: F)
    where
        F: FnMut(&GroupKey, &V),
    {
        for (key, value) in self.iter() {
            f(key, value);
        }
    }

    fn next_live(&self, cursor: &mut RangeCursor) -> Option<(GroupKey, V)>
    where
        V: Clone,
    {
        // Slots appended after the traversal started are left for the next one.
        let end = *cursor.end.get_or_insert(self.slots.len());
        while cursor.outer < end.min(self.slots.len()) {
            let slot = &self.slots[cursor.outer];
            cursor.outer += 1;
            if let Some(value) = &slot.value {
                return Some((slot.key.clone(), value.clone()));
            }
        }
        None
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }
}
