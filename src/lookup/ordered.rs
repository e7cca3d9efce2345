use std::cell::Cell;

use tracing::trace;

use crate::common::GroupKey;
use crate::lookup::{KeyLookup, RangeCursor};

/// A key and its value. `None` marks a tombstone left behind by `delete`.
#[derive(Debug)]
struct Element<V> {
    key: GroupKey,
    value: Option<V>,
}

/// A sorted run of keys. Inserts always land at the end of some run; inserting
/// into the middle splits the run in two.
#[derive(Debug)]
struct KeyGroup<V> {
    id: u64,
    elements: Vec<Element<V>>,
    deleted: usize,
}

impl<V> KeyGroup<V> {
    fn first(&self) -> &GroupKey {
        &self.elements[0].key
    }

    /// Position of `key` if present, otherwise the position it would be
    /// inserted at to keep the run sorted.
    fn insert_at(&self, key: &GroupKey) -> usize {
        match self.elements.last() {
            Some(last) if last.key < *key => self.elements.len(),
            _ => self.elements.partition_point(|e| e.key < *key),
        }
    }

    /// Position of a live element equal to `key`.
    fn index(&self, key: &GroupKey) -> Option<usize> {
        let i = self.insert_at(key);
        match self.elements.get(i) {
            Some(e) if e.value.is_some() && e.key == *key => Some(i),
            _ => None,
        }
    }

    fn is_dead(&self) -> bool {
        self.deleted == self.elements.len()
    }
}

/// Ordered map from [`GroupKey`] to `V`, optimized for keys that arrive in
/// ascending order. Appends and lookups of the most recently touched run are
/// O(1); anything else is a binary search over runs and then within a run.
///
/// `range` always visits keys in ascending order.
#[derive(Debug)]
pub struct Lookup<V> {
    groups: Vec<KeyGroup<V>>,
    // Run that was last found or appended to.
    last_group: Cell<Option<usize>>,
    next_id: u64,
    len: usize,
}

impl<V> Default for Lookup<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Lookup<V> {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            last_group: Cell::new(None),
            next_id: 1,
            len: 0,
        }
    }

    /// Number of internal sorted runs.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Live entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &V)> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.elements.iter())
            .filter_map(|e| e.value.as_ref().map(|v| (&e.key, v)))
    }

    fn new_group(&mut self, elements: Vec<Element<V>>, deleted: usize) -> KeyGroup<V> {
        let id = self.next_id;
        self.next_id += 1;
        KeyGroup { id, elements, deleted }
    }

    /// Index of the last run whose first key is <= `key`, or `None` if `key`
    /// sorts before every run.
    fn find_group(&self, key: &GroupKey) -> Option<usize> {
        if let Some(last) = self.last_group.get() {
            if let Some(group) = self.groups.get(last) {
                let before_next = self
                    .groups
                    .get(last + 1)
                    .map_or(true, |next| key < next.first());
                if group.first() <= key && before_next {
                    return Some(last);
                }
            }
        }

        let index = self.groups.partition_point(|g| g.first() <= key);
        if index == 0 {
            return None;
        }
        self.last_group.set(Some(index - 1));
        Some(index - 1)
    }

    fn position(&self, key: &GroupKey) -> Option<(usize, usize)> {
        let g = self.find_group(key)?;
        let i = self.groups[g].index(key)?;
        Some((g, i))
    }

    /// Returns the slot for `key`, creating an empty one if the key has never
    /// been stored. An empty slot counts as deleted until it is filled.
    fn entry(&mut self, key: GroupKey) -> (usize, usize) {
        let Some(g) = self.find_group(&key) else {
            let group = self.new_group(vec![Element { key, value: None }], 1);
            self.groups.insert(0, group);
            self.last_group.set(Some(0));
            return (0, 0);
        };

        let group = &mut self.groups[g];
        let i = group.insert_at(&key);
        if i == group.elements.len() {
            group.elements.push(Element { key, value: None });
            group.deleted += 1;
            return (g, i);
        }
        if group.elements[i].key == key {
            return (g, i);
        }

        // Split: everything from `i` moves into a new run right after this
        // one so the key can be appended here.
        let tail = group.elements.split_off(i);
        let tail_deleted = tail.iter().filter(|e| e.value.is_none()).count();
        group.deleted -= tail_deleted;
        group.elements.push(Element { key, value: None });
        group.deleted += 1;

        if tail_deleted == tail.len() {
            trace!(group = g, dropped = tail.len(), "dropping tombstoned tail of split group");
        } else {
            trace!(group = g, moved = tail.len(), "splitting key group");
            let new_group = self.new_group(tail, tail_deleted);
            self.groups.insert(g + 1, new_group);
        }
        (g, i)
    }

    /// Locates the run with generation `id`, starting near `hint`.
    fn locate_group(&self, hint: usize, id: u64) -> Option<usize> {
        let near = [hint, hint.wrapping_sub(1), hint + 1];
        near.into_iter()
            .find(|&i| self.groups.get(i).map_or(false, |g| g.id == id))
            .or_else(|| self.groups.iter().position(|g| g.id == id))
    }
}

impl<V> KeyLookup<V> for Lookup<V> {
    fn lookup(&self, key: &GroupKey) -> Option<&V> {
        let (g, i) = self.position(key)?;
        self.groups[g].elements[i].value.as_ref()
    }

    fn lookup_mut(&mut self, key: &GroupKey) -> Option<&mut V> {
        let (g, i) = self.position(key)?;
        self.groups[g].elements[i].value.as_mut()
    }

    fn lookup_or_create<F>(&mut self, key: &GroupKey, create: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let (g, i) = match self.position(key) {
            Some(pos) => pos,
            None => self.entry(key.clone()),
        };
        let group = &mut self.groups[g];
        let slot = &mut group.elements[i].value;
        if slot.is_none() {
            group.deleted -= 1;
            self.len += 1;
        }
        slot.get_or_insert_with(create)
    }

    fn set(&mut self, key: GroupKey, value: V) {
        let (g, i) = self.entry(key);
        let group = &mut self.groups[g];
        if group.elements[i].value.replace(value).is_none() {
            group.deleted -= 1;
            self.len += 1;
        }
    }

    fn delete(&mut self, key: &GroupKey) -> Option<V> {
        let (g, i) = self.position(key)?;
        let group = &mut self.groups[g];
        let value = group.elements[i].value.take();
        group.deleted += 1;
        self.len -= 1;

        if group.is_dead() {
            trace!(group = g, id = group.id, "removing empty key group");
            self.groups.remove(g);
            self.last_group.set(None);
        }
        value
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
        loop {
            let Some(id) = cursor.generation else {
                let group = self.groups.get(cursor.outer)?;
                cursor.generation = Some(group.id);
                cursor.inner = 0;
                continue;
            };

            let Some(g) = self.locate_group(cursor.outer, id) else {
                // The run went away; whatever shifted into its slot is next.
                cursor.generation = None;
                continue;
            };
            cursor.outer = g;

            let group = &self.groups[g];
            while let Some(element) = group.elements.get(cursor.inner) {
                cursor.inner += 1;
                let Some(value) = &element.value else {
                    continue;
                };
                // Splits may move already visited keys into a later run.
                if cursor.last_key.as_ref().map_or(false, |last| element.key <= *last) {
                    continue;
                }
                cursor.last_key = Some(element.key.clone());
                return Some((element.key.clone(), value.clone()));
            }

            cursor.outer = g + 1;
            cursor.generation = None;
        }
    }

    fn clear(&mut self) {
        self.groups.clear();
        self.last_group.set(None);
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }
}
