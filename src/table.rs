//! Open-addressed, linear-probed hash table used both for the string intern
//! set and for the VM's globals map. Tombstones keep probe sequences intact
//! across deletion; the table grows (doubling) once it crosses a 0.75 load
//! factor.

const INITIAL_CAPACITY: usize = 8;
const MAX_LOAD: f64 = 0.75;

fn fnv1a_hash(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

enum Slot<V> {
    Empty,
    Tombstone,
    Occupied(String, V),
}

pub struct Table<V> {
    entries: Vec<Slot<V>>,
    /// occupied + tombstone count, used to trigger growth early enough that
    /// tombstone buildup can never fill the table.
    count: usize,
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Table {
            entries: Vec::new(),
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(..)))
            .count()
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Finds the slot index a key with the given hash should occupy:
    /// either the existing occupied slot, or the first empty/tombstone slot
    /// seen along the probe sequence (so inserts can reuse tombstones).
    fn find_slot(entries: &[Slot<V>], key: &str, hash: u32) -> usize {
        let cap = entries.len();
        let mut index = hash as usize % cap;
        let mut first_tombstone: Option<usize> = None;
        loop {
            match &entries[index] {
                Slot::Empty => return first_tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                Slot::Occupied(k, _) if k == key => return index,
                Slot::Occupied(..) => {}
            }
            index = (index + 1) % cap;
        }
    }

    fn grow(&mut self) {
        let new_cap = if self.entries.is_empty() {
            INITIAL_CAPACITY
        } else {
            self.capacity() * 2
        };
        let mut new_entries: Vec<Slot<V>> = Vec::with_capacity(new_cap);
        for _ in 0..new_cap {
            new_entries.push(Slot::Empty);
        }
        let old = std::mem::replace(&mut self.entries, new_entries);
        self.count = 0;
        for slot in old {
            if let Slot::Occupied(key, value) = slot {
                let hash = fnv1a_hash(key.as_bytes());
                let idx = Self::find_slot(&self.entries, &key, hash);
                self.entries[idx] = Slot::Occupied(key, value);
                self.count += 1;
            }
        }
    }

    /// Inserts or overwrites `key`. Returns `true` if this created a new
    /// entry (the key was previously absent).
    pub fn set(&mut self, key: &str, value: V) -> bool {
        if self.entries.is_empty()
            || (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD
        {
            self.grow();
        }
        let hash = fnv1a_hash(key.as_bytes());
        let idx = Self::find_slot(&self.entries, key, hash);
        let is_new = !matches!(self.entries[idx], Slot::Occupied(..));
        if matches!(self.entries[idx], Slot::Empty) {
            self.count += 1;
        }
        self.entries[idx] = Slot::Occupied(key.to_string(), value);
        is_new
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        if self.entries.is_empty() {
            return None;
        }
        let hash = fnv1a_hash(key.as_bytes());
        let idx = Self::find_slot(&self.entries, key, hash);
        match &self.entries[idx] {
            Slot::Occupied(_, v) => Some(v),
            _ => None,
        }
    }

    /// Deletes `key`, leaving a tombstone so later probes past this slot
    /// still find their targets. Returns `true` if the key was present.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let hash = fnv1a_hash(key.as_bytes());
        let idx = Self::find_slot(&self.entries, key, hash);
        if matches!(self.entries[idx], Slot::Occupied(..)) {
            self.entries[idx] = Slot::Tombstone;
            true
        } else {
            false
        }
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Table::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut t = Table::new();
        assert!(t.set("a", 1));
        assert_eq!(t.get("a"), Some(&1));
        assert!(!t.set("a", 2));
        assert_eq!(t.get("a"), Some(&2));
    }

    #[test]
    fn delete_then_reprobe_past_tombstone() {
        let mut t: Table<i32> = Table::new();
        t.set("a", 1);
        t.set("b", 2);
        assert!(t.delete("a"));
        assert_eq!(t.get("a"), None);
        assert_eq!(t.get("b"), Some(&2));
    }

    #[test]
    fn grows_past_load_factor() {
        let mut t = Table::new();
        for i in 0..100 {
            t.set(&format!("k{i}"), i);
        }
        for i in 0..100 {
            assert_eq!(t.get(&format!("k{i}")), Some(&i));
        }
    }
}
