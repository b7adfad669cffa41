//! Slot+generation table backing every handle passed across the C ABI.
//!
//! A raw handle packs the slot index in the upper 32 bits and the slot's
//! generation in the lower 32. Removing an entry bumps the generation, so
//! stale and double-destroyed handles resolve to nothing.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Handle {
    slot: u32,
    generation: u32,
}

impl Handle {
    fn to_raw(self) -> u64 {
        (u64::from(self.slot) << 32) | u64::from(self.generation)
    }

    fn from_raw(raw: u64) -> Self {
        Self {
            slot: (raw >> 32) as u32,
            generation: raw as u32,
        }
    }
}

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Owned values addressed by `u64` handles.
pub(crate) struct HandleTable<T> {
    entries: Vec<Entry<T>>,
    vacant: Vec<u32>,
}

impl<T> HandleTable<T> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            vacant: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> u64 {
        let slot = match self.vacant.pop() {
            Some(slot) => slot,
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    value: None,
                });
                (self.entries.len() - 1) as u32
            }
        };
        let entry = &mut self.entries[slot as usize];
        entry.value = Some(value);
        Handle {
            slot,
            generation: entry.generation,
        }
        .to_raw()
    }

    fn entry(&self, raw: u64) -> Option<&Entry<T>> {
        let h = Handle::from_raw(raw);
        self.entries
            .get(h.slot as usize)
            .filter(|e| e.generation == h.generation)
    }

    pub(crate) fn get(&self, raw: u64) -> Option<&T> {
        self.entry(raw)?.value.as_ref()
    }

    /// Take the value out and invalidate `raw`.
    ///
    /// A slot whose generation wraps to zero is retired rather than reused,
    /// so handles from its first life can never match again.
    pub(crate) fn remove(&mut self, raw: u64) -> Option<T> {
        let h = Handle::from_raw(raw);
        let entry = self
            .entries
            .get_mut(h.slot as usize)
            .filter(|e| e.generation == h.generation)?;
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        if entry.generation != 0 {
            self.vacant.push(h.slot);
        }
        Some(value)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_encoding_splits_slot_and_generation() {
        let h = Handle {
            slot: 3,
            generation: 7,
        };
        assert_eq!(h.to_raw(), (3 << 32) | 7);
        assert_eq!(Handle::from_raw(h.to_raw()), h);
    }

    #[test]
    fn insert_then_get() {
        let mut table = HandleTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_ne!(a, b);
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn removed_handle_goes_stale() {
        let mut table = HandleTable::new();
        let h = table.insert(5u8);
        assert_eq!(table.remove(h), Some(5));
        assert_eq!(table.get(h), None);
        assert_eq!(table.remove(h), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn reused_slot_gets_a_new_generation() {
        let mut table = HandleTable::new();
        let old = table.insert(1u8);
        table.remove(old);
        let new = table.insert(2u8);

        let (o, n) = (Handle::from_raw(old), Handle::from_raw(new));
        assert_eq!(o.slot, n.slot);
        assert_eq!(n.generation, o.generation + 1);
        assert_eq!(table.get(old), None);
        assert_eq!(table.get(new), Some(&2));
    }

    #[test]
    fn never_issued_handle_is_unknown() {
        let table: HandleTable<u8> = HandleTable::new();
        assert_eq!(table.get(u64::MAX), None);
        assert_eq!(table.get(0), None);
    }

    #[test]
    fn wrapped_generation_retires_the_slot() {
        let mut table = HandleTable::new();
        let h = table.insert(0u8);
        table.entries[0].generation = u32::MAX;
        let h = Handle {
            generation: u32::MAX,
            ..Handle::from_raw(h)
        }
        .to_raw();

        assert_eq!(table.remove(h), Some(0));
        assert_eq!(table.entries[0].generation, 0);
        assert!(table.vacant.is_empty());

        let fresh = table.insert(9u8);
        assert_eq!(Handle::from_raw(fresh).slot, 1);
        assert_eq!(table.get(Handle { slot: 0, generation: 0 }.to_raw()), None);
    }
}
