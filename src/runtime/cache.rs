//! Identity-keyed lookup cache in front of the registry.
//!
//! Rewritten code passes the same interned class-name instance on every call, so comparing
//! the name's address is enough to recognize a repeat. Each name hashes to one of a fixed
//! number of slots; a slot is filled once and never replaced. A colliding name simply keeps
//! going through the full registry lookup.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, OnceLock,
};

use crate::runtime::HitArray;

/// Number of cache slots.
pub const IDENTITY_CACHE_SIZE: usize = 32;

/// Fixed-size cache from class-name identity to counter array.
#[derive(Debug)]
pub struct IdentityCache {
    entries: [OnceLock<(Arc<str>, Arc<HitArray>)>; IDENTITY_CACHE_SIZE],
    misses: AtomicU64,
}

impl Default for IdentityCache {
    fn default() -> Self {
        IdentityCache {
            entries: std::array::from_fn(|_| OnceLock::new()),
            misses: AtomicU64::new(0),
        }
    }
}

fn slot_of(name: &Arc<str>) -> usize {
    // Heap addresses are at least 8 byte aligned.
    (Arc::as_ptr(name).cast::<u8>() as usize >> 3) % IDENTITY_CACHE_SIZE
}

impl IdentityCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached array of this exact name instance.
    #[must_use]
    pub fn get(&self, name: &Arc<str>) -> Option<Arc<HitArray>> {
        let hit = self.entries[slot_of(name)]
            .get()
            .filter(|(key, _)| Arc::ptr_eq(key, name))
            .map(|(_, hits)| Arc::clone(hits));
        if hit.is_none() {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Remembers `hits` for `name` if its slot is still free.
    pub fn insert(&self, name: &Arc<str>, hits: &Arc<HitArray>) {
        let _ = self.entries[slot_of(name)].set((Arc::clone(name), Arc::clone(hits)));
    }

    /// Number of lookups that fell through to the registry.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_not_equality() {
        let cache = IdentityCache::new();
        let name: Arc<str> = Arc::from("pkg/Foo");
        let hits = Arc::new(HitArray::new(2));

        assert!(cache.get(&name).is_none());
        cache.insert(&name, &hits);
        assert!(Arc::ptr_eq(&cache.get(&name).unwrap(), &hits));

        let copy: Arc<str> = Arc::from("pkg/Foo");
        assert!(cache.get(&copy).is_none());
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn occupied_slot_is_kept() {
        let cache = IdentityCache::new();
        let name: Arc<str> = Arc::from("pkg/Foo");
        let first = Arc::new(HitArray::new(1));
        cache.insert(&name, &first);
        cache.insert(&name, &Arc::new(HitArray::new(5)));
        assert_eq!(cache.get(&name).unwrap().len(), 1);
    }
}
