//! Process-wide map from class name to counter array.
//!
//! Instrumented code reaches its counters by class name alone, through the static entry
//! points named by the constants below. The instrumenter declares the slot count of every
//! class it rewrites; the array itself is created on the first request and lives as long as
//! the registry.
//!
//! # Thread Safety
//!
//! Lookups of existing arrays only take a shard read lock. Creation goes through the map's
//! entry API, so racing first requests for one class end up with the same array.

use std::sync::Arc;

use dashmap::DashMap;
use log::warn;

use crate::runtime::{IdentityCache, HitArray, TestTracker, TraceMask};

/// Internal name of the class hosting the counter entry points.
pub const REGISTRY_OWNER: &str = "covscope/runtime/HitRegistry";
/// Static field caching the counter array in instrumented classes.
pub const HITS_FIELD: &str = "__$hits$";
/// Accessor generated into classes using the field strategy.
pub const HITS_INIT: &str = "__$hitsInit$";
/// Entry point returning a counting array.
pub const HITS_METHOD: &str = "hitsFor";
/// Entry point returning a flag array.
pub const FLAGS_METHOD: &str = "flagsFor";
/// Entry point returning the trace mask.
pub const TRACE_METHOD: &str = "traceFor";
/// Bootstrap of the counting array constant.
pub const HITS_CONSTANT: &str = "hitsConstant";
/// Bootstrap of the flag array constant.
pub const FLAGS_CONSTANT: &str = "flagsConstant";
/// Descriptor of [`HITS_METHOD`].
pub const HITS_DESCRIPTOR: &str = "(Ljava/lang/String;)[I";
/// Descriptor of [`FLAGS_METHOD`] and [`TRACE_METHOD`].
pub const FLAGS_DESCRIPTOR: &str = "(Ljava/lang/String;)[Z";
/// Descriptor of the constant bootstraps.
pub const CONSTANT_BOOTSTRAP_DESCRIPTOR: &str =
    "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;Ljava/lang/String;)Ljava/lang/Object;";

/// Counter arrays of all instrumented classes.
#[derive(Debug, Default)]
pub struct HitRegistry {
    layouts: DashMap<String, u32>,
    arrays: DashMap<String, Arc<HitArray>>,
    cache: IdentityCache,
    tracker: TestTracker,
}

impl HitRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the slot count of an instrumented class.
    ///
    /// A redeclaration with a different count only affects arrays created afterwards.
    pub fn declare(&self, class: &str, slots: u32) {
        if let Some(previous) = self.layouts.insert(class.to_string(), slots) {
            if previous != slots && self.arrays.contains_key(class) {
                warn!("{class} redeclared with {slots} slots, keeping the existing {previous}");
            }
        }
    }

    /// Declared slot count of `class`.
    #[must_use]
    pub fn slot_count(&self, class: &str) -> Option<u32> {
        self.layouts.get(class).map(|slots| *slots.value())
    }

    /// Counter array of `class`, created on first request.
    ///
    /// Undeclared classes get an empty array.
    pub fn hits_for(&self, class: &str) -> Arc<HitArray> {
        if let Some(hits) = self.arrays.get(class) {
            return Arc::clone(hits.value());
        }

        let slots = self.slot_count(class).unwrap_or_else(|| {
            warn!("counters requested for undeclared class {class}");
            0
        });
        Arc::clone(
            self.arrays
                .entry(class.to_string())
                .or_insert_with(|| Arc::new(HitArray::new(slots as usize)))
                .value(),
        )
    }

    /// Like [`HitRegistry::hits_for`], but answers repeated requests with the same name
    /// instance from the identity cache.
    pub fn hits_for_cached(&self, class: &Arc<str>) -> Arc<HitArray> {
        if let Some(hits) = self.cache.get(class) {
            return hits;
        }
        let hits = self.hits_for(class);
        self.cache.insert(class, &hits);
        hits
    }

    /// Trace mask of `class`, sized like its counter array.
    pub fn trace_for(&self, class: &str) -> Arc<TraceMask> {
        let slots = self.slot_count(class).unwrap_or(0);
        self.tracker.mask(class, slots as usize)
    }

    /// Existing counter array of `class`.
    #[must_use]
    pub fn lookup(&self, class: &str) -> Option<Arc<HitArray>> {
        self.arrays.get(class).map(|hits| Arc::clone(hits.value()))
    }

    /// Current counters of `class`; zeros for a declared class whose code never ran.
    #[must_use]
    pub fn counters(&self, class: &str) -> Option<Vec<u32>> {
        match self.lookup(class) {
            Some(hits) => Some(hits.snapshot()),
            None => self.slot_count(class).map(|slots| vec![0; slots as usize]),
        }
    }

    /// Per-test tracing state.
    #[must_use]
    pub fn tracker(&self) -> &TestTracker {
        &self.tracker
    }

    /// Identity cache statistics.
    #[must_use]
    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Zeroes every counter array.
    pub fn reset(&self) {
        for hits in self.arrays.iter() {
            hits.value().reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_arrays_are_sized() {
        let registry = HitRegistry::new();
        registry.declare("pkg/Foo", 3);
        let hits = registry.hits_for("pkg/Foo");
        assert_eq!(hits.len(), 3);
        assert!(Arc::ptr_eq(&hits, &registry.hits_for("pkg/Foo")));

        hits.increment(1);
        assert_eq!(registry.counters("pkg/Foo"), Some(vec![0, 1, 0]));
        registry.reset();
        assert_eq!(registry.counters("pkg/Foo"), Some(vec![0, 0, 0]));
    }

    #[test]
    fn undeclared_and_unused() {
        let registry = HitRegistry::new();
        assert!(registry.hits_for("pkg/Missing").is_empty());
        registry.declare("pkg/Idle", 2);
        assert!(registry.lookup("pkg/Idle").is_none());
        assert_eq!(registry.counters("pkg/Idle"), Some(vec![0, 0]));
        assert_eq!(registry.counters("pkg/Unknown"), None);
    }

    #[test]
    fn cached_lookup() {
        let registry = HitRegistry::new();
        registry.declare("pkg/Foo", 1);
        let name: Arc<str> = Arc::from("pkg/Foo");
        let first = registry.hits_for_cached(&name);
        let second = registry.hits_for_cached(&name);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.cache().misses(), 1);
    }

    #[test]
    fn concurrent_first_requests_share_one_array() {
        let registry = Arc::new(HitRegistry::new());
        registry.declare("pkg/Foo", 8);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.hits_for("pkg/Foo"))
            })
            .collect();
        let arrays: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        assert!(arrays.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }
}
