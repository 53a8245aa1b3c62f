//! Per-test line traces.
//!
//! Line probes of classes instrumented with tracking also set a bit in the class's trace mask.
//! The masks are cleared when a test starts and read out when it ends; the per-class lock is
//! only taken at those boundaries, never by probes.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use dashmap::DashMap;

use crate::{coverage::SlotId, Result};

/// Trace bits of one class, one per slot.
#[derive(Debug)]
pub struct TraceMask {
    bits: Box<[AtomicBool]>,
    lock: Mutex<()>,
}

impl TraceMask {
    /// Creates a cleared mask of `len` bits.
    #[must_use]
    pub fn new(len: usize) -> Self {
        TraceMask {
            bits: (0..len).map(|_| AtomicBool::new(false)).collect(),
            lock: Mutex::new(()),
        }
    }

    /// Number of bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns `true` for a mask without bits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Sets the bit of `slot`. Returns `false` if the slot is out of range.
    pub fn set(&self, slot: usize) -> bool {
        match self.bits.get(slot) {
            Some(bit) => {
                bit.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Reads the bit of `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> bool {
        self.bits
            .get(slot)
            .is_some_and(|bit| bit.load(Ordering::Relaxed))
    }

    /// Copies the bits.
    #[must_use]
    pub fn bits(&self) -> Vec<bool> {
        self.bits.iter().map(|bit| bit.load(Ordering::Relaxed)).collect()
    }

    /// Returns the set slots and clears the mask.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the mask lock is poisoned.
    pub fn take(&self) -> Result<Vec<SlotId>> {
        let _guard = lock!(self.lock)?;
        let mut set = Vec::new();
        for (slot, bit) in self.bits.iter().enumerate() {
            if bit.swap(false, Ordering::Relaxed) {
                set.push(u32::try_from(slot).unwrap_or(u32::MAX));
            }
        }
        Ok(set)
    }

    /// Clears the mask.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the mask lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        let _guard = lock!(self.lock)?;
        for bit in self.bits.iter() {
            bit.store(false, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Lines executed by one test.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestTrace {
    /// Test name
    pub name: String,
    /// Line slots set per class
    pub classes: BTreeMap<String, Vec<SlotId>>,
}

/// Owner of the trace masks and of the traces of finished tests.
#[derive(Debug, Default)]
pub struct TestTracker {
    masks: DashMap<String, Arc<TraceMask>>,
    archive: boxcar::Vec<TestTrace>,
}

impl TestTracker {
    /// Creates a tracker without masks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask of `class`, created with `len` bits on first request.
    pub fn mask(&self, class: &str, len: usize) -> Arc<TraceMask> {
        if let Some(mask) = self.masks.get(class) {
            return Arc::clone(mask.value());
        }
        Arc::clone(
            self.masks
                .entry(class.to_string())
                .or_insert_with(|| Arc::new(TraceMask::new(len)))
                .value(),
        )
    }

    /// Existing mask of `class`.
    #[must_use]
    pub fn lookup(&self, class: &str) -> Option<Arc<TraceMask>> {
        self.masks.get(class).map(|mask| Arc::clone(mask.value()))
    }

    /// Clears every mask before a test runs.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if a mask lock is poisoned.
    pub fn start_test(&self, name: &str) -> Result<()> {
        log::debug!("starting trace of {name}");
        for mask in self.masks.iter() {
            mask.value().clear()?;
        }
        Ok(())
    }

    /// Collects and clears the masks after a test ran and archives the trace.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if a mask lock is poisoned.
    pub fn end_test(&self, name: &str) -> Result<TestTrace> {
        let mut trace = TestTrace {
            name: name.to_string(),
            classes: BTreeMap::new(),
        };
        for mask in self.masks.iter() {
            let slots = mask.value().take()?;
            if !slots.is_empty() {
                trace.classes.insert(mask.key().clone(), slots);
            }
        }
        self.archive.push(trace.clone());
        Ok(trace)
    }

    /// Traces of all finished tests in completion order.
    #[must_use]
    pub fn traces(&self) -> Vec<TestTrace> {
        self.archive.iter().map(|(_, trace)| trace.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        let tracker = TestTracker::new();
        let mask = tracker.mask("pkg/Foo", 4);
        mask.set(1);
        tracker.start_test("first").unwrap();
        assert!(!mask.get(1));

        mask.set(2);
        mask.set(3);
        let trace = tracker.end_test("first").unwrap();
        assert_eq!(trace.classes["pkg/Foo"], vec![2, 3]);
        assert!(mask.bits().iter().all(|bit| !bit));

        tracker.start_test("second").unwrap();
        let trace = tracker.end_test("second").unwrap();
        assert!(trace.classes.is_empty());
        assert_eq!(tracker.traces().len(), 2);
    }

    #[test]
    fn mask_is_created_once() {
        let tracker = TestTracker::new();
        let first = tracker.mask("A", 2);
        let second = tracker.mask("A", 10);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
        assert!(!first.set(5));
        assert!(tracker.lookup("B").is_none());
    }
}
