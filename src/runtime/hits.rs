//! Per-class counter arrays.

use std::sync::atomic::{AtomicU32, Ordering};

/// Hit counters of one class, one per slot.
///
/// Probes update slots with a plain load followed by a store, exactly like the array
/// increment the rewritten code performs. Concurrent increments of the same slot may be lost,
/// but a reader never sees a torn value and a slot that was hit never reads back as zero once
/// the store is visible.
#[derive(Debug)]
pub struct HitArray {
    slots: Box<[AtomicU32]>,
}

impl HitArray {
    /// Creates `len` zeroed counters.
    #[must_use]
    pub fn new(len: usize) -> Self {
        HitArray {
            slots: (0..len).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` for a class without slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current value of `slot`; out of range slots read as 0.
    #[must_use]
    pub fn get(&self, slot: usize) -> u32 {
        self.slots
            .get(slot)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    /// Overwrites `slot`. Returns `false` if the slot is out of range.
    pub fn store(&self, slot: usize, value: u32) -> bool {
        match self.slots.get(slot) {
            Some(counter) => {
                counter.store(value, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Counts one execution of `slot`.
    pub fn increment(&self, slot: usize) -> bool {
        let value = self.get(slot).saturating_add(1);
        self.store(slot, value)
    }

    /// Marks `slot` as executed without counting.
    pub fn flag(&self, slot: usize) -> bool {
        self.store(slot, 1)
    }

    /// Copies the counters.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u32> {
        self.slots
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .collect()
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in self.slots.iter() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_and_flags() {
        let hits = HitArray::new(3);
        assert!(hits.increment(0));
        assert!(hits.increment(0));
        assert!(hits.flag(2));
        assert!(hits.flag(2));
        assert!(!hits.increment(3));
        assert_eq!(hits.snapshot(), vec![2, 0, 1]);
        assert_eq!(hits.get(9), 0);

        hits.reset();
        assert_eq!(hits.snapshot(), vec![0, 0, 0]);
    }

    #[test]
    fn racing_increments_never_lose_the_hit() {
        let hits = Arc::new(HitArray::new(4));
        let handles: Vec<_> = (0..4)
            .map(|slot| {
                let hits = Arc::clone(&hits);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        hits.increment(0);
                        hits.increment(slot);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let counts = hits.snapshot();
        assert!(counts[0] > 0 && counts[0] <= 5000);
        assert!(counts[1..].iter().all(|count| *count == 1000));
    }
}
