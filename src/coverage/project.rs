use std::collections::BTreeMap;

use crate::coverage::{ClassRecord, CoverageSummary};

/// Global collection settings a snapshot was recorded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotMode {
    /// Jumps and switches were recorded, not only lines
    pub branch_coverage: bool,
    /// Per-line instruction counts were recorded
    pub instruction_counting: bool,
    /// Counters hold execution counts rather than hit flags
    pub count_hits: bool,
}

impl Default for SnapshotMode {
    fn default() -> Self {
        SnapshotMode {
            branch_coverage: true,
            instruction_counting: false,
            count_hits: true,
        }
    }
}

/// Coverage of every class known to a session, keyed by internal class name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectSnapshot {
    /// Collection settings
    pub mode: SnapshotMode,
    /// Class records by name
    pub classes: BTreeMap<String, ClassRecord>,
}

impl ProjectSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new(mode: SnapshotMode) -> Self {
        ProjectSnapshot {
            mode,
            classes: BTreeMap::new(),
        }
    }

    /// Adds or replaces a class record.
    pub fn insert(&mut self, record: ClassRecord) {
        self.classes.insert(record.name.clone(), record);
    }

    /// Looks up a class record.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassRecord> {
        self.classes.get(name)
    }

    /// Returns the record of `name`, creating an empty one on first sight.
    pub fn class_or_insert(&mut self, name: &str) -> &mut ClassRecord {
        self.classes
            .entry(name.to_string())
            .or_insert_with(|| ClassRecord::new(name))
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` when no class is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Sums the summaries of all classes.
    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        let mut total = CoverageSummary::default();
        for class in self.classes.values() {
            total += class.summary();
        }
        total
    }
}
