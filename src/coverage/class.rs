//! Per-class coverage records.

use std::{
    collections::{btree_map::Entry, BTreeMap},
    ops::AddAssign,
};

use crate::coverage::{LineMapping, LineRecord, LineStatus, SlotId};

/// Aggregated line and branch counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoverageSummary {
    /// Lines with a record
    pub lines_total: usize,
    /// Lines executed at least once
    pub lines_covered: usize,
    /// Lines with status `FULL`
    pub lines_full: usize,
    /// Branch outcomes with a record
    pub branches_total: usize,
    /// Branch outcomes taken at least once
    pub branches_covered: usize,
}

impl CoverageSummary {
    /// Covered share of lines in `0.0..=1.0`; `1.0` when there are no lines.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn line_ratio(&self) -> f64 {
        if self.lines_total == 0 {
            1.0
        } else {
            self.lines_covered as f64 / self.lines_total as f64
        }
    }

    /// Covered share of branch outcomes in `0.0..=1.0`; `1.0` when there are no branches.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn branch_ratio(&self) -> f64 {
        if self.branches_total == 0 {
            1.0
        } else {
            self.branches_covered as f64 / self.branches_total as f64
        }
    }
}

impl AddAssign for CoverageSummary {
    fn add_assign(&mut self, other: Self) {
        self.lines_total += other.lines_total;
        self.lines_covered += other.lines_covered;
        self.lines_full += other.lines_full;
        self.branches_total += other.branches_total;
        self.branches_covered += other.branches_covered;
    }
}

/// Coverage records and counters of one class.
///
/// Lines are kept in a map ordered by line number, so any `u32` line number is accepted. Slot ids are dense: every id in `0..slot_count` is
/// owned by exactly one line or branch outcome of this class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassRecord {
    /// Internal class name
    pub name: String,
    /// Source file name
    pub source_file: Option<String>,
    lines: BTreeMap<u32, LineRecord>,
    /// Number of allocated slots
    pub slot_count: u32,
    /// Counter per slot
    pub hits: Vec<u32>,
    /// Line slots hit during the current test, when tracing
    pub trace: Option<Vec<bool>>,
    /// Whether the class went through the instrumenter, as opposed to only being named
    pub fully_analyzed: bool,
    /// Secondary line mapping from the source-debug extension
    pub mapping: Option<LineMapping>,
}

impl ClassRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassRecord {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Allocates the next free slot id.
    pub fn allocate_slot(&mut self) -> SlotId {
        let slot = self.slot_count;
        self.slot_count += 1;
        slot
    }

    /// Returns the record of `line`.
    #[must_use]
    pub fn line(&self, line: u32) -> Option<&LineRecord> {
        self.lines.get(&line)
    }

    /// Returns the record of `line` mutably.
    pub fn line_mut(&mut self, line: u32) -> Option<&mut LineRecord> {
        self.lines.get_mut(&line)
    }

    /// Returns the record of `line`, creating it with a fresh slot if absent.
    ///
    /// The second value is `true` if the record was created by this call.
    pub fn line_or_insert(&mut self, line: u32, method: &str) -> (&mut LineRecord, bool) {
        match self.lines.entry(line) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                let slot = self.slot_count;
                self.slot_count += 1;
                (entry.insert(LineRecord::new(line, method, slot)), true)
            }
        }
    }

    /// Stores a record, replacing any record for the same line.
    pub fn insert_line(&mut self, record: LineRecord) {
        self.lines.insert(record.line, record);
    }

    /// Line records in line order.
    pub fn lines(&self) -> impl Iterator<Item = &LineRecord> {
        self.lines.values()
    }

    /// Line records in line order, mutably.
    pub fn lines_mut(&mut self) -> impl Iterator<Item = &mut LineRecord> {
        self.lines.values_mut()
    }

    /// Number of line records.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` when no line was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Status of `line`, `None` when the line has no record.
    #[must_use]
    pub fn status(&self, line: u32) -> Option<LineStatus> {
        self.line(line).map(LineRecord::status)
    }

    /// Takes a copy of a counter array and distributes it over all records.
    pub fn apply_hits(&mut self, hits: &[u32]) {
        self.hits = hits.to_vec();
        for line in self.lines.values_mut() {
            line.apply_hits(hits);
        }
    }

    /// Counts lines and branch outcomes.
    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        let mut summary = CoverageSummary::default();
        for line in self.lines() {
            summary.lines_total += 1;
            match line.status() {
                LineStatus::None => {}
                LineStatus::Partial => summary.lines_covered += 1,
                LineStatus::Full => {
                    summary.lines_covered += 1;
                    summary.lines_full += 1;
                }
            }
            summary.branches_total += line.outcome_count();
            summary.branches_covered += line.outcomes().filter(|hits| *hits > 0).count();
        }
        summary
    }

    /// Line numbers whose line slot is set in the trace mask.
    #[must_use]
    pub fn traced_lines(&self) -> Vec<u32> {
        let Some(trace) = &self.trace else {
            return Vec::new();
        };
        self.lines()
            .filter(|line| {
                usize::try_from(line.slot)
                    .ok()
                    .and_then(|slot| trace.get(slot))
                    .copied()
                    .unwrap_or(false)
            })
            .map(|line| line.line)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::JumpRecord;

    fn sample() -> ClassRecord {
        let mut class = ClassRecord::new("com/example/Foo");
        let (line, created) = class.line_or_insert(10, "run()V");
        assert!(created);
        assert_eq!(line.slot, 0);
        let t = class.allocate_slot();
        let f = class.allocate_slot();
        class.line_mut(10).unwrap().jumps.push(JumpRecord::new(t, f));
        let (line, _) = class.line_or_insert(12, "run()V");
        assert_eq!(line.slot, 3);
        class
    }

    #[test]
    fn slots_are_dense() {
        let mut class = sample();
        let (again, created) = class.line_or_insert(10, "other()V");
        assert!(!created);
        assert_eq!(again.method, "run()V");
        assert_eq!(class.slot_count, 4);
        assert_eq!(class.line_count(), 2);
        assert!(class.line(11).is_none());
        assert!(class.line(1_000).is_none());
    }

    #[test]
    fn far_line_numbers_stay_sparse() {
        let mut class = sample();
        let (line, created) = class.line_or_insert(u32::MAX, "run()V");
        assert!(created);
        assert_eq!(line.slot, 4);
        class.insert_line(LineRecord::new(4_000_000_000, "run()V", 5));
        let numbers: Vec<u32> = class.lines().map(|line| line.line).collect();
        assert_eq!(numbers, vec![10, 12, 4_000_000_000, u32::MAX]);
        assert_eq!(class.line_count(), 4);
    }

    #[test]
    fn summary_counts() {
        let mut class = sample();
        class.apply_hits(&[1, 1, 0, 0]);
        assert_eq!(class.status(10), Some(LineStatus::Partial));
        assert_eq!(class.status(12), Some(LineStatus::None));
        let summary = class.summary();
        assert_eq!(summary.lines_total, 2);
        assert_eq!(summary.lines_covered, 1);
        assert_eq!(summary.lines_full, 0);
        assert_eq!(summary.branches_total, 2);
        assert_eq!(summary.branches_covered, 1);
        assert!((summary.line_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn traced() {
        let mut class = sample();
        class.trace = Some(vec![false, false, false, true]);
        assert_eq!(class.traced_lines(), vec![12]);
    }
}
