//! Instrumentation session.
//!
//! A [`CoverageSession`] ties together the options classes are instrumented with, the
//! [`HitRegistry`] the rewritten code reports to and the records of every instrumented class.
//! Taking a snapshot combines the records with the current counters.

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use log::debug;

use crate::{
    coverage::{merge, ClassRecord, ProjectSnapshot, SnapshotMode},
    instrument::{HitMode, InstrumentationOptions},
    runtime::{HitRegistry, TestTrace},
    Result,
};

/// Records and counters of one instrumented process.
#[derive(Debug)]
pub struct CoverageSession {
    options: InstrumentationOptions,
    registry: Arc<HitRegistry>,
    records: SkipMap<String, ClassRecord>,
}

impl CoverageSession {
    /// Creates a session with its own registry.
    #[must_use]
    pub fn new(options: InstrumentationOptions) -> Self {
        Self::with_registry(options, Arc::new(HitRegistry::new()))
    }

    /// Creates a session reporting to an existing registry.
    #[must_use]
    pub fn with_registry(options: InstrumentationOptions, registry: Arc<HitRegistry>) -> Self {
        CoverageSession {
            options,
            registry,
            records: SkipMap::new(),
        }
    }

    /// Options classes are instrumented with.
    #[must_use]
    pub fn options(&self) -> &InstrumentationOptions {
        &self.options
    }

    /// The counter registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<HitRegistry> {
        &self.registry
    }

    /// Settings recorded in snapshots of this session.
    #[must_use]
    pub fn mode(&self) -> SnapshotMode {
        SnapshotMode {
            branch_coverage: self.options.branches,
            instruction_counting: self.options.instructions,
            count_hits: self.options.hits == HitMode::Count,
        }
    }

    /// Stores the record of an instrumented class and declares its counters.
    ///
    /// Registering a class again (after a redefinition) replaces its record.
    pub fn register(&self, record: ClassRecord) {
        if record.slot_count > 0 {
            self.registry.declare(&record.name, record.slot_count);
        }
        debug!(
            "registered {} with {} lines and {} slots",
            record.name,
            record.line_count(),
            record.slot_count
        );
        self.records.insert(record.name.clone(), record);
    }

    /// Copy of the record of `class`, without counter values.
    #[must_use]
    pub fn record(&self, class: &str) -> Option<ClassRecord> {
        self.records.get(class).map(|entry| entry.value().clone())
    }

    /// Number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` before the first class was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reads the current counters into a snapshot of every registered class.
    #[must_use]
    pub fn snapshot(&self) -> ProjectSnapshot {
        let mut snapshot = ProjectSnapshot::new(self.mode());
        for entry in self.records.iter() {
            let mut record = entry.value().clone();
            if let Some(counters) = self.registry.counters(&record.name) {
                record.apply_hits(&counters);
            }
            if self.options.tracking {
                record.trace = self
                    .registry
                    .tracker()
                    .lookup(&record.name)
                    .map(|mask| mask.bits());
            }
            snapshot.insert(record);
        }
        snapshot
    }

    /// Merges the current snapshot into one persisted by an earlier run.
    #[must_use]
    pub fn snapshot_merged(&self, previous: &ProjectSnapshot) -> ProjectSnapshot {
        merge(previous, &self.snapshot())
    }

    /// Clears the trace masks before a test.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if a mask lock is poisoned.
    pub fn start_test(&self, name: &str) -> Result<()> {
        self.registry.tracker().start_test(name)
    }

    /// Collects the lines a test executed.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if a mask lock is poisoned.
    pub fn end_test(&self, name: &str) -> Result<TestTrace> {
        self.registry.tracker().end_test(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::LineStatus;

    fn record() -> ClassRecord {
        let mut record = ClassRecord::new("pkg/Foo");
        record.fully_analyzed = true;
        record.line_or_insert(3, "run()V");
        record.line_or_insert(4, "run()V");
        record
    }

    #[test]
    fn snapshot_reads_counters() {
        let session = CoverageSession::new(InstrumentationOptions::default());
        session.register(record());
        session.registry().hits_for("pkg/Foo").increment(1);

        let snapshot = session.snapshot();
        let class = snapshot.class("pkg/Foo").unwrap();
        assert_eq!(class.hits, vec![0, 1]);
        assert_eq!(class.status(3), Some(LineStatus::None));
        assert_eq!(class.status(4), Some(LineStatus::Full));
        assert!(session.record("pkg/Foo").unwrap().hits.is_empty());
    }

    #[test]
    fn merged_with_previous_run() {
        let session = CoverageSession::new(InstrumentationOptions::default());
        session.register(record());
        let mut previous = ProjectSnapshot::new(session.mode());
        let mut old = record();
        old.apply_hits(&[2, 0]);
        previous.insert(old);

        session.registry().hits_for("pkg/Foo").increment(0);
        let merged = session.snapshot_merged(&previous);
        assert_eq!(merged.class("pkg/Foo").unwrap().line(3).unwrap().hits, 3);
    }

    #[test]
    fn traces_follow_tests() {
        let options = InstrumentationOptions {
            tracking: true,
            ..Default::default()
        };
        let session = CoverageSession::new(options);
        session.register(record());
        session.start_test("t1").unwrap();
        session.registry().trace_for("pkg/Foo").set(1);
        assert_eq!(session.snapshot().class("pkg/Foo").unwrap().traced_lines(), vec![4]);

        let trace = session.end_test("t1").unwrap();
        assert_eq!(trace.classes["pkg/Foo"], vec![1]);
    }
}
