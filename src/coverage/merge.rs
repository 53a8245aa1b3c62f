//! Merging of snapshots.
//!
//! Merging is used to combine the counters of the current run with a snapshot persisted by an
//! earlier run of the same program. Both inputs are expected to come from identical
//! instrumentation of each class they share, so branch records are paired by position; this is
//! not checked. Classes are merged independently and in parallel.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::coverage::{ClassRecord, LineRecord, ProjectSnapshot, SnapshotMode};

/// Merges two snapshots into a new one.
///
/// The result holds the union of both class sets. Lines present in both inputs have their
/// counters summed (saturating) and their status re-derived; lines present in one input are
/// copied. A class that one side only names, without having analyzed it or recorded lines,
/// adds nothing structural. Neither input is modified.
///
/// # Examples
///
/// ```rust
/// use covscope::coverage::{merge, ClassRecord, LineStatus, ProjectSnapshot, SnapshotMode};
///
/// let mut a = ProjectSnapshot::new(SnapshotMode::default());
/// let class = a.class_or_insert("Foo");
/// class.line_or_insert(3, "run()V");
/// class.apply_hits(&[2]);
///
/// let mut b = a.clone();
/// b.class_or_insert("Foo").apply_hits(&[3]);
///
/// let merged = merge(&a, &b);
/// let line = merged.class("Foo").unwrap().line(3).unwrap();
/// assert_eq!(line.hits, 5);
/// assert_eq!(line.status(), LineStatus::Full);
/// ```
#[must_use]
pub fn merge(a: &ProjectSnapshot, b: &ProjectSnapshot) -> ProjectSnapshot {
    let names: BTreeSet<&String> = a.classes.keys().chain(b.classes.keys()).collect();
    let names: Vec<&String> = names.into_iter().collect();

    let classes = names
        .par_iter()
        .map(|name| {
            let merged = match (a.classes.get(*name), b.classes.get(*name)) {
                (Some(left), Some(right)) => merge_class(left, right),
                (Some(only), None) | (None, Some(only)) => only.clone(),
                (None, None) => ClassRecord::new(name),
            };
            ((*name).clone(), merged)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    ProjectSnapshot {
        mode: merge_mode(a.mode, b.mode),
        classes,
    }
}

fn merge_mode(a: SnapshotMode, b: SnapshotMode) -> SnapshotMode {
    SnapshotMode {
        branch_coverage: a.branch_coverage || b.branch_coverage,
        instruction_counting: a.instruction_counting || b.instruction_counting,
        count_hits: a.count_hits && b.count_hits,
    }
}

fn contributes(record: &ClassRecord) -> bool {
    record.fully_analyzed || !record.is_empty()
}

/// Merges two records of the same class.
#[must_use]
pub fn merge_class(a: &ClassRecord, b: &ClassRecord) -> ClassRecord {
    match (contributes(a), contributes(b)) {
        (true, false) => return a.clone(),
        (false, true) => return b.clone(),
        _ => {}
    }

    let mut merged = a.clone();
    merged.fully_analyzed = a.fully_analyzed || b.fully_analyzed;
    merged.source_file = min_option(&a.source_file, &b.source_file);
    merged.slot_count = a.slot_count.max(b.slot_count);
    merged.hits = sum_elementwise(&a.hits, &b.hits);
    merged.trace = match (&a.trace, &b.trace) {
        (Some(left), Some(right)) => Some(or_elementwise(left, right)),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    };
    if merged.mapping.is_none() {
        merged.mapping.clone_from(&b.mapping);
    }

    for theirs in b.lines() {
        match merged.line_mut(theirs.line) {
            Some(mine) => merge_line(mine, theirs),
            None => merged.insert_line(theirs.clone()),
        }
    }

    merged
}

fn merge_line(mine: &mut LineRecord, theirs: &LineRecord) {
    mine.hits = mine.hits.saturating_add(theirs.hits);
    if theirs.method < mine.method {
        mine.method.clone_from(&theirs.method);
    }
    mine.instructions = match (mine.instructions, theirs.instructions) {
        (Some(left), Some(right)) => Some(left.max(right)),
        (left, right) => left.or(right),
    };

    for (index, jump) in theirs.jumps.iter().enumerate() {
        match mine.jumps.get_mut(index) {
            Some(existing) => existing.accumulate(jump),
            None => mine.jumps.push(jump.clone()),
        }
    }
    for (index, switch) in theirs.switches.iter().enumerate() {
        match mine.switches.get_mut(index) {
            Some(existing) => existing.accumulate(switch),
            None => mine.switches.push(switch.clone()),
        }
    }
}

fn min_option(a: &Option<String>, b: &Option<String>) -> Option<String> {
    match (a, b) {
        (Some(left), Some(right)) => Some(left.min(right).clone()),
        (left, right) => left.clone().or_else(|| right.clone()),
    }
}

fn sum_elementwise(a: &[u32], b: &[u32]) -> Vec<u32> {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut result = long.to_vec();
    for (slot, hits) in result.iter_mut().zip(short) {
        *slot = slot.saturating_add(*hits);
    }
    result
}

fn or_elementwise(a: &[bool], b: &[bool]) -> Vec<bool> {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut result = long.to_vec();
    for (slot, hit) in result.iter_mut().zip(short) {
        *slot |= *hit;
    }
    result
}
