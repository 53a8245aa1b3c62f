//! Property tests for snapshot merging.
//!
//! Snapshots of the same program instrumented the same way share their record structure and
//! differ in counters only; merging them must not depend on order or grouping.

use std::collections::BTreeMap;

use covscope::prelude::*;
use proptest::prelude::*;

/// Line number to number of jumps on that line.
type Shape = BTreeMap<u32, usize>;

fn slot_count(shape: &Shape) -> usize {
    shape.values().map(|jumps| 1 + 2 * jumps).sum()
}

fn record(shape: &Shape, hits: &[u32]) -> ClassRecord {
    let mut class = ClassRecord::new("pkg/Foo");
    class.fully_analyzed = true;
    class.source_file = Some("Foo.kt".to_string());
    for (&line, &jumps) in shape {
        class.line_or_insert(line, "run()V");
        for _ in 0..jumps {
            let taken = class.allocate_slot();
            let not_taken = class.allocate_slot();
            if let Some(record) = class.line_mut(line) {
                record.jumps.push(JumpRecord::new(taken, not_taken));
            }
        }
    }
    class.apply_hits(hits);
    class
}

fn snapshot(shape: &Shape, hits: &[u32]) -> ProjectSnapshot {
    let mut snapshot = ProjectSnapshot::new(SnapshotMode::default());
    snapshot.insert(record(shape, hits));
    snapshot
}

/// Builds a record holding only the lines picked by `present`, with the slot layout the full
/// shape would have and zero counters for slots of missing lines.
fn partial_record(shape: &Shape, present: &[bool], hits: &[u32]) -> ClassRecord {
    let mut class = ClassRecord::new("pkg/Foo");
    class.fully_analyzed = true;
    class.source_file = Some("Foo.kt".to_string());
    let mut counters = vec![0; slot_count(shape)];
    let mut next = 0u32;
    for ((&line, &jumps), &keep) in shape.iter().zip(present) {
        let mut record = LineRecord::new(line, "run()V", next);
        next += 1;
        for _ in 0..jumps {
            record.jumps.push(JumpRecord::new(next, next + 1));
            next += 2;
        }
        if keep {
            for slot in record.slots() {
                counters[slot as usize] = hits[slot as usize];
            }
            class.insert_line(record);
        }
    }
    class.slot_count = next;
    class.apply_hits(&counters);
    class
}

fn partial_snapshot(shape: &Shape, present: &[bool], hits: &[u32]) -> ProjectSnapshot {
    let mut snapshot = ProjectSnapshot::new(SnapshotMode::default());
    snapshot.insert(partial_record(shape, present, hits));
    snapshot
}

type Run = (Vec<bool>, Vec<u32>);

fn differing_runs() -> impl Strategy<Value = (Shape, Run, Run, Run)> {
    prop::collection::btree_map(1u32..80, 0usize..3, 1..8).prop_flat_map(|shape| {
        let lines = shape.len();
        let slots = slot_count(&shape);
        let run = move || {
            (
                prop::collection::vec(any::<bool>(), lines),
                prop::collection::vec(0u32..1_000, slots),
            )
        };
        (Just(shape), run(), run(), run())
    })
}

fn shaped_runs() -> impl Strategy<Value = (Shape, Vec<u32>, Vec<u32>, Vec<u32>)> {
    prop::collection::btree_map(1u32..80, 0usize..3, 1..8).prop_flat_map(|shape| {
        let slots = slot_count(&shape);
        let hits = || prop::collection::vec(0u32..1_000, slots);
        (Just(shape), hits(), hits(), hits())
    })
}

proptest! {
    #[test]
    fn merge_is_commutative((shape, a, b, _) in shaped_runs()) {
        let (a, b) = (snapshot(&shape, &a), snapshot(&shape, &b));
        prop_assert_eq!(merge(&a, &b), merge(&b, &a));
    }

    #[test]
    fn merge_is_associative((shape, a, b, c) in shaped_runs()) {
        let (a, b, c) = (snapshot(&shape, &a), snapshot(&shape, &b), snapshot(&shape, &c));
        prop_assert_eq!(merge(&merge(&a, &b), &c), merge(&a, &merge(&b, &c)));
    }

    #[test]
    fn merge_sums_counters((shape, a, b, _) in shaped_runs()) {
        let merged = merge(&snapshot(&shape, &a), &snapshot(&shape, &b));
        let class = merged.class("pkg/Foo").unwrap();
        let expected: Vec<u32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        prop_assert_eq!(&class.hits, &expected);
        for line in class.lines() {
            prop_assert_eq!(line.hits, expected[line.slot as usize]);
        }
    }

    #[test]
    fn coverage_never_decreases((shape, a, b, _) in shaped_runs()) {
        let before = snapshot(&shape, &a);
        let merged = merge(&before, &snapshot(&shape, &b));
        let before = before.class("pkg/Foo").unwrap();
        let after = merged.class("pkg/Foo").unwrap();
        for line in before.lines() {
            prop_assert!(after.status(line.line).unwrap() >= line.status());
        }
    }

    #[test]
    fn merge_commutes_over_differing_lines((shape, a, b, _) in differing_runs()) {
        let a = partial_snapshot(&shape, &a.0, &a.1);
        let b = partial_snapshot(&shape, &b.0, &b.1);
        prop_assert_eq!(merge(&a, &b), merge(&b, &a));
    }

    #[test]
    fn merge_associates_over_differing_lines((shape, a, b, c) in differing_runs()) {
        let a = partial_snapshot(&shape, &a.0, &a.1);
        let b = partial_snapshot(&shape, &b.0, &b.1);
        let c = partial_snapshot(&shape, &c.0, &c.1);
        prop_assert_eq!(merge(&merge(&a, &b), &c), merge(&a, &merge(&b, &c)));
    }

    #[test]
    fn merge_unites_line_sets((shape, a, b, _) in differing_runs()) {
        let left = partial_snapshot(&shape, &a.0, &a.1);
        let right = partial_snapshot(&shape, &b.0, &b.1);
        let merged = merge(&left, &right);
        let class = merged.class("pkg/Foo").unwrap();
        for ((&line, _), (&in_a, &in_b)) in shape.iter().zip(a.0.iter().zip(&b.0)) {
            prop_assert_eq!(class.line(line).is_some(), in_a || in_b);
            if let Some(record) = class.line(line) {
                let slot = record.slot as usize;
                let expected = if in_a { a.1[slot] } else { 0 } + if in_b { b.1[slot] } else { 0 };
                prop_assert_eq!(record.hits, expected);
            }
        }
    }
}

#[test]
fn empty_side_is_identity() {
    let shape: Shape = [(3, 1), (4, 0)].into_iter().collect();
    let run = snapshot(&shape, &[1, 1, 0, 2]);
    let empty = ProjectSnapshot::new(SnapshotMode::default());
    assert_eq!(merge(&run, &empty), run);
    assert_eq!(merge(&empty, &run), run);
}

#[test]
fn disjoint_classes_are_united() {
    let shape: Shape = [(3, 0)].into_iter().collect();
    let mut left = snapshot(&shape, &[1]);
    let mut other = record(&shape, &[5]);
    other.name = "pkg/Bar".to_string();
    let mut right = ProjectSnapshot::new(SnapshotMode::default());
    right.insert(other);

    let merged = merge(&left, &right);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.class("pkg/Bar").unwrap().line(3).unwrap().hits, 5);

    left.mode.count_hits = false;
    assert!(!merge(&left, &right).mode.count_hits);
}
