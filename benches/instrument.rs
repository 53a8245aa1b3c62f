//! Benchmarks for the instrumentation passes and snapshot handling.
//!
//! The synthetic class has 64 methods, each a chain of guarded lines with one conditional jump
//! per line and a table switch at the end, which is roughly what a large service class looks
//! like after compilation.

extern crate covscope;

use std::{hint::black_box, sync::Arc};

use covscope::{
    coverage::{decode, encode},
    prelude::*,
};
use criterion::{criterion_group, criterion_main, Criterion};

const METHODS: u32 = 64;
const LINES_PER_METHOD: u32 = 16;

fn method_body(first_line: u32) -> MethodBody {
    let mut asm = BodyAssembler::new();
    asm.locals(2).max_stack(2);
    for offset in 0..LINES_PER_METHOD {
        let skip = asm.new_label();
        asm.line(first_line + offset)
            .iload(0)
            .iconst(i32::try_from(offset).unwrap_or(0))
            .jump(Opcode::IfIcmple, skip)
            .iinc(1, 1)
            .place(skip);
    }

    let cases = [asm.new_label(), asm.new_label(), asm.new_label()];
    let fallback = asm.new_label();
    asm.line(first_line + LINES_PER_METHOD)
        .iload(1)
        .table_switch(0, fallback, &cases);
    for (value, case) in cases.into_iter().enumerate() {
        asm.place(case)
            .iconst(i32::try_from(value).unwrap_or(0))
            .ireturn();
    }
    asm.place(fallback).iconst(-1).ireturn();
    asm.build()
}

fn large_class() -> ClassInfo {
    let mut class = ClassInfo::new("bench/Service", 61);
    for index in 0..METHODS {
        class.methods.push(MethodInfo::new(
            &format!("handle{index}"),
            "(I)I",
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            method_body(index * (LINES_PER_METHOD + 1) + 1),
        ));
    }
    class
}

fn populated_snapshot(options: &str) -> ProjectSnapshot {
    let session = Arc::new(CoverageSession::new(options.parse().unwrap()));
    Instrumenter::new(Arc::clone(&session)).instrument(&large_class());
    let hits = session.registry().hits_for("bench/Service");
    for slot in (0..hits.len()).step_by(3) {
        hits.increment(slot);
    }
    session.snapshot()
}

fn bench_instrument(c: &mut Criterion) {
    let class = large_class();

    for options in ["", "hits=flag,strategy=local", "tracking=true,instructions=true"] {
        let session = Arc::new(CoverageSession::new(options.parse().unwrap()));
        let instrumenter = Instrumenter::new(session);
        c.bench_function(&format!("instrument_large_class[{options}]"), |b| {
            b.iter(|| black_box(instrumenter.instrument(black_box(&class))));
        });
    }
}

fn bench_merge(c: &mut Criterion) {
    let a = populated_snapshot("");
    let b = populated_snapshot("");

    c.bench_function("merge_large_class", |bench| {
        bench.iter(|| black_box(merge(black_box(&a), black_box(&b))));
    });
}

fn bench_codec(c: &mut Criterion) {
    let snapshot = populated_snapshot("instructions=true");
    let bytes = encode(&snapshot).unwrap();

    c.bench_function("encode_snapshot", |b| {
        b.iter(|| black_box(encode(black_box(&snapshot)).unwrap()));
    });
    c.bench_function("decode_snapshot", |b| {
        b.iter(|| black_box(decode(black_box(&bytes)).unwrap()));
    });
}

fn bench_registry(c: &mut Criterion) {
    let registry = HitRegistry::new();
    registry.declare("bench/Service", 1024);
    let name: Arc<str> = Arc::from("bench/Service");

    c.bench_function("hits_for_uncached", |b| {
        b.iter(|| black_box(registry.hits_for(black_box("bench/Service"))));
    });
    c.bench_function("hits_for_cached", |b| {
        b.iter(|| black_box(registry.hits_for_cached(black_box(&name))));
    });
}

criterion_group!(
    benches,
    bench_instrument,
    bench_merge,
    bench_codec,
    bench_registry
);
criterion_main!(benches);
