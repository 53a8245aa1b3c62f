//! Integration tests for class instrumentation through the public API.
//!
//! Executing rewritten code is the host's business, so these tests play the probes' part by
//! bumping the registry counters the record says a run would touch.

use std::sync::Arc;

use covscope::{instrument::filters::FilterRegistry, prelude::*, Result};

const SIGN: &str = "pkg/Sign";

/// `static int sign(int x) { if (x > 0) return 1; return -1; }` on lines 10 to 12.
fn sign_class() -> Result<ClassInfo> {
    let mut asm = BodyAssembler::new();
    let positive = asm.new_label();
    asm.locals(1)
        .max_stack(1)
        .line(10)
        .iload(0)
        .jump(Opcode::Ifgt, positive)
        .line(11)
        .iconst(-1)
        .ireturn()
        .place(positive)
        .line(12)
        .iconst(1)
        .ireturn();

    let mut class = ClassInfo::new(SIGN, 52);
    class.source_file = Some("Sign.java".to_string());
    class.methods.push(MethodInfo::new(
        "sign",
        "(I)I",
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        asm.finish()?,
    ));
    Ok(class)
}

/// `static void greet(@NotNull String name)` with the generated parameter check on line 7.
fn guarded_class() -> Result<ClassInfo> {
    let mut asm = BodyAssembler::new();
    let checked = asm.new_label();
    asm.locals(1)
        .max_stack(1)
        .line(7)
        .aload(0)
        .jump(Opcode::Ifnonnull, checked)
        .iconst(0)
        .invoke_static("pkg/Greeter", "$$$reportNull$$$0", "(I)V")
        .place(checked)
        .ret();

    let mut class = ClassInfo::new("pkg/Greeter", 52);
    class.methods.push(MethodInfo::new(
        "greet",
        "(Ljava/lang/String;)V",
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        asm.finish()?,
    ));
    Ok(class)
}

fn session(options: &str) -> Result<Arc<CoverageSession>> {
    Ok(Arc::new(CoverageSession::new(options.parse()?)))
}

#[test]
fn positive_run_leaves_branch_partial() -> Result<()> {
    let session = session("")?;
    let instrumenter = Instrumenter::new(Arc::clone(&session));
    let rewritten = match instrumenter.instrument(&sign_class()?) {
        Instrumented::Rewritten(class) => class,
        other => panic!("expected a rewritten class, got {other:?}"),
    };
    for method in &rewritten.methods {
        if let Some(body) = &method.body {
            body.validate()?;
        }
    }

    let record = session.record(SIGN).expect("sign record");
    assert_eq!(record.line_count(), 3);
    assert_eq!(session.registry().slot_count(SIGN), Some(record.slot_count));

    // sign(5): line 10, the taken outcome of its jump, line 12
    let hits = session.registry().hits_for(SIGN);
    let condition = record.line(10).expect("line 10");
    hits.increment(condition.slot as usize);
    hits.increment(condition.jumps[0].true_slot as usize);
    hits.increment(record.line(12).expect("line 12").slot as usize);

    let snapshot = session.snapshot();
    let class = snapshot.class(SIGN).expect("sign snapshot");
    assert_eq!(class.status(10), Some(LineStatus::Partial));
    assert_eq!(class.status(11), Some(LineStatus::None));
    assert_eq!(class.status(12), Some(LineStatus::Full));

    let summary = class.summary();
    assert_eq!(summary.lines_covered, 2);
    assert_eq!(summary.branches_total, 2);
    assert_eq!(summary.branches_covered, 1);
    Ok(())
}

#[test]
fn generated_null_check_is_not_a_branch() -> Result<()> {
    let session = session("")?;
    let class = guarded_class()?;
    assert!(matches!(
        Instrumenter::new(Arc::clone(&session)).instrument(&class),
        Instrumented::Rewritten(_)
    ));

    let record = session.record("pkg/Greeter").expect("greeter record");
    assert_eq!(record.line_count(), 1);
    assert!(!record.line(7).expect("line 7").has_branches());
    assert_eq!(record.slot_count, 1);
    Ok(())
}

#[test]
fn without_filters_the_check_counts() -> Result<()> {
    let session = session("")?;
    let instrumenter = Instrumenter::with_filters(Arc::clone(&session), FilterRegistry::empty());
    instrumenter.instrument(&guarded_class()?);

    let record = session.record("pkg/Greeter").expect("greeter record");
    assert_eq!(record.line(7).expect("line 7").jumps.len(), 1);
    assert_eq!(record.slot_count, 3);
    Ok(())
}

#[test]
fn line_only_sessions_skip_branches() -> Result<()> {
    let session = session("branches=false,hits=flag")?;
    Instrumenter::new(Arc::clone(&session)).instrument(&sign_class()?);

    let record = session.record(SIGN).expect("sign record");
    assert!(record.lines().all(|line| !line.has_branches()));
    assert_eq!(record.slot_count, 3);
    assert!(!session.snapshot().mode.count_hits);
    Ok(())
}

#[test]
fn strategies_follow_class_version() -> Result<()> {
    let options: InstrumentationOptions = "strategy=constant".parse()?;
    let old = sign_class()?;
    let mut modern = sign_class()?;
    modern.major_version = 61;

    assert_eq!(options.strategy_for(&old), CounterStrategy::Field);
    assert_eq!(options.strategy_for(&modern), CounterStrategy::Constant);

    let session = Arc::new(CoverageSession::new(options));
    let rewritten = match Instrumenter::new(session).instrument(&modern) {
        Instrumented::Rewritten(class) => class,
        other => panic!("expected a rewritten class, got {other:?}"),
    };
    assert_eq!(rewritten.methods.len(), 1);
    assert!(rewritten.fields.is_empty());
    Ok(())
}

#[test]
fn field_strategy_adds_members_once() -> Result<()> {
    let session = session("strategy=field")?;
    let instrumenter = Instrumenter::new(session);
    let rewritten = match instrumenter.instrument(&sign_class()?) {
        Instrumented::Rewritten(class) => class,
        other => panic!("expected a rewritten class, got {other:?}"),
    };
    assert_eq!(rewritten.fields.len(), 1);
    assert_eq!(rewritten.methods.len(), 3);
    let initializer = rewritten
        .methods
        .iter()
        .find(|method| method.name == "<clinit>")
        .expect("class initializer");
    let body = initializer.body.as_ref().expect("initializer code");
    body.validate()?;
    assert!(body.instructions[0].is_call_to(SIGN, "__$hitsInit$"));
    assert_eq!(
        instrumenter.instrument(&rewritten),
        Instrumented::Skipped(SkipReason::AlreadyInstrumented)
    );
    Ok(())
}

#[test]
fn test_traces() -> Result<()> {
    let session = session("tracking=true")?;
    Instrumenter::new(Arc::clone(&session)).instrument(&sign_class()?);
    let record = session.record(SIGN).expect("sign record");
    let line = record.line(11).expect("line 11").slot;

    let mask = session.registry().trace_for(SIGN);
    session.start_test("negative")?;
    mask.set(line as usize);
    let trace = session.end_test("negative")?;

    assert_eq!(trace.classes[SIGN], vec![line]);
    assert!(session.end_test("empty")?.classes.is_empty());
    assert_eq!(session.registry().tracker().traces().len(), 2);
    Ok(())
}
