//! Probe insertion, the second pass over a method.
//!
//! The counter array is loaded once into a fresh local at method entry. Each probe
//! placeholder of the split stream becomes a short sequence on that local:
//!
//! ```text
//! count mode                 flag mode
//! aload counters             aload counters
//! push slot                  push slot
//! dup2                       iconst_1
//! iaload                     bastore
//! iconst_1
//! iadd
//! iastore
//! ```
//!
//! With tracking, line probes also set the line's bit in the trace mask held in a second
//! local.

use crate::{
    assembly::{Constant, Instruction, MethodBody, Opcode},
    coverage::SlotId,
    instrument::{
        layout::MethodSlots,
        split::{ProbeSite, SplitBody, SplitItem},
        strategy::ProbeStrategy,
        HitMode,
    },
    runtime::registry::{FLAGS_DESCRIPTOR, REGISTRY_OWNER, TRACE_METHOD},
};

/// Extra operand stack a count probe needs.
pub const COUNT_PROBE_DEPTH: u16 = 4;
/// Extra operand stack a flag or trace probe needs.
pub const FLAG_PROBE_DEPTH: u16 = 3;

/// Probe settings for one class.
#[derive(Clone, Copy)]
pub struct ProbeConfig<'a> {
    /// Counter array source
    pub strategy: &'a dyn ProbeStrategy,
    /// Counter semantics
    pub mode: HitMode,
    /// Class name passed to the trace entry point, `None` without tracking
    pub trace_class: Option<&'a str>,
}

fn push_slot(slot: SlotId) -> Instruction {
    Instruction::push_int(i32::try_from(slot).unwrap_or(i32::MAX))
}

fn emit_probe(out: &mut Vec<Instruction>, counters: u16, slot: SlotId, mode: HitMode) {
    out.push(Instruction::Var {
        opcode: Opcode::Aload,
        index: counters,
    });
    out.push(push_slot(slot));
    match mode {
        HitMode::Count => out.extend([
            Instruction::Simple(Opcode::Dup2),
            Instruction::Simple(Opcode::Iaload),
            Instruction::Simple(Opcode::Iconst1),
            Instruction::Simple(Opcode::Iadd),
            Instruction::Simple(Opcode::Iastore),
        ]),
        HitMode::Flag => out.extend([
            Instruction::Simple(Opcode::Iconst1),
            Instruction::Simple(Opcode::Bastore),
        ]),
    }
}

/// Replaces the probe placeholders of `split` and adds the counter prologue.
///
/// Placeholders without a slot in `slots` are dropped.
#[must_use]
pub fn insert_probes(split: SplitBody, slots: &MethodSlots, config: ProbeConfig<'_>) -> MethodBody {
    let counters = split.max_locals;
    let trace = config.trace_class.map(|_| counters + 1);
    let max_locals = counters + if trace.is_some() { 2 } else { 1 };

    let mut out = Vec::with_capacity(split.items.len() * 2 + 8);
    out.extend(config.strategy.acquire());
    out.push(Instruction::Var {
        opcode: Opcode::Astore,
        index: counters,
    });
    if let (Some(class), Some(trace)) = (config.trace_class, trace) {
        out.push(Instruction::Ldc(Constant::String(class.to_string())));
        out.push(Instruction::invoke_static(
            REGISTRY_OWNER,
            TRACE_METHOD,
            FLAGS_DESCRIPTOR,
        ));
        out.push(Instruction::Var {
            opcode: Opcode::Astore,
            index: trace,
        });
    }

    for item in split.items {
        match item {
            SplitItem::Insn(insn) => out.push(insn),
            SplitItem::Probe(site) => {
                let Some(slot) = slots.slot(site) else {
                    continue;
                };
                emit_probe(&mut out, counters, slot, config.mode);
                if let (ProbeSite::Line(_), Some(trace)) = (site, trace) {
                    emit_probe(&mut out, trace, slot, HitMode::Flag);
                }
            }
        }
    }

    let probe_depth = match config.mode {
        HitMode::Count => COUNT_PROBE_DEPTH,
        HitMode::Flag => FLAG_PROBE_DEPTH,
    };
    let max_stack = split
        .max_stack
        .saturating_add(probe_depth)
        .max(config.strategy.acquire_depth());

    MethodBody::new(out, max_stack, max_locals).with_try_catch(split.try_catch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{strategy::strategy, CounterStrategy};

    fn split_with(items: Vec<SplitItem>) -> SplitBody {
        SplitBody {
            items,
            try_catch: Vec::new(),
            max_stack: 1,
            max_locals: 2,
        }
    }

    fn line_slots() -> MethodSlots {
        let mut slots = MethodSlots::default();
        slots.lines.insert(7, 300);
        slots
    }

    #[test]
    fn count_probe_sequence() {
        let strategy = strategy(CounterStrategy::Local, "pkg/Foo", HitMode::Count);
        let split = split_with(vec![
            SplitItem::Insn(Instruction::Line(7)),
            SplitItem::Probe(ProbeSite::Line(7)),
            SplitItem::Insn(Instruction::simple(Opcode::Return)),
        ]);
        let body = insert_probes(
            split,
            &line_slots(),
            ProbeConfig {
                strategy: strategy.as_ref(),
                mode: HitMode::Count,
                trace_class: None,
            },
        );

        let listing: Vec<String> = body.instructions.iter().map(ToString::to_string).collect();
        assert_eq!(
            listing,
            vec![
                "ldc String(\"pkg/Foo\")",
                "invokestatic covscope/runtime/HitRegistry.hitsFor(Ljava/lang/String;)[I",
                "astore 2",
                "line 7",
                "aload 2",
                "sipush 300",
                "dup2",
                "iaload",
                "iconst_1",
                "iadd",
                "iastore",
                "return",
            ]
        );
        assert_eq!(body.max_locals, 3);
        assert_eq!(body.max_stack, 1 + COUNT_PROBE_DEPTH);
    }

    #[test]
    fn tracking_adds_second_local() {
        let strategy = strategy(CounterStrategy::Field, "pkg/Foo", HitMode::Flag);
        let split = split_with(vec![
            SplitItem::Insn(Instruction::Line(7)),
            SplitItem::Probe(ProbeSite::Line(7)),
            SplitItem::Probe(ProbeSite::JumpTaken(4)),
            SplitItem::Insn(Instruction::simple(Opcode::Return)),
        ]);
        let body = insert_probes(
            split,
            &line_slots(),
            ProbeConfig {
                strategy: strategy.as_ref(),
                mode: HitMode::Flag,
                trace_class: Some("pkg/Foo"),
            },
        );

        assert_eq!(body.max_locals, 4);
        let bastores = body
            .instructions
            .iter()
            .filter(|insn| insn.is(Opcode::Bastore))
            .count();
        assert_eq!(bastores, 2);
        assert!(body
            .instructions
            .iter()
            .any(|insn| insn.is_call_to(REGISTRY_OWNER, TRACE_METHOD)));
    }
}
