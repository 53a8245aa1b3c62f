//! First pass over a method: registration of lines, jumps and switches.
//!
//! The [`Enumerator`] registers one entry per line marker, one per conditional jump met after
//! the first line marker and one per switch. Unconditional jumps are not branches and are
//! ignored. Class initializers never get jump records: the only conditional jumps they usually
//! contain are the assertion toggles compilers inject.
//!
//! [`scan_method`] runs the enumerator and the applicable noise filters side by side over one
//! method body and returns what survived.

use log::debug;

use crate::{
    assembly::{Instruction, MethodBody},
    instrument::{
        context::{MethodContext, MethodScan, MethodScope},
        filters::FilterRegistry,
        InstrumentationOptions,
    },
};

/// Observer of a method's instruction stream.
///
/// `observe` is called once per instruction, markers included, in stream order; `finish`
/// once after the last instruction.
pub trait InstructionObserver {
    /// Sees one instruction.
    fn observe(&mut self, index: usize, insn: &Instruction, ctx: &mut MethodContext<'_>);

    /// End of the method.
    fn finish(&mut self, _ctx: &mut MethodContext<'_>) {}
}

/// Registers coverage records for a method's instructions.
#[derive(Debug, Clone, Copy)]
pub struct Enumerator {
    branches: bool,
}

impl Enumerator {
    /// Creates an enumerator; with `branches` off only lines are registered.
    #[must_use]
    pub fn new(branches: bool) -> Self {
        Enumerator { branches }
    }
}

impl InstructionObserver for Enumerator {
    fn observe(&mut self, index: usize, insn: &Instruction, ctx: &mut MethodContext<'_>) {
        match insn {
            Instruction::Line(line) => {
                ctx.register_line(index, *line);
            }
            Instruction::Label(_) => {}
            Instruction::Jump { opcode, .. } if opcode.is_conditional_jump() => {
                ctx.count_instruction();
                if self.branches && !ctx.scope().is_static_initializer() {
                    ctx.register_jump(index);
                }
            }
            Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => {
                ctx.count_instruction();
                if self.branches {
                    if let Some(keys) = insn.switch_keys() {
                        ctx.register_switch(index, keys);
                    }
                }
            }
            _ => ctx.count_instruction(),
        }
    }
}

/// Scans one method body with the enumerator and the filters of `registry`.
///
/// Filters run only when enabled in `options` and applicable to the method.
#[must_use]
pub fn scan_method(
    scope: MethodScope<'_>,
    body: &MethodBody,
    options: &InstrumentationOptions,
    registry: &FilterRegistry,
) -> MethodScan {
    let mut ctx = MethodContext::new(scope);
    let mut enumerator = Enumerator::new(options.branches);
    let mut filters = if options.filters {
        registry.instantiate(&scope)
    } else {
        Vec::new()
    };

    for (index, insn) in body.instructions.iter().enumerate() {
        ctx.advance(index);
        enumerator.observe(index, insn, &mut ctx);
        for filter in &mut filters {
            filter.observe(index, insn, &mut ctx);
        }
    }
    enumerator.finish(&mut ctx);
    for filter in &mut filters {
        filter.finish(&mut ctx);
    }

    let scan = ctx.into_scan();
    debug!(
        "{}.{}: {} markers, {} jumps, {} switches, {} filters",
        scope.class.name,
        scope.method.signature(),
        scan.markers.len(),
        scan.surviving_jumps().len(),
        scan.surviving_switches().len(),
        filters.len()
    );
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{BodyAssembler, Opcode},
        class::{AccessFlags, ClassInfo, MethodInfo},
    };

    fn branchy() -> MethodBody {
        let mut asm = BodyAssembler::new();
        let early = asm.new_label();
        let out = asm.new_label();
        let c0 = asm.new_label();
        let c1 = asm.new_label();
        asm.iload(0)
            .jump(Opcode::Ifeq, early)
            .line(5)
            .iload(0)
            .jump(Opcode::Ifne, out)
            .iload(0)
            .table_switch(0, out, &[c0, c1])
            .place(c0)
            .line(6)
            .goto(out)
            .place(c1)
            .line(5)
            .place(early)
            .place(out)
            .line(7)
            .ret();
        asm.finish().unwrap()
    }

    fn scan(name: &str, options: &InstrumentationOptions) -> MethodScan {
        let class = ClassInfo::new("A", 52);
        let method = MethodInfo::new(name, "(I)V", AccessFlags::STATIC, branchy());
        let body = method.body.clone().unwrap();
        scan_method(
            MethodScope::new(&class, &method),
            &body,
            options,
            &FilterRegistry::empty(),
        )
    }

    #[test]
    fn registers_after_first_line() {
        let scan = scan("run", &InstrumentationOptions::default());
        assert_eq!(scan.markers.len(), 4);
        assert_eq!(scan.surviving_lines().len(), 3);
        assert_eq!(scan.jumps.len(), 1);
        assert_eq!(scan.jumps[0].line, 5);
        assert_eq!(scan.switches.len(), 1);
        assert_eq!(scan.switches[0].keys, vec![0, 1]);
        assert_eq!(scan.instruction_counts.get(&5), Some(&4));
    }

    #[test]
    fn class_initializer_has_no_jumps() {
        let scan = scan("<clinit>", &InstrumentationOptions::default());
        assert!(scan.jumps.is_empty());
        assert_eq!(scan.switches.len(), 1);
    }

    #[test]
    fn line_only_mode() {
        let options = InstrumentationOptions {
            branches: false,
            ..Default::default()
        };
        let scan = scan("run", &options);
        assert!(scan.jumps.is_empty());
        assert!(scan.switches.is_empty());
        assert_eq!(scan.surviving_lines().len(), 3);
    }
}
