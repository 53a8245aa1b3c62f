//! Counter array acquisition.
//!
//! Every rewritten method starts by loading its class's counter array into a local. How the
//! array is obtained is a [`ProbeStrategy`]; all of them hand out the same registry array, so
//! they differ in cost only.

use crate::{
    assembly::{BodyAssembler, Constant, DynamicConstant, Handle, Instruction, Opcode},
    class::{AccessFlags, ClassInfo, FieldInfo, MethodInfo, STATIC_INITIALIZER},
    instrument::{CounterStrategy, HitMode},
    runtime::registry::{
        CONSTANT_BOOTSTRAP_DESCRIPTOR, FLAGS_CONSTANT, FLAGS_DESCRIPTOR, FLAGS_METHOD,
        HITS_CONSTANT, HITS_DESCRIPTOR, HITS_FIELD, HITS_INIT, HITS_METHOD, REGISTRY_OWNER,
    },
};

/// Source of the counter array inside rewritten methods.
pub trait ProbeStrategy: Send + Sync {
    /// Strategy kind.
    fn kind(&self) -> CounterStrategy;

    /// Instructions leaving the counter array on an empty operand stack.
    fn acquire(&self) -> Vec<Instruction>;

    /// Operand stack depth needed by [`ProbeStrategy::acquire`].
    fn acquire_depth(&self) -> u16 {
        1
    }

    /// Adds the members the strategy relies on to the class.
    fn prepare_class(&self, _class: &mut ClassInfo) {}
}

fn array_descriptor(mode: HitMode) -> &'static str {
    match mode {
        HitMode::Count => "[I",
        HitMode::Flag => "[Z",
    }
}

fn registry_call(mode: HitMode) -> Instruction {
    match mode {
        HitMode::Count => Instruction::invoke_static(REGISTRY_OWNER, HITS_METHOD, HITS_DESCRIPTOR),
        HitMode::Flag => Instruction::invoke_static(REGISTRY_OWNER, FLAGS_METHOD, FLAGS_DESCRIPTOR),
    }
}

/// Static field filled once from the class initializer.
///
/// A generated accessor asks the registry and stores the array in the field; `<clinit>` calls
/// it before anything else, and is created when the class has none. Methods then read the
/// field with a single `getstatic`.
#[derive(Debug, Clone)]
pub struct FieldStrategy {
    class: String,
    mode: HitMode,
}

impl FieldStrategy {
    fn accessor_descriptor(&self) -> String {
        format!("(){}", array_descriptor(self.mode))
    }

    fn accessor_call(&self) -> [Instruction; 2] {
        [
            Instruction::invoke_static(&self.class, HITS_INIT, &self.accessor_descriptor()),
            Instruction::simple(Opcode::Pop),
        ]
    }
}

impl ProbeStrategy for FieldStrategy {
    fn kind(&self) -> CounterStrategy {
        CounterStrategy::Field
    }

    fn acquire(&self) -> Vec<Instruction> {
        vec![Instruction::field(
            Opcode::Getstatic,
            &self.class,
            HITS_FIELD,
            array_descriptor(self.mode),
        )]
    }

    fn prepare_class(&self, class: &mut ClassInfo) {
        let descriptor = array_descriptor(self.mode);
        class.fields.push(FieldInfo::new(
            HITS_FIELD,
            descriptor,
            AccessFlags::PRIVATE | AccessFlags::STATIC | AccessFlags::TRANSIENT | AccessFlags::SYNTHETIC,
        ));

        let mut asm = BodyAssembler::new();
        let ready = asm.new_label();
        asm.max_stack(2)
            .field(Opcode::Getstatic, &self.class, HITS_FIELD, descriptor)
            .op(Opcode::Dup)
            .jump(Opcode::Ifnonnull, ready)
            .op(Opcode::Pop)
            .ldc_str(&self.class)
            .emit(registry_call(self.mode))
            .op(Opcode::Dup)
            .field(Opcode::Putstatic, &self.class, HITS_FIELD, descriptor)
            .place(ready)
            .areturn();
        class.methods.push(MethodInfo::new(
            HITS_INIT,
            &self.accessor_descriptor(),
            AccessFlags::PRIVATE | AccessFlags::STATIC | AccessFlags::SYNTHETIC,
            asm.build(),
        ));

        let initializer = class
            .methods
            .iter_mut()
            .find(|method| method.is_static_initializer())
            .and_then(|method| method.body.as_mut());
        match initializer {
            Some(body) => {
                body.instructions.splice(0..0, self.accessor_call());
                body.max_stack = body.max_stack.max(1);
            }
            None => {
                let mut asm = BodyAssembler::new();
                asm.max_stack(1);
                for instruction in self.accessor_call() {
                    asm.emit(instruction);
                }
                asm.ret();
                class.methods.push(MethodInfo::new(
                    STATIC_INITIALIZER,
                    "()V",
                    AccessFlags::STATIC,
                    asm.build(),
                ));
            }
        }
    }
}

/// Registry call on every invocation.
#[derive(Debug, Clone)]
pub struct LocalStrategy {
    class: String,
    mode: HitMode,
}

impl ProbeStrategy for LocalStrategy {
    fn kind(&self) -> CounterStrategy {
        CounterStrategy::Local
    }

    fn acquire(&self) -> Vec<Instruction> {
        vec![
            Instruction::Ldc(Constant::String(self.class.clone())),
            registry_call(self.mode),
        ]
    }
}

/// Dynamically computed constant resolved once by the execution engine.
#[derive(Debug, Clone)]
pub struct ConstantStrategy {
    class: String,
    mode: HitMode,
}

impl ProbeStrategy for ConstantStrategy {
    fn kind(&self) -> CounterStrategy {
        CounterStrategy::Constant
    }

    fn acquire(&self) -> Vec<Instruction> {
        let bootstrap = match self.mode {
            HitMode::Count => HITS_CONSTANT,
            HitMode::Flag => FLAGS_CONSTANT,
        };
        vec![Instruction::Ldc(Constant::Dynamic(Box::new(DynamicConstant {
            name: HITS_FIELD.to_string(),
            descriptor: array_descriptor(self.mode).to_string(),
            bootstrap: Handle {
                owner: REGISTRY_OWNER.to_string(),
                name: bootstrap.to_string(),
                descriptor: CONSTANT_BOOTSTRAP_DESCRIPTOR.to_string(),
            },
            arguments: vec![Constant::String(self.class.clone())],
        })))]
    }
}

/// Creates the strategy of `kind` for `class`.
#[must_use]
pub fn strategy(kind: CounterStrategy, class: &str, mode: HitMode) -> Box<dyn ProbeStrategy> {
    let class = class.to_string();
    match kind {
        CounterStrategy::Field => Box::new(FieldStrategy { class, mode }),
        CounterStrategy::Local => Box::new(LocalStrategy { class, mode }),
        CounterStrategy::Constant => Box::new(ConstantStrategy { class, mode }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_strategy_adds_members() {
        let mut class = ClassInfo::new("pkg/Foo", 52);
        let field = strategy(CounterStrategy::Field, "pkg/Foo", HitMode::Count);
        field.prepare_class(&mut class);

        assert!(class.field(HITS_FIELD).is_some());
        let accessor = class.method(HITS_INIT, "()[I").unwrap();
        assert!(accessor.is_static() && accessor.is_synthetic());
        accessor.body.as_ref().unwrap().validate().unwrap();
        assert_eq!(
            field.acquire(),
            vec![Instruction::field(Opcode::Getstatic, "pkg/Foo", HITS_FIELD, "[I")]
        );

        let initializer = class.method(STATIC_INITIALIZER, "()V").unwrap();
        let body = initializer.body.as_ref().unwrap();
        body.validate().unwrap();
        assert!(body.instructions[0].is_call("pkg/Foo", HITS_INIT, "()[I"));
        assert_eq!(body.instructions[1], Instruction::Simple(Opcode::Pop));
    }

    #[test]
    fn field_strategy_extends_initializer() {
        let mut class = ClassInfo::new("pkg/Foo", 52);
        let mut asm = BodyAssembler::new();
        asm.max_stack(1)
            .line(2)
            .iconst(7)
            .field(Opcode::Putstatic, "pkg/Foo", "LIMIT", "I")
            .ret();
        class.methods.push(MethodInfo::new(
            STATIC_INITIALIZER,
            "()V",
            AccessFlags::STATIC,
            asm.build(),
        ));

        strategy(CounterStrategy::Field, "pkg/Foo", HitMode::Flag).prepare_class(&mut class);

        let initializers = class
            .methods
            .iter()
            .filter(|method| method.is_static_initializer())
            .count();
        assert_eq!(initializers, 1);
        let body = class.methods[0].body.as_ref().unwrap();
        assert!(body.instructions[0].is_call("pkg/Foo", HITS_INIT, "()[Z"));
        assert_eq!(body.instructions[1], Instruction::Simple(Opcode::Pop));
        assert_eq!(body.instructions[2], Instruction::Line(2));
        assert_eq!(body.len(), 6);
    }

    #[test]
    fn local_and_constant_leave_class_alone() {
        for kind in [CounterStrategy::Local, CounterStrategy::Constant] {
            let mut class = ClassInfo::new("pkg/Foo", 61);
            let strategy = strategy(kind, "pkg/Foo", HitMode::Flag);
            strategy.prepare_class(&mut class);
            assert!(class.fields.is_empty() && class.methods.is_empty());
            assert_eq!(strategy.kind(), kind);
        }
    }

    #[test]
    fn flag_mode_uses_boolean_arrays() {
        let local = strategy(CounterStrategy::Local, "pkg/Foo", HitMode::Flag);
        assert!(local.acquire()[1].is_call(REGISTRY_OWNER, FLAGS_METHOD, FLAGS_DESCRIPTOR));

        let constant = strategy(CounterStrategy::Constant, "pkg/Foo", HitMode::Flag);
        match &constant.acquire()[0] {
            Instruction::Ldc(Constant::Dynamic(dynamic)) => {
                assert_eq!(dynamic.descriptor, "[Z");
                assert_eq!(dynamic.bootstrap.name, FLAGS_CONSTANT);
            }
            other => panic!("unexpected {other}"),
        }
    }
}
