use bitflags::bitflags;

bitflags! {
    /// Access and property flags of classes, fields and methods.
    ///
    /// The class-file format reuses bit positions between declaration kinds, so some constants
    /// share a value (`VOLATILE`/`BRIDGE`, `TRANSIENT`/`VARARGS`, `SUPER`/`SYNCHRONIZED`). Which
    /// reading applies depends on where the flags came from.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u16 {
        /// Visible everywhere
        const PUBLIC = 0x0001;
        /// Visible only inside the declaring class
        const PRIVATE = 0x0002;
        /// Visible to subclasses and the package
        const PROTECTED = 0x0004;
        /// Member belongs to the class, not to instances
        const STATIC = 0x0008;
        /// Cannot be overridden or reassigned
        const FINAL = 0x0010;
        /// Class: treat `invokespecial` with superclass semantics
        const SUPER = 0x0020;
        /// Method: invocation holds the receiver's monitor
        const SYNCHRONIZED = 0x0020;
        /// Field: not cached across threads
        const VOLATILE = 0x0040;
        /// Method: compiler-generated bridge for covariant or generic overrides
        const BRIDGE = 0x0040;
        /// Field: skipped by serialization
        const TRANSIENT = 0x0080;
        /// Method: takes a variable number of arguments
        const VARARGS = 0x0080;
        /// Method: implemented outside the bytecode
        const NATIVE = 0x0100;
        /// Class is an interface
        const INTERFACE = 0x0200;
        /// No implementation provided
        const ABSTRACT = 0x0400;
        /// Method: strict floating point
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Class is an annotation type
        const ANNOTATION = 0x2000;
        /// Class or field is an enum type or constant
        const ENUM = 0x4000;
        /// Class is a module descriptor
        const MODULE = 0x8000;
    }
}
