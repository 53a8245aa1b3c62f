//! Class model consumed by the instrumenter.
//!
//! Classes arrive already decoded: the host owns class-file parsing and writing, this crate
//! only reads and replaces method bodies and adds the members the counter strategy needs.

mod descriptor;
mod flags;
mod info;

pub use descriptor::{FieldType, MethodDescriptor};
pub use flags::AccessFlags;
pub use info::{ClassInfo, FieldInfo, MethodInfo, STATIC_INITIALIZER};
