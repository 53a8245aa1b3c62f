//! Classes, fields and methods as handed over by the loader hook.

use crate::{
    assembly::{Constant, MethodBody},
    class::{AccessFlags, MethodDescriptor},
    Result,
};

/// Name of the class initializer.
pub const STATIC_INITIALIZER: &str = "<clinit>";

/// A field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Field descriptor
    pub descriptor: String,
    /// Access flags
    pub access: AccessFlags,
    /// Compile-time constant initializer
    pub constant: Option<Constant>,
}

impl FieldInfo {
    /// Creates a field without a constant value.
    #[must_use]
    pub fn new(name: &str, descriptor: &str, access: AccessFlags) -> Self {
        FieldInfo {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access,
            constant: None,
        }
    }
}

/// A method declaration and its code.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Access flags
    pub access: AccessFlags,
    /// Code, `None` for abstract and native methods
    pub body: Option<MethodBody>,
}

impl MethodInfo {
    /// Creates a method with code.
    #[must_use]
    pub fn new(name: &str, descriptor: &str, access: AccessFlags, body: MethodBody) -> Self {
        MethodInfo {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access,
            body: Some(body),
        }
    }

    /// Creates a method without code.
    #[must_use]
    pub fn without_body(name: &str, descriptor: &str, access: AccessFlags) -> Self {
        MethodInfo {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access,
            body: None,
        }
    }

    /// `name` followed by `descriptor`, the key used in line records.
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }

    /// Parses the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an invalid descriptor.
    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor> {
        MethodDescriptor::parse(&self.descriptor)
    }

    /// Returns `true` for the class initializer `<clinit>`.
    #[must_use]
    pub fn is_static_initializer(&self) -> bool {
        self.name == STATIC_INITIALIZER
    }

    /// Returns `true` for constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    /// Returns `true` for compiler-generated bridge methods.
    #[must_use]
    pub fn is_bridge(&self) -> bool {
        self.access.contains(AccessFlags::BRIDGE)
    }

    /// Returns `true` for methods not present in source code.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.access.contains(AccessFlags::SYNTHETIC)
    }

    /// Returns `true` for synthetic methods holding a lambda body.
    #[must_use]
    pub fn is_lambda(&self) -> bool {
        self.is_synthetic() && self.name.starts_with("lambda$")
    }

    /// Local slot of the first parameter.
    #[must_use]
    pub fn first_param_slot(&self) -> u16 {
        u16::from(!self.is_static())
    }
}

/// A class presented for instrumentation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    /// Internal name, e.g. `com/example/Foo`
    pub name: String,
    /// Internal name of the superclass
    pub super_name: Option<String>,
    /// Access flags
    pub access: AccessFlags,
    /// Class-file major version
    pub major_version: u16,
    /// `SourceFile` attribute
    pub source_file: Option<String>,
    /// `SourceDebugExtension` attribute
    pub source_debug: Option<String>,
    /// Declared fields
    pub fields: Vec<FieldInfo>,
    /// Declared methods
    pub methods: Vec<MethodInfo>,
}

impl ClassInfo {
    /// Creates a public class extending `java/lang/Object`.
    #[must_use]
    pub fn new(name: &str, major_version: u16) -> Self {
        ClassInfo {
            name: name.to_string(),
            super_name: Some("java/lang/Object".to_string()),
            access: AccessFlags::PUBLIC | AccessFlags::SUPER,
            major_version,
            source_file: None,
            source_debug: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Returns `true` for interfaces, annotation types included.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access.contains(AccessFlags::INTERFACE)
    }

    /// Looks up a method by name and descriptor.
    #[must_use]
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name == name)
    }
}
