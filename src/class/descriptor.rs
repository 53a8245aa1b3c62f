//! Field and method descriptor parsing.
//!
//! Descriptors are the compact type strings of the class-file format, e.g. `(ILjava/lang/String;[J)V`.
//! Only what coverage needs is decoded: the parameter list, the return type and the number of
//! local slots the parameters occupy.

use std::fmt;

use crate::Result;

/// A decoded field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `L<internal name>;`
    Object(String),
    /// `[<component>`
    Array(Box<FieldType>),
}

impl FieldType {
    /// Number of local variable slots a value of this type occupies.
    #[must_use]
    pub fn width(&self) -> u16 {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    /// Returns `true` for object and array references.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }

    fn parse_at(descriptor: &str, offset: &mut usize) -> Result<FieldType> {
        let bytes = descriptor.as_bytes();
        let Some(tag) = bytes.get(*offset) else {
            return Err(out_of_bounds_error!());
        };
        *offset += 1;

        Ok(match tag {
            b'Z' => FieldType::Boolean,
            b'B' => FieldType::Byte,
            b'C' => FieldType::Char,
            b'S' => FieldType::Short,
            b'I' => FieldType::Int,
            b'J' => FieldType::Long,
            b'F' => FieldType::Float,
            b'D' => FieldType::Double,
            b'L' => {
                let rest = &descriptor[*offset..];
                let Some(end) = rest.find(';') else {
                    return Err(malformed_error!(
                        "Unterminated class type in descriptor '{}'",
                        descriptor
                    ));
                };
                let name = rest[..end].to_string();
                *offset += end + 1;
                FieldType::Object(name)
            }
            b'[' => FieldType::Array(Box::new(FieldType::parse_at(descriptor, offset)?)),
            other => {
                return Err(malformed_error!(
                    "Invalid type tag '{}' in descriptor '{}'",
                    char::from(*other),
                    descriptor
                ))
            }
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => write!(f, "Z"),
            FieldType::Byte => write!(f, "B"),
            FieldType::Char => write!(f, "C"),
            FieldType::Short => write!(f, "S"),
            FieldType::Int => write!(f, "I"),
            FieldType::Long => write!(f, "J"),
            FieldType::Float => write!(f, "F"),
            FieldType::Double => write!(f, "D"),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(component) => write!(f, "[{component}"),
        }
    }
}

/// A decoded method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Parameter types in declaration order
    pub params: Vec<FieldType>,
    /// Return type, `None` for `V`
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    /// Parses a method descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for anything that is not `(<params>)<return>`.
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor> {
        if !descriptor.starts_with('(') {
            return Err(malformed_error!(
                "Method descriptor '{}' does not start with '('",
                descriptor
            ));
        }

        let mut offset = 1;
        let mut params = Vec::new();
        loop {
            match descriptor.as_bytes().get(offset) {
                Some(b')') => {
                    offset += 1;
                    break;
                }
                Some(_) => params.push(FieldType::parse_at(descriptor, &mut offset)?),
                None => return Err(out_of_bounds_error!()),
            }
        }

        let ret = if descriptor.as_bytes().get(offset) == Some(&b'V') {
            offset += 1;
            None
        } else {
            Some(FieldType::parse_at(descriptor, &mut offset)?)
        };

        if offset != descriptor.len() {
            return Err(malformed_error!(
                "Trailing characters in method descriptor '{}'",
                descriptor
            ));
        }

        Ok(MethodDescriptor { params, ret })
    }

    /// Local slots used by the parameters, excluding the receiver.
    #[must_use]
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(FieldType::width).sum()
    }

    /// Returns the local slot of each parameter, given the first parameter's slot.
    #[must_use]
    pub fn param_locals(&self, first: u16) -> Vec<u16> {
        let mut slot = first;
        self.params
            .iter()
            .map(|param| {
                let current = slot;
                slot += param.width();
                current
            })
            .collect()
    }
}
