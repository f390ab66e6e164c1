//! Binding-type descriptors.
//!
//! A [`BindingType`] says what a C type is to a foreign-function interface:
//! an integer of some width and signedness, a float, a pointer, or a named
//! declaration. Emitters turn these into host-language spellings.

use std::fmt;

use cinterop_ast::CKind;
use cinterop_targets::PrimitiveLayout;
use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BindingType {
    Void,
    Bool,
    Char,
    Int { bits: u32, signed: bool },
    Float { bits: u32 },
    Pointer { pointee: Box<BindingType> },
    Array { element: Box<BindingType>, length: Option<u64> },
    /// A declaration in the binding model.
    Named { name: String, kind: CKind },
    Opaque { name: String, size: u64 },
}

impl BindingType {
    pub fn int(bits: u32, signed: bool) -> Self {
        BindingType::Int { bits, signed }
    }

    pub fn pointer(pointee: BindingType) -> Self {
        BindingType::Pointer {
            pointee: Box::new(pointee),
        }
    }

    pub fn void_pointer() -> Self {
        Self::pointer(BindingType::Void)
    }

    /// Parse a short form such as `u32`, `isize`, `f64`, `ptr` or `i8*`.
    ///
    /// The empty string means "remove" and yields `None`. `isize` and
    /// `usize` take the width of `pointer_bits`.
    pub fn parse(spelling: &str, pointer_bits: u32) -> Result<Option<BindingType>> {
        let trimmed = spelling.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if let Some(pointee) = trimmed.strip_suffix('*') {
            let pointee = Self::parse(pointee, pointer_bits)?.ok_or_else(|| MapError::InvalidBindingType {
                spelling: spelling.to_string(),
                detail: "pointer to nothing".to_string(),
            })?;
            return Ok(Some(Self::pointer(pointee)));
        }
        let ty = match trimmed {
            "void" => BindingType::Void,
            "bool" => BindingType::Bool,
            "char" => BindingType::Char,
            "ptr" => Self::void_pointer(),
            "isize" => Self::int(pointer_bits, true),
            "usize" => Self::int(pointer_bits, false),
            "f32" => BindingType::Float { bits: 32 },
            "f64" => BindingType::Float { bits: 64 },
            other => {
                let (signed, digits) = if let Some(digits) = other.strip_prefix('i') {
                    (true, digits)
                } else if let Some(digits) = other.strip_prefix('u') {
                    (false, digits)
                } else {
                    return Err(unknown(spelling));
                };
                match digits.parse::<u32>() {
                    Ok(bits @ (8 | 16 | 32 | 64)) => Self::int(bits, signed),
                    _ => return Err(unknown(spelling)),
                }
            }
        };
        Ok(Some(ty))
    }

    /// The binding type of a C builtin or well-known primitive of `size` bytes.
    pub fn from_primitive(spelling: &str, size: u64) -> Self {
        let bits = u32::try_from(size * 8).unwrap_or(u32::MAX);
        match spelling {
            "void" => BindingType::Void,
            "_Bool" | "bool" => BindingType::Bool,
            "char" => BindingType::Char,
            "va_list" | "__builtin_va_list" | "__gnuc_va_list" => Self::void_pointer(),
            s if PrimitiveLayout::is_floating(s) => BindingType::Float { bits },
            "size_t" | "uintptr_t" => Self::int(bits, false),
            "ssize_t" | "intptr_t" | "ptrdiff_t" => Self::int(bits, true),
            // wchar_t is unsigned where it is 16 bits wide.
            "wchar_t" => Self::int(bits, size > 2),
            s if s.starts_with("uint") => Self::int(bits, false),
            s => Self::int(bits, PrimitiveLayout::is_signed(s)),
        }
    }

    /// The innermost non-pointer, non-array type.
    pub fn innermost(&self) -> &BindingType {
        match self {
            BindingType::Pointer { pointee } => pointee.innermost(),
            BindingType::Array { element, .. } => element.innermost(),
            other => other,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, BindingType::Void)
    }
}

fn unknown(spelling: &str) -> MapError {
    MapError::InvalidBindingType {
        spelling: spelling.to_string(),
        detail: "expected void, bool, char, i8-i64, u8-u64, isize, usize, f32, f64 or ptr".to_string(),
    }
}

impl fmt::Display for BindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingType::Void => f.write_str("void"),
            BindingType::Bool => f.write_str("bool"),
            BindingType::Char => f.write_str("char"),
            BindingType::Int { bits, signed: true } => write!(f, "i{bits}"),
            BindingType::Int { bits, signed: false } => write!(f, "u{bits}"),
            BindingType::Float { bits } => write!(f, "f{bits}"),
            BindingType::Pointer { pointee } => write!(f, "{pointee}*"),
            BindingType::Array { element, length: Some(n) } => write!(f, "[{element}; {n}]"),
            BindingType::Array { element, length: None } => write!(f, "[{element}]"),
            BindingType::Named { name, .. } | BindingType::Opaque { name, .. } => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_short_forms() {
        assert_eq!(BindingType::parse("u32", 64).unwrap(), Some(BindingType::int(32, false)));
        assert_eq!(BindingType::parse("isize", 32).unwrap(), Some(BindingType::int(32, true)));
        assert_eq!(BindingType::parse("isize", 64).unwrap(), Some(BindingType::int(64, true)));
        assert_eq!(BindingType::parse("ptr", 64).unwrap(), Some(BindingType::void_pointer()));
        assert_eq!(
            BindingType::parse("u8*", 64).unwrap(),
            Some(BindingType::pointer(BindingType::int(8, false)))
        );
        assert_eq!(BindingType::parse("", 64).unwrap(), None);
        assert!(BindingType::parse("i7", 64).is_err());
        assert!(BindingType::parse("string", 64).is_err());
        assert!(BindingType::parse("*", 64).is_err());
    }

    #[test]
    fn primitives_by_size_and_sign() {
        assert_eq!(BindingType::from_primitive("unsigned long", 4), BindingType::int(32, false));
        assert_eq!(BindingType::from_primitive("long", 8), BindingType::int(64, true));
        assert_eq!(BindingType::from_primitive("uint16_t", 2), BindingType::int(16, false));
        assert_eq!(BindingType::from_primitive("size_t", 8), BindingType::int(64, false));
        assert_eq!(BindingType::from_primitive("double", 8), BindingType::Float { bits: 64 });
        assert_eq!(BindingType::from_primitive("_Bool", 1), BindingType::Bool);
        assert_eq!(BindingType::from_primitive("wchar_t", 2), BindingType::int(16, false));
        assert_eq!(BindingType::from_primitive("va_list", 8), BindingType::void_pointer());
    }

    #[test]
    fn display_matches_short_forms() {
        let ty = BindingType::Array {
            element: Box::new(BindingType::pointer(BindingType::int(8, true))),
            length: Some(4),
        };
        assert_eq!(ty.to_string(), "[i8*; 4]");
        assert_eq!(ty.innermost(), &BindingType::int(8, true));
    }

    #[test]
    fn serializes_with_a_type_tag() {
        let json = serde_json::to_string(&BindingType::int(32, false)).unwrap();
        assert_eq!(json, r#"{"type":"int","bits":32,"signed":false}"#);
        let named: BindingType = serde_json::from_str(r#"{"type":"named","name":"Color","kind":"enum"}"#).unwrap();
        assert_eq!(
            named,
            BindingType::Named {
                name: "Color".into(),
                kind: CKind::Enum
            }
        );
    }
}
