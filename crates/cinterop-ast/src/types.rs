//! Resolved type references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::CLocation;

/// Discriminant of every node and type reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CKind {
    Function,
    FunctionPointer,
    Record,
    Enum,
    EnumValue,
    OpaqueType,
    Typedef,
    Variable,
    MacroDefinition,
    Array,
    Pointer,
    Primitive,
}

impl CKind {
    /// Whether nodes of this kind are stored as named top-level declarations.
    pub fn is_declaration(&self) -> bool {
        !matches!(self, CKind::Array | CKind::Pointer | CKind::Primitive | CKind::EnumValue)
    }
}

impl fmt::Display for CKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CKind::Function => "function",
            CKind::FunctionPointer => "function pointer",
            CKind::Record => "record",
            CKind::Enum => "enum",
            CKind::EnumValue => "enum value",
            CKind::OpaqueType => "opaque type",
            CKind::Typedef => "typedef",
            CKind::Variable => "variable",
            CKind::MacroDefinition => "macro",
            CKind::Array => "array",
            CKind::Pointer => "pointer",
            CKind::Primitive => "primitive",
        };
        f.write_str(name)
    }
}

/// Calling convention of a function or function pointer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallingConvention {
    #[default]
    Cdecl,
    StdCall,
    FastCall,
    ThisCall,
    VectorCall,
}

impl CallingConvention {
    /// Map an MSVC modifier keyword such as `__stdcall`.
    pub fn from_modifier(keyword: &str) -> Option<Self> {
        match keyword.trim_start_matches('_') {
            "cdecl" => Some(CallingConvention::Cdecl),
            "stdcall" => Some(CallingConvention::StdCall),
            "fastcall" => Some(CallingConvention::FastCall),
            "thiscall" => Some(CallingConvention::ThisCall),
            "vectorcall" => Some(CallingConvention::VectorCall),
            _ => None,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A resolved type reference.
///
/// Pointers and arrays are never declarations of their own; they wrap the
/// referenced type in `inner`. Every other reference names exactly one node
/// of matching kind in the same tree, or a builtin primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CType {
    pub name: String,
    pub kind: CKind,
    /// Size in bytes; `None` for `void` and incomplete types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_of: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_of: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_length: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_system: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_anonymous: bool,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<CType>>,
}

impl CType {
    /// A builtin primitive such as `int` or `unsigned long`.
    pub fn primitive(name: impl Into<String>, size: u64, align: u64) -> Self {
        Self {
            name: name.into(),
            kind: CKind::Primitive,
            size_of: Some(size),
            align_of: Some(align),
            element_size: None,
            array_length: None,
            is_system: false,
            is_anonymous: false,
            location: CLocation::BuiltIn,
            inner: None,
        }
    }

    pub fn void() -> Self {
        Self {
            size_of: None,
            align_of: None,
            ..Self::primitive("void", 0, 0)
        }
    }

    /// A reference to a named declaration.
    pub fn named(name: impl Into<String>, kind: CKind, size: Option<u64>, align: Option<u64>, location: CLocation) -> Self {
        Self {
            name: name.into(),
            kind,
            size_of: size,
            align_of: align,
            element_size: None,
            array_length: None,
            is_system: false,
            is_anonymous: false,
            location,
            inner: None,
        }
    }

    /// A pointer to `pointee`.
    pub fn pointer(pointee: CType, pointer_size: u64) -> Self {
        Self {
            name: format!("{}*", pointee.name),
            kind: CKind::Pointer,
            size_of: Some(pointer_size),
            align_of: Some(pointer_size),
            element_size: None,
            array_length: None,
            is_system: false,
            is_anonymous: false,
            location: CLocation::BuiltIn,
            inner: Some(Box::new(pointee)),
        }
    }

    /// A fixed-size array, or an incomplete array when `length` is `None`.
    pub fn array(element: CType, length: Option<u64>) -> Self {
        let name = match length {
            Some(n) => format!("{}[{n}]", element.name),
            None => format!("{}[]", element.name),
        };
        Self {
            name,
            kind: CKind::Array,
            size_of: element.size_of.zip(length).map(|(size, n)| size * n),
            align_of: element.align_of,
            element_size: element.size_of,
            array_length: length,
            is_system: false,
            is_anonymous: false,
            location: CLocation::BuiltIn,
            inner: Some(Box::new(element)),
        }
    }

    pub fn with_system(mut self, is_system: bool) -> Self {
        self.is_system = is_system;
        self
    }

    pub fn with_anonymous(mut self, is_anonymous: bool) -> Self {
        self.is_anonymous = is_anonymous;
        self
    }

    pub fn is_void(&self) -> bool {
        self.kind == CKind::Primitive && self.name == "void"
    }

    /// The innermost non-pointer, non-array type.
    pub fn innermost(&self) -> &CType {
        match &self.inner {
            Some(inner) => inner.innermost(),
            None => self,
        }
    }

    /// Number of pointer levels wrapping the innermost type.
    pub fn pointer_depth(&self) -> usize {
        match (&self.inner, self.kind) {
            (Some(inner), CKind::Pointer) => 1 + inner.pointer_depth(),
            (Some(inner), _) => inner.pointer_depth(),
            (None, _) => 0,
        }
    }

    /// Equality ignoring locations.
    pub fn same_shape(&self, other: &CType) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.size_of == other.size_of
            && self.align_of == other.align_of
            && self.element_size == other.element_size
            && self.array_length == other.array_length
            && self.is_anonymous == other.is_anonymous
            && match (&self.inner, &other.inner) {
                (Some(a), Some(b)) => a.same_shape(b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
