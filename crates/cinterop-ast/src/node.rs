//! Declaration nodes.
//!
//! [`CNode`] is a closed sum type over every declaration category. Kind
//! specific logic (structural equality, naming, location) is an exhaustive
//! match so adding a category is a compile error everywhere it matters.

use serde::{Deserialize, Serialize};

use crate::location::CLocation;
use crate::types::{CKind, CType, CallingConvention};

fn is_false(value: &bool) -> bool {
    !*value
}

/// A named parameter of a function or function pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CParameter {
    /// May be empty for unnamed parameters.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: CType,
}

impl CParameter {
    pub fn new(name: impl Into<String>, ty: CType) -> Self {
        Self { name: name.into(), ty }
    }
}

fn same_parameter_types(a: &[CParameter], b: &[CParameter]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ty.same_shape(&y.ty))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    #[serde(default)]
    pub calling_convention: CallingConvention,
    pub return_type: CType,
    pub parameters: Vec<CParameter>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CFunctionPointer {
    pub name: String,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    #[serde(default)]
    pub calling_convention: CallingConvention,
    pub return_type: CType,
    pub parameters: Vec<CParameter>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_variadic: bool,
    pub size_of: u64,
}

/// One field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CRecordField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: CType,
    /// Byte offset from the start of the record.
    pub offset_of: u64,
    /// Unused bytes between this field and the next (or the end of the record).
    pub padding_of: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<u32>,
    /// Bit offset from the start of the record, for bitfields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_offset: Option<u64>,
}

impl CRecordField {
    fn same_shape(&self, other: &CRecordField) -> bool {
        self.name == other.name
            && self.ty.same_shape(&other.ty)
            && self.offset_of == other.offset_of
            && self.padding_of == other.padding_of
            && self.bit_width == other.bit_width
            && self.bit_offset == other.bit_offset
    }
}

/// A struct or union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_union: bool,
    pub size_of: u64,
    pub align_of: u64,
    pub fields: Vec<CRecordField>,
    /// Anonymous records declared inside this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_records: Vec<CRecord>,
}

impl CRecord {
    pub fn same_shape(&self, other: &CRecord) -> bool {
        self.name == other.name
            && self.is_union == other.is_union
            && self.size_of == other.size_of
            && self.align_of == other.align_of
            && self.fields.len() == other.fields.len()
            && self.fields.iter().zip(&other.fields).all(|(a, b)| a.same_shape(b))
            && self.nested_records.len() == other.nested_records.len()
            && self
                .nested_records
                .iter()
                .zip(&other.nested_records)
                .all(|(a, b)| a.same_shape(b))
    }
}

fn same_function_pointer(a: &CFunctionPointer, b: &CFunctionPointer) -> bool {
    a.name == b.name
        && a.calling_convention == b.calling_convention
        && a.size_of == b.size_of
        && a.is_variadic == b.is_variadic
        && a.return_type.same_shape(&b.return_type)
        && same_parameter_types(&a.parameters, &b.parameters)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CEnumValue {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CEnum {
    pub name: String,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    pub integer_type: CType,
    pub values: Vec<CEnumValue>,
}

/// A declaration exposed only by name and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct COpaqueType {
    pub name: String,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    /// Zero when the definition is intentionally hidden.
    pub size_of: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CTypedef {
    pub name: String,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    pub underlying: CType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    #[serde(rename = "type")]
    pub ty: CType,
}

/// An object-like macro whose value is a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CMacroObject {
    pub name: String,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    pub tokens: Vec<String>,
    #[serde(rename = "type")]
    pub ty: CType,
}

impl CMacroObject {
    /// The macro's value as it would be written in source.
    pub fn value(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Any declaration stored in a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "kebab-case")]
pub enum CNode {
    Function(CFunction),
    FunctionPointer(CFunctionPointer),
    Record(CRecord),
    Enum(CEnum),
    OpaqueType(COpaqueType),
    Typedef(CTypedef),
    Variable(CVariable),
    MacroObject(CMacroObject),
}

impl CNode {
    pub fn kind(&self) -> CKind {
        match self {
            CNode::Function(_) => CKind::Function,
            CNode::FunctionPointer(_) => CKind::FunctionPointer,
            CNode::Record(_) => CKind::Record,
            CNode::Enum(_) => CKind::Enum,
            CNode::OpaqueType(_) => CKind::OpaqueType,
            CNode::Typedef(_) => CKind::Typedef,
            CNode::Variable(_) => CKind::Variable,
            CNode::MacroObject(_) => CKind::MacroDefinition,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CNode::Function(n) => &n.name,
            CNode::FunctionPointer(n) => &n.name,
            CNode::Record(n) => &n.name,
            CNode::Enum(n) => &n.name,
            CNode::OpaqueType(n) => &n.name,
            CNode::Typedef(n) => &n.name,
            CNode::Variable(n) => &n.name,
            CNode::MacroObject(n) => &n.name,
        }
    }

    pub fn location(&self) -> &CLocation {
        match self {
            CNode::Function(n) => &n.location,
            CNode::FunctionPointer(n) => &n.location,
            CNode::Record(n) => &n.location,
            CNode::Enum(n) => &n.location,
            CNode::OpaqueType(n) => &n.location,
            CNode::Typedef(n) => &n.location,
            CNode::Variable(n) => &n.location,
            CNode::MacroObject(n) => &n.location,
        }
    }

    /// Kind-specific structural equality.
    ///
    /// Locations and parameter names are ignored; everything that affects
    /// the binary interface is compared.
    pub fn structurally_equals(&self, other: &CNode) -> bool {
        match (self, other) {
            (CNode::Function(a), CNode::Function(b)) => {
                a.name == b.name
                    && a.calling_convention == b.calling_convention
                    && a.is_variadic == b.is_variadic
                    && a.return_type.same_shape(&b.return_type)
                    && same_parameter_types(&a.parameters, &b.parameters)
            }
            (CNode::FunctionPointer(a), CNode::FunctionPointer(b)) => same_function_pointer(a, b),
            (CNode::Record(a), CNode::Record(b)) => a.same_shape(b),
            (CNode::Enum(a), CNode::Enum(b)) => {
                a.name == b.name && a.integer_type.same_shape(&b.integer_type) && a.values == b.values
            }
            (CNode::OpaqueType(a), CNode::OpaqueType(b)) => a.name == b.name && a.size_of == b.size_of,
            (CNode::Typedef(a), CNode::Typedef(b)) => a.name == b.name && a.underlying.same_shape(&b.underlying),
            (CNode::Variable(a), CNode::Variable(b)) => a.name == b.name && a.ty.same_shape(&b.ty),
            (CNode::MacroObject(a), CNode::MacroObject(b)) => {
                a.name == b.name && a.tokens == b.tokens && a.ty.same_shape(&b.ty)
            }
            _ => false,
        }
    }

    /// Every type reference the node holds, in declaration order.
    pub fn type_references(&self) -> Vec<&CType> {
        fn params<'a>(out: &mut Vec<&'a CType>, ps: &'a [CParameter]) {
            out.extend(ps.iter().map(|p| &p.ty));
        }
        fn record<'a>(out: &mut Vec<&'a CType>, r: &'a CRecord) {
            out.extend(r.fields.iter().map(|f| &f.ty));
            for nested in &r.nested_records {
                record(out, nested);
            }
        }
        let mut out = Vec::new();
        match self {
            CNode::Function(n) => {
                out.push(&n.return_type);
                params(&mut out, &n.parameters);
            }
            CNode::FunctionPointer(n) => {
                out.push(&n.return_type);
                params(&mut out, &n.parameters);
            }
            CNode::Record(n) => record(&mut out, n),
            CNode::Enum(n) => out.push(&n.integer_type),
            CNode::OpaqueType(_) => {}
            CNode::Typedef(n) => out.push(&n.underlying),
            CNode::Variable(n) => out.push(&n.ty),
            CNode::MacroObject(n) => out.push(&n.ty),
        }
        out
    }

    /// Mutable counterpart of [`type_references`](Self::type_references).
    pub fn type_references_mut(&mut self) -> Vec<&mut CType> {
        fn record<'a>(out: &mut Vec<&'a mut CType>, r: &'a mut CRecord) {
            out.extend(r.fields.iter_mut().map(|f| &mut f.ty));
            for nested in &mut r.nested_records {
                record(out, nested);
            }
        }
        let mut out = Vec::new();
        match self {
            CNode::Function(n) => {
                out.push(&mut n.return_type);
                out.extend(n.parameters.iter_mut().map(|p| &mut p.ty));
            }
            CNode::FunctionPointer(n) => {
                out.push(&mut n.return_type);
                out.extend(n.parameters.iter_mut().map(|p| &mut p.ty));
            }
            CNode::Record(n) => record(&mut out, n),
            CNode::Enum(n) => out.push(&mut n.integer_type),
            CNode::OpaqueType(_) => {}
            CNode::Typedef(n) => out.push(&mut n.underlying),
            CNode::Variable(n) => out.push(&mut n.ty),
            CNode::MacroObject(n) => out.push(&mut n.ty),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> CType {
        CType::primitive("int", 4, 4)
    }

    fn record(name: &str, field_ty: CType, loc: CLocation) -> CRecord {
        CRecord {
            name: name.into(),
            location: loc,
            is_union: false,
            size_of: 4,
            align_of: 4,
            fields: vec![CRecordField {
                name: "x".into(),
                ty: field_ty,
                offset_of: 0,
                padding_of: 0,
                bit_width: None,
                bit_offset: None,
            }],
            nested_records: vec![],
        }
    }

    #[test]
    fn records_equal_across_locations() {
        let a = CNode::Record(record("S", int(), CLocation::source("a.h", 1, 1)));
        let b = CNode::Record(record("S", int(), CLocation::source("a.h", 7, 1)));
        assert!(a.structurally_equals(&b));
    }

    #[test]
    fn records_differ_on_field_type() {
        let a = CNode::Record(record("T", int(), CLocation::BuiltIn));
        let b = CNode::Record(record("T", CType::primitive("unsigned int", 4, 4), CLocation::BuiltIn));
        assert!(!a.structurally_equals(&b));
    }

    #[test]
    fn functions_ignore_parameter_names() {
        let f = |param: &str| {
            CNode::Function(CFunction {
                name: "f".into(),
                location: CLocation::BuiltIn,
                calling_convention: CallingConvention::Cdecl,
                return_type: CType::void(),
                parameters: vec![CParameter::new(param, int())],
                is_variadic: false,
            })
        };
        assert!(f("a").structurally_equals(&f("b")));
    }

    #[test]
    fn function_pointers_differ_on_variadic() {
        let pointer = |is_variadic| {
            CNode::FunctionPointer(CFunctionPointer {
                name: "FnPtr_Int_Void".into(),
                location: CLocation::BuiltIn,
                calling_convention: CallingConvention::Cdecl,
                return_type: CType::void(),
                parameters: vec![CParameter::new("", int())],
                is_variadic,
                size_of: 8,
            })
        };
        assert!(pointer(true).structurally_equals(&pointer(true)));
        assert!(!pointer(false).structurally_equals(&pointer(true)));
    }

    #[test]
    fn different_categories_never_equal() {
        let opaque = CNode::OpaqueType(COpaqueType {
            name: "S".into(),
            location: CLocation::BuiltIn,
            size_of: 4,
        });
        let rec = CNode::Record(record("S", int(), CLocation::BuiltIn));
        assert!(!opaque.structurally_equals(&rec));
        assert_eq!(opaque.kind(), CKind::OpaqueType);
        assert_eq!(rec.name(), "S");
    }

    #[test]
    fn type_references_include_nested() {
        let mut outer = record("Outer", int(), CLocation::BuiltIn);
        outer
            .nested_records
            .push(record("Outer_anonymous_field1", CType::primitive("float", 4, 4), CLocation::BuiltIn));
        let node = CNode::Record(outer);
        let names: Vec<_> = node.type_references().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["int", "float"]);
    }
}
