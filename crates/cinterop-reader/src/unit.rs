//! The translation-unit query interface.

use cinterop_ast::{CLocation, CallingConvention, Diagnostic};
use cinterop_targets::TargetPlatform;

/// Handle to a declaration in a translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cursor(pub(crate) u32);

/// Handle to a type in a translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    FunctionDecl,
    VarDecl,
    StructDecl,
    UnionDecl,
    EnumDecl,
    EnumConstantDecl,
    FieldDecl,
    TypedefDecl,
    ParmDecl,
    MacroDefinition,
    Unexposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    /// A builtin arithmetic type; the spelling is normalized.
    Primitive,
    Pointer,
    ConstantArray,
    IncompleteArray,
    Record,
    Enum,
    Typedef,
    /// `struct Foo` / `enum Bar` sugar around a named type.
    Elaborated,
    /// `const` / `volatile` sugar.
    Qualified,
    FunctionProto,
    /// Something the reader could not model.
    Unexposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    External,
    Internal,
    NoLinkage,
}

/// Read-only cursor and type queries over one parsed header.
///
/// Handles are only meaningful for the unit that produced them. Queries
/// that do not apply to the handle's kind return `None` or an empty list.
pub trait TranslationUnit {
    fn file_path(&self) -> &str;
    fn platform(&self) -> &TargetPlatform;
    /// Fatal diagnostics from parsing. A unit with any is not explorable.
    fn fatal_errors(&self) -> &[String];
    /// Recoverable problems met while reading, such as constants that
    /// could not be evaluated.
    fn diagnostics(&self) -> &[Diagnostic];
    /// Top-level declarations and macro definitions in source order.
    fn top_level_cursors(&self) -> Vec<Cursor>;

    fn cursor_kind(&self, cursor: Cursor) -> CursorKind;
    /// Empty for anonymous declarations.
    fn cursor_name(&self, cursor: Cursor) -> &str;
    fn cursor_location(&self, cursor: Cursor) -> CLocation;
    fn cursor_type(&self, cursor: Cursor) -> Option<TypeHandle>;
    /// Declared by a system header rather than the user's headers.
    fn cursor_is_system(&self, cursor: Cursor) -> bool;
    fn cursor_is_anonymous(&self, cursor: Cursor) -> bool;
    /// Records and enums with a body.
    fn cursor_is_definition(&self, cursor: Cursor) -> bool;
    fn cursor_linkage(&self, cursor: Cursor) -> Linkage;
    /// Fields and nested declarations of a record, constants of an enum,
    /// parameters of a function.
    fn cursor_children(&self, cursor: Cursor) -> Vec<Cursor>;
    /// Offset of a field from the start of its record, in bits.
    fn field_bit_offset(&self, cursor: Cursor) -> Option<u64>;
    fn field_bit_width(&self, cursor: Cursor) -> Option<u32>;
    fn enum_constant_value(&self, cursor: Cursor) -> Option<i64>;
    fn typedef_underlying(&self, cursor: Cursor) -> Option<TypeHandle>;
    fn enum_integer_type(&self, cursor: Cursor) -> Option<TypeHandle>;
    fn macro_tokens(&self, cursor: Cursor) -> &[String];
    fn macro_is_function_like(&self, cursor: Cursor) -> bool;

    fn type_kind(&self, ty: TypeHandle) -> TypeKind;
    fn type_spelling(&self, ty: TypeHandle) -> &str;
    /// Declaration of a record, enum or typedef type.
    fn type_declaration(&self, ty: TypeHandle) -> Option<Cursor>;
    /// The type with typedef, qualifier and elaboration sugar removed.
    fn canonical_type(&self, ty: TypeHandle) -> TypeHandle;
    fn pointee_type(&self, ty: TypeHandle) -> Option<TypeHandle>;
    fn element_type(&self, ty: TypeHandle) -> Option<TypeHandle>;
    fn array_length(&self, ty: TypeHandle) -> Option<u64>;
    /// The type a qualified or elaborated type wraps.
    fn inner_type(&self, ty: TypeHandle) -> Option<TypeHandle>;
    fn result_type(&self, ty: TypeHandle) -> Option<TypeHandle>;
    fn argument_types(&self, ty: TypeHandle) -> Vec<TypeHandle>;
    fn is_variadic(&self, ty: TypeHandle) -> bool;
    fn calling_convention(&self, ty: TypeHandle) -> CallingConvention;
    fn size_of(&self, ty: TypeHandle) -> Option<u64>;
    fn align_of(&self, ty: TypeHandle) -> Option<u64>;
}
