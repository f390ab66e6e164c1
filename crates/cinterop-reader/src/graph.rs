//! Owned arena implementation of [`TranslationUnit`].
//!
//! Cursors and types live in two vectors and are addressed by index. The
//! graph holds no references into the parser, so it outlives the parse and
//! can be built by hand in tests through [`UnitGraphBuilder`].

use std::collections::{HashMap, HashSet};

use cinterop_ast::{CLocation, CallingConvention, Diagnostic};
use cinterop_targets::{system_typedef, PrimitiveLayout, SystemTypedef, TargetPlatform};

use crate::unit::{Cursor, CursorKind, Linkage, TranslationUnit, TypeHandle, TypeKind};

#[derive(Debug, Clone)]
pub(crate) struct CursorData {
    pub(crate) kind: CursorKind,
    pub(crate) name: String,
    pub(crate) location: CLocation,
    pub(crate) ty: Option<TypeHandle>,
    pub(crate) is_system: bool,
    pub(crate) is_definition: bool,
    pub(crate) linkage: Linkage,
    pub(crate) children: Vec<Cursor>,
    pub(crate) bit_offset: Option<u64>,
    pub(crate) bit_width: Option<u32>,
    pub(crate) enum_value: Option<i64>,
    pub(crate) underlying: Option<TypeHandle>,
    pub(crate) integer_type: Option<TypeHandle>,
    pub(crate) macro_tokens: Vec<String>,
    pub(crate) function_like: bool,
    /// Record layout was supplied explicitly and must not be recomputed.
    pub(crate) fixed_layout: bool,
    pub(crate) laid_out: bool,
}

impl CursorData {
    fn new(kind: CursorKind, name: impl Into<String>, location: CLocation) -> Self {
        Self {
            kind,
            name: name.into(),
            location,
            ty: None,
            is_system: false,
            is_definition: false,
            linkage: Linkage::NoLinkage,
            children: Vec::new(),
            bit_offset: None,
            bit_width: None,
            enum_value: None,
            underlying: None,
            integer_type: None,
            macro_tokens: Vec::new(),
            function_like: false,
            fixed_layout: false,
            laid_out: false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TypeData {
    pub(crate) kind: TypeKind,
    pub(crate) spelling: String,
    pub(crate) declaration: Option<Cursor>,
    /// `None` means the type is its own canonical type.
    pub(crate) canonical: Option<TypeHandle>,
    pub(crate) pointee: Option<TypeHandle>,
    pub(crate) element: Option<TypeHandle>,
    pub(crate) length: Option<u64>,
    pub(crate) inner: Option<TypeHandle>,
    pub(crate) result: Option<TypeHandle>,
    pub(crate) arguments: Vec<TypeHandle>,
    pub(crate) variadic: bool,
    pub(crate) calling_convention: CallingConvention,
    pub(crate) size: Option<u64>,
    pub(crate) align: Option<u64>,
}

impl TypeData {
    fn new(kind: TypeKind, spelling: impl Into<String>) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            declaration: None,
            canonical: None,
            pointee: None,
            element: None,
            length: None,
            inner: None,
            result: None,
            arguments: Vec::new(),
            variadic: false,
            calling_convention: CallingConvention::Cdecl,
            size: None,
            align: None,
        }
    }
}

/// A translation unit held entirely in memory.
#[derive(Debug, Clone)]
pub struct UnitGraph {
    pub(crate) file_path: String,
    pub(crate) platform: TargetPlatform,
    pub(crate) cursors: Vec<CursorData>,
    pub(crate) types: Vec<TypeData>,
    pub(crate) top_level: Vec<Cursor>,
    pub(crate) fatal_errors: Vec<String>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl UnitGraph {
    fn cursor(&self, cursor: Cursor) -> &CursorData {
        &self.cursors[cursor.0 as usize]
    }

    fn ty(&self, ty: TypeHandle) -> &TypeData {
        &self.types[ty.0 as usize]
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Find a top-level cursor by name and kind.
    pub fn find(&self, kind: CursorKind, name: &str) -> Option<Cursor> {
        self.top_level
            .iter()
            .copied()
            .find(|c| self.cursor(*c).kind == kind && self.cursor(*c).name == name)
    }
}

impl TranslationUnit for UnitGraph {
    fn file_path(&self) -> &str {
        &self.file_path
    }

    fn platform(&self) -> &TargetPlatform {
        &self.platform
    }

    fn fatal_errors(&self) -> &[String] {
        &self.fatal_errors
    }

    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn top_level_cursors(&self) -> Vec<Cursor> {
        self.top_level.clone()
    }

    fn cursor_kind(&self, cursor: Cursor) -> CursorKind {
        self.cursor(cursor).kind
    }

    fn cursor_name(&self, cursor: Cursor) -> &str {
        &self.cursor(cursor).name
    }

    fn cursor_location(&self, cursor: Cursor) -> CLocation {
        self.cursor(cursor).location.clone()
    }

    fn cursor_type(&self, cursor: Cursor) -> Option<TypeHandle> {
        self.cursor(cursor).ty
    }

    fn cursor_is_system(&self, cursor: Cursor) -> bool {
        self.cursor(cursor).is_system
    }

    fn cursor_is_anonymous(&self, cursor: Cursor) -> bool {
        self.cursor(cursor).name.is_empty()
    }

    fn cursor_is_definition(&self, cursor: Cursor) -> bool {
        self.cursor(cursor).is_definition
    }

    fn cursor_linkage(&self, cursor: Cursor) -> Linkage {
        self.cursor(cursor).linkage
    }

    fn cursor_children(&self, cursor: Cursor) -> Vec<Cursor> {
        self.cursor(cursor).children.clone()
    }

    fn field_bit_offset(&self, cursor: Cursor) -> Option<u64> {
        self.cursor(cursor).bit_offset
    }

    fn field_bit_width(&self, cursor: Cursor) -> Option<u32> {
        self.cursor(cursor).bit_width
    }

    fn enum_constant_value(&self, cursor: Cursor) -> Option<i64> {
        self.cursor(cursor).enum_value
    }

    fn typedef_underlying(&self, cursor: Cursor) -> Option<TypeHandle> {
        self.cursor(cursor).underlying
    }

    fn enum_integer_type(&self, cursor: Cursor) -> Option<TypeHandle> {
        self.cursor(cursor).integer_type
    }

    fn macro_tokens(&self, cursor: Cursor) -> &[String] {
        &self.cursor(cursor).macro_tokens
    }

    fn macro_is_function_like(&self, cursor: Cursor) -> bool {
        self.cursor(cursor).function_like
    }

    fn type_kind(&self, ty: TypeHandle) -> TypeKind {
        self.ty(ty).kind
    }

    fn type_spelling(&self, ty: TypeHandle) -> &str {
        &self.ty(ty).spelling
    }

    fn type_declaration(&self, ty: TypeHandle) -> Option<Cursor> {
        self.ty(ty).declaration
    }

    fn canonical_type(&self, ty: TypeHandle) -> TypeHandle {
        self.ty(ty).canonical.unwrap_or(ty)
    }

    fn pointee_type(&self, ty: TypeHandle) -> Option<TypeHandle> {
        self.ty(ty).pointee
    }

    fn element_type(&self, ty: TypeHandle) -> Option<TypeHandle> {
        self.ty(ty).element
    }

    fn array_length(&self, ty: TypeHandle) -> Option<u64> {
        self.ty(ty).length
    }

    fn inner_type(&self, ty: TypeHandle) -> Option<TypeHandle> {
        self.ty(ty).inner
    }

    fn result_type(&self, ty: TypeHandle) -> Option<TypeHandle> {
        self.ty(ty).result
    }

    fn argument_types(&self, ty: TypeHandle) -> Vec<TypeHandle> {
        self.ty(ty).arguments.clone()
    }

    fn is_variadic(&self, ty: TypeHandle) -> bool {
        self.ty(ty).variadic
    }

    fn calling_convention(&self, ty: TypeHandle) -> CallingConvention {
        self.ty(ty).calling_convention
    }

    fn size_of(&self, ty: TypeHandle) -> Option<u64> {
        self.ty(ty).size
    }

    fn align_of(&self, ty: TypeHandle) -> Option<u64> {
        self.ty(ty).align
    }
}

/// Incremental constructor for a [`UnitGraph`].
///
/// Record and enum tags, typedef names and system typedefs are interned so
/// that every reference to `struct Foo` yields the same cursor.
#[derive(Debug)]
pub struct UnitGraphBuilder {
    pub(crate) graph: UnitGraph,
    pub(crate) primitives_layout: PrimitiveLayout,
    pub(crate) in_progress: HashSet<Cursor>,
    primitives: HashMap<String, TypeHandle>,
    pointers: HashMap<TypeHandle, TypeHandle>,
    record_tags: HashMap<String, Cursor>,
    enum_tags: HashMap<String, Cursor>,
    typedefs: HashMap<String, Cursor>,
    system_typedefs: HashMap<String, TypeHandle>,
    enum_constants: HashMap<String, i64>,
    top_level_seen: HashSet<Cursor>,
}

impl UnitGraphBuilder {
    pub fn new(platform: TargetPlatform, file_path: impl Into<String>) -> Self {
        let primitives_layout = platform.primitive_layout();
        Self {
            graph: UnitGraph {
                file_path: file_path.into(),
                platform,
                cursors: Vec::new(),
                types: Vec::new(),
                top_level: Vec::new(),
                fatal_errors: Vec::new(),
                diagnostics: Vec::new(),
            },
            primitives_layout,
            in_progress: HashSet::new(),
            primitives: HashMap::new(),
            pointers: HashMap::new(),
            record_tags: HashMap::new(),
            enum_tags: HashMap::new(),
            typedefs: HashMap::new(),
            system_typedefs: HashMap::new(),
            enum_constants: HashMap::new(),
            top_level_seen: HashSet::new(),
        }
    }

    pub fn platform(&self) -> &TargetPlatform {
        &self.graph.platform
    }

    fn push_cursor(&mut self, data: CursorData) -> Cursor {
        let handle = Cursor(self.graph.cursors.len() as u32);
        self.graph.cursors.push(data);
        handle
    }

    fn push_type(&mut self, data: TypeData) -> TypeHandle {
        let handle = TypeHandle(self.graph.types.len() as u32);
        self.graph.types.push(data);
        handle
    }

    pub(crate) fn cursor_mut(&mut self, cursor: Cursor) -> &mut CursorData {
        &mut self.graph.cursors[cursor.0 as usize]
    }

    pub(crate) fn type_mut(&mut self, ty: TypeHandle) -> &mut TypeData {
        &mut self.graph.types[ty.0 as usize]
    }

    pub(crate) fn cursor_data(&self, cursor: Cursor) -> &CursorData {
        &self.graph.cursors[cursor.0 as usize]
    }

    pub(crate) fn type_data(&self, ty: TypeHandle) -> &TypeData {
        &self.graph.types[ty.0 as usize]
    }

    fn canonical_of(&self, ty: TypeHandle) -> TypeHandle {
        self.type_data(ty).canonical.unwrap_or(ty)
    }

    pub fn void(&mut self) -> TypeHandle {
        if let Some(ty) = self.primitives.get("void") {
            return *ty;
        }
        let ty = self.push_type(TypeData::new(TypeKind::Void, "void"));
        self.primitives.insert("void".into(), ty);
        ty
    }

    /// A builtin arithmetic type by normalized spelling.
    pub fn primitive(&mut self, spelling: &str) -> TypeHandle {
        if spelling == "void" {
            return self.void();
        }
        if let Some(ty) = self.primitives.get(spelling) {
            return *ty;
        }
        let ty = match self.primitives_layout.size_align(spelling) {
            Some((size, align)) => {
                let mut data = TypeData::new(TypeKind::Primitive, spelling);
                data.size = Some(size);
                data.align = Some(align);
                self.push_type(data)
            }
            None => self.push_type(TypeData::new(TypeKind::Unexposed, spelling)),
        };
        self.primitives.insert(spelling.to_string(), ty);
        ty
    }

    pub fn unexposed(&mut self, spelling: &str) -> TypeHandle {
        self.push_type(TypeData::new(TypeKind::Unexposed, spelling))
    }

    pub fn pointer(&mut self, pointee: TypeHandle) -> TypeHandle {
        if let Some(ty) = self.pointers.get(&pointee) {
            return *ty;
        }
        let size = self.primitives_layout.pointer_size;
        let mut data = TypeData::new(TypeKind::Pointer, format!("{} *", self.type_data(pointee).spelling));
        data.pointee = Some(pointee);
        data.size = Some(size);
        data.align = Some(size);
        let ty = self.push_type(data);
        self.pointers.insert(pointee, ty);
        ty
    }

    /// A constant array, or an incomplete one when `length` is `None`.
    pub fn array(&mut self, element: TypeHandle, length: Option<u64>) -> TypeHandle {
        let (kind, spelling) = match length {
            Some(n) => (TypeKind::ConstantArray, format!("{}[{n}]", self.type_data(element).spelling)),
            None => (TypeKind::IncompleteArray, format!("{}[]", self.type_data(element).spelling)),
        };
        let mut data = TypeData::new(kind, spelling);
        data.element = Some(element);
        data.length = length;
        self.push_type(data)
    }

    /// `const`/`volatile` sugar around `inner`.
    pub fn qualified(&mut self, inner: TypeHandle, qualifier: &str) -> TypeHandle {
        let mut data = TypeData::new(TypeKind::Qualified, format!("{qualifier} {}", self.type_data(inner).spelling));
        data.inner = Some(inner);
        data.canonical = Some(self.canonical_of(inner));
        self.push_type(data)
    }

    /// `struct Foo` / `enum Foo` sugar around a record or enum type.
    pub fn elaborated(&mut self, named: TypeHandle, keyword: &str) -> TypeHandle {
        let mut data = TypeData::new(TypeKind::Elaborated, format!("{keyword} {}", self.type_data(named).spelling));
        data.inner = Some(named);
        data.declaration = self.type_data(named).declaration;
        data.canonical = Some(self.canonical_of(named));
        self.push_type(data)
    }

    pub fn function_proto(
        &mut self,
        result: TypeHandle,
        arguments: Vec<TypeHandle>,
        variadic: bool,
        calling_convention: CallingConvention,
    ) -> TypeHandle {
        let args: Vec<&str> = arguments.iter().map(|a| self.type_data(*a).spelling.as_str()).collect();
        let spelling = format!("{} ({})", self.type_data(result).spelling, args.join(", "));
        let mut data = TypeData::new(TypeKind::FunctionProto, spelling);
        data.result = Some(result);
        data.arguments = arguments;
        data.variadic = variadic;
        data.calling_convention = calling_convention;
        self.push_type(data)
    }

    /// Get or create the record declared by `tag`. Anonymous records are
    /// always fresh.
    pub fn record(&mut self, tag: Option<&str>, is_union: bool, location: CLocation) -> Cursor {
        if let Some(existing) = tag.and_then(|t| self.record_tags.get(t)) {
            return *existing;
        }
        let kind = if is_union { CursorKind::UnionDecl } else { CursorKind::StructDecl };
        let name = tag.unwrap_or_default();
        let cursor = self.push_cursor(CursorData::new(kind, name, location));
        let mut data = TypeData::new(TypeKind::Record, name);
        data.declaration = Some(cursor);
        let ty = self.push_type(data);
        self.cursor_mut(cursor).ty = Some(ty);
        if let Some(tag) = tag {
            self.record_tags.insert(tag.to_string(), cursor);
        }
        cursor
    }

    /// Mark a record or enum as defined here. Returns `false` when it
    /// already had a body.
    pub fn begin_definition(&mut self, decl: Cursor, location: CLocation) -> bool {
        let data = self.cursor_mut(decl);
        if data.is_definition {
            return false;
        }
        data.is_definition = true;
        data.location = location;
        true
    }

    /// Append a field to a record. An empty name declares a C11 anonymous member.
    pub fn add_field(
        &mut self,
        record: Cursor,
        name: &str,
        ty: TypeHandle,
        bit_width: Option<u32>,
        location: CLocation,
    ) -> Cursor {
        let mut data = CursorData::new(CursorKind::FieldDecl, name, location);
        data.ty = Some(ty);
        data.bit_width = bit_width;
        let field = self.push_cursor(data);
        self.cursor_mut(record).children.push(field);
        field
    }

    /// Record a nested declaration inside `parent`, in source order.
    pub fn nest(&mut self, parent: Cursor, child: Cursor) {
        self.cursor_mut(parent).children.push(child);
    }

    /// Supply a field offset explicitly instead of computing it.
    pub fn set_field_offset(&mut self, field: Cursor, bit_offset: u64) {
        self.cursor_mut(field).bit_offset = Some(bit_offset);
    }

    /// Supply a record's size and alignment explicitly; field offsets must
    /// then be set with [`set_field_offset`](Self::set_field_offset).
    pub fn set_record_layout(&mut self, record: Cursor, size: u64, align: u64) {
        let data = self.cursor_mut(record);
        data.fixed_layout = true;
        data.laid_out = true;
        data.is_definition = true;
        if let Some(ty) = data.ty {
            let ty_data = self.type_mut(ty);
            ty_data.size = Some(size);
            ty_data.align = Some(align);
        }
    }

    pub fn enumeration(&mut self, tag: Option<&str>, location: CLocation) -> Cursor {
        if let Some(existing) = tag.and_then(|t| self.enum_tags.get(t)) {
            return *existing;
        }
        let name = tag.unwrap_or_default();
        let cursor = self.push_cursor(CursorData::new(CursorKind::EnumDecl, name, location));
        let mut data = TypeData::new(TypeKind::Enum, name);
        data.declaration = Some(cursor);
        let ty = self.push_type(data);
        self.cursor_mut(cursor).ty = Some(ty);
        if let Some(tag) = tag {
            self.enum_tags.insert(tag.to_string(), cursor);
        }
        cursor
    }

    pub fn set_enum_integer_type(&mut self, decl: Cursor, integer_type: TypeHandle) {
        let (size, align) = (self.type_data(integer_type).size, self.type_data(integer_type).align);
        let data = self.cursor_mut(decl);
        data.integer_type = Some(integer_type);
        if let Some(ty) = data.ty {
            let ty_data = self.type_mut(ty);
            ty_data.size = size;
            ty_data.align = align;
        }
    }

    pub fn add_enum_constant(&mut self, decl: Cursor, name: &str, value: i64, location: CLocation) -> Cursor {
        let mut data = CursorData::new(CursorKind::EnumConstantDecl, name, location);
        data.enum_value = Some(value);
        data.ty = self.cursor_data(decl).ty;
        let constant = self.push_cursor(data);
        self.cursor_mut(decl).children.push(constant);
        self.enum_constants.insert(name.to_string(), value);
        constant
    }

    /// Value of an enum constant declared so far.
    pub fn enum_constant(&self, name: &str) -> Option<i64> {
        self.enum_constants.get(name).copied()
    }

    pub fn typedef(&mut self, name: &str, underlying: TypeHandle, location: CLocation) -> Cursor {
        if let Some(existing) = self.typedefs.get(name) {
            return *existing;
        }
        let mut cursor_data = CursorData::new(CursorKind::TypedefDecl, name, location);
        cursor_data.underlying = Some(underlying);
        let cursor = self.push_cursor(cursor_data);
        let mut data = TypeData::new(TypeKind::Typedef, name);
        data.declaration = Some(cursor);
        data.canonical = Some(self.canonical_of(underlying));
        let ty = self.push_type(data);
        self.cursor_mut(cursor).ty = Some(ty);
        self.typedefs.insert(name.to_string(), cursor);
        cursor
    }

    /// The typedef type declared under `name`, if any.
    pub fn lookup_typedef(&self, name: &str) -> Option<TypeHandle> {
        self.typedefs.get(name).and_then(|c| self.cursor_data(*c).ty)
    }

    /// A typedef the user's headers reference but never declare.
    ///
    /// Known system names resolve through the platform tables; anything else
    /// becomes a system typedef over an unexposed type.
    pub fn system_typedef(&mut self, name: &str) -> TypeHandle {
        if let Some(ty) = self.system_typedefs.get(name) {
            return *ty;
        }
        let underlying = match system_typedef(name, &self.graph.platform) {
            Some(SystemTypedef::Primitive(spelling)) => self.primitive(spelling),
            Some(SystemTypedef::VoidPointer) => {
                let void = self.void();
                self.pointer(void)
            }
            None => self.unexposed(name),
        };
        let mut cursor_data = CursorData::new(CursorKind::TypedefDecl, name, CLocation::System);
        cursor_data.underlying = Some(underlying);
        cursor_data.is_system = true;
        let cursor = self.push_cursor(cursor_data);
        let mut data = TypeData::new(TypeKind::Typedef, name);
        data.declaration = Some(cursor);
        data.canonical = Some(self.canonical_of(underlying));
        let ty = self.push_type(data);
        self.cursor_mut(cursor).ty = Some(ty);
        self.system_typedefs.insert(name.to_string(), ty);
        ty
    }

    /// Declare a function whose type is `proto`. Parameter cursors take their
    /// types from the prototype and their names from `parameter_names`.
    pub fn function(
        &mut self,
        name: &str,
        proto: TypeHandle,
        parameter_names: &[String],
        linkage: Linkage,
        location: CLocation,
    ) -> Cursor {
        let mut data = CursorData::new(CursorKind::FunctionDecl, name, location.clone());
        data.ty = Some(proto);
        data.linkage = linkage;
        let function = self.push_cursor(data);
        let arguments = self.type_data(proto).arguments.clone();
        for (index, arg) in arguments.into_iter().enumerate() {
            let param_name = parameter_names.get(index).cloned().unwrap_or_default();
            let mut param = CursorData::new(CursorKind::ParmDecl, param_name, location.clone());
            param.ty = Some(arg);
            let param = self.push_cursor(param);
            self.cursor_mut(function).children.push(param);
        }
        function
    }

    pub fn variable(&mut self, name: &str, ty: TypeHandle, linkage: Linkage, location: CLocation) -> Cursor {
        let mut data = CursorData::new(CursorKind::VarDecl, name, location);
        data.ty = Some(ty);
        data.linkage = linkage;
        self.push_cursor(data)
    }

    pub fn macro_definition(
        &mut self,
        name: &str,
        tokens: Vec<String>,
        function_like: bool,
        location: CLocation,
    ) -> Cursor {
        let mut data = CursorData::new(CursorKind::MacroDefinition, name, location);
        data.macro_tokens = tokens;
        data.function_like = function_like;
        self.push_cursor(data)
    }

    /// The type a declaration introduces.
    pub fn declared_type(&self, cursor: Cursor) -> Option<TypeHandle> {
        self.cursor_data(cursor).ty
    }

    /// Add a cursor to the top-level list once.
    pub fn push_top_level(&mut self, cursor: Cursor) {
        if self.top_level_seen.insert(cursor) {
            self.graph.top_level.push(cursor);
        }
    }

    pub fn add_fatal_error(&mut self, message: impl Into<String>) {
        self.graph.fatal_errors.push(message.into());
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.graph.diagnostics.push(diagnostic);
    }

    /// Lay out every record and return the finished graph.
    pub fn finish(mut self) -> UnitGraph {
        self.compute_layouts();
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> UnitGraphBuilder {
        UnitGraphBuilder::new(TargetPlatform::linux_x64(), "test.h")
    }

    #[test]
    fn record_tags_are_interned() {
        let mut b = builder();
        let a = b.record(Some("Node"), false, CLocation::source("test.h", 1, 8));
        let again = b.record(Some("Node"), false, CLocation::source("test.h", 5, 8));
        assert_eq!(a, again);
        let anon1 = b.record(None, true, CLocation::source("test.h", 2, 1));
        let anon2 = b.record(None, true, CLocation::source("test.h", 3, 1));
        assert_ne!(anon1, anon2);
    }

    #[test]
    fn typedef_canonical_strips_sugar() {
        let mut b = builder();
        let int = b.primitive("int");
        let konst = b.qualified(int, "const");
        let td = b.typedef("MyInt", konst, CLocation::source("test.h", 1, 1));
        let graph = b.finish();
        let ty = graph.cursor_type(td).unwrap();
        assert_eq!(graph.type_kind(ty), TypeKind::Typedef);
        assert_eq!(graph.canonical_type(ty), int);
        assert_eq!(graph.type_kind(graph.canonical_type(ty)), TypeKind::Primitive);
    }

    #[test]
    fn system_typedefs_resolve_through_platform_tables() {
        let mut b = UnitGraphBuilder::new(TargetPlatform::windows_x64(), "test.h");
        let dword = b.system_typedef("DWORD");
        let unknown = b.system_typedef("FOO_T");
        let graph = b.finish();
        let canonical = graph.canonical_type(dword);
        assert_eq!(graph.type_spelling(canonical), "unsigned long");
        assert_eq!(graph.size_of(canonical), Some(4));
        let decl = graph.type_declaration(dword).unwrap();
        assert!(graph.cursor_is_system(decl));
        assert_eq!(graph.type_kind(graph.canonical_type(unknown)), TypeKind::Unexposed);
    }

    #[test]
    fn function_parameters_become_children() {
        let mut b = builder();
        let void = b.void();
        let int = b.primitive("int");
        let proto = b.function_proto(void, vec![int, int], false, CallingConvention::Cdecl);
        let f = b.function("f", proto, &["a".into(), "b".into()], Linkage::External, CLocation::source("test.h", 1, 6));
        b.push_top_level(f);
        b.push_top_level(f);
        let graph = b.finish();
        assert_eq!(graph.top_level_cursors().len(), 1);
        let params = graph.cursor_children(f);
        assert_eq!(params.len(), 2);
        assert_eq!(graph.cursor_name(params[1]), "b");
        assert_eq!(graph.cursor_kind(params[0]), CursorKind::ParmDecl);
    }

    #[test]
    fn enum_constants_are_recorded() {
        let mut b = builder();
        let e = b.enumeration(Some("Color"), CLocation::source("test.h", 1, 6));
        let int = b.primitive("int");
        b.set_enum_integer_type(e, int);
        b.add_enum_constant(e, "RED", 0, CLocation::source("test.h", 1, 14));
        b.add_enum_constant(e, "GREEN", 1, CLocation::source("test.h", 1, 19));
        assert_eq!(b.enum_constant("GREEN"), Some(1));
        let graph = b.finish();
        let ty = graph.cursor_type(e).unwrap();
        assert_eq!(graph.size_of(ty), Some(4));
        assert_eq!(graph.cursor_children(e).len(), 2);
    }
}
