//! Worklist traversal of one translation unit.
//!
//! Declarations are registered by `(kind, name)` the moment they are first
//! referenced and expanded later from the frontier, so every name is
//! expanded at most once however cyclic the reference graph is. Resolving a
//! type reference never recurses into a declaration's members; it only
//! enqueues the declaration.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use cinterop_ast::{
    CAbstractSyntaxTree, CEnum, CEnumValue, CFunction, CFunctionPointer, CKind, CLocation, CMacroObject, CNode,
    COpaqueType, CParameter, CRecord, CRecordField, CType, CTypedef, CVariable, Diagnostic, DiagnosticKind,
    Diagnostics, Severity,
};
use cinterop_reader::eval::Symbol;
use cinterop_reader::{Cursor, CursorKind, Linkage, TranslationUnit, TypeHandle, TypeKind};
use cinterop_targets::{is_well_known, PrimitiveLayout, TargetPlatform};

use crate::error::{ExploreError, Result};
use crate::macros::macro_constant;
use crate::naming::{anonymous_enum_name, anonymous_field_name, anonymous_type_name, function_pointer_name};
use crate::options::{EntryPoints, ExploreOptions};

/// The AST of one platform plus everything reported while building it.
#[derive(Debug, Clone)]
pub struct Exploration {
    pub tree: CAbstractSyntaxTree,
    pub diagnostics: Diagnostics,
}

/// Explore a translation unit from its entry points.
pub fn explore<U: TranslationUnit + ?Sized>(unit: &U, options: &ExploreOptions) -> Result<Exploration> {
    if !unit.fatal_errors().is_empty() {
        return Err(ExploreError::FatalParse {
            platform: unit.platform().clone(),
            file: unit.file_path().to_string(),
            errors: unit.fatal_errors().to_vec(),
        });
    }
    let mut explorer = Explorer::new(unit, options);
    explorer.seed();
    while let Some(work) = explorer.frontier.pop_front() {
        explorer.expand(work);
    }
    Ok(explorer.finish())
}

#[derive(Debug)]
enum Work {
    Function(Cursor),
    Variable(Cursor),
    Record { decl: Cursor, name: String },
    Enum { decl: Cursor, name: String },
    Typedef { decl: Cursor, name: String },
    Macro(Cursor),
}

/// Why a declaration cannot be represented as is.
#[derive(Debug)]
enum Invalid {
    Unclassified(String),
    NegativePadding { field: String, deficit_bits: u64 },
}

struct Explorer<'a, U: ?Sized> {
    unit: &'a U,
    options: &'a ExploreOptions,
    platform: TargetPlatform,
    layout: PrimitiveLayout,
    tree: CAbstractSyntaxTree,
    diagnostics: Diagnostics,
    visited: HashSet<(CKind, String)>,
    frontier: VecDeque<Work>,
    /// Names given to anonymous records and enums.
    assigned_names: HashMap<Cursor, String>,
    /// Anonymous records stored inside their parent.
    nested: HashSet<Cursor>,
    /// Records replaced by opaque types.
    demoted: HashSet<String>,
    /// Location of the declaration being expanded.
    context: CLocation,
    macros: HashMap<String, (Vec<String>, bool)>,
}

impl<'a, U: TranslationUnit + ?Sized> Explorer<'a, U> {
    fn new(unit: &'a U, options: &'a ExploreOptions) -> Self {
        let platform = unit.platform().clone();
        let macros = unit
            .top_level_cursors()
            .into_iter()
            .filter(|c| unit.cursor_kind(*c) == CursorKind::MacroDefinition)
            .map(|c| {
                let definition = (unit.macro_tokens(c).to_vec(), unit.macro_is_function_like(c));
                (unit.cursor_name(c).to_string(), definition)
            })
            .collect();
        let mut diagnostics = Diagnostics::new();
        for diagnostic in unit.diagnostics() {
            diagnostics.push(diagnostic.clone().on(&platform));
        }
        Self {
            unit,
            options,
            layout: platform.primitive_layout(),
            tree: CAbstractSyntaxTree::new(platform.clone(), unit.file_path()),
            platform,
            diagnostics,
            visited: HashSet::new(),
            frontier: VecDeque::new(),
            assigned_names: HashMap::new(),
            nested: HashSet::new(),
            demoted: HashSet::new(),
            context: CLocation::BuiltIn,
            macros,
        }
    }

    fn report(&mut self, severity: Severity, kind: DiagnosticKind, message: String, location: CLocation) {
        self.diagnostics
            .push(Diagnostic::new(severity, kind, message).at(location).on(&self.platform));
    }

    /// Mark `(kind, name)` as discovered. Returns `false` if it already was.
    fn register(&mut self, kind: CKind, name: &str) -> bool {
        let fresh = self.visited.insert((kind, name.to_string()));
        if fresh {
            log::debug!("{}: found {kind} {name}", self.platform);
        }
        fresh
    }

    fn remember(&mut self, ty: CType) -> CType {
        self.tree.types.entry(ty.name.clone()).or_insert_with(|| ty.clone());
        ty
    }

    fn check_blocked(&mut self, name: &str, location: &CLocation) {
        if self.options.is_blocked(location) {
            self.report(
                Severity::Warning,
                DiagnosticKind::BlockedHeader,
                format!("'{name}' is declared in a blocked header but is reachable from an entry point"),
                location.clone(),
            );
        }
    }

    fn reject(&mut self, kind: CKind, name: &str, location: CLocation, invalid: Invalid, outcome: &str) {
        let (diagnostic, message) = match invalid {
            Invalid::Unclassified(spelling) => (
                DiagnosticKind::UnclassifiedType,
                format!("{kind} '{name}' {outcome}: type '{spelling}' cannot be classified"),
            ),
            Invalid::NegativePadding { field, deficit_bits } => (
                DiagnosticKind::NegativePadding,
                format!("{kind} '{name}' {outcome}: field '{field}' overlaps the next field by {deficit_bits} bits"),
            ),
        };
        self.report(Severity::Error, diagnostic, message, location);
    }

    fn seed(&mut self) {
        let unit = self.unit;
        let options = self.options;
        let whitelist = match &options.entry_points {
            EntryPoints::Whitelist(names) => Some(names),
            EntryPoints::ExportedFunctions => None,
        };
        let cursors = unit.top_level_cursors();
        // Anonymous enums named by a typedef.
        let typedef_names: HashMap<Cursor, String> = cursors
            .iter()
            .filter(|c| unit.cursor_kind(**c) == CursorKind::TypedefDecl)
            .filter_map(|c| {
                let target = self.declaration_of(unit.typedef_underlying(*c)?)?;
                Some((target, unit.cursor_name(*c).to_string()))
            })
            .collect();
        let mut found = BTreeSet::new();
        for cursor in cursors {
            let name = unit.cursor_name(cursor);
            let exported = unit.cursor_linkage(cursor) == Linkage::External
                && (!unit.cursor_is_system(cursor) || options.system_declarations);
            let wanted = whitelist.map_or(true, |names| names.contains(name));
            match unit.cursor_kind(cursor) {
                CursorKind::FunctionDecl if exported && wanted => {
                    found.insert(name.to_string());
                    if self.register(CKind::Function, name) {
                        self.frontier.push_back(Work::Function(cursor));
                    }
                }
                CursorKind::VarDecl if exported && wanted && options.variables => {
                    found.insert(name.to_string());
                    if self.register(CKind::Variable, name) {
                        self.frontier.push_back(Work::Variable(cursor));
                    }
                }
                CursorKind::MacroDefinition if options.macros => {
                    if self.register(CKind::MacroDefinition, name) {
                        self.frontier.push_back(Work::Macro(cursor));
                    }
                }
                CursorKind::EnumDecl if options.enums && unit.cursor_is_definition(cursor) => {
                    if unit.cursor_is_anonymous(cursor) {
                        match typedef_names.get(&cursor) {
                            Some(typedef) => {
                                self.assigned_names.entry(cursor).or_insert_with(|| typedef.clone());
                            }
                            None => {
                                self.anonymous_enum(cursor);
                                continue;
                            }
                        }
                    }
                    if let Err(invalid) = self.enum_reference(cursor) {
                        log::debug!("{}: skipping enum {name}: {invalid:?}", self.platform);
                    }
                }
                _ => {}
            }
        }
        if let Some(names) = whitelist {
            for missing in names.iter().filter(|n| !found.contains(*n)) {
                self.report(
                    Severity::Warning,
                    DiagnosticKind::MissingEntryPoint,
                    format!("entry point '{missing}' is not declared"),
                    CLocation::BuiltIn,
                );
            }
        }
        log::debug!("{}: seeded {} entry points", self.platform, self.frontier.len());
    }

    /// A file-scope `enum { ... };` takes the shared prefix of its constants
    /// as its name. Without one, each constant becomes a macro object.
    fn anonymous_enum(&mut self, decl: Cursor) {
        let unit = self.unit;
        let constants: Vec<Cursor> = unit
            .cursor_children(decl)
            .into_iter()
            .filter(|c| unit.cursor_kind(*c) == CursorKind::EnumConstantDecl)
            .collect();
        let names: Vec<&str> = constants.iter().map(|c| unit.cursor_name(*c)).collect();
        if let Some(name) = anonymous_enum_name(&names) {
            if !self.visited.contains(&(CKind::Enum, name.clone())) {
                self.assigned_names.insert(decl, name);
                if let Err(invalid) = self.enum_reference(decl) {
                    log::debug!("{}: skipping anonymous enum: {invalid:?}", self.platform);
                }
                return;
            }
        }
        let ty = match unit.enum_integer_type(decl).map(|t| self.resolve(t)) {
            Some(Ok(ty)) => ty,
            _ => CType::primitive("int", 4, 4),
        };
        for constant in constants {
            let name = unit.cursor_name(constant).to_string();
            if !self.register(CKind::MacroDefinition, &name) {
                continue;
            }
            let location = unit.cursor_location(constant);
            self.check_blocked(&name, &location);
            let value = unit.enum_constant_value(constant).unwrap_or(0);
            self.tree.insert(CNode::MacroObject(CMacroObject {
                name,
                location,
                tokens: vec![value.to_string()],
                ty: ty.clone(),
            }));
        }
    }

    fn expand(&mut self, work: Work) {
        match work {
            Work::Function(cursor) => self.expand_function(cursor),
            Work::Variable(cursor) => self.expand_variable(cursor),
            Work::Record { decl, name } => self.expand_record(decl, name),
            Work::Enum { decl, name } => self.expand_enum(decl, name),
            Work::Typedef { decl, name } => self.expand_typedef(decl, name),
            Work::Macro(cursor) => self.expand_macro(cursor),
        }
    }

    fn enter(&mut self, name: &str, location: &CLocation) {
        self.context = location.clone();
        self.check_blocked(name, location);
    }

    fn expand_function(&mut self, cursor: Cursor) {
        let unit = self.unit;
        let name = unit.cursor_name(cursor).to_string();
        let location = unit.cursor_location(cursor);
        self.enter(&name, &location);
        let Some(proto) = unit.cursor_type(cursor) else {
            self.reject(CKind::Function, &name, location, Invalid::Unclassified(name.clone()), "omitted");
            return;
        };
        match self.signature(proto, Some(cursor)) {
            Ok((return_type, parameters)) => {
                self.tree.insert(CNode::Function(CFunction {
                    name,
                    location,
                    calling_convention: unit.calling_convention(proto),
                    return_type,
                    parameters,
                    is_variadic: unit.is_variadic(proto),
                }));
            }
            Err(invalid) => self.reject(CKind::Function, &name, location, invalid, "omitted"),
        }
    }

    fn expand_variable(&mut self, cursor: Cursor) {
        let unit = self.unit;
        let name = unit.cursor_name(cursor).to_string();
        let location = unit.cursor_location(cursor);
        self.enter(&name, &location);
        let resolved = match unit.cursor_type(cursor) {
            Some(ty) => self.resolve(ty),
            None => Err(Invalid::Unclassified(name.clone())),
        };
        match resolved {
            Ok(ty) => {
                self.tree.insert(CNode::Variable(CVariable { name, location, ty }));
            }
            Err(invalid) => self.reject(CKind::Variable, &name, location, invalid, "omitted"),
        }
    }

    fn expand_record(&mut self, decl: Cursor, name: String) {
        let unit = self.unit;
        let location = unit.cursor_location(decl);
        self.enter(&name, &location);
        match self.build_record(decl, &name) {
            Ok(record) => {
                self.tree.insert(CNode::Record(record));
            }
            Err(invalid) => {
                let size_of = unit.cursor_type(decl).and_then(|t| unit.size_of(t)).unwrap_or(0);
                self.reject(CKind::Record, &name, location.clone(), invalid, "exposed as an opaque type");
                self.demoted.insert(name.clone());
                self.tree.insert(CNode::OpaqueType(COpaqueType {
                    name,
                    location,
                    size_of,
                }));
            }
        }
    }

    fn build_record(&mut self, decl: Cursor, name: &str) -> std::result::Result<CRecord, Invalid> {
        let unit = self.unit;
        let ty = unit.cursor_type(decl);
        let size_of = ty.and_then(|t| unit.size_of(t)).unwrap_or(0);
        let align_of = ty.and_then(|t| unit.align_of(t)).unwrap_or(1);
        let is_union = unit.cursor_kind(decl) == CursorKind::UnionDecl;

        let mut nested_records = Vec::new();
        let mut anonymous_index: HashMap<Cursor, usize> = HashMap::new();
        // (field, first bit, width in bits)
        let mut placed: Vec<(CRecordField, u64, u64)> = Vec::new();
        for child in unit.cursor_children(decl) {
            match unit.cursor_kind(child) {
                CursorKind::StructDecl | CursorKind::UnionDecl if unit.cursor_is_anonymous(child) => {
                    let index = anonymous_index.len();
                    let nested_name = anonymous_type_name(name, index);
                    anonymous_index.insert(child, index);
                    self.assigned_names.insert(child, nested_name.clone());
                    self.nested.insert(child);
                    nested_records.push(self.build_record(child, &nested_name)?);
                }
                CursorKind::EnumDecl if unit.cursor_is_anonymous(child) => {
                    let index = anonymous_index.len();
                    anonymous_index.insert(child, index);
                    self.assigned_names
                        .entry(child)
                        .or_insert_with(|| anonymous_type_name(name, index));
                }
                // Named nested tags have file scope and are reached through fields.
                CursorKind::StructDecl | CursorKind::UnionDecl | CursorKind::EnumDecl => {}
                CursorKind::FieldDecl => {
                    let field_ty = unit
                        .cursor_type(child)
                        .ok_or_else(|| Invalid::Unclassified(unit.cursor_name(child).to_string()))?;
                    let mut field_name = unit.cursor_name(child).to_string();
                    if field_name.is_empty() {
                        let index = self
                            .declaration_of(field_ty)
                            .and_then(|d| anonymous_index.get(&d).copied())
                            .unwrap_or(placed.len());
                        field_name = anonymous_field_name(index);
                    }
                    let resolved = self.resolve(field_ty)?;
                    let first_bit = unit.field_bit_offset(child).unwrap_or(0);
                    let bit_width = unit.field_bit_width(child);
                    let width = bit_width
                        .map(u64::from)
                        .unwrap_or_else(|| resolved.size_of.unwrap_or(0) * 8);
                    let field = CRecordField {
                        name: field_name,
                        ty: resolved,
                        offset_of: first_bit / 8,
                        padding_of: 0,
                        bit_width,
                        bit_offset: bit_width.map(|_| first_bit),
                    };
                    placed.push((field, first_bit, width));
                }
                other => {
                    let location = unit.cursor_location(child);
                    self.report(
                        Severity::Warning,
                        DiagnosticKind::UnsupportedCursor,
                        format!("record '{name}': member of kind {other:?} is not supported"),
                        location,
                    );
                }
            }
        }

        let record_bits = size_of * 8;
        let starts: Vec<u64> = placed.iter().map(|(_, start, _)| *start).collect();
        let mut fields = Vec::with_capacity(placed.len());
        for (index, (mut field, start, width)) in placed.into_iter().enumerate() {
            let (end, next) = if is_union {
                (width, record_bits)
            } else {
                (start + width, starts.get(index + 1).copied().unwrap_or(record_bits))
            };
            if next < end {
                return Err(Invalid::NegativePadding {
                    field: field.name,
                    deficit_bits: end - next,
                });
            }
            field.padding_of = (next - end) / 8;
            fields.push(field);
        }

        Ok(CRecord {
            name: name.to_string(),
            location: unit.cursor_location(decl),
            is_union,
            size_of,
            align_of,
            fields,
            nested_records,
        })
    }

    fn expand_enum(&mut self, decl: Cursor, name: String) {
        let unit = self.unit;
        let location = unit.cursor_location(decl);
        self.enter(&name, &location);
        let integer_type = match unit.enum_integer_type(decl).map(|t| self.resolve(t)) {
            Some(Ok(ty)) => ty,
            Some(Err(invalid)) => {
                self.reject(CKind::Enum, &name, location, invalid, "omitted");
                return;
            }
            None => CType::primitive("int", 4, 4),
        };
        let values = unit
            .cursor_children(decl)
            .into_iter()
            .filter(|c| unit.cursor_kind(*c) == CursorKind::EnumConstantDecl)
            .map(|c| CEnumValue {
                name: unit.cursor_name(c).to_string(),
                value: unit.enum_constant_value(c).unwrap_or(0),
            })
            .collect();
        self.tree.insert(CNode::Enum(CEnum {
            name,
            location,
            integer_type,
            values,
        }));
    }

    fn expand_typedef(&mut self, decl: Cursor, name: String) {
        let unit = self.unit;
        let location = unit.cursor_location(decl);
        self.enter(&name, &location);
        let resolved = match unit.typedef_underlying(decl) {
            Some(underlying) => self.resolve(underlying),
            None => Err(Invalid::Unclassified(name.clone())),
        };
        match resolved {
            Ok(underlying) => {
                self.tree.insert(CNode::Typedef(CTypedef {
                    name,
                    location,
                    underlying,
                }));
            }
            Err(invalid) => self.reject(CKind::Typedef, &name, location, invalid, "omitted"),
        }
    }

    fn expand_macro(&mut self, cursor: Cursor) {
        let unit = self.unit;
        let name = unit.cursor_name(cursor).to_string();
        let location = unit.cursor_location(cursor);
        let lookup = |n: &str| {
            self.macros.get(n).map(|(tokens, function_like)| {
                if *function_like {
                    Symbol::FunctionLike
                } else {
                    Symbol::Tokens(tokens.clone())
                }
            })
        };
        let constant = macro_constant(
            &name,
            unit.macro_tokens(cursor),
            unit.macro_is_function_like(cursor),
            &self.layout,
            &lookup,
        );
        match constant {
            Ok((tokens, ty)) => {
                self.enter(&name, &location);
                self.tree.insert(CNode::MacroObject(CMacroObject {
                    name,
                    location,
                    tokens,
                    ty,
                }));
            }
            Err(skip) => log::debug!("{}: skipping macro {name}: {skip:?}", self.platform),
        }
    }

    fn signature(
        &mut self,
        proto: TypeHandle,
        declaration: Option<Cursor>,
    ) -> std::result::Result<(CType, Vec<CParameter>), Invalid> {
        let unit = self.unit;
        let result = unit
            .result_type(proto)
            .ok_or_else(|| Invalid::Unclassified(unit.type_spelling(proto).to_string()))?;
        let return_type = self.resolve(result)?;
        let names: Vec<String> = declaration
            .map(|d| {
                unit.cursor_children(d)
                    .into_iter()
                    .filter(|p| unit.cursor_kind(*p) == CursorKind::ParmDecl)
                    .map(|p| unit.cursor_name(p).to_string())
                    .collect()
            })
            .unwrap_or_default();
        let mut parameters = Vec::new();
        for (index, argument) in unit.argument_types(proto).into_iter().enumerate() {
            let ty = self.resolve(argument)?;
            parameters.push(CParameter::new(names.get(index).cloned().unwrap_or_default(), ty));
        }
        Ok((return_type, parameters))
    }

    /// Remove qualifier and elaboration sugar.
    fn strip_sugar(&self, mut ty: TypeHandle) -> TypeHandle {
        while matches!(self.unit.type_kind(ty), TypeKind::Qualified | TypeKind::Elaborated) {
            match self.unit.inner_type(ty) {
                Some(inner) => ty = inner,
                None => break,
            }
        }
        ty
    }

    fn declaration_of(&self, ty: TypeHandle) -> Option<Cursor> {
        self.unit.type_declaration(self.strip_sugar(ty))
    }

    /// Classify a type and return a reference to it, enqueueing whatever
    /// declaration it names.
    fn resolve(&mut self, ty: TypeHandle) -> std::result::Result<CType, Invalid> {
        let unit = self.unit;
        let unclassified = || Invalid::Unclassified(unit.type_spelling(ty).to_string());
        let pointer_size = self.layout.pointer_size;
        match unit.type_kind(ty) {
            TypeKind::Qualified | TypeKind::Elaborated => {
                let inner = unit.inner_type(ty).ok_or_else(unclassified)?;
                self.resolve(inner)
            }
            TypeKind::Void => Ok(CType::void()),
            TypeKind::Primitive => {
                let size = unit.size_of(ty).ok_or_else(unclassified)?;
                let align = unit.align_of(ty).unwrap_or(size);
                Ok(CType::primitive(unit.type_spelling(ty), size, align))
            }
            TypeKind::Pointer => {
                let pointee = unit.pointee_type(ty).ok_or_else(unclassified)?;
                let bare = self.strip_sugar(pointee);
                match unit.type_kind(bare) {
                    TypeKind::FunctionProto => return self.function_pointer(bare, None),
                    TypeKind::Typedef if unit.type_kind(unit.canonical_type(bare)) == TypeKind::FunctionProto => {
                        return self.resolve(bare)
                    }
                    _ => {}
                }
                let inner = self.resolve(pointee)?;
                Ok(CType::pointer(inner, pointer_size))
            }
            TypeKind::ConstantArray | TypeKind::IncompleteArray => {
                let element = unit.element_type(ty).ok_or_else(unclassified)?;
                let element = self.resolve(element)?;
                Ok(CType::array(element, unit.array_length(ty)))
            }
            TypeKind::Record => {
                let decl = unit.type_declaration(ty).ok_or_else(unclassified)?;
                self.record_reference(decl)
            }
            TypeKind::Enum => {
                let decl = unit.type_declaration(ty).ok_or_else(unclassified)?;
                self.enum_reference(decl)
            }
            TypeKind::Typedef => {
                let decl = unit.type_declaration(ty).ok_or_else(unclassified)?;
                self.typedef_reference(decl, ty)
            }
            TypeKind::FunctionProto => self.function_pointer(ty, None),
            TypeKind::Unexposed => Err(unclassified()),
        }
    }

    fn declared_name(&self, decl: Cursor) -> String {
        match self.assigned_names.get(&decl) {
            Some(name) => name.clone(),
            None => self.unit.cursor_name(decl).to_string(),
        }
    }

    fn opaque(&mut self, name: String, location: CLocation, size: Option<u64>, align: Option<u64>) -> CType {
        if self.register(CKind::OpaqueType, &name) {
            self.check_blocked(&name, &location);
            self.tree.insert(CNode::OpaqueType(COpaqueType {
                name: name.clone(),
                location: location.clone(),
                size_of: size.unwrap_or(0),
            }));
        }
        self.remember(CType::named(name, CKind::OpaqueType, size, align, location))
    }

    fn record_reference(&mut self, decl: Cursor) -> std::result::Result<CType, Invalid> {
        let unit = self.unit;
        let name = self.declared_name(decl);
        if name.is_empty() {
            return Err(Invalid::Unclassified("anonymous record".to_string()));
        }
        let ty = unit.cursor_type(decl);
        let size = ty.and_then(|t| unit.size_of(t));
        let align = ty.and_then(|t| unit.align_of(t));
        let location = unit.cursor_location(decl);
        if self.nested.contains(&decl) {
            return Ok(CType::named(name, CKind::Record, size, align, location).with_anonymous(true));
        }
        if self.options.is_opaque(&name) || !unit.cursor_is_definition(decl) {
            return Ok(self.opaque(name, location, size, align));
        }
        if self.register(CKind::Record, &name) {
            self.frontier.push_back(Work::Record {
                decl,
                name: name.clone(),
            });
        }
        let anonymous = unit.cursor_is_anonymous(decl);
        Ok(self.remember(CType::named(name, CKind::Record, size, align, location).with_anonymous(anonymous)))
    }

    fn enum_reference(&mut self, decl: Cursor) -> std::result::Result<CType, Invalid> {
        let unit = self.unit;
        let name = self.declared_name(decl);
        if name.is_empty() {
            // Nothing names it; its constants' integer type stands in.
            return match unit.enum_integer_type(decl) {
                Some(integer) => self.resolve(integer),
                None => Ok(CType::primitive("int", 4, 4)),
            };
        }
        let ty = unit.cursor_type(decl);
        let size = ty.and_then(|t| unit.size_of(t));
        let align = ty.and_then(|t| unit.align_of(t));
        let location = unit.cursor_location(decl);
        if self.options.is_opaque(&name) {
            return Ok(self.opaque(name, location, size, align));
        }
        if self.register(CKind::Enum, &name) {
            self.frontier.push_back(Work::Enum {
                decl,
                name: name.clone(),
            });
        }
        Ok(self.remember(CType::named(name, CKind::Enum, size, align, location)))
    }

    fn typedef_reference(&mut self, decl: Cursor, ty: TypeHandle) -> std::result::Result<CType, Invalid> {
        let unit = self.unit;
        let name = unit.cursor_name(decl).to_string();
        let location = unit.cursor_location(decl);
        let size = unit.size_of(ty);
        let align = unit.align_of(ty);

        if is_well_known(&name) {
            let size = size.unwrap_or(self.layout.pointer_size);
            return Ok(CType::primitive(name, size, align.unwrap_or(size)).with_system(true));
        }
        if self.options.is_opaque(&name) {
            return Ok(self.opaque(name, location, size, align));
        }

        let underlying = unit
            .typedef_underlying(decl)
            .ok_or_else(|| Invalid::Unclassified(name.clone()))?;
        let bare = self.strip_sugar(underlying);
        match unit.type_kind(bare) {
            TypeKind::Pointer => {
                if let Some(pointee) = unit.pointee_type(bare).map(|p| self.strip_sugar(p)) {
                    if unit.type_kind(pointee) == TypeKind::FunctionProto {
                        return self.function_pointer(pointee, Some((name, location)));
                    }
                }
            }
            TypeKind::FunctionProto => return self.function_pointer(bare, Some((name, location))),
            kind @ (TypeKind::Record | TypeKind::Enum) => {
                if let Some(target) = unit.type_declaration(bare) {
                    if unit.cursor_is_anonymous(target) && !self.assigned_names.contains_key(&target) {
                        self.assigned_names.insert(target, name.clone());
                    }
                    let is_record = kind == TypeKind::Record;
                    if is_record && !unit.cursor_is_definition(target) {
                        return Ok(self.opaque(name, location, size, align));
                    }
                    if self.declared_name(target) == name {
                        return if is_record {
                            self.record_reference(target)
                        } else {
                            self.enum_reference(target)
                        };
                    }
                }
            }
            _ => {}
        }

        if self.register(CKind::Typedef, &name) {
            self.frontier.push_back(Work::Typedef {
                decl,
                name: name.clone(),
            });
        }
        let is_system = unit.cursor_is_system(decl);
        Ok(self.remember(CType::named(name, CKind::Typedef, size, align, location).with_system(is_system)))
    }

    fn function_pointer(
        &mut self,
        proto: TypeHandle,
        owner: Option<(String, CLocation)>,
    ) -> std::result::Result<CType, Invalid> {
        let (return_type, parameters) = self.signature(proto, None)?;
        let is_variadic = self.unit.is_variadic(proto);
        let (name, location) = match owner {
            Some(owner) => owner,
            None => {
                let types: Vec<CType> = parameters.iter().map(|p| p.ty.clone()).collect();
                (function_pointer_name(&types, is_variadic, &return_type), self.context.clone())
            }
        };
        let pointer_size = self.layout.pointer_size;
        if self.register(CKind::FunctionPointer, &name) {
            self.check_blocked(&name, &location);
            self.tree.insert(CNode::FunctionPointer(CFunctionPointer {
                name: name.clone(),
                location: location.clone(),
                calling_convention: self.unit.calling_convention(proto),
                return_type,
                parameters,
                is_variadic,
                size_of: pointer_size,
            }));
        }
        Ok(self.remember(CType::named(
            name,
            CKind::FunctionPointer,
            Some(pointer_size),
            Some(pointer_size),
            location,
        )))
    }

    fn finish(mut self) -> Exploration {
        if !self.demoted.is_empty() {
            let nodes = std::mem::take(&mut self.tree.nodes);
            for mut node in nodes.nodes() {
                for ty in node.type_references_mut() {
                    retarget(ty, &self.demoted);
                }
                self.tree.nodes.insert(node);
            }
            for ty in self.tree.types.values_mut() {
                retarget(ty, &self.demoted);
            }
        }
        log::info!(
            "{}: explored {} declarations from {} ({} diagnostics)",
            self.platform,
            self.tree.nodes.len(),
            self.tree.file_path,
            self.diagnostics.len()
        );
        Exploration {
            tree: self.tree,
            diagnostics: self.diagnostics,
        }
    }
}

/// Point references at records that were demoted to their opaque type.
fn retarget(ty: &mut CType, demoted: &HashSet<String>) {
    if ty.kind == CKind::Record && demoted.contains(&ty.name) {
        ty.kind = CKind::OpaqueType;
    }
    if let Some(inner) = ty.inner.as_deref_mut() {
        retarget(inner, demoted);
    }
}

#[cfg(test)]
mod tests {
    use cinterop_ast::Severity;
    use cinterop_reader::{read_source, ReadOptions, UnitGraphBuilder};

    use super::*;

    fn explore_source(platform: TargetPlatform, source: &str, options: &ExploreOptions) -> Exploration {
        let unit = read_source(source, "api.h", &ReadOptions::new(platform)).unwrap();
        explore(&unit, options).unwrap()
    }

    fn linux(source: &str) -> Exploration {
        explore_source(TargetPlatform::linux_x64(), source, &ExploreOptions::default())
    }

    fn record<'t>(tree: &'t CAbstractSyntaxTree, name: &str) -> &'t CRecord {
        tree.nodes.records.get(name).unwrap()
    }

    #[test]
    fn exploring_twice_is_idempotent() {
        let source = "struct P { int x; double y; };\ntypedef struct P P;\nP* make(int n);\n";
        let first = linux(source);
        let second = linux(source);
        assert!(first.tree.structurally_equals(&second.tree));
        assert_eq!(first.tree, second.tree);
    }

    #[test]
    fn self_referential_struct_is_expanded_once() {
        let result = linux("struct Node { int value; struct Node* next; };\nvoid push(struct Node* node);\n");
        let tree = &result.tree;
        assert_eq!(tree.nodes.records.len(), 1);
        let node = record(tree, "Node");
        assert_eq!(node.fields[1].ty.name, "Node*");
        assert_eq!(node.fields[1].ty.inner.as_ref().unwrap().kind, CKind::Record);
        let push = tree.nodes.functions.get("push").unwrap();
        assert_eq!(push.parameters[0].name, "node");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn tagged_anonymous_union_is_one_field() {
        let result = linux("struct S { int tag; union { int i; float f; } value; };\nvoid use_s(struct S s);\n");
        let s = record(&result.tree, "S");
        let names: Vec<&str> = s.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["tag", "value"]);
        assert_eq!(s.fields[1].ty.name, "S_anonymous_field0");
        assert_eq!(s.nested_records.len(), 1);
        assert!(s.nested_records[0].is_union);
        assert_eq!(s.nested_records[0].fields.len(), 2);
        assert!(!result.tree.nodes.records.contains_key("S_anonymous_field0"));
    }

    #[test]
    fn unnamed_anonymous_member_gets_a_field_name() {
        let result = linux("struct V { int tag; union { int i; float f; }; };\nvoid use_v(struct V* v);\n");
        let v = record(&result.tree, "V");
        assert_eq!(v.fields[1].name, "anonymous_field0");
        assert_eq!(v.fields[1].ty.name, "V_anonymous_field0");
        assert_eq!(v.fields[1].offset_of, 4);
    }

    fn explicit_record(offsets_bits: &[u64], size: u64) -> UnitGraphBuilder {
        let mut b = UnitGraphBuilder::new(TargetPlatform::linux_x64(), "layout.h");
        let location = CLocation::source("layout.h", 1, 8);
        let decl = b.record(Some("Explicit"), false, location.clone());
        let int = b.primitive("int");
        let mut fields = Vec::new();
        for (index, _) in offsets_bits.iter().enumerate() {
            fields.push(b.add_field(decl, &format!("f{index}"), int, None, location.clone()));
        }
        b.set_record_layout(decl, size, 8);
        for (field, offset) in fields.into_iter().zip(offsets_bits) {
            b.set_field_offset(field, *offset);
        }
        let ty = b.declared_type(decl).unwrap();
        let elaborated = b.elaborated(ty, "struct");
        let pointer = b.pointer(elaborated);
        let void = b.void();
        let proto = b.function_proto(void, vec![pointer], false, Default::default());
        let f = b.function("take", proto, &["value".into()], Linkage::External, location);
        b.push_top_level(f);
        b
    }

    #[test]
    fn padding_is_derived_from_offsets() {
        let unit = explicit_record(&[0, 32, 96], 16).finish();
        let result = explore(&unit, &ExploreOptions::default()).unwrap();
        let paddings: Vec<u64> = record(&result.tree, "Explicit").fields.iter().map(|f| f.padding_of).collect();
        assert_eq!(paddings, vec![0, 4, 0]);
    }

    #[test]
    fn negative_padding_is_reported_and_record_made_opaque() {
        let unit = explicit_record(&[0, 16], 8).finish();
        let result = explore(&unit, &ExploreOptions::default()).unwrap();
        assert!(result.tree.nodes.records.is_empty());
        assert_eq!(result.tree.nodes.opaque_types.get("Explicit").unwrap().size_of, 8);
        let errors: Vec<_> = result.diagnostics.of_kind(DiagnosticKind::NegativePadding).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, Severity::Error);
        let take = result.tree.nodes.functions.get("take").unwrap();
        assert_eq!(take.parameters[0].ty.inner.as_ref().unwrap().kind, CKind::OpaqueType);
    }

    #[test]
    fn function_pointers_are_named_and_deduplicated() {
        let source = "typedef void (*log_fn)(const char* message);\n\
                      struct Hooks { void (*on_open)(int fd); void (*on_close)(int fd); log_fn log; };\n\
                      void install(struct Hooks* hooks, void (*fallback)(int));\n";
        let result = linux(source);
        let pointers = &result.tree.nodes.function_pointers;
        assert!(pointers.contains_key("log_fn"));
        assert!(pointers.contains_key("FnPtr_Int_Void"));
        assert_eq!(pointers.len(), 2);
        let hooks = record(&result.tree, "Hooks");
        assert_eq!(hooks.fields[0].ty.kind, CKind::FunctionPointer);
        assert_eq!(hooks.fields[2].ty.name, "log_fn");
        assert!(result.tree.nodes.typedefs.is_empty());
    }

    #[test]
    fn incomplete_and_overridden_records_are_opaque() {
        let source = "typedef struct Session Session;\nstruct Config { int level; };\n\
                      Session* session_open(struct Config* config);\n";
        let options = ExploreOptions {
            opaque_types: ["Config".to_string()].into_iter().collect(),
            ..ExploreOptions::default()
        };
        let result = explore_source(TargetPlatform::linux_x64(), source, &options);
        let opaque = &result.tree.nodes.opaque_types;
        assert_eq!(opaque.get("Session").unwrap().size_of, 0);
        assert_eq!(opaque.get("Config").unwrap().size_of, 4);
        assert!(result.tree.nodes.records.is_empty());
        assert!(result.tree.nodes.typedefs.is_empty());
    }

    #[test]
    fn anonymous_typedef_records_take_the_typedef_name() {
        let result = linux("typedef struct { float x, y; } Vec2;\nVec2 vec2_add(Vec2 a, Vec2 b);\n");
        let vec2 = record(&result.tree, "Vec2");
        assert_eq!(vec2.size_of, 8);
        assert!(result.tree.nodes.typedefs.is_empty());
        let add = result.tree.nodes.functions.get("vec2_add").unwrap();
        assert_eq!(add.return_type.name, "Vec2");
    }

    #[test]
    fn well_known_types_resolve_to_primitives() {
        let result = linux("uint32_t checksum(const uint8_t* data, size_t length);\n");
        let f = result.tree.nodes.functions.get("checksum").unwrap();
        assert_eq!(f.return_type.kind, CKind::Primitive);
        assert_eq!(f.return_type.name, "uint32_t");
        assert_eq!(f.return_type.size_of, Some(4));
        assert!(f.return_type.is_system);
        assert_eq!(f.parameters[1].ty.size_of, Some(8));
        assert!(result.tree.nodes.typedefs.is_empty());
    }

    #[test]
    fn system_typedefs_are_kept_as_typedef_nodes() {
        let result = explore_source(
            TargetPlatform::windows_x64(),
            "DWORD get_flags(HANDLE handle);\n",
            &ExploreOptions::default(),
        );
        let dword = result.tree.nodes.typedefs.get("DWORD").unwrap();
        assert_eq!(dword.location, CLocation::System);
        assert_eq!(dword.underlying.name, "unsigned long");
        assert_eq!(dword.underlying.size_of, Some(4));
        let f = result.tree.nodes.functions.get("get_flags").unwrap();
        assert!(f.return_type.is_system);
        assert_eq!(f.parameters[0].ty.size_of, Some(8));
    }

    #[test]
    fn blocked_headers_warn_but_resolve() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("internal.h"), "struct Internal { int x; };\n").unwrap();
        std::fs::write(dir.path().join("api.h"), "#include \"internal.h\"\nvoid run(struct Internal* i);\n").unwrap();
        let read_options = ReadOptions::new(TargetPlatform::linux_x64());
        let unit = cinterop_reader::read_header(&dir.path().join("api.h"), &read_options).unwrap();
        let options = ExploreOptions {
            blocked_headers: vec!["internal.h".into()],
            ..ExploreOptions::default()
        };
        let result = explore(&unit, &options).unwrap();
        assert!(result.tree.nodes.records.contains_key("Internal"));
        assert_eq!(result.diagnostics.of_kind(DiagnosticKind::BlockedHeader).count(), 1);
    }

    #[test]
    fn whitelist_limits_entry_points_and_reports_missing() {
        let options = ExploreOptions {
            entry_points: EntryPoints::whitelist(["first", "missing"]),
            ..ExploreOptions::default()
        };
        let result = explore_source(TargetPlatform::linux_x64(), "void first(void);\nvoid second(void);\n", &options);
        assert!(result.tree.nodes.functions.contains_key("first"));
        assert!(!result.tree.nodes.functions.contains_key("second"));
        let missing: Vec<_> = result.diagnostics.of_kind(DiagnosticKind::MissingEntryPoint).collect();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("missing"));
    }

    #[test]
    fn static_functions_are_not_entry_points() {
        let result = linux("static int helper(int x) { return x; }\nint api(int x);\n");
        assert!(!result.tree.nodes.functions.contains_key("helper"));
        assert!(result.tree.nodes.functions.contains_key("api"));
    }

    #[test]
    fn macros_follow_naming_rules() {
        let result = linux("#define VERSION 3\n#define _HIDDEN 1\n#define FLAG\n#define NAME \"lib\"\n#define TWICE(x) ((x) * 2)\n");
        let macros = &result.tree.nodes.macro_objects;
        let names: Vec<&String> = macros.keys().collect();
        assert_eq!(names, vec!["NAME", "VERSION"]);
        assert_eq!(macros.get("VERSION").unwrap().ty.name, "int");
        assert_eq!(macros.get("NAME").unwrap().ty.name, "char*");
    }

    #[test]
    fn dangling_enums_follow_the_toggle() {
        let source = "enum Mode { MODE_A, MODE_B };\nvoid run(void);\n";
        assert!(linux(source).tree.nodes.enums.contains_key("Mode"));
        let options = ExploreOptions {
            enums: false,
            ..ExploreOptions::default()
        };
        let result = explore_source(TargetPlatform::linux_x64(), source, &options);
        assert!(result.tree.nodes.enums.is_empty());
    }

    #[test]
    fn variables_are_explored() {
        let result = linux("extern const int api_version;\nstatic int hidden;\n");
        let var = result.tree.nodes.variables.get("api_version").unwrap();
        assert_eq!(var.ty.name, "int");
        assert!(!result.tree.nodes.variables.contains_key("hidden"));
    }

    #[test]
    fn anonymous_enum_fields_are_named_after_the_record() {
        let result = linux("struct S { int tag; enum { MODE_A, MODE_B } mode; };\nvoid use_s(struct S* s);\n");
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let s = record(&result.tree, "S");
        assert_eq!(s.fields[1].name, "mode");
        assert_eq!(s.fields[1].ty.name, "S_anonymous_field0");
        assert_eq!(s.fields[1].ty.kind, CKind::Enum);
        assert_eq!(s.fields[1].offset_of, 4);
        let mode = result.tree.nodes.enums.get("S_anonymous_field0").unwrap();
        let names: Vec<&str> = mode.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["MODE_A", "MODE_B"]);
        assert!(result.tree.nodes.opaque_types.is_empty());
    }

    #[test]
    fn file_scope_anonymous_enums_are_named_or_promoted() {
        let source = "enum { FLAG_A = 1, FLAG_B = 2 };\nenum { noErr = 0 };\nenum { normal = 0, bold = 1 };\n\
                      typedef enum { LEVEL_LOW, LEVEL_HIGH } Level;\nvoid run(void);\n";
        let result = linux(source);
        let enums = &result.tree.nodes.enums;
        let flags = enums.get("FLAG").unwrap();
        let values: Vec<(&str, i64)> = flags.values.iter().map(|v| (v.name.as_str(), v.value)).collect();
        assert_eq!(values, vec![("FLAG_A", 1), ("FLAG_B", 2)]);
        assert!(enums.contains_key("Level"));
        assert!(!enums.contains_key("LEVEL"));
        assert_eq!(enums.len(), 2);

        let macros = &result.tree.nodes.macro_objects;
        let names: Vec<&String> = macros.keys().collect();
        assert_eq!(names, vec!["bold", "noErr", "normal"]);
        assert_eq!(macros.get("bold").unwrap().value(), "1");
        assert_eq!(macros.get("noErr").unwrap().ty.name, "int");
    }

    #[test]
    fn variadic_function_pointers_are_distinct() {
        let result = linux("void reg(void (*a)(int), void (*b)(int, ...));\n");
        let reg = result.tree.nodes.functions.get("reg").unwrap();
        let names: Vec<&str> = reg.parameters.iter().map(|p| p.ty.name.as_str()).collect();
        assert_eq!(names, vec!["FnPtr_Int_Void", "FnPtr_Int_Varargs_Void"]);
        let pointers = &result.tree.nodes.function_pointers;
        assert!(!pointers.get("FnPtr_Int_Void").unwrap().is_variadic);
        assert!(pointers.get("FnPtr_Int_Varargs_Void").unwrap().is_variadic);
    }

    #[test]
    fn reader_diagnostics_reach_the_exploration() {
        let result = linux("struct B { unsigned a : WIDTH; unsigned b : 4; };\nvoid use_b(struct B* b);\n");
        let unevaluated: Vec<_> = result.diagnostics.of_kind(DiagnosticKind::UnevaluatedConstant).collect();
        assert_eq!(unevaluated.len(), 1);
        assert_eq!(unevaluated[0].severity, Severity::Error);
        assert_eq!(unevaluated[0].platform, Some(TargetPlatform::linux_x64()));
        assert!(result.diagnostics.has_errors());
    }

    #[test]
    fn fatal_parse_errors_abort() {
        let mut b = UnitGraphBuilder::new(TargetPlatform::linux_x64(), "broken.h");
        b.add_fatal_error("broken.h:1:1: syntax error");
        let err = explore(&b.finish(), &ExploreOptions::default()).unwrap_err();
        assert!(matches!(err, ExploreError::FatalParse { .. }));
    }
}
