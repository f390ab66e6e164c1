//! Lowering of tree-sitter C syntax trees into a [`UnitGraph`].
//!
//! Declarators are applied outside-in: each pointer, array or function
//! declarator wraps the type built so far, and the identifier at the bottom
//! names the result.

use std::collections::HashMap;

use cinterop_ast::{CLocation, CallingConvention, Diagnostic, DiagnosticKind, Severity};
use cinterop_targets::TargetPlatform;
use tree_sitter::{Node, Parser};

use crate::error::{ReadError, Result};
use crate::eval::{evaluate, tokenize, Symbol};
use crate::graph::{UnitGraph, UnitGraphBuilder};
use crate::preprocess::{MacroDefinition, SourceFile};
use crate::unit::{Cursor, Linkage, TypeHandle, TypeKind};

/// Parse every preprocessed file and build the unit for `file_path`.
pub fn lower(files: &[SourceFile], platform: TargetPlatform, file_path: &str) -> Result<UnitGraph> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c::language())
        .map_err(|e| ReadError::Language(e.to_string()))?;

    let mut lowerer = Lowerer {
        builder: UnitGraphBuilder::new(platform, file_path),
        macros: HashMap::new(),
    };
    for file in files {
        for definition in &file.macros {
            lowerer.macros.insert(definition.name.clone(), definition.clone());
        }
        let tree = parser.parse(&file.text, None).ok_or_else(|| ReadError::Syntax {
            file: file.path.clone(),
            line: 1,
            column: 1,
            detail: "parser produced no tree".to_string(),
        })?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(syntax_error(root, file));
        }
        let source = Source {
            path: &file.path,
            text: &file.text,
        };
        lowerer.lower_macros(&file.path, &file.macros);
        for item in named_children(root) {
            lowerer.top_level_item(&source, item)?;
        }
    }
    Ok(lowerer.builder.finish())
}

fn syntax_error(root: Node<'_>, file: &SourceFile) -> ReadError {
    let mut stack = vec![root];
    let mut culprit = root;
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            culprit = node;
            break;
        }
        if node.has_error() {
            let mut below = children(node);
            below.reverse();
            stack.extend(below);
        }
    }
    let position = culprit.start_position();
    let detail = if culprit.is_missing() {
        format!("missing '{}'", culprit.kind())
    } else {
        let snippet: String = culprit
            .utf8_text(file.text.as_bytes())
            .unwrap_or_default()
            .chars()
            .take(40)
            .collect();
        format!("unexpected '{}'", snippet.trim())
    };
    ReadError::Syntax {
        file: file.path.clone(),
        line: position.row as u32 + 1,
        column: position.column as u32 + 1,
        detail,
    }
}

struct Source<'a> {
    path: &'a str,
    text: &'a str,
}

impl Source<'_> {
    fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.text.as_bytes()).unwrap_or_default()
    }

    fn location(&self, node: Node<'_>) -> CLocation {
        let position = node.start_position();
        CLocation::source(self.path, position.row as u32 + 1, position.column as u32 + 1)
    }
}

fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let nodes = node.children(&mut cursor).collect();
    nodes
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let nodes = node.named_children(&mut cursor).collect();
    nodes
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let nodes = node.children_by_field_name(field, &mut cursor).collect();
    nodes
}

fn is_name(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "identifier" | "field_identifier" | "type_identifier" | "primitive_type"
    )
}

/// `__stdcall` and friends written directly inside `node`.
fn call_modifier(node: Node<'_>, source: &Source<'_>) -> Option<CallingConvention> {
    children(node)
        .into_iter()
        .filter(|c| c.kind() == "ms_call_modifier")
        .find_map(|c| CallingConvention::from_modifier(source.text(c).trim()))
}

/// The declarator wrapped by `node`, whether held in a field or as the only
/// named child.
fn inner_declarator(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("declarator").or_else(|| {
        named_children(node)
            .into_iter()
            .find(|c| !matches!(c.kind(), "ms_call_modifier" | "attribute_declaration" | "attribute_specifier"))
    })
}

#[derive(Debug, Default)]
struct Specifiers {
    is_static: bool,
    is_const: bool,
    calling_convention: Option<CallingConvention>,
}

fn specifiers(node: Node<'_>, source: &Source<'_>) -> Specifiers {
    let mut specifiers = Specifiers {
        calling_convention: call_modifier(node, source),
        ..Specifiers::default()
    };
    for child in children(node) {
        match (child.kind(), source.text(child)) {
            ("storage_class_specifier", "static") => specifiers.is_static = true,
            ("type_qualifier", "const") => specifiers.is_const = true,
            _ => {}
        }
    }
    specifiers
}

struct Declared<'t> {
    name: Option<Node<'t>>,
    ty: TypeHandle,
    parameter_names: Vec<String>,
}

struct Parameters {
    types: Vec<TypeHandle>,
    names: Vec<String>,
    variadic: bool,
}

struct Lowerer {
    builder: UnitGraphBuilder,
    macros: HashMap<String, MacroDefinition>,
}

impl Lowerer {
    fn lower_macros(&mut self, path: &str, macros: &[MacroDefinition]) {
        for definition in macros {
            let cursor = self.builder.macro_definition(
                &definition.name,
                definition.tokens.clone(),
                definition.is_function_like(),
                CLocation::source(path, definition.line, definition.column),
            );
            self.builder.push_top_level(cursor);
        }
    }

    fn top_level_item(&mut self, source: &Source<'_>, item: Node<'_>) -> Result<()> {
        match item.kind() {
            "declaration" | "function_definition" => self.declaration(source, item),
            "type_definition" => self.type_definition(source, item),
            "linkage_specification" => {
                if let Some(body) = item.child_by_field_name("body") {
                    if body.kind() == "declaration_list" {
                        for child in named_children(body) {
                            self.top_level_item(source, child)?;
                        }
                    } else {
                        self.top_level_item(source, body)?;
                    }
                }
                Ok(())
            }
            "struct_specifier" | "union_specifier" | "enum_specifier" => {
                // A specifier followed by `;` with no declarators.
                let (ty, defined) = self.type_specifier(source, item)?;
                if let Some(cursor) = defined.or(self.builder.type_data(ty).declaration) {
                    self.builder.push_top_level(cursor);
                }
                Ok(())
            }
            "comment" | ";" => Ok(()),
            other => {
                log::debug!("{}: skipping top-level {other}", source.location(item));
                Ok(())
            }
        }
    }

    fn base_type(&mut self, source: &Source<'_>, node: Node<'_>, specifiers: &Specifiers) -> Result<(TypeHandle, Option<Cursor>)> {
        let Some(type_node) = node.child_by_field_name("type") else {
            return Ok((self.builder.primitive("int"), None));
        };
        let (mut ty, defined) = self.type_specifier(source, type_node)?;
        if specifiers.is_const {
            ty = self.builder.qualified(ty, "const");
        }
        Ok((ty, defined))
    }

    fn declaration(&mut self, source: &Source<'_>, node: Node<'_>) -> Result<()> {
        let specifiers = specifiers(node, source);
        let (base, defined) = self.base_type(source, node, &specifiers)?;
        if let Some(cursor) = defined {
            self.builder.push_top_level(cursor);
        }
        let declarators = field_children(node, "declarator");
        if declarators.is_empty() && defined.is_none() {
            // `struct Foo;`
            if let Some(cursor) = self.builder.type_data(base).declaration {
                self.builder.push_top_level(cursor);
            }
        }
        let linkage = if specifiers.is_static { Linkage::Internal } else { Linkage::External };
        let convention = specifiers.calling_convention.unwrap_or_default();
        for declarator in declarators {
            let declared = self.declare(source, base, Some(declarator), convention)?;
            let Some(name_node) = declared.name else {
                continue;
            };
            let name = source.text(name_node);
            let location = source.location(name_node);
            let cursor = if self.builder.type_data(declared.ty).kind == TypeKind::FunctionProto {
                self.builder
                    .function(name, declared.ty, &declared.parameter_names, linkage, location)
            } else {
                self.builder.variable(name, declared.ty, linkage, location)
            };
            self.builder.push_top_level(cursor);
        }
        Ok(())
    }

    fn type_definition(&mut self, source: &Source<'_>, node: Node<'_>) -> Result<()> {
        let specifiers = specifiers(node, source);
        let (base, defined) = self.base_type(source, node, &specifiers)?;
        if let Some(cursor) = defined {
            self.builder.push_top_level(cursor);
        }
        let convention = specifiers.calling_convention.unwrap_or_default();
        for declarator in field_children(node, "declarator") {
            let declared = self.declare(source, base, Some(declarator), convention)?;
            let Some(name_node) = declared.name else {
                continue;
            };
            let cursor = self
                .builder
                .typedef(source.text(name_node), declared.ty, source.location(name_node));
            self.builder.push_top_level(cursor);
        }
        Ok(())
    }

    /// The type named by a type specifier node, plus the record or enum
    /// cursor when the specifier carries a body.
    fn type_specifier(&mut self, source: &Source<'_>, node: Node<'_>) -> Result<(TypeHandle, Option<Cursor>)> {
        let ty = match node.kind() {
            "primitive_type" => self.primitive_type(source.text(node)),
            "sized_type_specifier" => {
                let spelling = sized_spelling(source, node);
                self.builder.primitive(&spelling)
            }
            "type_identifier" => {
                let name = source.text(node);
                match self.builder.lookup_typedef(name) {
                    Some(ty) => ty,
                    None if name == "_Bool" => self.builder.primitive("_Bool"),
                    None => self.builder.system_typedef(name),
                }
            }
            "struct_specifier" => return self.record_specifier(source, node, false),
            "union_specifier" => return self.record_specifier(source, node, true),
            "enum_specifier" => return self.enum_specifier(source, node),
            other => {
                log::debug!("{}: unmodelled type specifier {other}", source.location(node));
                self.builder.unexposed(source.text(node))
            }
        };
        Ok((ty, None))
    }

    fn primitive_type(&mut self, spelling: &str) -> TypeHandle {
        match spelling {
            "void" => self.builder.void(),
            "bool" | "_Bool" => self.builder.primitive("_Bool"),
            "char" | "int" | "float" | "double" | "short" | "long" => self.builder.primitive(spelling),
            other => self.builder.system_typedef(other),
        }
    }

    fn record_specifier(
        &mut self,
        source: &Source<'_>,
        node: Node<'_>,
        is_union: bool,
    ) -> Result<(TypeHandle, Option<Cursor>)> {
        let name_node = node.child_by_field_name("name");
        let tag = name_node.map(|n| source.text(n));
        let location = source.location(name_node.unwrap_or(node));
        let record = self.builder.record(tag, is_union, location.clone());
        let record_ty = self.record_type(record);

        let mut defined = None;
        if let Some(body) = node.child_by_field_name("body") {
            if self.builder.begin_definition(record, location) {
                for member in named_children(body) {
                    if member.kind() == "field_declaration" {
                        self.field_declaration(source, record, member)?;
                    }
                }
            } else {
                log::warn!("{}: redefinition of {}", source.location(node), tag.unwrap_or("<anonymous>"));
            }
            defined = Some(record);
        }

        let ty = match tag {
            Some(_) => {
                let keyword = if is_union { "union" } else { "struct" };
                self.builder.elaborated(record_ty, keyword)
            }
            None => record_ty,
        };
        Ok((ty, defined))
    }

    fn record_type(&mut self, decl: Cursor) -> TypeHandle {
        match self.builder.cursor_data(decl).ty {
            Some(ty) => ty,
            None => self.builder.unexposed(""),
        }
    }

    fn field_declaration(&mut self, source: &Source<'_>, record: Cursor, node: Node<'_>) -> Result<()> {
        let specifiers = specifiers(node, source);
        let (base, nested) = self.base_type(source, node, &specifiers)?;
        if let Some(nested) = nested {
            self.builder.nest(record, nested);
        }
        let declarators = field_children(node, "declarator");
        let bit_width = children(node)
            .into_iter()
            .find(|c| c.kind() == "bitfield_clause")
            .and_then(|clause| named_children(clause).into_iter().next())
            .and_then(|expression| {
                self.constant_or_report(source, expression, "bitfield width", "the field takes its full width")
            })
            .and_then(|width| u32::try_from(width).ok());

        if declarators.is_empty() {
            // C11 anonymous struct or union member.
            if let Some(nested) = nested.filter(|n| self.builder.cursor_data(*n).name.is_empty()) {
                let location = self.builder.cursor_data(nested).location.clone();
                self.builder.add_field(record, "", base, None, location);
            }
            return Ok(());
        }
        let convention = specifiers.calling_convention.unwrap_or_default();
        for declarator in declarators {
            let declared = self.declare(source, base, Some(declarator), convention)?;
            let (name, location) = match declared.name {
                Some(n) => (source.text(n), source.location(n)),
                None => ("", source.location(declarator)),
            };
            self.builder.add_field(record, name, declared.ty, bit_width, location);
        }
        Ok(())
    }

    fn enum_specifier(&mut self, source: &Source<'_>, node: Node<'_>) -> Result<(TypeHandle, Option<Cursor>)> {
        let name_node = node.child_by_field_name("name");
        let tag = name_node.map(|n| source.text(n));
        let location = source.location(name_node.unwrap_or(node));
        let decl = self.builder.enumeration(tag, location.clone());
        let enum_ty = self.record_type(decl);

        let mut defined = None;
        if let Some(body) = node.child_by_field_name("body") {
            if self.builder.begin_definition(decl, location) {
                let mut values = Vec::new();
                let mut next: i64 = 0;
                for enumerator in named_children(body) {
                    if enumerator.kind() != "enumerator" {
                        continue;
                    }
                    let Some(name_node) = enumerator.child_by_field_name("name") else {
                        continue;
                    };
                    let fallback = format!("the constant takes the value {next}");
                    let value = enumerator
                        .child_by_field_name("value")
                        .and_then(|v| self.constant_or_report(source, v, "enumerator value", &fallback))
                        .unwrap_or(next);
                    self.builder
                        .add_enum_constant(decl, source.text(name_node), value, source.location(name_node));
                    values.push(value);
                    next = value.wrapping_add(1);
                }
                let integer_type = match node.child_by_field_name("underlying_type") {
                    Some(underlying) => self.type_specifier(source, underlying)?.0,
                    None => self.builder.primitive(enum_integer_spelling(&values)),
                };
                self.builder.set_enum_integer_type(decl, integer_type);
            }
            defined = Some(decl);
        }

        let ty = match tag {
            Some(_) => self.builder.elaborated(enum_ty, "enum"),
            None => enum_ty,
        };
        Ok((ty, defined))
    }

    fn declare<'t>(
        &mut self,
        source: &Source<'_>,
        base: TypeHandle,
        declarator: Option<Node<'t>>,
        convention: CallingConvention,
    ) -> Result<Declared<'t>> {
        let mut ty = base;
        let mut parameter_names = Vec::new();
        let mut current = declarator;
        while let Some(node) = current {
            // Type and field declarators are aliases of the plain ones.
            let kind = node
                .kind()
                .trim_start_matches("abstract_")
                .replace("_type_declarator", "_declarator")
                .replace("_field_declarator", "_declarator");
            match kind.as_str() {
                "pointer_declarator" => ty = self.builder.pointer(ty),
                "array_declarator" => {
                    let length = node
                        .child_by_field_name("size")
                        .and_then(|size| self.constant_or_report(source, size, "array length", "the array is unsized"))
                        .and_then(|n| u64::try_from(n).ok());
                    ty = self.builder.array(ty, length);
                }
                "function_declarator" => {
                    let inner = inner_declarator(node);
                    let own_convention = inner
                        .filter(|n| n.kind().ends_with("parenthesized_declarator"))
                        .and_then(|n| call_modifier(n, source))
                        .or_else(|| call_modifier(node, source))
                        .unwrap_or(convention);
                    let parameters = self.parameters(source, node.child_by_field_name("parameters"))?;
                    if inner.is_some_and(is_name) {
                        parameter_names = parameters.names;
                    }
                    ty = self
                        .builder
                        .function_proto(ty, parameters.types, parameters.variadic, own_convention);
                }
                "parenthesized_declarator" | "attributed_declarator" | "init_declarator" => {}
                _ if is_name(node) => {
                    return Ok(Declared {
                        name: Some(node),
                        ty,
                        parameter_names,
                    })
                }
                other => {
                    log::debug!("{}: unmodelled declarator {other}", source.location(node));
                    break;
                }
            }
            current = inner_declarator(node);
        }
        Ok(Declared {
            name: None,
            ty,
            parameter_names,
        })
    }

    fn parameters(&mut self, source: &Source<'_>, list: Option<Node<'_>>) -> Result<Parameters> {
        let mut parameters = Parameters {
            types: Vec::new(),
            names: Vec::new(),
            variadic: false,
        };
        let Some(list) = list else {
            return Ok(parameters);
        };
        let entries = named_children(list);
        for entry in &entries {
            match entry.kind() {
                "variadic_parameter" => parameters.variadic = true,
                "parameter_declaration" => {
                    let specifiers = specifiers(*entry, source);
                    let (base, _) = self.base_type(source, *entry, &specifiers)?;
                    let declarator = entry.child_by_field_name("declarator");
                    if declarator.is_none() && self.builder.type_data(base).kind == TypeKind::Void && entries.len() == 1 {
                        // `(void)`
                        break;
                    }
                    let convention = specifiers.calling_convention.unwrap_or_default();
                    let declared = self.declare(source, base, declarator, convention)?;
                    parameters.types.push(self.decay(declared.ty));
                    parameters
                        .names
                        .push(declared.name.map(|n| source.text(n).to_string()).unwrap_or_default());
                }
                _ => {}
            }
        }
        // `...` is an anonymous token in some grammar versions.
        if children(list).iter().any(|c| c.kind() == "...") {
            parameters.variadic = true;
        }
        Ok(parameters)
    }

    /// Arrays and functions in parameter position become pointers.
    fn decay(&mut self, ty: TypeHandle) -> TypeHandle {
        let data = self.builder.type_data(ty);
        match (data.kind, data.element) {
            (TypeKind::ConstantArray | TypeKind::IncompleteArray, Some(element)) => self.builder.pointer(element),
            (TypeKind::FunctionProto, _) => self.builder.pointer(ty),
            _ => ty,
        }
    }

    /// Evaluate an integer constant expression against the enum constants
    /// and object-like macros seen so far.
    fn constant(&self, source: &Source<'_>, node: Node<'_>) -> std::result::Result<i64, String> {
        let lookup = |name: &str| {
            if let Some(value) = self.builder.enum_constant(name) {
                return Some(Symbol::Value(value));
            }
            self.macros.get(name).map(|m| {
                if m.is_function_like() {
                    Symbol::FunctionLike
                } else {
                    Symbol::Tokens(m.tokens.clone())
                }
            })
        };
        evaluate(&tokenize(source.text(node)), &lookup, false)
    }

    /// Evaluate `node`, reporting an error when it cannot be and the
    /// declaration has to fall back to `fallback`.
    fn constant_or_report(&mut self, source: &Source<'_>, node: Node<'_>, what: &str, fallback: &str) -> Option<i64> {
        match self.constant(source, node) {
            Ok(value) => Some(value),
            Err(detail) => {
                let message = format!("cannot evaluate {what} '{}' ({detail}); {fallback}", source.text(node));
                self.builder.add_diagnostic(
                    Diagnostic::new(Severity::Error, DiagnosticKind::UnevaluatedConstant, message)
                        .at(source.location(node)),
                );
                None
            }
        }
    }
}

/// Normalized spelling of `unsigned long int` and friends.
fn sized_spelling(source: &Source<'_>, node: Node<'_>) -> String {
    let mut unsigned = false;
    let mut longs = 0;
    let mut short = false;
    let mut base = None;
    let type_field = node.child_by_field_name("type");
    for child in children(node) {
        if Some(child) == type_field {
            base = Some(source.text(child));
            continue;
        }
        match source.text(child) {
            "unsigned" => unsigned = true,
            "long" => longs += 1,
            "short" => short = true,
            "int" | "char" | "double" => base = Some(source.text(child)),
            _ => {}
        }
    }
    let sign = if unsigned { "unsigned " } else { "" };
    match (base, short, longs) {
        (Some("char"), _, _) if unsigned => "unsigned char".to_string(),
        (Some("char"), _, _) => "signed char".to_string(),
        (Some("double"), _, n) if n > 0 => "long double".to_string(),
        (_, true, _) => format!("{sign}short"),
        (_, _, 1) => format!("{sign}long"),
        (_, _, n) if n >= 2 => format!("{sign}long long"),
        _ => format!("{sign}int"),
    }
}

/// Smallest of `int`, `unsigned int` and `long long` holding every value.
fn enum_integer_spelling(values: &[i64]) -> &'static str {
    let fits = |lo: i64, hi: i64| values.iter().all(|v| (lo..=hi).contains(v));
    if fits(i64::from(i32::MIN), i64::from(i32::MAX)) {
        "int"
    } else if fits(0, i64::from(u32::MAX)) {
        "unsigned int"
    } else {
        "long long"
    }
}
