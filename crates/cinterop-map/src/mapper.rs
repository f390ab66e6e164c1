//! Mapping a bundle into a binding model.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use cinterop_ast::{
    CEnum, CFunction, CFunctionPointer, CKind, CLocation, CMacroObject, CNode, COpaqueType, CParameter, CRecord,
    CType, CTypedef, CVariable, Diagnostic, DiagnosticKind, Diagnostics, NodeSet, Severity,
};
use cinterop_targets::TargetPlatform;
use cinterop_unify::CrossPlatformBundle;
use rayon::prelude::*;

use crate::aliases::AliasTable;
use crate::binding::BindingType;
use crate::model::{
    BindingAlias, BindingConstant, BindingEnum, BindingEnumValue, BindingField, BindingFunction,
    BindingFunctionPointer, BindingModel, BindingNodes, BindingOpaque, BindingParameter, BindingRecord,
    BindingVariable,
};
use crate::options::MapOptions;

#[derive(Debug, Clone)]
pub struct Mapping {
    pub model: BindingModel,
    pub diagnostics: Diagnostics,
}

/// Map every declaration of `bundle`.
///
/// The agnostic partition is mapped with the aliases every platform of the
/// bundle agrees on; each platform partition with its own table. Platform
/// partitions are mapped in parallel.
pub fn map(bundle: &CrossPlatformBundle, options: &MapOptions) -> Mapping {
    let mut diagnostics = Diagnostics::new();
    let renames = effective_renames(bundle, options, &mut diagnostics);

    let (aliases, disagreeing) = agreed_aliases(bundle, options);
    let (agnostic, agnostic_diagnostics) =
        PartitionMapper::new(bundle, options, &renames, None, aliases, disagreeing).run(&bundle.agnostic);
    diagnostics.extend(agnostic_diagnostics);

    let partitions: Vec<(TargetPlatform, BindingNodes, Diagnostics)> = bundle
        .specific
        .par_iter()
        .map(|(platform, nodes)| {
            let aliases = options.system_aliases.table_for(platform);
            let (mapped, diagnostics) =
                PartitionMapper::new(bundle, options, &renames, Some(platform), aliases, BTreeSet::new()).run(nodes);
            (platform.clone(), mapped, diagnostics)
        })
        .collect();

    let mut model = BindingModel {
        file_path: bundle.file_path.clone(),
        platforms: bundle.platforms.clone(),
        agnostic,
        specific: BTreeMap::new(),
    };
    for (platform, nodes, partition_diagnostics) in partitions {
        diagnostics.extend(partition_diagnostics);
        if !nodes.is_empty() {
            model.specific.insert(platform, nodes);
        }
    }
    log::info!(
        "mapped {} agnostic and {} platform-specific declaration(s)",
        model.agnostic.len(),
        model.specific_count()
    );
    Mapping { model, diagnostics }
}

/// Renames that can be applied safely. A rename whose target already names
/// a declaration, or whose target is shared with another rename, is reported
/// and dropped.
fn effective_renames(
    bundle: &CrossPlatformBundle,
    options: &MapOptions,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, String> {
    let mut existing: BTreeSet<String> = bundle.agnostic.keys().into_iter().map(|(_, name)| name).collect();
    for nodes in bundle.specific.values() {
        existing.extend(nodes.keys().into_iter().map(|(_, name)| name));
    }

    let mut by_target: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (from, to) in &options.renames {
        by_target.entry(to.as_str()).or_default().push(from.as_str());
    }

    let mut renames = BTreeMap::new();
    for (to, sources) in by_target {
        match sources.as_slice() {
            [from] if *from == to => {}
            [from] if existing.contains(to) => diagnostics.warning(
                DiagnosticKind::RenameCollision,
                format!("cannot rename '{from}' to '{to}': a declaration named '{to}' already exists"),
                CLocation::BuiltIn,
            ),
            [from] => {
                renames.insert(from.to_string(), to.to_string());
            }
            many => diagnostics.warning(
                DiagnosticKind::RenameCollision,
                format!("renames of {} all target '{to}'; none applied", many.join(", ")),
                CLocation::BuiltIn,
            ),
        }
    }
    renames
}

/// Aliases identical on every platform of the bundle, plus the names whose
/// aliases differ or exist only on some platforms.
fn agreed_aliases(bundle: &CrossPlatformBundle, options: &MapOptions) -> (AliasTable, BTreeSet<String>) {
    let tables: Vec<AliasTable> = bundle
        .platforms
        .iter()
        .map(|p| options.system_aliases.table_for(p))
        .collect();
    let mut agreed = AliasTable::new();
    let mut disagreeing = BTreeSet::new();
    let Some((first, rest)) = tables.split_first() else {
        return (agreed, disagreeing);
    };
    let names: BTreeSet<&String> = tables.iter().flat_map(|t| t.keys()).collect();
    for name in names {
        match first.get(name) {
            Some(alias) if rest.iter().all(|t| t.get(name) == Some(alias)) => {
                agreed.insert(name.clone(), alias.clone());
            }
            _ => {
                disagreeing.insert(name.clone());
            }
        }
    }
    (agreed, disagreeing)
}

/// Maps one partition. The referrer and location of the declaration being
/// mapped are kept for diagnostics.
struct PartitionMapper<'a> {
    bundle: &'a CrossPlatformBundle,
    options: &'a MapOptions,
    renames: &'a BTreeMap<String, String>,
    platform: Option<&'a TargetPlatform>,
    aliases: AliasTable,
    disagreeing: BTreeSet<String>,
    nodes: BindingNodes,
    diagnostics: Diagnostics,
    reported: HashSet<(String, String)>,
    referrer: String,
    location: CLocation,
}

impl<'a> PartitionMapper<'a> {
    fn new(
        bundle: &'a CrossPlatformBundle,
        options: &'a MapOptions,
        renames: &'a BTreeMap<String, String>,
        platform: Option<&'a TargetPlatform>,
        aliases: AliasTable,
        disagreeing: BTreeSet<String>,
    ) -> Self {
        Self {
            bundle,
            options,
            renames,
            platform,
            aliases,
            disagreeing,
            nodes: BindingNodes::default(),
            diagnostics: Diagnostics::new(),
            reported: HashSet::new(),
            referrer: String::new(),
            location: CLocation::BuiltIn,
        }
    }

    fn run(mut self, nodes: &NodeSet) -> (BindingNodes, Diagnostics) {
        for typedef in nodes.typedefs.values() {
            self.map_typedef(typedef);
        }
        for opaque in nodes.opaque_types.values() {
            self.map_opaque(opaque);
        }
        for record in nodes.records.values() {
            self.map_record(record);
        }
        for enumeration in nodes.enums.values() {
            self.map_enum(enumeration);
        }
        for pointer in nodes.function_pointers.values() {
            self.map_function_pointer(pointer);
        }
        for function in nodes.functions.values() {
            self.map_function(function);
        }
        for variable in nodes.variables.values() {
            self.map_variable(variable);
        }
        for constant in nodes.macro_objects.values() {
            self.map_constant(constant);
        }
        log::debug!("{}: mapped {} declaration(s)", self.scope(), self.nodes.len());
        (self.nodes, self.diagnostics)
    }

    fn scope(&self) -> &str {
        self.platform.map_or("agnostic", |p| p.triple())
    }

    fn report(&mut self, severity: Severity, kind: DiagnosticKind, message: String) {
        let mut diagnostic = Diagnostic::new(severity, kind, message).at(self.location.clone());
        if let Some(platform) = self.platform {
            diagnostic = diagnostic.on(platform);
        }
        self.diagnostics.push(diagnostic);
    }

    /// Report at most once per referrer and referenced name.
    fn report_reference(&mut self, referenced: &str, kind: DiagnosticKind, message: String) {
        if self.reported.insert((self.referrer.clone(), referenced.to_string())) {
            self.report(Severity::Warning, kind, message);
        }
    }

    fn name_of(&self, c_name: &str) -> String {
        self.renames.get(c_name).cloned().unwrap_or_else(|| c_name.to_string())
    }

    fn is_ignored(&self, c_name: &str) -> bool {
        let ignored = &self.options.ignored_names;
        ignored.contains(c_name) || self.renames.get(c_name).is_some_and(|renamed| ignored.contains(renamed))
    }

    /// Start mapping a declaration. Returns its binding name, or `None` when
    /// it is replaced by a system alias or ignored.
    fn admit(&mut self, c_name: &str, location: &CLocation) -> Option<String> {
        self.referrer = c_name.to_string();
        self.location = location.clone();
        if self.aliases.contains_key(c_name) {
            log::debug!("{}: {c_name} is replaced by its system alias", self.scope());
            return None;
        }
        if self.is_ignored(c_name) {
            log::debug!("{}: {c_name} is ignored", self.scope());
            return None;
        }
        Some(self.name_of(c_name))
    }

    fn map_type(&mut self, ty: &CType) -> BindingType {
        match ty.kind {
            CKind::Pointer => {
                let pointee = match ty.inner.as_deref() {
                    Some(inner) => self.map_type(inner),
                    None => BindingType::Void,
                };
                BindingType::pointer(pointee)
            }
            CKind::Array => {
                let element = match ty.inner.as_deref() {
                    Some(inner) => self.map_type(inner),
                    None => BindingType::Void,
                };
                BindingType::Array {
                    element: Box::new(element),
                    length: ty.array_length,
                }
            }
            CKind::Primitive => match self.aliases.get(&ty.name) {
                Some(Some(alias)) => alias.clone(),
                _ => BindingType::from_primitive(&ty.name, ty.size_of.unwrap_or(0)),
            },
            kind => self.map_reference(ty, kind),
        }
    }

    fn map_reference(&mut self, ty: &CType, kind: CKind) -> BindingType {
        let name = &ty.name;
        if self.disagreeing.contains(name) {
            let message = format!(
                "'{}' references '{name}', whose system alias differs between platforms; kept as a named reference",
                self.referrer
            );
            self.report_reference(name, DiagnosticKind::AliasDisagreement, message);
        }
        match self.aliases.get(name).cloned() {
            Some(Some(alias)) => return alias,
            Some(None) => {
                if kind == CKind::Typedef {
                    let mut targets: Vec<BindingType> = Vec::new();
                    for underlying in self.typedef_underlying(name) {
                        let target = self.map_type(&underlying);
                        if !targets.contains(&target) {
                            targets.push(target);
                        }
                    }
                    match targets.len() {
                        0 => {}
                        1 => return targets.remove(0),
                        _ => {
                            let message = format!(
                                "'{}' references '{name}', which a system alias removes, but its underlying type \
                                 differs between platforms; kept as a named reference",
                                self.referrer
                            );
                            self.report_reference(name, DiagnosticKind::AliasDisagreement, message);
                            return BindingType::Named {
                                name: name.clone(),
                                kind,
                            };
                        }
                    }
                }
                let message = format!("'{}' references '{name}', which a system alias removes", self.referrer);
                self.report_reference(name, DiagnosticKind::IgnoredNameReferenced, message);
                return BindingType::Named {
                    name: name.clone(),
                    kind,
                };
            }
            None => {}
        }
        if self.is_ignored(name) {
            let message = format!("'{}' references ignored '{name}'; the reference keeps the C name", self.referrer);
            self.report_reference(name, DiagnosticKind::IgnoredNameReferenced, message);
            return BindingType::Named {
                name: name.clone(),
                kind,
            };
        }
        let mapped = self.name_of(name);
        match kind {
            CKind::OpaqueType => BindingType::Opaque {
                name: mapped,
                size: ty.size_of.unwrap_or(0),
            },
            _ => BindingType::Named { name: mapped, kind },
        }
    }

    /// Underlying types of the typedef `name` as this partition sees it. An
    /// agnostic reference to a typedef that differs between platforms sees
    /// every platform's variant.
    fn typedef_underlying(&self, name: &str) -> Vec<CType> {
        if self.platform.is_none() {
            if let Some(typedef) = self.bundle.agnostic.typedefs.get(name) {
                return vec![typedef.underlying.clone()];
            }
        }
        let platforms = match self.platform {
            Some(platform) => std::slice::from_ref(platform),
            None => self.bundle.platforms.as_slice(),
        };
        platforms
            .iter()
            .filter_map(|platform| match self.bundle.resolve(platform, CKind::Typedef, name) {
                Some(CNode::Typedef(typedef)) => Some(typedef.underlying),
                _ => None,
            })
            .collect()
    }

    fn parameters(&mut self, parameters: &[CParameter]) -> Vec<BindingParameter> {
        parameters
            .iter()
            .map(|p| BindingParameter {
                name: p.name.clone(),
                ty: self.map_type(&p.ty),
            })
            .collect()
    }

    fn map_typedef(&mut self, typedef: &CTypedef) {
        let Some(name) = self.admit(&typedef.name, &typedef.location) else {
            return;
        };
        let target = self.map_type(&typedef.underlying);
        self.nodes.aliases.insert(
            name.clone(),
            BindingAlias {
                name,
                c_name: typedef.name.clone(),
                location: typedef.location.clone(),
                target,
            },
        );
    }

    fn map_opaque(&mut self, opaque: &COpaqueType) {
        let Some(name) = self.admit(&opaque.name, &opaque.location) else {
            return;
        };
        self.nodes.opaque_types.insert(
            name.clone(),
            BindingOpaque {
                name,
                c_name: opaque.name.clone(),
                location: opaque.location.clone(),
                size: opaque.size_of,
            },
        );
    }

    fn map_record(&mut self, record: &CRecord) {
        let Some(name) = self.admit(&record.name, &record.location) else {
            return;
        };
        let mapped = self.record(record, name.clone());
        self.nodes.records.insert(name, mapped);
    }

    fn record(&mut self, record: &CRecord, name: String) -> BindingRecord {
        let fields = record
            .fields
            .iter()
            .map(|f| BindingField {
                name: f.name.clone(),
                ty: self.map_type(&f.ty),
                offset: f.offset_of,
                padding: f.padding_of,
                bit_width: f.bit_width,
                bit_offset: f.bit_offset,
            })
            .collect();
        let nested = record
            .nested_records
            .iter()
            .map(|n| {
                let nested_name = self.name_of(&n.name);
                self.record(n, nested_name)
            })
            .collect();
        BindingRecord {
            name,
            c_name: record.name.clone(),
            location: record.location.clone(),
            is_union: record.is_union,
            size: record.size_of,
            align: record.align_of,
            fields,
            nested,
        }
    }

    fn map_enum(&mut self, enumeration: &CEnum) {
        let Some(name) = self.admit(&enumeration.name, &enumeration.location) else {
            return;
        };
        let backing = self.enum_backing(enumeration);
        let values = enumeration
            .values
            .iter()
            .map(|v| BindingEnumValue {
                name: self.name_of(&v.name),
                value: v.value,
            })
            .collect();
        self.nodes.enums.insert(
            name.clone(),
            BindingEnum {
                name,
                c_name: enumeration.name.clone(),
                location: enumeration.location.clone(),
                backing,
                values,
            },
        );
    }

    /// `i32` when every value fits, then `u32`, otherwise `i64` with a warning.
    fn enum_backing(&mut self, enumeration: &CEnum) -> BindingType {
        let values = || enumeration.values.iter().map(|v| v.value);
        if values().all(|v| i32::try_from(v).is_ok()) {
            return BindingType::int(32, true);
        }
        if values().all(|v| u32::try_from(v).is_ok()) {
            return BindingType::int(32, false);
        }
        if let Some(wide) = values().find(|v| i32::try_from(*v).is_err() && u32::try_from(*v).is_err()) {
            let message = format!(
                "enum '{}' has value {wide} outside the 32-bit range; backed by a 64-bit integer",
                enumeration.name
            );
            self.report(Severity::Warning, DiagnosticKind::EnumValueUnsupported, message);
        }
        BindingType::int(64, true)
    }

    fn map_function_pointer(&mut self, pointer: &CFunctionPointer) {
        let Some(name) = self.admit(&pointer.name, &pointer.location) else {
            return;
        };
        let return_type = self.map_type(&pointer.return_type);
        let parameters = self.parameters(&pointer.parameters);
        self.nodes.function_pointers.insert(
            name.clone(),
            BindingFunctionPointer {
                name,
                c_name: pointer.name.clone(),
                location: pointer.location.clone(),
                calling_convention: pointer.calling_convention,
                return_type,
                parameters,
                is_variadic: pointer.is_variadic,
            },
        );
    }

    fn map_function(&mut self, function: &CFunction) {
        let Some(name) = self.admit(&function.name, &function.location) else {
            return;
        };
        let return_type = self.map_type(&function.return_type);
        let parameters = self.parameters(&function.parameters);
        self.nodes.functions.insert(
            name.clone(),
            BindingFunction {
                name,
                c_name: function.name.clone(),
                location: function.location.clone(),
                calling_convention: function.calling_convention,
                return_type,
                parameters,
                is_variadic: function.is_variadic,
            },
        );
    }

    fn map_variable(&mut self, variable: &CVariable) {
        let Some(name) = self.admit(&variable.name, &variable.location) else {
            return;
        };
        let ty = self.map_type(&variable.ty);
        self.nodes.variables.insert(
            name.clone(),
            BindingVariable {
                name,
                c_name: variable.name.clone(),
                location: variable.location.clone(),
                ty,
            },
        );
    }

    fn map_constant(&mut self, constant: &CMacroObject) {
        let Some(name) = self.admit(&constant.name, &constant.location) else {
            return;
        };
        let ty = self.map_type(&constant.ty);
        let tokens = constant.tokens.iter().map(|t| self.name_of(t)).collect();
        self.nodes.constants.insert(
            name.clone(),
            BindingConstant {
                name,
                c_name: constant.name.clone(),
                location: constant.location.clone(),
                ty,
                tokens,
            },
        );
    }
}
