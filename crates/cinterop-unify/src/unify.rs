//! Diffing per-platform trees into a bundle.

use std::collections::{BTreeMap, BTreeSet};

use cinterop_ast::{CAbstractSyntaxTree, CKind, CLocation, CNode, Diagnostic, DiagnosticKind, Diagnostics, Severity};
use cinterop_targets::TargetPlatform;

use crate::bundle::CrossPlatformBundle;

#[derive(Debug, Clone)]
pub struct Unification {
    pub bundle: CrossPlatformBundle,
    pub diagnostics: Diagnostics,
}

/// Unify the trees of several platforms.
///
/// A declaration goes to the agnostic set when every tree has it and all
/// variants are structurally equal. Otherwise each platform that has it
/// keeps its own copy and a mismatch is reported. Functions and variables
/// named in `required` that are missing or differ are errors; all other
/// mismatches are warnings.
///
/// When a platform is given twice, the last tree wins.
pub fn unify(trees: &[CAbstractSyntaxTree], required: &BTreeSet<String>) -> Unification {
    let mut by_platform: BTreeMap<&TargetPlatform, &CAbstractSyntaxTree> = BTreeMap::new();
    let mut platforms = Vec::new();
    for tree in trees {
        if by_platform.insert(&tree.platform, tree).is_none() {
            platforms.push(tree.platform.clone());
        }
    }
    let file_path = trees.first().map(|t| t.file_path.clone()).unwrap_or_default();
    let mut bundle = CrossPlatformBundle::new(file_path, platforms.clone());
    let mut diagnostics = Diagnostics::new();

    let keys: BTreeSet<(CKind, String)> = by_platform.values().flat_map(|tree| tree.nodes.keys()).collect();
    for (kind, name) in &keys {
        let variants: Vec<(&TargetPlatform, CNode)> = platforms
            .iter()
            .filter_map(|p| by_platform.get(p).and_then(|t| t.get(*kind, name)).map(|node| (p, node)))
            .collect();
        let Some((_, first)) = variants.first() else {
            continue;
        };
        let everywhere = variants.len() == platforms.len();
        if everywhere && variants.iter().all(|(_, node)| node.structurally_equals(first)) {
            bundle.agnostic.insert(first.clone());
            continue;
        }

        let location = first.location().clone();
        let missing: Vec<&TargetPlatform> = platforms
            .iter()
            .filter(|p| !variants.iter().any(|(q, _)| q == p))
            .collect();
        let entry_point = matches!(kind, CKind::Function | CKind::Variable) && required.contains(name);
        let severity = if entry_point { Severity::Error } else { Severity::Warning };
        let message = if missing.is_empty() {
            format!("{kind} '{name}' differs between platforms: {}", describe_groups(&variants))
        } else {
            format!("{kind} '{name}' is missing on {}", join_platforms(missing.iter().copied()))
        };
        let mut diagnostic = Diagnostic::new(severity, DiagnosticKind::PlatformMismatch, message).at(location);
        if let Some(platform) = missing.first() {
            diagnostic = diagnostic.on(platform);
        }
        diagnostics.push(diagnostic);

        for (platform, node) in variants {
            bundle.specific_mut(platform).insert(node);
        }
    }

    for name in required {
        let declared = keys
            .iter()
            .any(|(kind, key)| key == name && matches!(kind, CKind::Function | CKind::Variable));
        if !declared && !platforms.is_empty() {
            diagnostics.error(
                DiagnosticKind::PlatformMismatch,
                format!("entry point '{name}' is missing on every platform"),
                CLocation::BuiltIn,
            );
        }
    }

    log::info!(
        "unified {} platform(s): {} agnostic, {} platform-specific declaration(s)",
        platforms.len(),
        bundle.agnostic.len(),
        bundle.specific_count()
    );
    Unification { bundle, diagnostics }
}

fn join_platforms<'a>(platforms: impl Iterator<Item = &'a TargetPlatform>) -> String {
    platforms.map(|p| p.triple()).collect::<Vec<_>>().join(", ")
}

/// `a, b | c`: platforms grouped by identical variants.
fn describe_groups(variants: &[(&TargetPlatform, CNode)]) -> String {
    let mut groups: Vec<(&CNode, Vec<&TargetPlatform>)> = Vec::new();
    for (platform, node) in variants {
        match groups.iter_mut().find(|(seen, _)| seen.structurally_equals(node)) {
            Some((_, members)) => members.push(*platform),
            None => groups.push((node, vec![*platform])),
        }
    }
    groups
        .into_iter()
        .map(|(_, members)| join_platforms(members.into_iter()))
        .collect::<Vec<_>>()
        .join(" | ")
}
