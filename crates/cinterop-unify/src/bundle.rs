//! The unified, platform-partitioned declaration set.

use std::collections::BTreeMap;
use std::path::Path;

use cinterop_ast::persist::{load, save};
use cinterop_ast::{CKind, CNode, NodeSet, PersistError};
use cinterop_targets::TargetPlatform;
use serde::{Deserialize, Serialize};

/// Format tag of a persisted bundle.
pub const BUNDLE_FORMAT: &str = "cinterop-bundle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrossPlatformBundle {
    pub file_path: String,
    /// Every platform that was unified, in request order.
    pub platforms: Vec<TargetPlatform>,
    /// Declarations identical on every platform.
    pub agnostic: NodeSet,
    /// Declarations missing on some platform or differing between platforms.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specific: BTreeMap<TargetPlatform, NodeSet>,
}

impl CrossPlatformBundle {
    pub fn new(file_path: impl Into<String>, platforms: Vec<TargetPlatform>) -> Self {
        Self {
            file_path: file_path.into(),
            platforms,
            agnostic: NodeSet::new(),
            specific: BTreeMap::new(),
        }
    }

    /// The platform-specific set of `platform`, created on first use.
    pub fn specific_mut(&mut self, platform: &TargetPlatform) -> &mut NodeSet {
        self.specific.entry(platform.clone()).or_default()
    }

    /// The declaration as seen by `platform`: its own variant if it has one,
    /// otherwise the agnostic one.
    pub fn resolve(&self, platform: &TargetPlatform, kind: CKind, name: &str) -> Option<CNode> {
        self.specific
            .get(platform)
            .and_then(|nodes| nodes.get(kind, name))
            .or_else(|| self.agnostic.get(kind, name))
    }

    /// Whether `(kind, name)` has at least one platform-specific variant.
    pub fn is_platform_specific(&self, kind: CKind, name: &str) -> bool {
        self.specific.values().any(|nodes| nodes.contains(kind, name))
    }

    /// Platforms that have their own variant of `(kind, name)`.
    pub fn platforms_with(&self, kind: CKind, name: &str) -> Vec<&TargetPlatform> {
        self.specific
            .iter()
            .filter(|(_, nodes)| nodes.contains(kind, name))
            .map(|(platform, _)| platform)
            .collect()
    }

    pub fn specific_count(&self) -> usize {
        self.specific.values().map(NodeSet::len).sum()
    }
}

pub fn save_bundle(path: &Path, bundle: &CrossPlatformBundle) -> Result<(), PersistError> {
    save(path, BUNDLE_FORMAT, bundle)
}

pub fn load_bundle(path: &Path) -> Result<CrossPlatformBundle, PersistError> {
    load(path, BUNDLE_FORMAT)
}

#[cfg(test)]
mod tests {
    use cinterop_ast::{CLocation, COpaqueType};

    use super::*;

    fn opaque(name: &str, size_of: u64) -> CNode {
        CNode::OpaqueType(COpaqueType {
            name: name.into(),
            location: CLocation::source("api.h", 1, 1),
            size_of,
        })
    }

    fn sample() -> CrossPlatformBundle {
        let linux = TargetPlatform::linux_x64();
        let windows = TargetPlatform::windows_x64();
        let mut bundle = CrossPlatformBundle::new("api.h", vec![linux.clone(), windows.clone()]);
        bundle.agnostic.insert(opaque("Shared", 16));
        bundle.specific_mut(&linux).insert(opaque("Handle", 8));
        bundle.specific_mut(&windows).insert(opaque("Handle", 4));
        bundle
    }

    #[test]
    fn resolve_prefers_the_platform_variant() {
        let bundle = sample();
        let windows = TargetPlatform::windows_x64();
        match bundle.resolve(&windows, CKind::OpaqueType, "Handle") {
            Some(CNode::OpaqueType(o)) => assert_eq!(o.size_of, 4),
            other => panic!("unexpected {other:?}"),
        }
        assert!(bundle.resolve(&windows, CKind::OpaqueType, "Shared").is_some());
        assert!(bundle.is_platform_specific(CKind::OpaqueType, "Handle"));
        assert_eq!(bundle.platforms_with(CKind::OpaqueType, "Handle").len(), 2);
        assert_eq!(bundle.specific_count(), 2);
    }

    #[test]
    fn bundle_survives_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let bundle = sample();
        save_bundle(&path, &bundle).unwrap();
        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"format\": \"cinterop-bundle\""));
        assert!(json.contains("x86_64-pc-windows-msvc"));
        assert_eq!(load_bundle(&path).unwrap(), bundle);
    }

    #[test]
    fn tree_documents_are_not_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ast.json");
        let tree = cinterop_ast::CAbstractSyntaxTree::new(TargetPlatform::linux_x64(), "api.h");
        cinterop_ast::persist::save_tree(&path, &tree).unwrap();
        let err = load_bundle(&path).unwrap_err();
        assert!(matches!(err, PersistError::WrongFormat { .. }));
    }
}
