//! Per-platform abstract syntax trees.

use std::collections::BTreeMap;

use cinterop_targets::TargetPlatform;
use serde::{Deserialize, Serialize};

use crate::node::{CEnum, CFunction, CFunctionPointer, CMacroObject, CNode, COpaqueType, CRecord, CTypedef, CVariable};
use crate::types::{CKind, CType};

/// Name-keyed maps, one per declaration category.
///
/// Names are unique within a category; a function and a record may share
/// a name, two records may not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeSet {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub functions: BTreeMap<String, CFunction>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub function_pointers: BTreeMap<String, CFunctionPointer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub records: BTreeMap<String, CRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub enums: BTreeMap<String, CEnum>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub opaque_types: BTreeMap<String, COpaqueType>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub typedefs: BTreeMap<String, CTypedef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, CVariable>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub macro_objects: BTreeMap<String, CMacroObject>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning the one it replaced in the same category.
    pub fn insert(&mut self, node: CNode) -> Option<CNode> {
        match node {
            CNode::Function(n) => self.functions.insert(n.name.clone(), n).map(CNode::Function),
            CNode::FunctionPointer(n) => self
                .function_pointers
                .insert(n.name.clone(), n)
                .map(CNode::FunctionPointer),
            CNode::Record(n) => self.records.insert(n.name.clone(), n).map(CNode::Record),
            CNode::Enum(n) => self.enums.insert(n.name.clone(), n).map(CNode::Enum),
            CNode::OpaqueType(n) => self.opaque_types.insert(n.name.clone(), n).map(CNode::OpaqueType),
            CNode::Typedef(n) => self.typedefs.insert(n.name.clone(), n).map(CNode::Typedef),
            CNode::Variable(n) => self.variables.insert(n.name.clone(), n).map(CNode::Variable),
            CNode::MacroObject(n) => self.macro_objects.insert(n.name.clone(), n).map(CNode::MacroObject),
        }
    }

    pub fn get(&self, kind: CKind, name: &str) -> Option<CNode> {
        match kind {
            CKind::Function => self.functions.get(name).cloned().map(CNode::Function),
            CKind::FunctionPointer => self.function_pointers.get(name).cloned().map(CNode::FunctionPointer),
            CKind::Record => self.records.get(name).cloned().map(CNode::Record),
            CKind::Enum => self.enums.get(name).cloned().map(CNode::Enum),
            CKind::OpaqueType => self.opaque_types.get(name).cloned().map(CNode::OpaqueType),
            CKind::Typedef => self.typedefs.get(name).cloned().map(CNode::Typedef),
            CKind::Variable => self.variables.get(name).cloned().map(CNode::Variable),
            CKind::MacroDefinition => self.macro_objects.get(name).cloned().map(CNode::MacroObject),
            CKind::EnumValue | CKind::Array | CKind::Pointer | CKind::Primitive => None,
        }
    }

    pub fn contains(&self, kind: CKind, name: &str) -> bool {
        match kind {
            CKind::Function => self.functions.contains_key(name),
            CKind::FunctionPointer => self.function_pointers.contains_key(name),
            CKind::Record => self.records.contains_key(name),
            CKind::Enum => self.enums.contains_key(name),
            CKind::OpaqueType => self.opaque_types.contains_key(name),
            CKind::Typedef => self.typedefs.contains_key(name),
            CKind::Variable => self.variables.contains_key(name),
            CKind::MacroDefinition => self.macro_objects.contains_key(name),
            CKind::EnumValue | CKind::Array | CKind::Pointer | CKind::Primitive => false,
        }
    }

    pub fn remove(&mut self, kind: CKind, name: &str) -> Option<CNode> {
        match kind {
            CKind::Function => self.functions.remove(name).map(CNode::Function),
            CKind::FunctionPointer => self.function_pointers.remove(name).map(CNode::FunctionPointer),
            CKind::Record => self.records.remove(name).map(CNode::Record),
            CKind::Enum => self.enums.remove(name).map(CNode::Enum),
            CKind::OpaqueType => self.opaque_types.remove(name).map(CNode::OpaqueType),
            CKind::Typedef => self.typedefs.remove(name).map(CNode::Typedef),
            CKind::Variable => self.variables.remove(name).map(CNode::Variable),
            CKind::MacroDefinition => self.macro_objects.remove(name).map(CNode::MacroObject),
            CKind::EnumValue | CKind::Array | CKind::Pointer | CKind::Primitive => None,
        }
    }

    /// Every `(category, name)` key in the set.
    pub fn keys(&self) -> Vec<(CKind, String)> {
        let mut keys = Vec::with_capacity(self.len());
        keys.extend(self.functions.keys().map(|k| (CKind::Function, k.clone())));
        keys.extend(self.function_pointers.keys().map(|k| (CKind::FunctionPointer, k.clone())));
        keys.extend(self.records.keys().map(|k| (CKind::Record, k.clone())));
        keys.extend(self.enums.keys().map(|k| (CKind::Enum, k.clone())));
        keys.extend(self.opaque_types.keys().map(|k| (CKind::OpaqueType, k.clone())));
        keys.extend(self.typedefs.keys().map(|k| (CKind::Typedef, k.clone())));
        keys.extend(self.variables.keys().map(|k| (CKind::Variable, k.clone())));
        keys.extend(self.macro_objects.keys().map(|k| (CKind::MacroDefinition, k.clone())));
        keys
    }

    /// All nodes ordered by location, then category, then name.
    pub fn nodes(&self) -> Vec<CNode> {
        let mut nodes: Vec<CNode> = Vec::with_capacity(self.len());
        nodes.extend(self.functions.values().cloned().map(CNode::Function));
        nodes.extend(self.function_pointers.values().cloned().map(CNode::FunctionPointer));
        nodes.extend(self.records.values().cloned().map(CNode::Record));
        nodes.extend(self.enums.values().cloned().map(CNode::Enum));
        nodes.extend(self.opaque_types.values().cloned().map(CNode::OpaqueType));
        nodes.extend(self.typedefs.values().cloned().map(CNode::Typedef));
        nodes.extend(self.variables.values().cloned().map(CNode::Variable));
        nodes.extend(self.macro_objects.values().cloned().map(CNode::MacroObject));
        nodes.sort_by(|a, b| {
            a.location()
                .cmp(b.location())
                .then_with(|| a.kind().cmp(&b.kind()))
                .then_with(|| a.name().cmp(b.name()))
        });
        nodes
    }

    pub fn len(&self) -> usize {
        self.functions.len()
            + self.function_pointers.len()
            + self.records.len()
            + self.enums.len()
            + self.opaque_types.len()
            + self.typedefs.len()
            + self.variables.len()
            + self.macro_objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same keys, and every node structurally equal to its counterpart.
    pub fn structurally_equals(&self, other: &NodeSet) -> bool {
        let keys = self.keys();
        keys == other.keys()
            && keys.iter().all(|(kind, name)| match (self.get(*kind, name), other.get(*kind, name)) {
                (Some(a), Some(b)) => a.structurally_equals(&b),
                _ => false,
            })
    }
}

/// The explored declarations of one header on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CAbstractSyntaxTree {
    pub platform: TargetPlatform,
    pub file_path: String,
    pub nodes: NodeSet,
    /// Every type reference resolved during exploration, by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub types: BTreeMap<String, CType>,
}

impl CAbstractSyntaxTree {
    pub fn new(platform: TargetPlatform, file_path: impl Into<String>) -> Self {
        Self {
            platform,
            file_path: file_path.into(),
            nodes: NodeSet::new(),
            types: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, node: CNode) -> Option<CNode> {
        self.nodes.insert(node)
    }

    pub fn get(&self, kind: CKind, name: &str) -> Option<CNode> {
        self.nodes.get(kind, name)
    }

    pub fn nodes_in_location_order(&self) -> Vec<CNode> {
        self.nodes.nodes()
    }

    /// Structural equality of the whole tree; locations are ignored.
    pub fn structurally_equals(&self, other: &CAbstractSyntaxTree) -> bool {
        self.platform == other.platform && self.nodes.structurally_equals(&other.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::CLocation;

    fn opaque(name: &str, line: u32) -> CNode {
        CNode::OpaqueType(COpaqueType {
            name: name.into(),
            location: CLocation::source("a.h", line, 1),
            size_of: 0,
        })
    }

    #[test]
    fn names_unique_per_category() {
        let mut set = NodeSet::new();
        assert!(set.insert(opaque("Handle", 1)).is_none());
        assert!(set.insert(opaque("Handle", 2)).is_some());
        set.insert(CNode::Typedef(CTypedef {
            name: "Handle".into(),
            location: CLocation::BuiltIn,
            underlying: CType::primitive("int", 4, 4),
        }));
        assert_eq!(set.len(), 2);
        assert!(set.contains(CKind::OpaqueType, "Handle"));
        assert!(set.contains(CKind::Typedef, "Handle"));
        assert!(!set.contains(CKind::Record, "Handle"));
    }

    #[test]
    fn nodes_sorted_by_location() {
        let mut set = NodeSet::new();
        set.insert(opaque("Late", 30));
        set.insert(opaque("Early", 3));
        set.insert(opaque("Middle", 10));
        let names: Vec<_> = set.nodes().iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, vec!["Early", "Middle", "Late"]);
    }

    #[test]
    fn remove_and_get() {
        let mut set = NodeSet::new();
        set.insert(opaque("A", 1));
        assert!(set.get(CKind::OpaqueType, "A").is_some());
        assert!(set.get(CKind::Pointer, "A").is_none());
        assert!(set.remove(CKind::OpaqueType, "A").is_some());
        assert!(set.is_empty());
    }

    #[test]
    fn tree_structural_equality_ignores_locations() {
        let mut a = CAbstractSyntaxTree::new(TargetPlatform::linux_x64(), "a.h");
        let mut b = CAbstractSyntaxTree::new(TargetPlatform::linux_x64(), "a.h");
        a.insert(opaque("A", 1));
        b.insert(opaque("A", 5));
        assert!(a.structurally_equals(&b));
        b.insert(opaque("B", 6));
        assert!(!a.structurally_equals(&b));
    }
}
