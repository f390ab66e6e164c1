//! The mapped declarations handed to code emitters.

use std::collections::BTreeMap;
use std::path::Path;

use cinterop_ast::persist::{load, save};
use cinterop_ast::{CLocation, CallingConvention};
use cinterop_targets::TargetPlatform;
use serde::{Deserialize, Serialize};

use crate::binding::BindingType;
use crate::error::Result;

/// Format tag of a persisted binding model.
pub const MODEL_FORMAT: &str = "cinterop-model";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingParameter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: BindingType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingFunction {
    pub name: String,
    /// The symbol name in the C library.
    pub c_name: String,
    pub location: CLocation,
    pub calling_convention: CallingConvention,
    pub return_type: BindingType,
    pub parameters: Vec<BindingParameter>,
    #[serde(default)]
    pub is_variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingFunctionPointer {
    pub name: String,
    pub c_name: String,
    pub location: CLocation,
    pub calling_convention: CallingConvention,
    pub return_type: BindingType,
    pub parameters: Vec<BindingParameter>,    #[serde(default)]
    pub is_variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: BindingType,
    /// Byte offset from the start of the record.
    pub offset: u64,
    /// Bytes between the end of this field and the next one.
    pub padding: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingRecord {
    pub name: String,
    pub c_name: String,
    pub location: CLocation,
    pub is_union: bool,
    pub size: u64,
    pub align: u64,
    pub fields: Vec<BindingField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<BindingRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEnumValue {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingEnum {
    pub name: String,
    pub c_name: String,
    pub location: CLocation,
    pub backing: BindingType,
    pub values: Vec<BindingEnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingOpaque {
    pub name: String,
    pub c_name: String,
    pub location: CLocation,
    pub size: u64,
}

/// A typedef that survived mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingAlias {
    pub name: String,
    pub c_name: String,
    pub location: CLocation,
    pub target: BindingType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingVariable {
    pub name: String,
    pub c_name: String,
    pub location: CLocation,
    #[serde(rename = "type")]
    pub ty: BindingType,
}

/// An object-like macro exposed as a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingConstant {
    pub name: String,
    pub c_name: String,
    pub location: CLocation,
    #[serde(rename = "type")]
    pub ty: BindingType,
    pub tokens: Vec<String>,
}

/// One partition of mapped declarations, keyed by mapped name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingNodes {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub functions: BTreeMap<String, BindingFunction>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub function_pointers: BTreeMap<String, BindingFunctionPointer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub records: BTreeMap<String, BindingRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub enums: BTreeMap<String, BindingEnum>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub opaque_types: BTreeMap<String, BindingOpaque>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, BindingAlias>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, BindingVariable>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constants: BTreeMap<String, BindingConstant>,
}

impl BindingNodes {
    pub fn len(&self) -> usize {
        self.functions.len()
            + self.function_pointers.len()
            + self.records.len()
            + self.enums.len()
            + self.opaque_types.len()
            + self.aliases.len()
            + self.variables.len()
            + self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mapped declarations, partitioned like the bundle they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingModel {
    pub file_path: String,
    pub platforms: Vec<TargetPlatform>,
    pub agnostic: BindingNodes,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specific: BTreeMap<TargetPlatform, BindingNodes>,
}

impl BindingModel {
    pub fn specific_count(&self) -> usize {
        self.specific.values().map(BindingNodes::len).sum()
    }
}

pub fn save_model(path: &Path, model: &BindingModel) -> Result<()> {
    Ok(save(path, MODEL_FORMAT, model)?)
}

pub fn load_model(path: &Path) -> Result<BindingModel> {
    Ok(load(path, MODEL_FORMAT)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_survives_a_save_load_cycle() {
        let mut agnostic = BindingNodes::default();
        agnostic.enums.insert(
            "Color".into(),
            BindingEnum {
                name: "Color".into(),
                c_name: "Color".into(),
                location: CLocation::source("color.h", 1, 6),
                backing: BindingType::int(32, true),
                values: vec![BindingEnumValue {
                    name: "RED".into(),
                    value: 0,
                }],
            },
        );
        let model = BindingModel {
            file_path: "color.h".into(),
            platforms: vec![TargetPlatform::linux_x64()],
            agnostic,
            specific: BTreeMap::new(),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        save_model(&path, &model).unwrap();
        assert_eq!(load_model(&path).unwrap(), model);
        assert_eq!(model.agnostic.len(), 1);
        assert_eq!(model.specific_count(), 0);
    }
}
