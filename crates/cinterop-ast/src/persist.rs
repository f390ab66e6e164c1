//! Persisted document format.
//!
//! Every artifact that crosses a stage boundary on disk is wrapped in the
//! same JSON envelope:
//!
//! ```json
//! { "format": "cinterop-ast", "version": 1, "digest": "<sha256 hex>", "payload": { ... } }
//! ```
//!
//! The digest is the SHA-256 of the compact JSON encoding of `payload`
//! (object keys sorted), and is verified on load.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{PersistError, Result};
use crate::tree::CAbstractSyntaxTree;

/// Format tag of a persisted per-platform tree.
pub const AST_FORMAT: &str = "cinterop-ast";

/// Current envelope version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    digest: String,
    payload: Value,
}

/// SHA-256 hex digest of a JSON value.
pub fn content_digest(value: &Value) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Serialize a payload into a pretty-printed envelope.
pub fn to_document<T: Serialize>(format: &str, payload: &T) -> Result<String> {
    let payload = serde_json::to_value(payload)?;
    let envelope = Envelope {
        format: format.to_string(),
        version: FORMAT_VERSION,
        digest: content_digest(&payload)?,
        payload,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Parse an envelope, check its format tag and digest, and decode the payload.
pub fn from_document<T: DeserializeOwned>(format: &str, json: &str) -> Result<T> {
    let envelope: Envelope = serde_json::from_str(json)?;
    if envelope.format != format {
        return Err(PersistError::WrongFormat {
            expected: format.to_string(),
            actual: envelope.format,
        });
    }
    if envelope.version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            version: envelope.version,
        });
    }
    let actual = content_digest(&envelope.payload)?;
    if actual != envelope.digest {
        return Err(PersistError::IntegrityMismatch {
            expected: envelope.digest,
            actual,
        });
    }
    Ok(serde_json::from_value(envelope.payload)?)
}

pub fn save<T: Serialize>(path: &Path, format: &str, payload: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, to_document(format, payload)?)?;
    Ok(())
}

pub fn load<T: DeserializeOwned>(path: &Path, format: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    from_document(format, &content)
}

pub fn save_tree(path: &Path, tree: &CAbstractSyntaxTree) -> Result<()> {
    save(path, AST_FORMAT, tree)
}

pub fn load_tree(path: &Path) -> Result<CAbstractSyntaxTree> {
    load(path, AST_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::CLocation;
    use crate::node::{CEnum, CEnumValue, CFunction, CNode, CParameter, CRecord, CRecordField};
    use crate::types::{CKind, CType, CallingConvention};
    use cinterop_targets::TargetPlatform;

    fn sample_tree() -> CAbstractSyntaxTree {
        let mut tree = CAbstractSyntaxTree::new(TargetPlatform::windows_x64(), "api.h");
        let color = CType::named("Color", CKind::Enum, Some(4), Some(4), CLocation::source("api.h", 1, 6));
        tree.insert(CNode::Enum(CEnum {
            name: "Color".into(),
            location: CLocation::source("api.h", 1, 6),
            integer_type: CType::primitive("int", 4, 4),
            values: vec![
                CEnumValue { name: "RED".into(), value: 0 },
                CEnumValue { name: "GREEN".into(), value: 1 },
            ],
        }));
        tree.insert(CNode::Function(CFunction {
            name: "set_color".into(),
            location: CLocation::source("api.h", 2, 6),
            calling_convention: CallingConvention::Cdecl,
            return_type: CType::void(),
            parameters: vec![CParameter::new("c", color.clone())],
            is_variadic: false,
        }));
        tree.insert(CNode::Record(CRecord {
            name: "Node".into(),
            location: CLocation::source("api.h", 3, 8),
            is_union: false,
            size_of: 8,
            align_of: 8,
            fields: vec![CRecordField {
                name: "next".into(),
                ty: CType::pointer(
                    CType::named("Node", CKind::Record, Some(8), Some(8), CLocation::source("api.h", 3, 8)),
                    8,
                ),
                offset_of: 0,
                padding_of: 0,
                bit_width: None,
                bit_offset: None,
            }],
            nested_records: vec![],
        }));
        tree.types.insert("Color".into(), color);
        tree
    }

    #[test]
    fn round_trip_is_structurally_equal() {
        let tree = sample_tree();
        let json = to_document(AST_FORMAT, &tree).unwrap();
        let back: CAbstractSyntaxTree = from_document(AST_FORMAT, &json).unwrap();
        assert!(back.structurally_equals(&tree));
        assert_eq!(back, tree);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let json = to_document(AST_FORMAT, &sample_tree()).unwrap();
        let tampered = json.replace("\"GREEN\"", "\"BLUE\"");
        let err = from_document::<CAbstractSyntaxTree>(AST_FORMAT, &tampered).unwrap_err();
        assert!(matches!(err, PersistError::IntegrityMismatch { .. }));
    }

    #[test]
    fn wrong_format_is_rejected() {
        let json = to_document("cinterop-bundle", &sample_tree()).unwrap();
        let err = from_document::<CAbstractSyntaxTree>(AST_FORMAT, &json).unwrap_err();
        assert!(matches!(err, PersistError::WrongFormat { .. }));
    }

    #[test]
    fn builtin_locations_are_omitted() {
        let json = to_document(AST_FORMAT, &sample_tree()).unwrap();
        assert!(!json.contains("built-in"));
        assert!(json.contains("\"source\""));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ast").join("x86_64-pc-windows-msvc.json");
        let tree = sample_tree();
        save_tree(&path, &tree).unwrap();
        let loaded = load_tree(&path).unwrap();
        assert!(loaded.structurally_equals(&tree));
    }
}
