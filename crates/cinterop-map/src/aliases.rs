//! System type alias tables.
//!
//! Operating systems hide their ABI types behind typedef names (`DWORD`,
//! `__time_t`, `HWND`). The tables here say what such a name is in binding
//! terms, per operating system and pointer width. An empty target removes
//! the name: typedefs aliased to nothing are elided in favour of their
//! underlying type.

use std::collections::BTreeMap;

use cinterop_targets::{Bitness, OperatingSystem, TargetPlatform};

use crate::binding::BindingType;
use crate::error::{MapError, Result};

/// Resolved aliases of one platform. `None` marks a removed name.
pub type AliasTable = BTreeMap<String, Option<BindingType>>;

const WINDOWS: &[(&str, &str)] = &[
    ("BOOL", "i32"),
    ("BOOLEAN", "bool"),
    ("BYTE", "u8"),
    ("CCHAR", "u8"),
    ("CHAR", "u8"),
    ("UINT8", "u8"),
    ("UINT16", "u16"),
    ("UINT32", "u32"),
    ("UINT64", "u64"),
    ("DWORD", "u32"),
    ("ULONG", "u32"),
    ("UINT", "u32"),
    ("ULONGLONG", "u64"),
    ("INT8", "i8"),
    ("INT16", "i16"),
    ("INT32", "i32"),
    ("INT64", "i64"),
    ("LONG", "i32"),
    ("INT", "i32"),
    ("LONGLONG", "i64"),
    ("LONG_PTR", "isize"),
    ("ULONG_PTR", "usize"),
    ("UINT_PTR", "usize"),
    ("INT_PTR", "isize"),
    ("LPARAM", "isize"),
    ("WPARAM", "usize"),
    ("LPVOID", "ptr"),
    ("LPINT", "ptr"),
    ("HANDLE", "ptr"),
    ("HINSTANCE", "ptr"),
    ("HWND", "ptr"),
    ("SOCKET", "usize"),
    ("HINSTANCE__", ""),
    ("HWND__", ""),
];

const LINUX: &[(&str, &str)] = &[
    ("__gid_t", "u32"),
    ("__uid_t", "u32"),
    ("__pid_t", "i32"),
    ("__socklen_t", "u32"),
    ("__time_t", "isize"),
];

const DARWIN: &[(&str, &str)] = &[
    ("__uint32_t", "u32"),
    ("__uint16_t", "u16"),
    ("__uint8_t", "u8"),
    ("__int32_t", "i32"),
    ("__darwin_pthread_t", "ptr"),
    ("__darwin_uid_t", "u32"),
    ("__darwin_pid_t", "i32"),
    ("__darwin_gid_t", "u32"),
    ("__darwin_socklen_t", "u32"),
    ("__darwin_time_t", "isize"),
    ("_opaque_pthread_t", ""),
    ("__darwin_pthread_handler_rec", ""),
    ("__darwin_wchar_t", ""),
];

const BITNESSES: [Bitness; 2] = [Bitness::Bits32, Bitness::Bits64];

/// Alias entries keyed by `(operating system, bitness)`, kept in their
/// short form until resolved for a platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemTypeAliases {
    tables: BTreeMap<(OperatingSystem, Bitness), BTreeMap<String, String>>,
}

impl SystemTypeAliases {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The Windows, Linux and Darwin tables.
    pub fn builtin() -> Self {
        let mut aliases = Self::empty();
        for os in OperatingSystem::ALL {
            let entries = match os {
                OperatingSystem::Windows => WINDOWS,
                os if os.is_linux_like() => LINUX,
                os if os.is_apple() => DARWIN,
                _ => continue,
            };
            for bitness in BITNESSES {
                let table = aliases.tables.entry((os, bitness)).or_default();
                for (name, target) in entries {
                    table.insert(name.to_string(), target.to_string());
                }
            }
        }
        aliases
    }

    /// Add or replace one alias. The target is validated immediately.
    pub fn insert(&mut self, os: OperatingSystem, bitness: Bitness, name: &str, target: &str) -> Result<()> {
        BindingType::parse(target, bitness.bits())?;
        self.tables
            .entry((os, bitness))
            .or_default()
            .insert(name.to_string(), target.to_string());
        Ok(())
    }

    /// Apply user entries. Scopes are `<os>` for both pointer widths or
    /// `<os>-<32|64>` for one.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, BTreeMap<String, String>>) -> Result<()> {
        for (scope, entries) in overrides {
            let (os, bitnesses) = parse_scope(scope)?;
            for bitness in bitnesses {
                for (name, target) in entries {
                    self.insert(os, bitness, name, target)?;
                }
            }
        }
        Ok(())
    }

    /// Every alias that applies to `platform`, resolved to binding types.
    pub fn table_for(&self, platform: &TargetPlatform) -> AliasTable {
        let bitness = platform.bitness();
        let Some(entries) = self.tables.get(&(platform.os(), bitness)) else {
            return AliasTable::new();
        };
        entries
            .iter()
            .filter_map(|(name, target)| match BindingType::parse(target, bitness.bits()) {
                Ok(ty) => Some((name.clone(), ty)),
                Err(err) => {
                    log::warn!("ignoring system alias {name}: {err}");
                    None
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_scope(scope: &str) -> Result<(OperatingSystem, Vec<Bitness>)> {
    let invalid = || MapError::InvalidAliasScope {
        scope: scope.to_string(),
    };
    let (os, bits) = match scope.rsplit_once('-') {
        Some((os, bits)) => (os, Some(bits)),
        None => (scope, None),
    };
    let os: OperatingSystem = os.parse().map_err(|_| invalid())?;
    let bitnesses = match bits {
        None => BITNESSES.to_vec(),
        Some(bits) => {
            let bits: u32 = bits.parse().map_err(|_| invalid())?;
            vec![Bitness::try_from(bits).map_err(|_| invalid())?]
        }
    };
    Ok((os, bitnesses))
}
