//! Complete target platform model.
//!
//! A [`TargetPlatform`] is the unit the pipeline iterates over: every header
//! is read, explored and mapped once per platform. Platforms serialize as
//! their target triple.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};
use crate::primitives::PrimitiveLayout;

/// Operating system family of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatingSystem {
    Windows,
    Linux,
    #[serde(rename = "macos")]
    MacOs,
    Ios,
    Android,
    #[serde(rename = "freebsd")]
    FreeBsd,
}

impl OperatingSystem {
    /// Every supported operating system.
    pub const ALL: [OperatingSystem; 6] = [
        OperatingSystem::Windows,
        OperatingSystem::Linux,
        OperatingSystem::MacOs,
        OperatingSystem::Ios,
        OperatingSystem::Android,
        OperatingSystem::FreeBsd,
    ];

    /// Lowercase name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            OperatingSystem::Windows => "windows",
            OperatingSystem::Linux => "linux",
            OperatingSystem::MacOs => "macos",
            OperatingSystem::Ios => "ios",
            OperatingSystem::Android => "android",
            OperatingSystem::FreeBsd => "freebsd",
        }
    }

    /// Whether the OS uses the Darwin system headers.
    pub fn is_apple(&self) -> bool {
        matches!(self, OperatingSystem::MacOs | OperatingSystem::Ios)
    }

    /// Whether the OS uses glibc/bionic style `__*_t` system typedefs.
    pub fn is_linux_like(&self) -> bool {
        matches!(self, OperatingSystem::Linux | OperatingSystem::Android)
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperatingSystem {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        OperatingSystem::ALL
            .into_iter()
            .find(|os| os.name() == lower)
            .or(match lower.as_str() {
                "win32" | "win" => Some(OperatingSystem::Windows),
                "darwin" | "macosx" | "osx" => Some(OperatingSystem::MacOs),
                _ => None,
            })
            .ok_or_else(|| TargetError::UnknownPlatform { name: s.to_string() })
    }
}

/// CPU architecture of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    X86,
    X64,
    Arm32,
    Arm64,
}

impl Architecture {
    /// Pointer width of the architecture.
    pub fn bitness(&self) -> Bitness {
        match self {
            Architecture::X86 | Architecture::Arm32 => Bitness::Bits32,
            Architecture::X64 | Architecture::Arm64 => Bitness::Bits64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Architecture::X86 => "x86",
            Architecture::X64 => "x64",
            Architecture::Arm32 => "arm32",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pointer width of a target. Serializes as the integer `32` or `64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Bitness {
    Bits32,
    Bits64,
}

impl Bitness {
    pub fn bits(&self) -> u32 {
        match self {
            Bitness::Bits32 => 32,
            Bitness::Bits64 => 64,
        }
    }

    /// Pointer size in bytes.
    pub fn pointer_size(&self) -> u64 {
        u64::from(self.bits() / 8)
    }
}

impl TryFrom<u32> for Bitness {
    type Error = TargetError;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            32 => Ok(Bitness::Bits32),
            64 => Ok(Bitness::Bits64),
            other => Err(TargetError::InvalidBitness { bits: other }),
        }
    }
}

impl From<Bitness> for u32 {
    fn from(bitness: Bitness) -> Self {
        bitness.bits()
    }
}

impl fmt::Display for Bitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// C data model: the widths of `int`, `long` and pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataModel {
    /// 32-bit int, long and pointer.
    Ilp32,
    /// 32-bit int, 64-bit long and pointer.
    Lp64,
    /// 32-bit int and long, 64-bit long long and pointer (64-bit Windows).
    Llp64,
}

impl DataModel {
    /// Size of C `long` in bytes.
    pub fn long_size(&self) -> u64 {
        match self {
            DataModel::Lp64 => 8,
            DataModel::Ilp32 | DataModel::Llp64 => 4,
        }
    }

    pub fn pointer_size(&self) -> u64 {
        match self {
            DataModel::Ilp32 => 4,
            DataModel::Lp64 | DataModel::Llp64 => 8,
        }
    }
}

impl fmt::Display for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataModel::Ilp32 => "ILP32",
            DataModel::Lp64 => "LP64",
            DataModel::Llp64 => "LLP64",
        };
        f.write_str(name)
    }
}

/// A target platform identified by its triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetPlatform {
    triple: String,
    arch: Architecture,
    os: OperatingSystem,
}

impl TargetPlatform {
    /// Build a platform from already-known parts.
    pub(crate) fn from_parts(triple: impl Into<String>, arch: Architecture, os: OperatingSystem) -> Self {
        Self {
            triple: triple.into(),
            arch,
            os,
        }
    }

    /// Parse a target triple such as `x86_64-pc-windows-msvc`.
    pub fn parse(triple: &str) -> Result<Self> {
        crate::parse::parse_triple(triple)
    }

    pub fn triple(&self) -> &str {
        &self.triple
    }

    pub fn os(&self) -> OperatingSystem {
        self.os
    }

    pub fn arch(&self) -> Architecture {
        self.arch
    }

    pub fn bitness(&self) -> Bitness {
        self.arch.bitness()
    }

    /// Pointer size in bytes.
    pub fn pointer_size(&self) -> u64 {
        self.bitness().pointer_size()
    }

    /// The C data model in effect on this platform.
    pub fn data_model(&self) -> DataModel {
        match (self.bitness(), self.os) {
            (Bitness::Bits32, _) => DataModel::Ilp32,
            (Bitness::Bits64, OperatingSystem::Windows) => DataModel::Llp64,
            (Bitness::Bits64, _) => DataModel::Lp64,
        }
    }

    /// Size and alignment table for C builtin types on this platform.
    pub fn primitive_layout(&self) -> PrimitiveLayout {
        PrimitiveLayout::for_platform(self)
    }

    /// Macros a C compiler for this platform predefines.
    ///
    /// These seed the preprocessor so that `#ifdef _WIN32` style blocks
    /// select the same branch the platform's own compiler would.
    pub fn predefined_macros(&self) -> Vec<(&'static str, &'static str)> {
        let mut macros = vec![("__STDC__", "1"), ("__STDC_VERSION__", "201112L")];
        match self.os {
            OperatingSystem::Windows => {
                macros.push(("_WIN32", "1"));
                if self.bitness() == Bitness::Bits64 {
                    macros.push(("_WIN64", "1"));
                }
                macros.push(("_MSC_VER", "1930"));
            }
            OperatingSystem::Linux => {
                macros.extend([("__linux__", "1"), ("__linux", "1"), ("__unix__", "1"), ("__gnu_linux__", "1")]);
            }
            OperatingSystem::Android => {
                macros.extend([("__linux__", "1"), ("__unix__", "1"), ("__ANDROID__", "1")]);
            }
            OperatingSystem::MacOs => {
                macros.extend([("__APPLE__", "1"), ("__MACH__", "1"), ("TARGET_OS_OSX", "1")]);
            }
            OperatingSystem::Ios => {
                macros.extend([("__APPLE__", "1"), ("__MACH__", "1"), ("TARGET_OS_IPHONE", "1")]);
            }
            OperatingSystem::FreeBsd => {
                macros.extend([("__FreeBSD__", "1"), ("__unix__", "1")]);
            }
        }
        if self.os != OperatingSystem::Windows {
            macros.push(("__GNUC__", "4"));
        }
        match self.arch {
            Architecture::X86 => macros.extend([("__i386__", "1"), ("_M_IX86", "600")]),
            Architecture::X64 => macros.extend([("__x86_64__", "1"), ("__amd64__", "1"), ("_M_X64", "100")]),
            Architecture::Arm32 => macros.extend([("__arm__", "1"), ("_M_ARM", "7")]),
            Architecture::Arm64 => macros.extend([("__aarch64__", "1"), ("_M_ARM64", "1")]),
        }
        match self.data_model() {
            DataModel::Lp64 => macros.extend([("__LP64__", "1"), ("_LP64", "1")]),
            DataModel::Ilp32 => macros.extend([("__ILP32__", "1"), ("_ILP32", "1")]),
            DataModel::Llp64 => {}
        }
        macros
    }

    /// Generic 64-bit Windows with the MSVC ABI.
    pub fn windows_x64() -> Self {
        Self::from_parts("x86_64-pc-windows-msvc", Architecture::X64, OperatingSystem::Windows)
    }

    pub fn windows_x86() -> Self {
        Self::from_parts("i686-pc-windows-msvc", Architecture::X86, OperatingSystem::Windows)
    }

    pub fn windows_arm64() -> Self {
        Self::from_parts("aarch64-pc-windows-msvc", Architecture::Arm64, OperatingSystem::Windows)
    }

    /// Generic 64-bit Linux with glibc.
    pub fn linux_x64() -> Self {
        Self::from_parts("x86_64-unknown-linux-gnu", Architecture::X64, OperatingSystem::Linux)
    }

    pub fn linux_x86() -> Self {
        Self::from_parts("i686-unknown-linux-gnu", Architecture::X86, OperatingSystem::Linux)
    }

    pub fn linux_arm64() -> Self {
        Self::from_parts("aarch64-unknown-linux-gnu", Architecture::Arm64, OperatingSystem::Linux)
    }

    pub fn linux_arm32() -> Self {
        Self::from_parts("armv7-unknown-linux-gnueabihf", Architecture::Arm32, OperatingSystem::Linux)
    }

    pub fn macos_x64() -> Self {
        Self::from_parts("x86_64-apple-darwin", Architecture::X64, OperatingSystem::MacOs)
    }

    pub fn macos_arm64() -> Self {
        Self::from_parts("aarch64-apple-darwin", Architecture::Arm64, OperatingSystem::MacOs)
    }

    pub fn ios_arm64() -> Self {
        Self::from_parts("aarch64-apple-ios", Architecture::Arm64, OperatingSystem::Ios)
    }

    pub fn android_arm64() -> Self {
        Self::from_parts("aarch64-linux-android", Architecture::Arm64, OperatingSystem::Android)
    }

    pub fn android_arm32() -> Self {
        Self::from_parts("armv7-linux-androideabi", Architecture::Arm32, OperatingSystem::Android)
    }

    pub fn freebsd_x64() -> Self {
        Self::from_parts("x86_64-unknown-freebsd", Architecture::X64, OperatingSystem::FreeBsd)
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.triple)
    }
}

impl FromStr for TargetPlatform {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TargetPlatform {
    type Error = TargetError;

    fn try_from(triple: String) -> Result<Self> {
        Self::parse(&triple)
    }
}

impl From<TargetPlatform> for String {
    fn from(platform: TargetPlatform) -> Self {
        platform.triple
    }
}

/// The platforms the CLI offers out of the box.
pub fn builtin_platforms() -> Vec<TargetPlatform> {
    vec![
        TargetPlatform::windows_x64(),
        TargetPlatform::windows_x86(),
        TargetPlatform::windows_arm64(),
        TargetPlatform::linux_x64(),
        TargetPlatform::linux_x86(),
        TargetPlatform::linux_arm64(),
        TargetPlatform::linux_arm32(),
        TargetPlatform::macos_x64(),
        TargetPlatform::macos_arm64(),
        TargetPlatform::ios_arm64(),
        TargetPlatform::android_arm64(),
        TargetPlatform::android_arm32(),
        TargetPlatform::freebsd_x64(),
    ]
}
