//! Size and alignment of C builtin types per platform.

use serde::{Deserialize, Serialize};

use crate::platform::{Architecture, DataModel, OperatingSystem, TargetPlatform};

/// Size/alignment table for the C builtin types of one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PrimitiveLayout {
    pub data_model: DataModel,
    pub pointer_size: u64,
    /// Alignment of 8-byte scalars (`double`, `long long`) inside records.
    pub wide_scalar_align: u64,
    pub long_double_size: u64,
    pub long_double_align: u64,
    pub wchar_size: u64,
}

impl PrimitiveLayout {
    pub fn for_platform(platform: &TargetPlatform) -> Self {
        let data_model = platform.data_model();
        let os = platform.os();
        let arch = platform.arch();

        // The i386 System V ABI aligns 8-byte scalars to 4 inside records.
        let wide_scalar_align = if arch == Architecture::X86 && os != OperatingSystem::Windows {
            4
        } else {
            8
        };

        let (long_double_size, long_double_align) = match (os, arch) {
            (OperatingSystem::Windows, _) => (8, 8),
            (os, Architecture::Arm64) if os.is_apple() => (8, 8),
            (_, Architecture::X64) | (_, Architecture::Arm64) => (16, 16),
            (_, Architecture::X86) => (12, 4),
            (_, Architecture::Arm32) => (8, 8),
        };

        let wchar_size = if os == OperatingSystem::Windows { 2 } else { 4 };

        Self {
            data_model,
            pointer_size: data_model.pointer_size(),
            wide_scalar_align,
            long_double_size,
            long_double_align,
            wchar_size,
        }
    }

    /// Size and alignment in bytes of a builtin type spelling.
    ///
    /// Spellings are normalized (`unsigned int`, `long long`, `signed char`).
    /// Returns `None` for `void` and for names that are not builtins.
    pub fn size_align(&self, spelling: &str) -> Option<(u64, u64)> {
        let long = self.data_model.long_size();
        let layout = match spelling {
            "_Bool" | "bool" | "char" | "signed char" | "unsigned char" => (1, 1),
            "short" | "unsigned short" => (2, 2),
            "int" | "unsigned int" | "float" => (4, 4),
            "long" | "unsigned long" => (long, long),
            "long long" | "unsigned long long" | "double" => (8, self.wide_scalar_align),
            "long double" => (self.long_double_size, self.long_double_align),
            "wchar_t" => (self.wchar_size, self.wchar_size),
            _ => return None,
        };
        Some(layout)
    }

    /// Whether a builtin spelling is signed. `char` is treated as signed.
    pub fn is_signed(spelling: &str) -> bool {
        !(spelling.starts_with("unsigned") || spelling == "_Bool" || spelling == "bool")
    }

    pub fn is_floating(spelling: &str) -> bool {
        matches!(spelling, "float" | "double" | "long double")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_follows_data_model() {
        let win = TargetPlatform::windows_x64().primitive_layout();
        let linux = TargetPlatform::linux_x64().primitive_layout();
        assert_eq!(win.size_align("unsigned long"), Some((4, 4)));
        assert_eq!(linux.size_align("unsigned long"), Some((8, 8)));
        assert_eq!(win.pointer_size, 8);
    }

    #[test]
    fn i386_sysv_packs_doubles_at_four() {
        let layout = TargetPlatform::linux_x86().primitive_layout();
        assert_eq!(layout.size_align("double"), Some((8, 4)));
        assert_eq!(layout.size_align("long long"), Some((8, 4)));
        let win = TargetPlatform::windows_x86().primitive_layout();
        assert_eq!(win.size_align("double"), Some((8, 8)));
    }

    #[test]
    fn wchar_and_long_double() {
        let win = TargetPlatform::windows_x64().primitive_layout();
        let linux = TargetPlatform::linux_x64().primitive_layout();
        let mac = TargetPlatform::macos_arm64().primitive_layout();
        assert_eq!(win.size_align("wchar_t"), Some((2, 2)));
        assert_eq!(linux.size_align("wchar_t"), Some((4, 4)));
        assert_eq!(linux.size_align("long double"), Some((16, 16)));
        assert_eq!(mac.size_align("long double"), Some((8, 8)));
    }

    #[test]
    fn void_and_unknown_have_no_layout() {
        let layout = TargetPlatform::linux_x64().primitive_layout();
        assert_eq!(layout.size_align("void"), None);
        assert_eq!(layout.size_align("Foo"), None);
    }

    #[test]
    fn signedness() {
        assert!(PrimitiveLayout::is_signed("int"));
        assert!(PrimitiveLayout::is_signed("char"));
        assert!(!PrimitiveLayout::is_signed("unsigned long long"));
        assert!(!PrimitiveLayout::is_signed("_Bool"));
        assert!(PrimitiveLayout::is_floating("double"));
    }
}
