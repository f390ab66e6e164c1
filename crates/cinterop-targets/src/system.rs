//! Well-known system typedefs and their canonical primitive spelling.
//!
//! Headers routinely refer to `size_t`, `uint32_t` or `DWORD` without the
//! system headers that define them being available. The reader resolves such
//! names through [`system_typedef`], and the explorer collapses the
//! platform-independent ones ([`is_well_known`]) straight to primitives.

use crate::platform::{Bitness, DataModel, OperatingSystem, TargetPlatform};

/// What a system typedef name resolves to on a given platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTypedef {
    /// A builtin spelling such as `unsigned long`.
    Primitive(&'static str),
    /// An untyped pointer (`void *`).
    VoidPointer,
}

/// Fixed-width and size-class names that every platform defines.
const WELL_KNOWN: &[&str] = &[
    "int8_t",
    "uint8_t",
    "int16_t",
    "uint16_t",
    "int32_t",
    "uint32_t",
    "int64_t",
    "uint64_t",
    "intptr_t",
    "uintptr_t",
    "size_t",
    "ssize_t",
    "ptrdiff_t",
    "va_list",
    "__builtin_va_list",
    "__gnuc_va_list",
];

/// Whether a name is a well-known system typedef that should be replaced by
/// its primitive instead of becoming a typedef node.
pub fn is_well_known(name: &str) -> bool {
    WELL_KNOWN.contains(&name)
}

/// Resolve a system typedef name on a platform.
pub fn system_typedef(name: &str, platform: &TargetPlatform) -> Option<SystemTypedef> {
    common_typedef(name, platform)
        .or_else(|| match platform.os() {
            OperatingSystem::Windows => windows_typedef(name, platform.bitness()),
            os if os.is_apple() => darwin_typedef(name),
            os if os.is_linux_like() => glibc_typedef(name),
            _ => None,
        })
        .or_else(|| posix_typedef(name, platform))
}

fn int64(model: DataModel) -> &'static str {
    if model == DataModel::Lp64 {
        "long"
    } else {
        "long long"
    }
}

fn uint64(model: DataModel) -> &'static str {
    if model == DataModel::Lp64 {
        "unsigned long"
    } else {
        "unsigned long long"
    }
}

fn intptr(model: DataModel) -> &'static str {
    match model {
        DataModel::Ilp32 => "int",
        DataModel::Lp64 => "long",
        DataModel::Llp64 => "long long",
    }
}

fn uintptr(model: DataModel) -> &'static str {
    match model {
        DataModel::Ilp32 => "unsigned int",
        DataModel::Lp64 => "unsigned long",
        DataModel::Llp64 => "unsigned long long",
    }
}

fn common_typedef(name: &str, platform: &TargetPlatform) -> Option<SystemTypedef> {
    use SystemTypedef::*;
    let model = platform.data_model();
    let resolved = match name {
        "int8_t" => Primitive("signed char"),
        "uint8_t" => Primitive("unsigned char"),
        "int16_t" => Primitive("short"),
        "uint16_t" => Primitive("unsigned short"),
        "int32_t" => Primitive("int"),
        "uint32_t" => Primitive("unsigned int"),
        "int64_t" => Primitive(int64(model)),
        "uint64_t" => Primitive(uint64(model)),
        "intptr_t" | "ssize_t" | "ptrdiff_t" => Primitive(intptr(model)),
        "uintptr_t" | "size_t" => Primitive(uintptr(model)),
        "va_list" | "__builtin_va_list" | "__gnuc_va_list" => VoidPointer,
        "wchar_t" if platform.os() == OperatingSystem::Windows => Primitive("unsigned short"),
        "wchar_t" => Primitive("int"),
        "time_t" if platform.os() == OperatingSystem::Windows => Primitive("long long"),
        "time_t" => Primitive("long"),
        _ => return None,
    };
    Some(resolved)
}

fn windows_typedef(name: &str, bitness: Bitness) -> Option<SystemTypedef> {
    use SystemTypedef::*;
    let wide = bitness == Bitness::Bits64;
    let resolved = match name {
        "BOOL" | "INT" | "INT32" | "LONG32" | "HRESULT" => Primitive("int"),
        "BOOLEAN" | "BYTE" | "UCHAR" | "UINT8" => Primitive("unsigned char"),
        "CHAR" | "CCHAR" => Primitive("char"),
        "INT8" => Primitive("signed char"),
        "SHORT" | "INT16" => Primitive("short"),
        "WORD" | "USHORT" | "UINT16" | "WCHAR" | "ATOM" => Primitive("unsigned short"),
        "UINT" | "UINT32" | "ULONG32" | "DWORD32" => Primitive("unsigned int"),
        "LONG" => Primitive("long"),
        "DWORD" | "ULONG" => Primitive("unsigned long"),
        "LONGLONG" | "INT64" | "LONG64" => Primitive("long long"),
        "ULONGLONG" | "UINT64" | "ULONG64" | "DWORD64" => Primitive("unsigned long long"),
        "FLOAT" => Primitive("float"),
        "LONG_PTR" | "INT_PTR" | "SSIZE_T" | "LPARAM" | "LRESULT" => {
            Primitive(if wide { "long long" } else { "long" })
        }
        "ULONG_PTR" | "UINT_PTR" | "DWORD_PTR" | "SIZE_T" | "WPARAM" | "SOCKET" => {
            Primitive(if wide { "unsigned long long" } else { "unsigned long" })
        }
        "HANDLE" | "HWND" | "HINSTANCE" | "HMODULE" | "HKEY" | "HDC" | "LPVOID" | "PVOID" | "LPCVOID"
        | "FARPROC" => VoidPointer,
        _ => return None,
    };
    Some(resolved)
}

fn glibc_typedef(name: &str) -> Option<SystemTypedef> {
    use SystemTypedef::*;
    let resolved = match name {
        "__time_t" | "__off_t" | "__suseconds_t" | "__clock_t" | "__ssize_t" | "__blksize_t" => Primitive("long"),
        "__pid_t" | "__int32_t" | "__clockid_t" => Primitive("int"),
        "__uid_t" | "__gid_t" | "__socklen_t" | "__mode_t" | "__uint32_t" | "__useconds_t" => {
            Primitive("unsigned int")
        }
        "__uint8_t" => Primitive("unsigned char"),
        "__int8_t" => Primitive("signed char"),
        "__uint16_t" => Primitive("unsigned short"),
        "__int16_t" => Primitive("short"),
        "__off64_t" | "__int64_t" => Primitive("long long"),
        "__uint64_t" | "__ino64_t" => Primitive("unsigned long long"),
        _ => return None,
    };
    Some(resolved)
}

fn darwin_typedef(name: &str) -> Option<SystemTypedef> {
    use SystemTypedef::*;
    let resolved = match name {
        "__darwin_time_t" | "__darwin_ssize_t" | "__darwin_clock_t" => Primitive("long"),
        "__darwin_size_t" => Primitive("unsigned long"),
        "__darwin_pid_t" | "__int32_t" | "__darwin_suseconds_t" => Primitive("int"),
        "__darwin_uid_t" | "__darwin_gid_t" | "__darwin_socklen_t" | "__uint32_t" | "__darwin_useconds_t" => {
            Primitive("unsigned int")
        }
        "__darwin_mode_t" | "__uint16_t" => Primitive("unsigned short"),
        "__uint8_t" => Primitive("unsigned char"),
        "__int8_t" => Primitive("signed char"),
        "__int16_t" => Primitive("short"),
        "__int64_t" | "__darwin_off_t" => Primitive("long long"),
        "__uint64_t" => Primitive("unsigned long long"),
        "__darwin_va_list" => VoidPointer,
        _ => return None,
    };
    Some(resolved)
}

/// POSIX names shared by every non-Windows libc.
fn posix_typedef(name: &str, platform: &TargetPlatform) -> Option<SystemTypedef> {
    use SystemTypedef::*;
    if platform.os() == OperatingSystem::Windows {
        return None;
    }
    let resolved = match name {
        "pid_t" => Primitive("int"),
        "uid_t" | "gid_t" | "socklen_t" | "useconds_t" => Primitive("unsigned int"),
        "off_t" | "suseconds_t" | "clock_t" => Primitive(if platform.os().is_apple() { "long long" } else { "long" }),
        "mode_t" => Primitive(if platform.os().is_apple() { "unsigned short" } else { "unsigned int" }),
        _ => return None,
    };
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dword_is_unsigned_long_on_windows() {
        let win = TargetPlatform::windows_x64();
        assert_eq!(system_typedef("DWORD", &win), Some(SystemTypedef::Primitive("unsigned long")));
        assert_eq!(system_typedef("DWORD", &TargetPlatform::linux_x64()), None);
    }

    #[test]
    fn time_t_internal_name_on_linux() {
        let linux = TargetPlatform::linux_x64();
        assert_eq!(system_typedef("__time_t", &linux), Some(SystemTypedef::Primitive("long")));
        assert_eq!(system_typedef("__time_t", &TargetPlatform::windows_x64()), None);
    }

    #[test]
    fn size_t_follows_data_model() {
        assert_eq!(
            system_typedef("size_t", &TargetPlatform::windows_x64()),
            Some(SystemTypedef::Primitive("unsigned long long"))
        );
        assert_eq!(
            system_typedef("size_t", &TargetPlatform::linux_x64()),
            Some(SystemTypedef::Primitive("unsigned long"))
        );
        assert_eq!(
            system_typedef("size_t", &TargetPlatform::linux_x86()),
            Some(SystemTypedef::Primitive("unsigned int"))
        );
    }

    #[test]
    fn handles_are_void_pointers() {
        let win = TargetPlatform::windows_x86();
        assert_eq!(system_typedef("HANDLE", &win), Some(SystemTypedef::VoidPointer));
        assert_eq!(
            system_typedef("ULONG_PTR", &win),
            Some(SystemTypedef::Primitive("unsigned long"))
        );
    }

    #[test]
    fn darwin_names() {
        let mac = TargetPlatform::macos_arm64();
        assert_eq!(system_typedef("__darwin_time_t", &mac), Some(SystemTypedef::Primitive("long")));
        assert_eq!(system_typedef("pid_t", &mac), Some(SystemTypedef::Primitive("int")));
    }

    #[test]
    fn well_known_names() {
        assert!(is_well_known("uint32_t"));
        assert!(is_well_known("size_t"));
        assert!(!is_well_known("DWORD"));
        assert!(!is_well_known("MyType"));
    }
}
