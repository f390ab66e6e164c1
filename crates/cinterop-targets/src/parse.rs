//! Target triple parsing.
//!
//! Triples follow the `arch-vendor-os[-env]` convention used by clang and
//! rustc. The vendor may be omitted (`aarch64-linux-android`) and the OS
//! component may carry a version suffix (`arm64-apple-ios14.0`).

use crate::error::{Result, TargetError};
use crate::platform::{Architecture, OperatingSystem, TargetPlatform};

/// Parse a target triple into a [`TargetPlatform`].
pub fn parse_triple(triple: &str) -> Result<TargetPlatform> {
    let trimmed = triple.trim();
    let parts: Vec<&str> = trimmed.split('-').collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid(triple, "expected at least `arch-os`"));
    }

    let arch = parse_arch(parts[0]).ok_or_else(|| invalid(triple, &format!("unknown architecture '{}'", parts[0])))?;
    let os = parse_os(&parts[1..]).ok_or_else(|| invalid(triple, "no recognised operating system component"))?;

    Ok(TargetPlatform::from_parts(trimmed, arch, os))
}

fn parse_arch(component: &str) -> Option<Architecture> {
    let lower = component.to_ascii_lowercase();
    match lower.as_str() {
        "x86_64" | "amd64" | "x64" => Some(Architecture::X64),
        "i386" | "i486" | "i586" | "i686" | "x86" => Some(Architecture::X86),
        "aarch64" | "arm64" | "arm64e" => Some(Architecture::Arm64),
        other if other.starts_with("armv8") => Some(Architecture::Arm64),
        other if other.starts_with("arm") || other.starts_with("thumb") => Some(Architecture::Arm32),
        _ => None,
    }
}

fn parse_os(components: &[&str]) -> Option<OperatingSystem> {
    let lower: Vec<String> = components.iter().map(|c| c.to_ascii_lowercase()).collect();

    // Android triples also name linux, so it has to win.
    if lower.iter().any(|c| c.starts_with("android")) {
        return Some(OperatingSystem::Android);
    }
    lower.iter().find_map(|c| {
        if c.starts_with("windows") || c == "win32" || c == "mingw32" {
            Some(OperatingSystem::Windows)
        } else if c == "linux" {
            Some(OperatingSystem::Linux)
        } else if c.starts_with("darwin") || c.starts_with("macos") {
            Some(OperatingSystem::MacOs)
        } else if c.starts_with("ios") {
            Some(OperatingSystem::Ios)
        } else if c.starts_with("freebsd") {
            Some(OperatingSystem::FreeBsd)
        } else {
            None
        }
    })
}

fn invalid(triple: &str, detail: &str) -> TargetError {
    TargetError::InvalidTriple {
        triple: triple.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Bitness;

    #[test]
    fn parses_common_triples() {
        let cases = [
            ("x86_64-pc-windows-msvc", Architecture::X64, OperatingSystem::Windows),
            ("i686-pc-windows-gnu", Architecture::X86, OperatingSystem::Windows),
            ("x86_64-unknown-linux-gnu", Architecture::X64, OperatingSystem::Linux),
            ("aarch64-apple-darwin", Architecture::Arm64, OperatingSystem::MacOs),
            ("arm64-apple-ios14.0", Architecture::Arm64, OperatingSystem::Ios),
            ("armv7-linux-androideabi", Architecture::Arm32, OperatingSystem::Android),
            ("aarch64-linux-android", Architecture::Arm64, OperatingSystem::Android),
            ("x86_64-unknown-freebsd", Architecture::X64, OperatingSystem::FreeBsd),
            ("x86_64-apple-macosx10.15", Architecture::X64, OperatingSystem::MacOs),
        ];
        for (triple, arch, os) in cases {
            let p = parse_triple(triple).unwrap();
            assert_eq!(p.arch(), arch, "{triple}");
            assert_eq!(p.os(), os, "{triple}");
            assert_eq!(p.triple(), triple);
        }
    }

    #[test]
    fn thumb_is_arm32() {
        let p = parse_triple("thumbv7neon-linux-androideabi").unwrap();
        assert_eq!(p.bitness(), Bitness::Bits32);
    }

    #[test]
    fn rejects_unknown_arch() {
        let err = parse_triple("mips-unknown-linux-gnu").unwrap_err();
        assert!(matches!(err, TargetError::InvalidTriple { .. }));
        assert!(err.to_string().contains("mips"));
    }

    #[test]
    fn rejects_missing_os() {
        assert!(parse_triple("x86_64-unknown-none").is_err());
        assert!(parse_triple("x86_64").is_err());
        assert!(parse_triple("x86_64--linux").is_err());
    }
}
