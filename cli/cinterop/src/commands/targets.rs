//! `cinterop targets`: platform listing and description.

use anyhow::{Context, Result};
use cinterop_targets::{builtin_platforms, TargetPlatform};

const PRIMITIVES: &[&str] = &[
    "char",
    "short",
    "int",
    "long",
    "long long",
    "float",
    "double",
    "long double",
    "wchar_t",
];

/// List all built-in platforms.
pub fn list() -> Result<()> {
    println!("Built-in platforms:");
    println!();
    for platform in builtin_platforms() {
        println!(
            "  {:<32} {:<8} {:<6} {}",
            platform.triple(),
            platform.os(),
            platform.arch(),
            platform.data_model()
        );
    }
    println!();
    println!("Use 'cinterop targets describe <triple>' for details.");
    Ok(())
}

/// Describe one platform's C ABI.
pub fn describe(triple: &str) -> Result<()> {
    let platform = TargetPlatform::parse(triple).with_context(|| format!("unknown target '{triple}'"))?;
    print!("{}", describe_text(&platform));
    Ok(())
}

fn describe_text(platform: &TargetPlatform) -> String {
    let mut out = format!("=== Platform: {} ===\n", platform.triple());
    out.push_str(&format!("  OS:           {}\n", platform.os()));
    out.push_str(&format!("  Architecture: {}\n", platform.arch()));
    out.push_str(&format!("  Bitness:      {}\n", platform.bitness().bits()));
    out.push_str(&format!("  Data model:   {}\n", platform.data_model()));
    out.push('\n');

    out.push_str("--- Primitives (size/align) ---\n");
    let layout = platform.primitive_layout();
    for spelling in PRIMITIVES {
        if let Some((size, align)) = layout.size_align(spelling) {
            out.push_str(&format!("  {spelling:<12} {size}/{align}\n"));
        }
    }
    out.push_str(&format!("  {:<12} {}/{}\n", "void*", layout.pointer_size, layout.pointer_size));
    out.push('\n');

    out.push_str("--- Predefined macros ---\n");
    for (name, value) in platform.predefined_macros() {
        out.push_str(&format!("  {name}={value}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_known_target() {
        assert!(describe("x86_64-pc-windows-msvc").is_ok());
        assert!(describe("sparc-sun-solaris").is_err());
    }

    #[test]
    fn description_reflects_data_model() {
        let windows = describe_text(&TargetPlatform::windows_x64());
        assert!(windows.contains("LLP64"));
        assert!(windows.contains("long         4/4"));
        assert!(windows.contains("_WIN64=1"));

        let linux = describe_text(&TargetPlatform::linux_x64());
        assert!(linux.contains("long         8/8"));
        assert!(linux.contains("void*        8/8"));
    }
}
