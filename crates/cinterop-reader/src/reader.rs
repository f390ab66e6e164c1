//! Entry points: header on disk or source in memory to [`UnitGraph`].

use std::path::{Path, PathBuf};

use cinterop_targets::TargetPlatform;

use crate::error::Result;
use crate::graph::UnitGraph;
use crate::lower::lower;
use crate::preprocess::Preprocessor;

/// Settings for reading one header for one platform.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub platform: TargetPlatform,
    /// Searched, in order, for quoted includes not found next to the
    /// including file.
    pub include_directories: Vec<PathBuf>,
    /// `NAME=VALUE` defines added on top of the platform's predefined macros.
    pub defines: Vec<(String, String)>,
}

impl ReadOptions {
    pub fn new(platform: TargetPlatform) -> Self {
        Self {
            platform,
            include_directories: Vec::new(),
            defines: Vec::new(),
        }
    }

    pub fn with_include_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.include_directories.push(directory.into());
        self
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }
}

/// Read a header and the user headers it includes.
pub fn read_header(path: &Path, options: &ReadOptions) -> Result<UnitGraph> {
    log::info!("reading {} for {}", path.display(), options.platform);
    let files = Preprocessor::new(&options.platform, &options.defines, options.include_directories.clone()).run_file(path)?;
    let graph = lower(&files, options.platform.clone(), &path.to_string_lossy())?;
    log::debug!("{}: {} cursors", path.display(), graph.cursor_count());
    Ok(graph)
}

/// Read header text held in memory. `file_name` is used for locations.
pub fn read_source(source: &str, file_name: &str, options: &ReadOptions) -> Result<UnitGraph> {
    let files = Preprocessor::new(&options.platform, &options.defines, options.include_directories.clone())
        .run_source(file_name, source, None)?;
    lower(&files, options.platform.clone(), file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReadError;
    use crate::unit::{CursorKind, TranslationUnit};

    const HEADER: &str = r#"
#ifndef API_H
#define API_H

#ifdef _WIN32
#  define API __declspec(dllexport)
typedef unsigned long long handle_t;
#else
#  define API __attribute__((visibility("default")))
typedef unsigned long handle_t;
#endif

#define API_VERSION 2

typedef struct Session Session;

API Session* session_open(const char* name, handle_t flags);
API void session_close(Session* session);

#endif
"#;

    #[test]
    fn reads_the_same_header_per_platform() {
        for platform in [TargetPlatform::linux_x64(), TargetPlatform::windows_x64(), TargetPlatform::linux_x86()] {
            let graph = read_source(HEADER, "api.h", &ReadOptions::new(platform.clone())).unwrap();
            assert!(graph.fatal_errors().is_empty());
            let open = graph.find(CursorKind::FunctionDecl, "session_open").unwrap();
            let params = graph.cursor_children(open);
            let flags = graph.cursor_type(params[1]).unwrap();
            let expected = if platform.pointer_size() == 8 { 8 } else { 4 };
            assert_eq!(graph.size_of(graph.canonical_type(flags)), Some(expected), "{platform}");
            assert!(graph.find(CursorKind::MacroDefinition, "API_VERSION").is_some());
            assert!(graph.find(CursorKind::TypedefDecl, "Session").is_some());
        }
    }

    #[test]
    fn reads_headers_from_disk_with_includes() {
        let dir = tempfile::tempdir().unwrap();
        let include = dir.path().join("include");
        std::fs::create_dir(&include).unwrap();
        std::fs::write(include.join("common.h"), "typedef struct Vec2 { float x, y; } Vec2;\n").unwrap();
        std::fs::write(dir.path().join("geometry.h"), "#include \"common.h\"\nfloat vec2_length(Vec2 v);\n").unwrap();

        let options = ReadOptions::new(TargetPlatform::macos_arm64()).with_include_directory(&include);
        let graph = read_header(&dir.path().join("geometry.h"), &options).unwrap();
        let vec2 = graph.find(CursorKind::StructDecl, "Vec2").unwrap();
        let location = graph.cursor_location(vec2);
        assert_eq!(location.file_name(), Some("common.h"));
        assert!(graph.find(CursorKind::FunctionDecl, "vec2_length").is_some());
    }

    #[test]
    fn user_defines_select_branches() {
        let source = "#ifdef WITH_EXTRAS\nvoid extras(void);\n#endif\n";
        let plain = read_source(source, "x.h", &ReadOptions::new(TargetPlatform::linux_x64())).unwrap();
        assert!(plain.find(CursorKind::FunctionDecl, "extras").is_none());
        let options = ReadOptions::new(TargetPlatform::linux_x64()).with_define("WITH_EXTRAS", "1");
        let extended = read_source(source, "x.h", &options).unwrap();
        assert!(extended.find(CursorKind::FunctionDecl, "extras").is_some());
    }

    #[test]
    fn missing_header_is_an_io_error() {
        let options = ReadOptions::new(TargetPlatform::linux_x64());
        let err = read_header(Path::new("/nonexistent/cinterop/missing.h"), &options).unwrap_err();
        assert!(matches!(err, ReadError::Io { .. }));
    }
}
