//! Line-based C preprocessor.
//!
//! The output keeps every line where it was: directives and inactive lines
//! become blank lines, so positions reported by the parser are positions in
//! the original file. Work done here:
//! - conditionals are evaluated against the platform's predefined macros and
//!   the user's defines
//! - object-like and function-like macro definitions are collected
//! - export/attribute macros that expand to nothing useful are removed from
//!   code lines, calling-convention macros are replaced by their keyword
//! - `#include "..."` is followed recursively, each file at most once

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use cinterop_targets::TargetPlatform;

use crate::error::{ReadError, Result};
use crate::eval::{evaluate, tokenize, Symbol};

/// A `#define` seen in a user header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    pub name: String,
    /// `Some` for function-like macros.
    pub parameters: Option<Vec<String>>,
    pub tokens: Vec<String>,
    pub line: u32,
    pub column: u32,
}

impl MacroDefinition {
    pub fn is_function_like(&self) -> bool {
        self.parameters.is_some()
    }
}

/// One preprocessed file, ready for the parser.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
    pub macros: Vec<MacroDefinition>,
}

#[derive(Debug, Clone)]
struct Macro {
    parameters: Option<Vec<String>>,
    tokens: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    active: bool,
    parent_active: bool,
    taken: bool,
}

/// Keywords a macro may expand to and still be substituted into code.
const SPECIFIER_KEYWORDS: &[&str] = &[
    "extern",
    "static",
    "inline",
    "__inline",
    "__forceinline",
    "const",
    "__cdecl",
    "__stdcall",
    "__fastcall",
    "__thiscall",
    "__vectorcall",
];

pub struct Preprocessor {
    defines: HashMap<String, Macro>,
    include_directories: Vec<PathBuf>,
    visited: HashSet<PathBuf>,
    files: Vec<SourceFile>,
}

impl Preprocessor {
    pub fn new(platform: &TargetPlatform, defines: &[(String, String)], include_directories: Vec<PathBuf>) -> Self {
        let mut table = HashMap::new();
        for (name, value) in platform.predefined_macros() {
            table.insert(
                name.to_string(),
                Macro {
                    parameters: None,
                    tokens: tokenize(value),
                },
            );
        }
        for (name, value) in defines {
            table.insert(
                name.clone(),
                Macro {
                    parameters: None,
                    tokens: tokenize(value),
                },
            );
        }
        Self {
            defines: table,
            include_directories,
            visited: HashSet::new(),
            files: Vec::new(),
        }
    }

    /// Preprocess a header and everything it includes. Included files come
    /// before the files that include them.
    pub fn run_file(mut self, path: &Path) -> Result<Vec<SourceFile>> {
        let text = std::fs::read_to_string(path).map_err(|source| ReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.visited.insert(canonical(path));
        let display = path.to_string_lossy().into_owned();
        self.process(&display, path.parent(), &text)?;
        Ok(self.files)
    }

    /// Preprocess in-memory source. Quoted includes resolve against
    /// `base_dir` and the include directories.
    pub fn run_source(mut self, name: &str, text: &str, base_dir: Option<&Path>) -> Result<Vec<SourceFile>> {
        self.process(name, base_dir, text)?;
        Ok(self.files)
    }

    fn symbol(&self, name: &str) -> Option<Symbol> {
        self.defines.get(name).map(|m| match &m.parameters {
            Some(_) => Symbol::FunctionLike,
            None => Symbol::Tokens(m.tokens.clone()),
        })
    }

    fn condition(&self, file: &str, line: u32, expression: &str) -> Result<bool> {
        let lookup = |name: &str| self.symbol(name);
        evaluate(&tokenize(expression), &lookup, true)
            .map(|v| v != 0)
            .map_err(|detail| ReadError::Preprocessor {
                file: file.to_string(),
                line,
                detail,
            })
    }

    fn process(&mut self, file: &str, dir: Option<&Path>, text: &str) -> Result<()> {
        log::debug!("preprocessing {file}");
        let stripped = strip_comments(text);
        let physical: Vec<&str> = stripped.split('\n').collect();
        let mut output: Vec<String> = Vec::with_capacity(physical.len());
        let mut macros = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();

        let mut index = 0;
        while index < physical.len() {
            let start = index;
            let mut logical = physical[index].trim_end_matches('\r').to_string();
            while logical.ends_with('\\') && index + 1 < physical.len() {
                logical.pop();
                index += 1;
                logical.push(' ');
                logical.push_str(physical[index].trim_end_matches('\r'));
            }
            let continued = index - start;
            index += 1;
            let line = start as u32 + 1;
            let active = stack.last().map_or(true, |f| f.active);
            let trimmed = logical.trim_start();

            if let Some(directive) = trimmed.strip_prefix('#') {
                let directive = directive.trim_start();
                let name_len = directive
                    .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                    .unwrap_or(directive.len());
                let (name, rest) = directive.split_at(name_len);
                let rest = rest.trim();
                match name {
                    "if" => {
                        let cond = active && self.condition(file, line, rest)?;
                        stack.push(Frame {
                            active: cond,
                            parent_active: active,
                            taken: cond,
                        });
                    }
                    "ifdef" | "ifndef" => {
                        let defined = self.defines.contains_key(first_identifier(rest));
                        let cond = active && (defined == (name == "ifdef"));
                        stack.push(Frame {
                            active: cond,
                            parent_active: active,
                            taken: cond,
                        });
                    }
                    "elif" => {
                        let frame = *stack.last().ok_or_else(|| unmatched(file, line, "#elif"))?;
                        let cond = frame.parent_active && !frame.taken && self.condition(file, line, rest)?;
                        if let Some(top) = stack.last_mut() {
                            top.active = cond;
                            top.taken |= cond;
                        }
                    }
                    "else" => {
                        let top = stack.last_mut().ok_or_else(|| unmatched(file, line, "#else"))?;
                        top.active = top.parent_active && !top.taken;
                        top.taken = true;
                    }
                    "endif" => {
                        stack.pop().ok_or_else(|| unmatched(file, line, "#endif"))?;
                    }
                    _ if !active => {}
                    "define" => {
                        let column = (logical.len() - rest.len()) as u32 + 1;
                        if let Some((macro_name, definition)) = parse_define(rest) {
                            macros.push(MacroDefinition {
                                name: macro_name.clone(),
                                parameters: definition.parameters.clone(),
                                tokens: definition.tokens.clone(),
                                line,
                                column,
                            });
                            self.defines.insert(macro_name, definition);
                        }
                    }
                    "undef" => {
                        self.defines.remove(first_identifier(rest));
                    }
                    "include" => self.include(file, dir, line, rest)?,
                    "error" => {
                        return Err(ReadError::ErrorDirective {
                            file: file.to_string(),
                            line,
                            message: rest.to_string(),
                        })
                    }
                    "warning" => log::warn!("{file}:{line}: #warning {rest}"),
                    _ => {}
                }
                output.push(String::new());
            } else if active {
                output.push(self.rewrite_code_line(&logical));
            } else {
                output.push(String::new());
            }
            output.extend(std::iter::repeat(String::new()).take(continued));
        }

        if !stack.is_empty() {
            return Err(ReadError::Preprocessor {
                file: file.to_string(),
                line: physical.len() as u32,
                detail: "unterminated conditional directive".to_string(),
            });
        }

        self.files.push(SourceFile {
            path: file.to_string(),
            text: output.join("\n"),
            macros,
        });
        Ok(())
    }

    fn include(&mut self, file: &str, dir: Option<&Path>, line: u32, rest: &str) -> Result<()> {
        let Some(target) = rest.strip_prefix('"').and_then(|r| r.split('"').next()) else {
            log::debug!("{file}:{line}: skipping system include {rest}");
            return Ok(());
        };
        let candidates = dir
            .map(|d| d.join(target))
            .into_iter()
            .chain(self.include_directories.iter().map(|d| d.join(target)));
        let Some(found) = candidates.into_iter().find(|p| p.is_file()) else {
            return Err(ReadError::IncludeNotFound {
                file: file.to_string(),
                line,
                include: target.to_string(),
            });
        };
        if !self.visited.insert(canonical(&found)) {
            log::debug!("{file}:{line}: {} already included", found.display());
            return Ok(());
        }
        let text = std::fs::read_to_string(&found).map_err(|source| ReadError::Io {
            path: found.clone(),
            source,
        })?;
        let display = found.to_string_lossy().into_owned();
        self.process(&display, found.parent(), &text)
    }

    /// Drop export/attribute macros from a code line and substitute
    /// macros that stand for specifier keywords.
    fn rewrite_code_line(&self, line: &str) -> String {
        let mut result = String::with_capacity(line.len());
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '"' || c == '\'' {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(chars.len());
                result.extend(&chars[start..i]);
            } else if c.is_ascii_alphabetic() || c == '_' {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                match self.specifier_expansion(&ident, 0) {
                    Some(expansion) => result.push_str(&expansion),
                    None => result.push_str(&ident),
                }
            } else {
                result.push(c);
                i += 1;
            }
        }
        result
    }

    /// `Some(text)` when `name` is an object-like macro that expands only to
    /// specifier keywords (possibly none) once attribute groups are removed.
    fn specifier_expansion(&self, name: &str, depth: usize) -> Option<String> {
        let definition = self.defines.get(name)?;
        if definition.parameters.is_some() || depth > 8 {
            return None;
        }
        let mut kept = Vec::new();
        for token in strip_attribute_groups(&definition.tokens) {
            if SPECIFIER_KEYWORDS.contains(&token.as_str()) {
                kept.push(token);
            } else if let Some(nested) = self.specifier_expansion(&token, depth + 1) {
                if !nested.is_empty() {
                    kept.push(nested);
                }
            } else {
                return None;
            }
        }
        Some(kept.join(" "))
    }
}

/// Remove `__declspec(...)` and `__attribute__((...))` groups.
fn strip_attribute_groups(tokens: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        if matches!(token, "__declspec" | "__attribute__" | "__attribute") && tokens.get(i + 1).map(String::as_str) == Some("(")
        {
            let mut depth = 0;
            i += 1;
            while i < tokens.len() {
                match tokens[i].as_str() {
                    "(" => depth += 1,
                    ")" => {
                        depth -= 1;
                        if depth == 0 {
                            i += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
        } else {
            out.push(tokens[i].clone());
            i += 1;
        }
    }
    out
}

fn parse_define(rest: &str) -> Option<(String, Macro)> {
    let name = first_identifier(rest);
    if name.is_empty() {
        return None;
    }
    let after = &rest[name.len()..];
    if let Some(params) = after.strip_prefix('(') {
        let close = params.find(')')?;
        let parameters = params[..close]
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let body = &params[close + 1..];
        return Some((
            name.to_string(),
            Macro {
                parameters: Some(parameters),
                tokens: tokenize(body),
            },
        ));
    }
    Some((
        name.to_string(),
        Macro {
            parameters: None,
            tokens: tokenize(after),
        },
    ))
}

fn first_identifier(text: &str) -> &str {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(text.len());
    &text[..end]
}

fn unmatched(file: &str, line: u32, directive: &str) -> ReadError {
    ReadError::Preprocessor {
        file: file.to_string(),
        line,
        detail: format!("{directive} without #if"),
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Replace comments with spaces, keeping newlines so line numbers hold.
fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c && chars[i] != '\n' {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            out.extend(&chars[start..i]);
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            out.push(' ');
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                if chars[i] == '\n' {
                    out.push('\n');
                }
                i += 1;
            }
            i = (i + 2).min(chars.len());
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(platform: TargetPlatform, source: &str) -> SourceFile {
        let mut files = Preprocessor::new(&platform, &[], Vec::new())
            .run_source("test.h", source, None)
            .unwrap();
        files.pop().unwrap()
    }

    #[test]
    fn platform_conditionals_select_branch() {
        let source = "#ifdef _WIN32\ntypedef int handle_t;\n#else\ntypedef long handle_t;\n#endif\n";
        let win = run(TargetPlatform::windows_x64(), source);
        let linux = run(TargetPlatform::linux_x64(), source);
        assert_eq!(win.text.lines().nth(1), Some("typedef int handle_t;"));
        assert_eq!(win.text.lines().nth(3), Some(""));
        assert_eq!(linux.text.lines().nth(1), Some(""));
        assert_eq!(linux.text.lines().nth(3), Some("typedef long handle_t;"));
    }

    #[test]
    fn line_numbers_are_preserved() {
        let source = "/* a\n   comment */\n#define A 1\n#if A > 0 && \\\n    defined(A)\nint x;\n#endif\n";
        let file = run(TargetPlatform::linux_x64(), source);
        let lines: Vec<&str> = file.text.split('\n').collect();
        assert_eq!(lines.len(), source.split('\n').count());
        assert_eq!(lines[5], "int x;");
    }

    #[test]
    fn elif_chain() {
        let source = "#if defined(__APPLE__)\nint a;\n#elif defined(__linux__)\nint b;\n#elif 1\nint c;\n#else\nint d;\n#endif\n";
        let file = run(TargetPlatform::linux_arm64(), source);
        let code: Vec<&str> = file.text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(code, vec!["int b;"]);
    }

    #[test]
    fn nested_inactive_blocks_stay_inactive() {
        let source = "#if 0\n#if 1\nint a;\n#else\nint b;\n#endif\n#endif\nint c;\n";
        let file = run(TargetPlatform::linux_x64(), source);
        let code: Vec<&str> = file.text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(code, vec!["int c;"]);
    }

    #[test]
    fn collects_macros() {
        let source = "#define VERSION 3\n#define MAX(a, b) ((a) > (b) ? (a) : (b))\n#define FLAG\n";
        let file = run(TargetPlatform::linux_x64(), source);
        assert_eq!(file.macros.len(), 3);
        assert_eq!(file.macros[0].name, "VERSION");
        assert_eq!(file.macros[0].tokens, vec!["3"]);
        assert_eq!(file.macros[0].line, 1);
        assert!(file.macros[1].is_function_like());
        assert_eq!(file.macros[1].parameters.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert!(file.macros[2].tokens.is_empty());
    }

    #[test]
    fn export_macros_are_removed() {
        let source = "#define API __declspec(dllexport)\n#define CALL __stdcall\n#define EMPTY\nAPI void CALL f(void);\nEMPTY int g;\n";
        let file = run(TargetPlatform::windows_x64(), source);
        let lines: Vec<&str> = file.text.split('\n').collect();
        assert_eq!(lines[3], " void __stdcall f(void);");
        assert_eq!(lines[4], " int g;");
    }

    #[test]
    fn error_directive_is_fatal_only_when_active() {
        let ok = Preprocessor::new(&TargetPlatform::linux_x64(), &[], Vec::new())
            .run_source("t.h", "#ifdef _WIN32\n#error windows only\n#endif\n", None);
        assert!(ok.is_ok());
        let err = Preprocessor::new(&TargetPlatform::windows_x64(), &[], Vec::new())
            .run_source("t.h", "#ifdef _WIN32\n#error windows only\n#endif\n", None)
            .unwrap_err();
        assert!(matches!(err, ReadError::ErrorDirective { line: 2, .. }));
    }

    #[test]
    fn unterminated_conditional_is_an_error() {
        let err = Preprocessor::new(&TargetPlatform::linux_x64(), &[], Vec::new())
            .run_source("t.h", "#if 1\nint x;\n", None)
            .unwrap_err();
        assert!(matches!(err, ReadError::Preprocessor { .. }));
    }

    #[test]
    fn user_defines_participate() {
        let files = Preprocessor::new(
            &TargetPlatform::linux_x64(),
            &[("ENABLE_EXTRAS".to_string(), "1".to_string())],
            Vec::new(),
        )
        .run_source("t.h", "#if ENABLE_EXTRAS\nint extra;\n#endif\n", None)
        .unwrap();
        assert_eq!(files[0].text.lines().next(), Some(""));
        assert_eq!(files[0].text.lines().nth(1), Some("int extra;"));
    }

    #[test]
    fn quoted_includes_are_followed_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("types.h"), "typedef int my_int;\n").unwrap();
        std::fs::write(
            dir.path().join("api.h"),
            "#include \"types.h\"\n#include \"types.h\"\n#include <stdio.h>\nmy_int f(void);\n",
        )
        .unwrap();
        let files = Preprocessor::new(&TargetPlatform::linux_x64(), &[], Vec::new())
            .run_file(&dir.path().join("api.h"))
            .unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("types.h"));
        assert!(files[1].path.ends_with("api.h"));
    }

    #[test]
    fn missing_quoted_include_is_fatal() {
        let err = Preprocessor::new(&TargetPlatform::linux_x64(), &[], Vec::new())
            .run_source("t.h", "#include \"nope.h\"\n", None)
            .unwrap_err();
        assert!(matches!(err, ReadError::IncludeNotFound { .. }));
    }
}
