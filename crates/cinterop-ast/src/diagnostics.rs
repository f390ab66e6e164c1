//! The diagnostics sink.
//!
//! Recoverable problems are never errors in the `Result` sense: each stage
//! pushes a [`Diagnostic`] and carries on, and the driver decides afterwards
//! whether the accumulated severities should fail the build.

use std::fmt;

use cinterop_targets::TargetPlatform;
use serde::{Deserialize, Serialize};

use crate::location::CLocation;

/// Severity level for diagnostics. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// The header could not be parsed for a platform.
    ParseFailure,
    /// A record field overlaps the next one.
    NegativePadding,
    /// A cursor kind the explorer does not handle.
    UnsupportedCursor,
    /// A type whose canonical kind could not be determined.
    UnclassifiedType,
    /// A declaration resolved from a blocked header.
    BlockedHeader,
    /// An entry point name that matched no declaration.
    MissingEntryPoint,
    /// A declaration missing or diverging across platforms.
    PlatformMismatch,
    /// A rename whose target name is already taken.
    RenameCollision,
    /// A declaration that references an ignored name.
    IgnoredNameReferenced,
    /// An enum value that has no straightforward mapping.
    EnumValueUnsupported,
    /// Platforms disagree on a system type alias.
    AliasDisagreement,
    /// A constant expression the reader could not evaluate.
    UnevaluatedConstant,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::ParseFailure => "parse-failure",
            DiagnosticKind::NegativePadding => "negative-padding",
            DiagnosticKind::UnsupportedCursor => "unsupported-cursor",
            DiagnosticKind::UnclassifiedType => "unclassified-type",
            DiagnosticKind::BlockedHeader => "blocked-header",
            DiagnosticKind::MissingEntryPoint => "missing-entry-point",
            DiagnosticKind::PlatformMismatch => "platform-mismatch",
            DiagnosticKind::RenameCollision => "rename-collision",
            DiagnosticKind::IgnoredNameReferenced => "ignored-name-referenced",
            DiagnosticKind::EnumValueUnsupported => "enum-value-unsupported",
            DiagnosticKind::AliasDisagreement => "alias-disagreement",
            DiagnosticKind::UnevaluatedConstant => "unevaluated-constant",
        };
        f.write_str(name)
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "CLocation::is_synthetic")]
    pub location: CLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<TargetPlatform>,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location: CLocation::BuiltIn,
            platform: None,
        }
    }

    pub fn at(mut self, location: CLocation) -> Self {
        self.location = location;
        self
    }

    pub fn on(mut self, platform: &TargetPlatform) -> Self {
        self.platform = Some(platform.clone());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.severity, self.kind)?;
        if let Some(platform) = &self.platform {
            write!(f, " ({platform})")?;
        }
        if !self.location.is_synthetic() {
            write!(f, " {}", self.location)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Ordered, append-only collection of diagnostics.
///
/// Every push is mirrored to the `log` facade at the matching level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => log::error!("{diagnostic}"),
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Info => log::info!("{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, location: CLocation) {
        self.push(Diagnostic::new(Severity::Error, kind, message).at(location));
    }

    pub fn warning(&mut self, kind: DiagnosticKind, message: impl Into<String>, location: CLocation) {
        self.push(Diagnostic::new(Severity::Warning, kind, message).at(location));
    }

    pub fn info(&mut self, kind: DiagnosticKind, message: impl Into<String>, location: CLocation) {
        self.push(Diagnostic::new(Severity::Info, kind, message).at(location));
    }

    /// Append everything from another sink, preserving its order.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    /// Highest severity seen, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.entries.iter().map(|d| d.severity).max()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
