//! Per-file indexing diagnostics.
//!
//! Extraction failures never abort a batch; they are recorded here and
//! reported once the batch completes. The watcher reuses the same types for
//! its skip decisions.

use serde::{Deserialize, Serialize};

/// Why a path was skipped during walking or watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Not a regular file (directory, socket, missing)
    NotAFile,
    /// Matched the built-in denylist (.git, node_modules, db files, ...)
    IgnoredInternal,
    /// Matched a project ignore file pattern
    IgnoredByRules,
    /// No extractor registered for the file extension
    UnsupportedLanguage,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotAFile => write!(f, "not a file"),
            SkipReason::IgnoredInternal => write!(f, "ignored (built-in)"),
            SkipReason::IgnoredByRules => write!(f, "ignored (project rules)"),
            SkipReason::UnsupportedLanguage => write!(f, "unsupported language"),
        }
    }
}

/// Pipeline stage where a diagnostic was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticStage {
    Walk,
    Parse,
    Resolve,
    Store,
}

/// A single non-fatal problem observed while indexing one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDiagnostic {
    /// Project-relative path of the offending file
    pub path: String,
    pub stage: DiagnosticStage,
    pub message: String,
}

impl IndexDiagnostic {
    pub fn new(path: impl Into<String>, stage: DiagnosticStage, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stage,
            message: message.into(),
        }
    }

    /// Diagnostic for a file the extractor could not parse at all.
    pub fn parse_failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, DiagnosticStage::Parse, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_display() {
        assert_eq!(SkipReason::NotAFile.to_string(), "not a file");
        assert_eq!(
            SkipReason::UnsupportedLanguage.to_string(),
            "unsupported language"
        );
    }

    #[test]
    fn diagnostic_serializes() {
        let d = IndexDiagnostic::parse_failed("a.py", "empty tree");
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("a.py"));
        assert!(json.contains("Parse"));
    }
}
