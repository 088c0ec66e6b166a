//! Path normalisation and validation.
//!
//! Every path stored in the graph is project-relative and forward-slash
//! separated, regardless of host OS. Paths arriving from the watcher or the
//! tool surface are validated against the project root before use.

use std::path::{Path, PathBuf};

/// Error types for path validation.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    /// Path cannot be canonicalized (doesn't exist or permission denied)
    #[error("cannot canonicalize path: {0}")]
    CannotCanonicalize(String),

    /// Resolved path escapes the project root
    #[error("path escapes project root: {0} (root: {1})")]
    OutsideRoot(String, String),
}

/// Normalise a path for storage: project-relative, forward slashes, no
/// drive prefix.
///
/// If the path is not under `root` it is returned with separators
/// normalised only; callers that require containment use
/// [`validate_path_within_root`] first.
pub fn normalize_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = String::new();
    for component in rel.components() {
        if let std::path::Component::Normal(part) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}

/// Canonicalize a path, resolving symlinks, `.` and `..` components.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, PathValidationError> {
    std::fs::canonicalize(path)
        .map_err(|_| PathValidationError::CannotCanonicalize(path.to_string_lossy().to_string()))
}

/// Validate that a path resolves inside the given root directory.
///
/// # Arguments
/// * `path` - Path to validate (must exist)
/// * `root` - Project root directory
///
/// # Returns
/// The canonicalized path if it is contained in the root.
pub fn validate_path_within_root(
    path: &Path,
    root: &Path,
) -> Result<PathBuf, PathValidationError> {
    let canonical_path = canonicalize_path(path)?;
    let canonical_root = canonicalize_path(root)?;

    if !canonical_path.starts_with(&canonical_root) {
        return Err(PathValidationError::OutsideRoot(
            canonical_path.to_string_lossy().to_string(),
            canonical_root.to_string_lossy().to_string(),
        ));
    }

    Ok(canonical_path)
}
