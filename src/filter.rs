//! File filtering for ignore rules and CLI include/exclude globs.
//!
//! Filtering precedence:
//! 1. Hard internal ignores (db files, .git/, node_modules/, the context dir)
//! 2. Project ignore files (.gitignore, .ignore)
//! 3. CLI include patterns (if any provided)
//! 4. CLI exclude patterns
//! 5. Extension dispatch (files no extractor handles are skipped)
//!
//! Matching is on project-relative, forward-slash paths. Same inputs always
//! produce the same decision.

use anyhow::Result;
use ignore::gitignore::Gitignore;
use std::path::{Path, PathBuf};

use crate::common::language_for_path;
use crate::diagnostics::SkipReason;

/// Directories that are always ignored.
const INTERNAL_IGNORE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    "dist",
    "build",
    "target",
    "vibegraph_context",
];

/// File suffixes that are always ignored (the store's own files).
const INTERNAL_IGNORE_EXTS: &[&str] = &[
    ".db",
    ".db-journal",
    ".db-wal",
    ".db-shm",
    ".sqlite",
    ".sqlite3",
];

/// Filter configuration for scanning and watching.
pub struct FileFilter {
    /// Root directory for path normalization
    root: PathBuf,
    /// Compiled project ignore rules (.gitignore, .ignore)
    gitignore: Option<Gitignore>,
    /// CLI include patterns (empty = include all)
    include_patterns: Vec<globset::GlobMatcher>,
    /// CLI exclude patterns
    exclude_patterns: Vec<globset::GlobMatcher>,
}

impl FileFilter {
    /// Create a new filter for the given root directory.
    ///
    /// # Arguments
    /// * `root` - Project root for path normalization
    /// * `include_patterns` - Optional include globs (empty = include all)
    /// * `exclude_patterns` - Exclude globs
    pub fn new(
        root: &Path,
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self> {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let gitignore = Self::load_ignore_rules(&root)?;
        let include_patterns = Self::compile_globs(include_patterns)?;
        let exclude_patterns = Self::compile_globs(exclude_patterns)?;

        Ok(Self {
            root,
            gitignore,
            include_patterns,
            exclude_patterns,
        })
    }

    /// Load .gitignore and .ignore rules from the root, if present.
    fn load_ignore_rules(root: &Path) -> Result<Option<Gitignore>> {
        let mut builder = ignore::gitignore::GitignoreBuilder::new(root);

        for name in [".gitignore", ".ignore"] {
            let path = root.join(name);
            if path.exists() {
                if let Some(err) = builder.add(&path) {
                    // Malformed ignore files must not abort indexing
                    tracing::warn!("failed to load {}: {}", name, err);
                }
            }
        }

        Ok(Some(builder.build()?))
    }

    fn compile_globs(patterns: &[String]) -> Result<Vec<globset::GlobMatcher>> {
        let mut matchers = Vec::new();
        for pattern in patterns {
            let glob = globset::Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid glob pattern '{}': {}", pattern, e))?;
            matchers.push(glob.compile_matcher());
        }
        Ok(matchers)
    }

    /// Check whether a path should be skipped, returning the reason if so.
    pub fn should_skip(&self, path: &Path) -> Option<SkipReason> {
        if !path.is_file() {
            return Some(SkipReason::NotAFile);
        }

        if self.is_internal_ignore(path) {
            return Some(SkipReason::IgnoredInternal);
        }

        if let Some(ref gitignore) = self.gitignore {
            let check_path = path.strip_prefix(&self.root).unwrap_or(path);

            if gitignore.matched(check_path, false).is_ignore() {
                return Some(SkipReason::IgnoredByRules);
            }

            // Directory-only patterns ("dist/") match files beneath the
            // directory, so every ancestor has to be consulted too.
            let mut current = check_path.parent();
            while let Some(ancestor) = current {
                if ancestor.as_os_str().is_empty() {
                    break;
                }
                if gitignore.matched(ancestor, true).is_ignore() {
                    return Some(SkipReason::IgnoredByRules);
                }
                current = ancestor.parent();
            }
        }

        let rel = self.relative_path(path);

        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|m| m.is_match(&rel))
        {
            return Some(SkipReason::IgnoredByRules);
        }

        if self.exclude_patterns.iter().any(|m| m.is_match(&rel)) {
            return Some(SkipReason::IgnoredByRules);
        }

        if language_for_path(&rel).is_none() {
            return Some(SkipReason::UnsupportedLanguage);
        }

        None
    }

    /// Check whether a directory should be descended into at all.
    ///
    /// Used by the walker to prune ignored subtrees without statting their
    /// contents.
    pub fn should_skip_dir(&self, path: &Path) -> bool {
        if let Some(name) = path.file_name() {
            let name = name.to_string_lossy();
            if INTERNAL_IGNORE_DIRS.contains(&name.as_ref()) {
                return true;
            }
        }
        if let Some(ref gitignore) = self.gitignore {
            let check_path = path.strip_prefix(&self.root).unwrap_or(path);
            if !check_path.as_os_str().is_empty()
                && gitignore.matched(check_path, true).is_ignore()
            {
                return true;
            }
        }
        false
    }

    fn is_internal_ignore(&self, path: &Path) -> bool {
        if let Some(file_name) = path.file_name() {
            let file_name = file_name.to_string_lossy();
            for ext in INTERNAL_IGNORE_EXTS {
                if file_name.ends_with(ext) {
                    return true;
                }
            }
        }

        if let Ok(rel_path) = path.strip_prefix(&self.root) {
            for component in rel_path.components() {
                if let std::path::Component::Normal(dir) = component {
                    let dir = dir.to_string_lossy();
                    if INTERNAL_IGNORE_DIRS.contains(&dir.as_ref()) {
                        return true;
                    }
                }
            }
        }

        false
    }

    /// Path relative to root, with forward slashes.
    pub fn relative_path(&self, path: &Path) -> String {
        crate::validation::normalize_path(path, &self.root)
    }

    /// Whether a path is one of the store's own files. The watcher excludes
    /// these to avoid a write feedback loop.
    pub fn is_database_file(path: &Path) -> bool {
        let path = path.to_string_lossy().to_lowercase();
        INTERNAL_IGNORE_EXTS.iter().any(|ext| path.ends_with(ext))
    }

    /// Project root this filter normalizes against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn internal_dirs_are_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let filter = FileFilter::new(root, &[], &[]).unwrap();

        for dir in ["node_modules", "__pycache__", "vibegraph_context"] {
            fs::create_dir_all(root.join(dir)).unwrap();
            let file = root.join(dir).join("x.py");
            fs::write(&file, b"x = 1").unwrap();
            assert_eq!(
                filter.should_skip(&file),
                Some(SkipReason::IgnoredInternal),
                "{dir} should be ignored"
            );
        }
    }

    #[test]
    fn database_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let filter = FileFilter::new(root, &[], &[]).unwrap();

        fs::write(root.join("graph.db"), b"x").unwrap();
        assert_eq!(
            filter.should_skip(&root.join("graph.db")),
            Some(SkipReason::IgnoredInternal)
        );
        assert!(FileFilter::is_database_file(Path::new("a/b/graph.sqlite3")));
        assert!(!FileFilter::is_database_file(Path::new("database.rs")));
    }

    #[test]
    fn ignore_file_patterns_apply() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::write(root.join(".gitignore"), "ignored.py\ndist/\n# comment\n").unwrap();
        fs::write(root.join("ignored.py"), b"x = 1").unwrap();
        fs::write(root.join("kept.py"), b"x = 1").unwrap();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("dist/out.py"), b"x = 1").unwrap();

        let filter = FileFilter::new(root, &[], &[]).unwrap();

        assert_eq!(
            filter.should_skip(&root.join("ignored.py")),
            Some(SkipReason::IgnoredByRules)
        );
        assert_eq!(filter.should_skip(&root.join("kept.py")), None);
        assert_eq!(
            filter.should_skip(&root.join("dist/out.py")),
            Some(SkipReason::IgnoredByRules),
            "trailing-slash pattern must match files under the directory"
        );
    }

    #[test]
    fn glob_pattern_in_ignore_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::write(root.join(".gitignore"), "*_generated.py\n").unwrap();
        fs::write(root.join("models_generated.py"), b"x = 1").unwrap();
        fs::write(root.join("models.py"), b"x = 1").unwrap();

        let filter = FileFilter::new(root, &[], &[]).unwrap();
        assert_eq!(
            filter.should_skip(&root.join("models_generated.py")),
            Some(SkipReason::IgnoredByRules)
        );
        assert_eq!(filter.should_skip(&root.join("models.py")), None);
    }

    #[test]
    fn unsupported_extensions_are_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let filter = FileFilter::new(root, &[], &[]).unwrap();

        fs::write(root.join("notes.txt"), b"hello").unwrap();
        fs::write(root.join("main.py"), b"x = 1").unwrap();

        assert_eq!(
            filter.should_skip(&root.join("notes.txt")),
            Some(SkipReason::UnsupportedLanguage)
        );
        assert_eq!(filter.should_skip(&root.join("main.py")), None);
    }

    #[test]
    fn include_and_exclude_globs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("scripts")).unwrap();
        fs::write(root.join("src/lib.py"), b"x = 1").unwrap();
        fs::write(root.join("src/lib_test.py"), b"x = 1").unwrap();
        fs::write(root.join("scripts/run.py"), b"x = 1").unwrap();

        let filter = FileFilter::new(
            root,
            &["src/**".to_string()],
            &["**/*_test.py".to_string()],
        )
        .unwrap();

        assert_eq!(filter.should_skip(&root.join("src/lib.py")), None);
        assert_eq!(
            filter.should_skip(&root.join("src/lib_test.py")),
            Some(SkipReason::IgnoredByRules)
        );
        assert_eq!(
            filter.should_skip(&root.join("scripts/run.py")),
            Some(SkipReason::IgnoredByRules)
        );
    }

    #[test]
    fn directories_are_not_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let filter = FileFilter::new(root, &[], &[]).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        assert_eq!(
            filter.should_skip(&root.join("src")),
            Some(SkipReason::NotAFile)
        );
    }

    #[test]
    fn dir_pruning_matches_internal_and_rules() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join(".gitignore"), "generated/\n").unwrap();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::create_dir_all(root.join("node_modules")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();

        let filter = FileFilter::new(root, &[], &[]).unwrap();
        assert!(filter.should_skip_dir(&root.join("node_modules")));
        assert!(filter.should_skip_dir(&root.join("generated")));
        assert!(!filter.should_skip_dir(&root.join("src")));
    }
}
