//! Module resolution: mapping import strings to project files.
//!
//! A registry of dotted module names is built once per re-index from a
//! directory walk. `resolve` classifies an import as internal (backed by a
//! project file), standard library, or third party. After extraction the
//! resolver rewrites edges that target placeholders once a concrete node
//! for the same qualified name exists.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::common::language_for_path;
use crate::errors::QueryError;
use crate::filter::FileFilter;
use crate::graph::GraphStore;
use crate::ident::{node_id, EXTERNAL_PATH};

/// Source-root prefixes stripped when constructing dotted module names.
const SRC_PREFIXES: &[&str] = &["src", "lib", "python"];

/// Whether a file stem elevates its directory to a module, per language:
/// `__init__.py`, `mod.rs`/`lib.rs`/`main.rs`, `index.js`/`index.ts`.
fn is_package_marker(base: &str, rel_path: &str) -> bool {
    let ext = Path::new(rel_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    match ext {
        "py" => base == "__init__",
        "rs" => matches!(base, "mod" | "lib" | "main"),
        "js" | "jsx" | "ts" | "tsx" => base == "index",
        _ => false,
    }
}

/// Python standard library, top-level module names.
const PYTHON_STDLIB: &[&str] = &[
    "abc", "argparse", "array", "asyncio", "base64", "bisect", "collections", "concurrent",
    "contextlib", "copy", "csv", "ctypes", "dataclasses", "datetime", "decimal", "enum",
    "functools", "glob", "gzip", "hashlib", "heapq", "html", "http", "importlib", "inspect",
    "io", "itertools", "json", "logging", "math", "multiprocessing", "os", "pathlib", "pickle",
    "platform", "queue", "random", "re", "secrets", "select", "shutil", "signal", "socket",
    "sqlite3", "ssl", "statistics", "string", "struct", "subprocess", "sys", "tempfile",
    "textwrap", "threading", "time", "traceback", "types", "typing", "unicodedata", "unittest",
    "urllib", "uuid", "warnings", "weakref", "xml", "zipfile", "zlib",
];

/// Node.js built-in modules (JavaScript/TypeScript).
const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "crypto",
    "dgram", "dns", "events", "fs", "http", "http2", "https", "module", "net", "os", "path",
    "perf_hooks", "process", "querystring", "readline", "repl", "stream", "string_decoder",
    "timers", "tls", "tty", "url", "util", "v8", "vm", "worker_threads", "zlib",
];

/// Go standard library, first path segment.
const GO_STDLIB: &[&str] = &[
    "archive", "bufio", "bytes", "compress", "container", "context", "crypto", "database",
    "embed", "encoding", "errors", "expvar", "flag", "fmt", "hash", "html", "image", "io",
    "log", "math", "mime", "net", "os", "path", "reflect", "regexp", "runtime", "sort",
    "strconv", "strings", "sync", "syscall", "testing", "text", "time", "unicode", "unsafe",
];

/// Rust sysroot crates.
const RUST_STD: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

/// Classification of an import target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportCategory {
    /// Backed by a project file (project-relative path)
    Internal(String),
    /// Standard library of the importing file's language
    StdLib,
    /// Everything else
    ThirdParty,
}

/// Whether `module` names a standard-library module of `language`.
///
/// Used both at resolution time and at query time when categorising the
/// retained placeholders of a file's imports.
pub fn is_stdlib_module(language: &str, module: &str) -> bool {
    let head = module
        .trim_start_matches("node:")
        .split(['.', ':', '/'])
        .next()
        .unwrap_or("");
    let set: &[&str] = match language {
        "python" => PYTHON_STDLIB,
        "javascript" | "typescript" => NODE_BUILTINS,
        "go" => GO_STDLIB,
        "rust" => RUST_STD,
        _ => return false,
    };
    set.contains(&head)
}

/// Canonical dotted module name for a file path, without a registry.
///
/// Extractors use this to name a file's module node; the registry's
/// [`ModuleResolver::module_for_path`] produces the same string for every
/// registered file, which is what keeps import retargeting ID-stable.
pub fn default_module_name(rel_path: &str) -> String {
    let path = Path::new(rel_path);
    let base = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    let mut parts: Vec<String> = path
        .parent()
        .map(|p| {
            p.components()
                .filter_map(|c| match c {
                    std::path::Component::Normal(n) => Some(n.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if parts
        .first()
        .map(|p| SRC_PREFIXES.contains(&p.as_str()))
        .unwrap_or(false)
    {
        parts.remove(0);
    }

    let name = if is_package_marker(&base, rel_path) {
        parts.join(".")
    } else {
        parts.push(base.clone());
        parts.join(".")
    };

    if name.is_empty() {
        base
    } else {
        name
    }
}

/// Registry mapping dotted module names to project-relative file paths.
pub struct ModuleResolver {
    /// Dotted module name -> project-relative path
    module_map: HashMap<String, String>,
    /// Project-relative path -> canonical dotted module name
    path_to_module: HashMap<String, String>,
    /// All known source paths, for relative-import candidate checks
    known_paths: HashSet<String>,
}

impl ModuleResolver {
    /// Build the registry by walking the project root.
    ///
    /// Applies the same ignore rules as the indexing driver, so ignored
    /// files never become resolvable modules.
    pub fn build(root: &Path, filter: &FileFilter) -> Self {
        let mut paths = Vec::new();
        let walker = walkdir::WalkDir::new(root).follow_links(false);
        let mut it = walker.into_iter();
        while let Some(entry) = it.next() {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.file_type().is_dir() {
                if entry.depth() > 0 && filter.should_skip_dir(entry.path()) {
                    it.skip_current_dir();
                }
                continue;
            }
            if filter.should_skip(entry.path()).is_some() {
                continue;
            }
            paths.push(filter.relative_path(entry.path()));
        }
        Self::from_paths(paths)
    }

    /// Build the registry from an explicit list of project-relative paths.
    pub fn from_paths<I: IntoIterator<Item = String>>(paths: I) -> Self {
        let mut resolver = Self {
            module_map: HashMap::new(),
            path_to_module: HashMap::new(),
            known_paths: HashSet::new(),
        };
        for path in paths {
            resolver.register(&path);
        }
        resolver
    }

    fn register(&mut self, rel_path: &str) {
        if language_for_path(rel_path).is_none() {
            return;
        }
        self.known_paths.insert(rel_path.to_string());

        let path = Path::new(rel_path);
        let base = match path.file_stem().and_then(|s| s.to_str()) {
            Some(b) => b.to_string(),
            None => return,
        };
        let parts: Vec<String> = path
            .parent()
            .map(|p| {
                p.components()
                    .filter_map(|c| match c {
                        std::path::Component::Normal(n) => {
                            Some(n.to_string_lossy().to_string())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        // Absolute mapping plus the src-stripped variant; the canonical
        // name (what module nodes are called) always comes from
        // `default_module_name` so extractor and registry agree.
        self.add_mapping(&parts, &base, rel_path);
        if parts
            .first()
            .map(|p| SRC_PREFIXES.contains(&p.as_str()))
            .unwrap_or(false)
        {
            self.add_mapping(&parts[1..], &base, rel_path);
        }

        let canonical = default_module_name(rel_path);
        if !canonical.is_empty() {
            self.module_map
                .entry(canonical.clone())
                .or_insert_with(|| rel_path.to_string());
            self.path_to_module.insert(rel_path.to_string(), canonical);
        }
    }

    fn add_mapping(&mut self, parts: &[String], base: &str, rel_path: &str) {
        let module_name = if is_package_marker(base, rel_path) {
            parts.join(".")
        } else {
            let mut all: Vec<&str> = parts.iter().map(|s| s.as_str()).collect();
            all.push(base);
            all.join(".")
        };

        if !module_name.is_empty() {
            self.module_map
                .insert(module_name, rel_path.to_string());
        }
    }

    /// Canonical dotted module name for a project file.
    pub fn module_for_path(&self, rel_path: &str) -> Option<&str> {
        self.path_to_module.get(rel_path).map(|s| s.as_str())
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.module_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.module_map.is_empty()
    }

    /// Resolve an import string as written in `from_file`.
    pub fn resolve(&self, import: &str, from_file: &str) -> ImportCategory {
        if import.is_empty() {
            return ImportCategory::ThirdParty;
        }

        let language = language_for_path(from_file).unwrap_or("python");

        if import.contains("::") {
            return self.resolve_rust_path(import, from_file);
        }
        if import.starts_with("./") || import.starts_with("../") {
            return self.resolve_js_relative(import, from_file);
        }
        if import.starts_with('.') {
            return self.resolve_python_relative(import, from_file);
        }

        // Absolute dotted import: registry first, progressively trimming
        // trailing segments so `import a.b.symbol` still finds module a.b.
        let mut candidate = import.trim_start_matches("node:").to_string();
        loop {
            if let Some(path) = self.module_map.get(&candidate) {
                return ImportCategory::Internal(path.clone());
            }
            match candidate.rfind('.') {
                Some(pos) => candidate.truncate(pos),
                None => break,
            }
        }

        if is_stdlib_module(language, import) {
            ImportCategory::StdLib
        } else {
            ImportCategory::ThirdParty
        }
    }

    /// Resolve `crate::`/`super::`/`self::` style paths against the
    /// importing file's module position.
    fn resolve_rust_path(&self, import: &str, from_file: &str) -> ImportCategory {
        let segments: Vec<&str> = import.split("::").filter(|s| !s.is_empty()).collect();
        let Some(&first) = segments.first() else {
            return ImportCategory::ThirdParty;
        };

        if RUST_STD.contains(&first) {
            return ImportCategory::StdLib;
        }

        let current_module: Vec<String> = self
            .module_for_path(from_file)
            .map(|m| m.split('.').map(|s| s.to_string()).collect())
            .unwrap_or_default();

        let resolved: Vec<String> = match first {
            "crate" => segments[1..].iter().map(|s| s.to_string()).collect(),
            "self" => current_module
                .iter()
                .cloned()
                .chain(segments[1..].iter().map(|s| s.to_string()))
                .collect(),
            "super" => {
                let mut base = current_module;
                base.pop();
                base.into_iter()
                    .chain(segments[1..].iter().map(|s| s.to_string()))
                    .collect()
            }
            _ => segments.iter().map(|s| s.to_string()).collect(),
        };

        // Longest registered prefix wins: `crate::store::GraphStore` maps
        // to module `store` even though the final segment names a symbol.
        let mut candidate = resolved;
        while !candidate.is_empty() {
            let name = candidate.join(".");
            if let Some(path) = self.module_map.get(&name) {
                return ImportCategory::Internal(path.clone());
            }
            candidate.pop();
        }

        ImportCategory::ThirdParty
    }

    /// Resolve Python leading-dot relative imports (`.x`, `..y.z`).
    fn resolve_python_relative(&self, import: &str, from_file: &str) -> ImportCategory {
        let dots = import.chars().take_while(|&c| c == '.').count();
        let rest = &import[dots..];

        let mut dir_parts: Vec<String> = Path::new(from_file)
            .parent()
            .map(|p| {
                p.components()
                    .filter_map(|c| match c {
                        std::path::Component::Normal(n) => {
                            Some(n.to_string_lossy().to_string())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        // One dot is the current package; each further dot climbs a level.
        for _ in 1..dots {
            if dir_parts.pop().is_none() {
                return ImportCategory::ThirdParty;
            }
        }

        let mut parts = dir_parts;
        if !rest.is_empty() {
            parts.extend(rest.split('.').map(|s| s.to_string()));
        }

        let joined = parts.join("/");
        let file_candidate = format!("{joined}.py");
        let package_candidate = format!("{joined}/__init__.py");
        for candidate in [file_candidate, package_candidate] {
            if self.known_paths.contains(&candidate) {
                return ImportCategory::Internal(candidate);
            }
        }
        ImportCategory::ThirdParty
    }

    /// Resolve `./x` and `../y` JavaScript/TypeScript imports.
    fn resolve_js_relative(&self, import: &str, from_file: &str) -> ImportCategory {
        let mut parts: Vec<String> = Path::new(from_file)
            .parent()
            .map(|p| {
                p.components()
                    .filter_map(|c| match c {
                        std::path::Component::Normal(n) => {
                            Some(n.to_string_lossy().to_string())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        for segment in import.split('/') {
            match segment {
                "." | "" => {}
                ".." => {
                    if parts.pop().is_none() {
                        return ImportCategory::ThirdParty;
                    }
                }
                name => parts.push(name.to_string()),
            }
        }

        let joined = parts.join("/");
        let exts = ["js", "jsx", "ts", "tsx"];
        if self.known_paths.contains(&joined) {
            return ImportCategory::Internal(joined);
        }
        for ext in exts {
            let candidate = format!("{joined}.{ext}");
            if self.known_paths.contains(&candidate) {
                return ImportCategory::Internal(candidate);
            }
        }
        for ext in exts {
            let candidate = format!("{joined}/index.{ext}");
            if self.known_paths.contains(&candidate) {
                return ImportCategory::Internal(candidate);
            }
        }
        ImportCategory::ThirdParty
    }

    /// Rewrite edges that target placeholders to concrete nodes.
    ///
    /// A placeholder is rewritten when the registry resolves its qualified
    /// name to an indexed module, or when exactly one concrete node carries
    /// the same qualified name. Ambiguous names are left untouched.
    /// Unreferenced placeholders are pruned afterwards.
    ///
    /// # Returns
    /// Number of placeholders rewritten.
    pub fn rewrite_placeholder_edges(&self, store: &GraphStore) -> Result<usize, QueryError> {
        let placeholders = store.nodes_by_file(EXTERNAL_PATH)?;
        let mut rewritten = 0;

        for placeholder in placeholders {
            let target_id = self.concrete_target(store, &placeholder.qualified_name)?;
            if let Some(target_id) = target_id {
                if target_id != placeholder.id {
                    store.retarget_edges(&placeholder.id, &target_id)?;
                    rewritten += 1;
                }
            }
        }

        store.prune_placeholders()?;
        Ok(rewritten)
    }

    fn concrete_target(
        &self,
        store: &GraphStore,
        qualified_name: &str,
    ) -> Result<Option<String>, QueryError> {
        // Module names resolve through the registry.
        if let Some(path) = self.module_map.get(qualified_name) {
            if let Some(canonical) = self.module_for_path(path) {
                let id = node_id(path, canonical);
                if store.get_node(&id)?.is_some() {
                    return Ok(Some(id));
                }
            }
        }

        // Plain symbols resolve only when unambiguous.
        let matches = store.nodes_by_qualified_name(qualified_name)?;
        match matches.len() {
            1 => Ok(Some(matches[0].id.clone())),
            _ => Ok(None),
        }
    }
}
