//! Shared helpers used across extractors and the query layer.

/// Maximum length of a stored signature, in characters.
pub const MAX_SIGNATURE_LEN: usize = 200;

/// Slice a byte buffer with bounds checking.
///
/// Returns `None` instead of panicking when tree-sitter hands back offsets
/// that fall outside the buffer (seen on files that change mid-parse).
pub fn safe_slice(source: &[u8], start: usize, end: usize) -> Option<&[u8]> {
    if start > end || end > source.len() {
        return None;
    }
    Some(&source[start..end])
}

/// Extract the UTF-8 text of a tree-sitter node, empty on failure.
pub fn node_text(node: tree_sitter::Node, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or("").to_string()
}

/// Collapse runs of whitespace (including newlines) into single spaces and
/// cap the result at [`MAX_SIGNATURE_LEN`] characters.
pub fn collapse_signature(raw: &str) -> String {
    let collapsed: String = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_SIGNATURE_LEN {
        collapsed
    } else {
        collapsed.chars().take(MAX_SIGNATURE_LEN).collect()
    }
}

/// Map a file extension to the language name that owns it.
///
/// Returns `None` for extensions no extractor handles; the driver skips
/// those files with a diagnostic.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "py" => Some("python"),
        "js" | "jsx" => Some("javascript"),
        "ts" | "tsx" => Some("typescript"),
        "go" => Some("go"),
        "rs" => Some("rust"),
        "java" => Some("java"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "cxx" | "hpp" => Some("cpp"),
        "cs" => Some("csharp"),
        "rb" => Some("ruby"),
        "php" => Some("php"),
        _ => None,
    }
}

/// Language name for a path, by extension.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())?;
    language_for_extension(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_slice_in_bounds() {
        let buf = b"hello";
        assert_eq!(safe_slice(buf, 1, 3), Some(&b"el"[..]));
    }

    #[test]
    fn safe_slice_out_of_bounds() {
        let buf = b"hi";
        assert_eq!(safe_slice(buf, 0, 5), None);
        assert_eq!(safe_slice(buf, 2, 1), None);
    }

    #[test]
    fn collapse_signature_flattens_whitespace() {
        let raw = "def f(\n    a: int,\n    b: int\n) -> int";
        assert_eq!(collapse_signature(raw), "def f( a: int, b: int ) -> int");
    }

    #[test]
    fn collapse_signature_caps_length() {
        let raw = "x".repeat(500);
        assert_eq!(collapse_signature(&raw).len(), MAX_SIGNATURE_LEN);
    }

    #[test]
    fn language_detection() {
        assert_eq!(language_for_path("src/main.rs"), Some("rust"));
        assert_eq!(language_for_path("a/b.py"), Some("python"));
        assert_eq!(language_for_path("web/app.tsx"), Some("typescript"));
        assert_eq!(language_for_path("pkg/mod.go"), Some("go"));
        assert_eq!(language_for_path("Legacy.cs"), Some("csharp"));
        assert_eq!(language_for_path("README.md"), None);
        assert_eq!(language_for_path("Makefile"), None);
    }
}
