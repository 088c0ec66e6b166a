//! Content-addressable node identifiers.
//!
//! A node ID is derived from the pair (project-relative file path, qualified
//! name). The same pair always produces the same ID, on every machine, so
//! re-indexing a file upserts by primary key without coordinating sequence
//! numbers, and cross-file edges survive a refresh as long as the symbol
//! still exists.

use sha2::{Digest, Sha256};

/// Synthetic file path for placeholder nodes (unresolved imports, forward
/// references, external packages).
pub const EXTERNAL_PATH: &str = "<external>";

/// Length of a hex node ID.
pub const NODE_ID_LEN: usize = 32;

/// Compute the stable ID for a node.
///
/// # Arguments
/// * `file_path` - Project-relative, forward-slash separated path
/// * `qualified_name` - Dotted path of the symbol within the file
///
/// # Returns
/// 32-char lowercase hex string, deterministic across machines.
pub fn node_id(file_path: &str, qualified_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update(b"::");
    hasher.update(qualified_name.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(NODE_ID_LEN);
    for byte in digest.iter().take(NODE_ID_LEN / 2) {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Compute the ID of a placeholder node for an unresolved name.
pub fn placeholder_id(qualified_name: &str) -> String {
    node_id(EXTERNAL_PATH, qualified_name)
}
