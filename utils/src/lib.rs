//! # faultline Utilities
//!
//! Small helpers shared by the core types and the capture pipeline:
//! content hashing for fingerprints, component id classification and
//! Rust path handling.

use sha2::{Digest, Sha256};

/// Tag value used for components that are known but not registered under a
/// public numeric id.
pub const LOCAL_COMPONENT_ID: &str = "local";

/// Compute SHA-256 hash of content string
///
/// # Examples
///
/// ```
/// use utils::compute_content_hash;
///
/// let hash = compute_content_hash("hello world");
/// assert_eq!(hash.len(), 64);
/// ```
#[must_use]
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Render a registry id as a report tag.
///
/// Ids strictly inside `(0, max)` are published ids and rendered as numbers,
/// anything else belongs to a locally built component.
#[must_use]
pub fn component_id_tag(id: i64, max: i64) -> String {
    if id > 0 && id < max {
        id.to_string()
    } else {
        LOCAL_COMPONENT_ID.to_string()
    }
}

/// First segment of a `::` separated Rust path.
///
/// Leading `<` of trait impl symbols (`<alloc::boxed::Box<F> as Fn>::call`) is
/// ignored. Returns `None` for paths without a separator.
#[must_use]
pub fn root_segment(path: &str) -> Option<&str> {
    let trimmed = path.trim().trim_start_matches('<');
    let (head, _) = trimmed.split_once("::")?;
    if head.is_empty() { None } else { Some(head) }
}
