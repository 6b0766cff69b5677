//! Helpers for turning untrusted names into safe filesystem names and for
//! keeping paths out of log lines.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::matching::TextNormalizer;

/// Leaves room under the common 255-byte NAME_MAX for `_<n>` conflict
/// suffixes.
const MAX_FILENAME_BYTES: usize = 200;
const MAX_EXTENSION_BYTES: usize = 16;
const HASH_SUFFIX_CHARS: usize = 8;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

fn is_illegal(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// Produces a storage-safe filename from an attachment's declared name.
///
/// Illegal path characters become `_`, the extension is lower-cased and
/// stripped of illegal characters, and names longer than 200 UTF-8 bytes
/// are cut on a character boundary and given an `_` + 8-hex SHA-256 suffix
/// computed over the untruncated name, so two long names sharing a prefix
/// stay distinct.
pub fn safe_filename(name: &str) -> String {
    let name = name.trim();
    let name = if name.is_empty() { "attachment" } else { name };

    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) => (base, ext),
        None => (name, ""),
    };

    let mut base: String = base.chars().map(|c| if is_illegal(c) { '_' } else { c }).collect();
    if base.trim_matches('.').is_empty() {
        base = "attachment".to_string();
    }
    let ext: String = ext
        .to_lowercase()
        .chars()
        .filter(|c| !is_illegal(*c))
        .collect();

    let full = join_ext(&base, &ext);
    if full.len() <= MAX_FILENAME_BYTES {
        return full;
    }

    let digest = hex::encode(Sha256::digest(full.as_bytes()));
    let suffix = &digest[..HASH_SUFFIX_CHARS];
    let ext = truncate_bytes(&ext, MAX_EXTENSION_BYTES);
    let ext_bytes = ext.len() + usize::from(!ext.is_empty());
    let keep = MAX_FILENAME_BYTES - ext_bytes - HASH_SUFFIX_CHARS - 1;

    join_ext(&format!("{}_{}", truncate_bytes(&base, keep), suffix), ext)
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn join_ext(base: &str, ext: &str) -> String {
    if ext.is_empty() {
        base.to_string()
    } else {
        format!("{}.{}", base, ext)
    }
}

/// Directory name for a job title: normalized text with spaces as `_`.
pub fn job_slug(title: &str) -> String {
    let normalized = TextNormalizer::new().normalize(title);
    let slug: String = normalized
        .chars()
        .map(|c| if c == ' ' || is_illegal(c) { '_' } else { c })
        .collect();
    if slug.trim_matches(|c| c == '.' || c == '_').is_empty() {
        "job".to_string()
    } else {
        slug
    }
}
