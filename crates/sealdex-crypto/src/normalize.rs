//! Keyword normalization shared by indexing and querying.
//!
//! The index builder and the trapdoor derivation must agree on this
//! transform, otherwise a keyword queried from one client would miss
//! indexes built by another.

/// Lowercases `keyword` and keeps only Unicode letters and digits.
///
/// The empty string is a legal result; its trapdoors match nothing
/// semantically meaningful.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
