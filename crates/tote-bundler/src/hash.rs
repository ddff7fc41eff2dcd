//! Content hashing for manifest entries and `[hash]` template tokens.

/// Number of hex characters substituted for `[hash]`.
pub const SHORT_HASH_LEN: usize = 8;

/// BLAKE3 hex digest of `content`.
pub fn content_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// Prefix of a full hex digest used in file names.
pub fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(SHORT_HASH_LEN)]
}
