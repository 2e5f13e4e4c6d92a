//! Schema compatibility: fingerprints and evolution modes.

use crate::model::TypeDef;

/// Number of schema hash bytes prefixed to every strict-mode stream.
pub const SCHEMA_HASH_LEN: usize = 8;

/// Compatibility mode, fixed at engine build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Streams carry an 8-byte schema hash prefix; any structural drift in
    /// any reachable kind fails decoding outright.
    #[default]
    Strict,
    /// No hash prefix. Field renames are tolerated; a shorter stream is
    /// accepted when the receiving record declares a matching fallback
    /// arity. Field reordering between same-typed fields is undetectable
    /// and silently swaps values: a documented hazard, not defended.
    Lenient,
}

/// 64-bit structural fingerprint of a user kind, truncated from a 256-bit
/// BLAKE3 digest of its signature: simple name plus ordered field
/// name/descriptor pairs for records, ordered constant names for enums,
/// ordered variant names for unions.
#[must_use]
pub fn fingerprint(def: &TypeDef) -> u64 {
    let digest = blake3::hash(def.signature().as_bytes());
    u64::from_be_bytes(digest.as_bytes()[..SCHEMA_HASH_LEN].try_into().unwrap())
}

/// The stream prefix hash: folds the root shape descriptor and every
/// discovered kind's fingerprint in ordinal order, so drift anywhere in the
/// reachable graph is caught, not just at the root.
#[must_use]
pub fn schema_hash(root_descriptor: &str, fingerprints: &[u64]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(root_descriptor.as_bytes());
    for fp in fingerprints {
        hasher.update(&fp.to_be_bytes());
    }
    u64::from_be_bytes(
        hasher.finalize().as_bytes()[..SCHEMA_HASH_LEN]
            .try_into()
            .unwrap(),
    )
}
