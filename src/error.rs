use thiserror::Error;

use crate::tag::Tag;

/// Build-time failures. Any of these means the type graph is ill-formed
/// and no engine can be constructed for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Map keys must flatten to a single scalar or enum leaf.
    #[error("illegal map key `{0}`: keys must be a single scalar or enum leaf")]
    IllegalMapKey(String),
    /// Two structurally distinct kinds resolved to the same fully-qualified name.
    #[error("ordinal collision: two distinct kinds share the name `{0}`")]
    OrdinalCollision(&'static str),
    #[error("unsupported kind `{0}`")]
    UnsupportedKind(String),
    /// The type reaches itself without an intervening union. Union-indirected
    /// recursion (tree shapes) is legal; anything else would never terminate.
    #[error("`{0}` references itself without an intervening union")]
    CyclicNonSumReference(&'static str),
}

/// Encode-time failures. The write cursor is rewound to its pre-call
/// position whenever one of these surfaces from an engine entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("buffer underflow: need {needed} more bytes, {remaining} remaining")]
    Underflow { needed: usize, remaining: usize },
    /// A dynamic value did not match the compiled shape.
    #[error("value mismatch: compiled shape expects {expected}, found {found}")]
    ValueMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Decode-time failures, each carrying the byte position that triggered it.
/// The read cursor is rewound to its pre-call position on error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("input truncated at byte {at}")]
    Truncated { at: usize },
    #[error("tag mismatch at byte {at}: expected {expected:?}, found ordinal {found}")]
    TagMismatch { at: usize, expected: Tag, found: i64 },
    #[error("unknown ordinal {found} at byte {at}")]
    UnknownOrdinal { at: usize, found: i64 },
    #[error("schema hash mismatch: stream has {found:#018x}, engine expects {expected:#018x}")]
    SchemaMismatch { expected: u64, found: u64 },
    #[error("malformed varint at byte {at}")]
    MalformedVarint { at: usize },
    #[error("value out of range at byte {at}")]
    ValueOverflow { at: usize },
    #[error("invalid utf-8 in string at byte {at}")]
    InvalidUtf8 { at: usize },
    #[error("constant index {found} out of range for enum `{type_name}` at byte {at}")]
    ConstantOutOfRange {
        at: usize,
        type_name: &'static str,
        found: i64,
    },
    #[error("component count mismatch for `{type_name}`: stream has {found}, schema has {expected}")]
    ComponentCountMismatch {
        type_name: &'static str,
        expected: usize,
        found: usize,
    },
    /// Lenient mode only: the stream carried fewer components than the
    /// schema and the receiver declared no matching fallback arity.
    #[error("no fallback constructor on `{type_name}` accepting {found} components")]
    NoFallbackConstructor {
        type_name: &'static str,
        found: usize,
    },
    /// A decoded value tree did not match the concrete type it was
    /// converted into.
    #[error("decoded value mismatch: expected {expected}, found {found}")]
    ValueMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
