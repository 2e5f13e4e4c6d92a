//! Ordinal-tagged binary serialization for algebraic data.
//!
//! A build-time meta stage analyzes a declared root type, discovers every
//! reachable user kind, assigns stable ordinals and compiles specialized
//! writer/reader/sizer closure chains. Runtime serialization then walks the
//! compiled chains with no type inspection beyond a single bounded
//! name-to-ordinal lookup at union dispatch sites.
//!
//! On the wire every value is a ZigZag varint ordinal followed by its body:
//! zero is null, negative ordinals are built-in kinds, positive ordinals are
//! user kinds. Fixed-width scalars are big-endian.

/// Shape flattening
pub mod analyze;
mod buf;
/// Writer/reader/sizer chain compilation
pub mod chain;
/// Fingerprints and evolution modes
pub mod compat;
/// Transitive closure over reachable kinds
pub mod discover;
/// Per-kind dispatch tables
pub mod dispatch;
/// Engine construction and entry points
pub mod engine;
pub mod error;
/// Type descriptors and the dynamic value tree
pub mod model;
/// The structural tag vocabulary
pub mod tag;
mod varint;

pub use self::buf::{Cursor, WriteCursor};
pub use self::compat::Mode;
pub use self::engine::{Engine, RawEngine, clear_engine_cache};
pub use self::error::{AnalysisError, DecodeError, WireError};
pub use self::model::{Reflect, TypeExpr, Value};
pub use self::tag::Tag;
pub use self::varint::{unzigzag, varint_len, zigzag};
