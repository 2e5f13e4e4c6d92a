//! Engine construction and the public encode/decode surface.
//!
//! `build` runs the whole meta stage eagerly: analyze the root, discover
//! reachable kinds, erect the dispatch tables, compile every kind chain and
//! the root chain. The resulting engine is immutable and shareable across
//! threads; encode/decode/size touch only the read-only tables and the
//! caller's cursor.

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::analyze::Analyzer;
use crate::buf::{Cursor, WriteCursor};
use crate::chain::{self, Chain};
use crate::compat::{self, Mode, SCHEMA_HASH_LEN};
use crate::discover::discover;
use crate::dispatch::Dispatch;
use crate::error::{AnalysisError, DecodeError, WireError};
use crate::model::{Reflect, TypeExpr, Value};

/// An engine over a dynamic root type, operating on [`Value`] trees.
pub struct RawEngine {
    mode: Mode,
    dispatch: Dispatch,
    root: Chain,
    schema_hash: u64,
}

impl RawEngine {
    /// Analyze, discover, table and compile. Fails on ill-formed type
    /// graphs; a failed build leaves nothing behind.
    pub fn build(root: TypeExpr, mode: Mode) -> Result<Self, AnalysisError> {
        let mut analyzer = Analyzer::new();
        let root_shape = analyzer.shape_of(&root)?;
        let discovery = discover(&root)?;
        let dispatch = Dispatch::from_discovery(&discovery);
        for index in 0..dispatch.len() {
            let kind_chain = chain::compile_kind(&dispatch, index, &mut analyzer, mode)?;
            dispatch.seal_chain(index, kind_chain);
        }
        let root_chain = chain::compile_shape(&root_shape, &dispatch)?;
        let schema_hash = compat::schema_hash(&root.descriptor(), dispatch.fingerprints());
        debug!(
            root = %root.descriptor(),
            kinds = dispatch.len(),
            schema_hash,
            "engine built"
        );
        Ok(Self {
            mode,
            dispatch,
            root: root_chain,
            schema_hash,
        })
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The 8-byte hash prefixed to strict-mode streams.
    #[inline]
    #[must_use]
    pub fn schema_hash(&self) -> u64 {
        self.schema_hash
    }

    #[must_use]
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Exact encoded size of a value, hash prefix included.
    pub fn size_of_value(&self, value: &Value) -> Result<usize, WireError> {
        let body = (self.root.sizer)(&self.dispatch, value)?;
        Ok(match self.mode {
            Mode::Strict => SCHEMA_HASH_LEN + body,
            Mode::Lenient => body,
        })
    }

    /// Encode into the caller's buffer. On success the cursor advances by
    /// exactly [`Self::size_of_value`]; on error it is rewound to where it
    /// was.
    pub fn encode_value(&self, value: &Value, out: &mut WriteCursor<'_>) -> Result<(), WireError> {
        let start = out.position();
        let result = self.encode_inner(value, out);
        if result.is_err() {
            out.set_position(start);
        }
        result
    }

    fn encode_inner(&self, value: &Value, out: &mut WriteCursor<'_>) -> Result<(), WireError> {
        if self.mode == Mode::Strict {
            out.write_u64(self.schema_hash)?;
        }
        (self.root.writer)(&self.dispatch, out, value)
    }

    /// Decode one value. On error the cursor is rewound to where it was;
    /// on success it rests at the end of the consumed value.
    pub fn decode_value(&self, input: &mut Cursor<'_>) -> Result<Value, DecodeError> {
        let start = input.position();
        let result = self.decode_inner(input);
        if result.is_err() {
            input.set_position(start);
        }
        result
    }

    fn decode_inner(&self, input: &mut Cursor<'_>) -> Result<Value, DecodeError> {
        if self.mode == Mode::Strict {
            let found = input.read_u64()?;
            if found != self.schema_hash {
                return Err(DecodeError::SchemaMismatch {
                    expected: self.schema_hash,
                    found,
                });
            }
        }
        (self.root.reader)(&self.dispatch, input)
    }
}

type CacheKey = (TypeId, Mode);

static ENGINES: Lazy<Mutex<HashMap<CacheKey, Arc<RawEngine>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Drop every cached engine. Intended for tests.
pub fn clear_engine_cache() {
    ENGINES.lock().unwrap().clear();
    trace!("engine cache cleared");
}

/// A typed engine over a [`Reflect`] root.
pub struct Engine<T> {
    raw: Arc<RawEngine>,
    _root: PhantomData<fn() -> T>,
}

impl<T> Clone for Engine<T> {
    fn clone(&self) -> Self {
        Self {
            raw: Arc::clone(&self.raw),
            _root: PhantomData,
        }
    }
}

impl<T: Reflect> Engine<T> {
    /// Cached build: one engine per root type and mode, process-wide. A
    /// failed build is not cached.
    pub fn of(mode: Mode) -> Result<Self, AnalysisError> {
        let key = (TypeId::of::<T>(), mode);
        let mut cache = ENGINES.lock().unwrap();
        if let Some(raw) = cache.get(&key) {
            trace!(root = std::any::type_name::<T>(), "engine cache hit");
            return Ok(Self::wrap(Arc::clone(raw)));
        }
        let raw = Arc::new(RawEngine::build(T::ty(), mode)?);
        cache.insert(key, Arc::clone(&raw));
        Ok(Self::wrap(raw))
    }

    /// Uncached eager build.
    pub fn build(mode: Mode) -> Result<Self, AnalysisError> {
        Ok(Self::wrap(Arc::new(RawEngine::build(T::ty(), mode)?)))
    }

    fn wrap(raw: Arc<RawEngine>) -> Self {
        Self {
            raw,
            _root: PhantomData,
        }
    }

    /// The shared untyped engine, also usable for [`Value`]-level work.
    #[must_use]
    pub fn raw(&self) -> &Arc<RawEngine> {
        &self.raw
    }

    pub fn size_of(&self, value: &T) -> Result<usize, WireError> {
        self.raw.size_of_value(&value.to_value())
    }

    pub fn encode(&self, value: &T, out: &mut WriteCursor<'_>) -> Result<(), WireError> {
        self.raw.encode_value(&value.to_value(), out)
    }

    /// Encode into a freshly sized buffer.
    pub fn to_bytes(&self, value: &T) -> Result<Vec<u8>, WireError> {
        let dynamic = value.to_value();
        let mut bytes = vec![0u8; self.raw.size_of_value(&dynamic)?];
        let mut out = WriteCursor::new(&mut bytes);
        self.raw.encode_value(&dynamic, &mut out)?;
        Ok(bytes)
    }

    pub fn decode(&self, input: &mut Cursor<'_>) -> Result<T, DecodeError> {
        let start = input.position();
        let dynamic = self.raw.decode_value(input)?;
        match T::from_value(dynamic) {
            Ok(value) => Ok(value),
            Err(err) => {
                input.set_position(start);
                Err(err)
            }
        }
    }

    pub fn from_bytes(&self, bytes: &[u8]) -> Result<T, DecodeError> {
        self.decode(&mut Cursor::new(bytes))
    }
}
