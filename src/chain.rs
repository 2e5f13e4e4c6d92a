//! Writer/reader/sizer chain compilation.
//!
//! For each analyzed shape the compiler composes three closures, built
//! right-to-left: the innermost leaf first, then each container tag wrapping
//! the accumulated chain. At run time serialization walks the closures only;
//! the single remaining type inspection is the `name -> ordinal` lookup at
//! union dispatch sites.
//!
//! Closures receive the dispatch tables as a call argument rather than
//! capturing them, which is what lets union-recursive kinds (tree shapes)
//! indirect through the ordinal table without reference cycles.

use std::sync::Arc;

use crate::analyze::{Analyzer, TypeShape};
use crate::buf::{Cursor, WriteCursor};
use crate::compat::Mode;
use crate::dispatch::Dispatch;
use crate::error::{AnalysisError, DecodeError, WireError};
use crate::model::{EnumDef, RecordDef, Scalar, TypeDef, TypeExpr, Value};
use crate::tag::Tag;
use crate::varint::varint_len;

pub type Writer =
    Arc<dyn Fn(&Dispatch, &mut WriteCursor<'_>, &Value) -> Result<(), WireError> + Send + Sync>;
pub type Reader = Arc<dyn Fn(&Dispatch, &mut Cursor<'_>) -> Result<Value, DecodeError> + Send + Sync>;
pub type Sizer = Arc<dyn Fn(&Dispatch, &Value) -> Result<usize, WireError> + Send + Sync>;

/// A compiled writer/reader/sizer triple for one shape or kind.
#[derive(Clone)]
pub struct Chain {
    pub writer: Writer,
    pub reader: Reader,
    pub sizer: Sizer,
}

/// Compile the chain for a flattened shape.
pub(crate) fn compile_shape(shape: &TypeShape, dispatch: &Dispatch) -> Result<Chain, AnalysisError> {
    let (chain, consumed) = compile_at(shape, 0, dispatch)?;
    debug_assert_eq!(consumed, shape.len());
    Ok(chain)
}

/// Compile the chain for one discovered kind's top-level shape.
pub(crate) fn compile_kind(
    dispatch: &Dispatch,
    index: usize,
    analyzer: &mut Analyzer,
    mode: Mode,
) -> Result<Chain, AnalysisError> {
    match dispatch.def_at(index).clone() {
        TypeDef::Record(r) => record_chain(dispatch, index, &r, analyzer, mode),
        TypeDef::Enum(e) => Ok(enum_chain(index, &e)),
        TypeDef::Union(_) => Ok(union_chain(dispatch, index)),
    }
}

fn compile_at(
    shape: &TypeShape,
    at: usize,
    dispatch: &Dispatch,
) -> Result<(Chain, usize), AnalysisError> {
    let tag = shape.tag_at(at);
    match tag {
        Tag::Array => {
            let element_tag = shape.tag_at(at + 1);
            let (inner, next) = compile_at(shape, at + 1, dispatch)?;
            Ok((array_chain(element_tag, inner), next))
        }
        Tag::List => {
            let (inner, next) = compile_at(shape, at + 1, dispatch)?;
            Ok((list_chain(inner), next))
        }
        Tag::Optional => {
            let (inner, next) = compile_at(shape, at + 1, dispatch)?;
            Ok((optional_chain(inner), next))
        }
        Tag::Map => {
            let (key, separator) = compile_at(shape, at + 1, dispatch)?;
            debug_assert_eq!(Tag::MapSeparator, shape.tag_at(separator));
            let (value, next) = compile_at(shape, separator + 1, dispatch)?;
            Ok((map_chain(key, value), next))
        }
        Tag::Record | Tag::Enum | Tag::Interface => {
            let TypeExpr::User(user) = shape.type_at(at) else {
                return Err(AnalysisError::UnsupportedKind(
                    shape.type_at(at).descriptor(),
                ));
            };
            let ordinal = dispatch
                .ordinal_of(user.name)
                .expect("kind discovered during analysis");
            Ok((kind_delegate((ordinal - 1) as usize), at + 1))
        }
        _ => {
            let TypeExpr::Scalar(s) = shape.type_at(at) else {
                return Err(AnalysisError::UnsupportedKind(
                    shape.type_at(at).descriptor(),
                ));
            };
            Ok((scalar_chain(*s), at + 1))
        }
    }
}

/// Late-bound delegation to a kind's compiled chain through the dispatch
/// tables. Null handling and ordinal bytes live inside the kind chain.
fn kind_delegate(index: usize) -> Chain {
    Chain {
        writer: Arc::new(move |d, out, v| (d.chain_at(index).writer)(d, out, v)),
        reader: Arc::new(move |d, input| (d.chain_at(index).reader)(d, input)),
        sizer: Arc::new(move |d, v| (d.chain_at(index).sizer)(d, v)),
    }
}

/// Wrap raw scalar codecs into a leaf chain: ordinal byte handling, null
/// short-circuit and value mismatch reporting are shared here.
fn leaf_chain(
    tag: Tag,
    expected: &'static str,
    write: fn(&mut WriteCursor<'_>, &Value) -> Result<bool, WireError>,
    read: fn(&mut Cursor<'_>) -> Result<Value, DecodeError>,
    size: fn(&Value) -> Option<usize>,
) -> Chain {
    let ord = tag.wire_ordinal();
    Chain {
        writer: Arc::new(move |_d, out, v| {
            if v.is_null() {
                return out.write_varint(0);
            }
            out.write_varint(ord)?;
            if write(out, v)? {
                Ok(())
            } else {
                Err(WireError::ValueMismatch {
                    expected,
                    found: v.kind_name(),
                })
            }
        }),
        reader: Arc::new(move |_d, input| {
            let at = input.position();
            let found = input.read_varint()?;
            if found == 0 {
                return Ok(Value::Null);
            }
            if found != ord {
                return Err(DecodeError::TagMismatch {
                    at,
                    expected: tag,
                    found,
                });
            }
            read(input)
        }),
        sizer: Arc::new(move |_d, v| {
            if v.is_null() {
                return Ok(varint_len(0));
            }
            size(v).map(|body| varint_len(ord) + body).ok_or_else(|| {
                WireError::ValueMismatch {
                    expected,
                    found: v.kind_name(),
                }
            })
        }),
    }
}

fn scalar_chain(scalar: Scalar) -> Chain {
    match scalar {
        Scalar::Bool => leaf_chain(
            Tag::Bool,
            "bool",
            |out, v| match v {
                Value::Bool(x) => out.write_u8(u8::from(*x)).map(|()| true),
                _ => Ok(false),
            },
            |input| {
                let at = input.position();
                match input.read_u8()? {
                    0 => Ok(Value::Bool(false)),
                    1 => Ok(Value::Bool(true)),
                    _ => Err(DecodeError::ValueOverflow { at }),
                }
            },
            |v| matches!(v, Value::Bool(_)).then_some(1),
        ),
        Scalar::I8 => leaf_chain(
            Tag::I8,
            "i8",
            |out, v| match v {
                Value::I8(x) => out.write_i8(*x).map(|()| true),
                _ => Ok(false),
            },
            |input| input.read_i8().map(Value::I8),
            |v| matches!(v, Value::I8(_)).then_some(1),
        ),
        Scalar::I16 => leaf_chain(
            Tag::I16,
            "i16",
            |out, v| match v {
                Value::I16(x) => out.write_i16(*x).map(|()| true),
                _ => Ok(false),
            },
            |input| input.read_i16().map(Value::I16),
            |v| matches!(v, Value::I16(_)).then_some(2),
        ),
        Scalar::I32 => leaf_chain(
            Tag::I32,
            "i32",
            |out, v| match v {
                Value::I32(x) => out.write_i32(*x).map(|()| true),
                _ => Ok(false),
            },
            |input| input.read_i32().map(Value::I32),
            |v| matches!(v, Value::I32(_)).then_some(4),
        ),
        Scalar::I64 => leaf_chain(
            Tag::I64,
            "i64",
            |out, v| match v {
                Value::I64(x) => out.write_i64(*x).map(|()| true),
                _ => Ok(false),
            },
            |input| input.read_i64().map(Value::I64),
            |v| matches!(v, Value::I64(_)).then_some(8),
        ),
        Scalar::F32 => leaf_chain(
            Tag::F32,
            "f32",
            |out, v| match v {
                Value::F32(x) => out.write_f32(*x).map(|()| true),
                _ => Ok(false),
            },
            |input| input.read_f32().map(Value::F32),
            |v| matches!(v, Value::F32(_)).then_some(4),
        ),
        Scalar::F64 => leaf_chain(
            Tag::F64,
            "f64",
            |out, v| match v {
                Value::F64(x) => out.write_f64(*x).map(|()| true),
                _ => Ok(false),
            },
            |input| input.read_f64().map(Value::F64),
            |v| matches!(v, Value::F64(_)).then_some(8),
        ),
        Scalar::Char => leaf_chain(
            Tag::Char,
            "char",
            |out, v| match v {
                Value::Char(x) => out.write_u16(*x).map(|()| true),
                _ => Ok(false),
            },
            |input| input.read_u16().map(Value::Char),
            |v| matches!(v, Value::Char(_)).then_some(2),
        ),
        Scalar::Str => leaf_chain(
            Tag::Str,
            "str",
            |out, v| match v {
                Value::Str(s) => {
                    out.write_len(s.len())?;
                    out.write_bytes(s.as_bytes()).map(|()| true)
                }
                _ => Ok(false),
            },
            |input| {
                let count = input.read_len()?;
                let at = input.position();
                let bytes = input.read_bytes(count)?;
                match std::str::from_utf8(bytes) {
                    Ok(s) => Ok(Value::Str(s.to_owned())),
                    Err(_) => Err(DecodeError::InvalidUtf8 { at }),
                }
            },
            |v| match v {
                Value::Str(s) => Some(varint_len(s.len() as i64) + s.len()),
                _ => None,
            },
        ),
        Scalar::Uuid => leaf_chain(
            Tag::Uuid,
            "uuid",
            |out, v| match v {
                Value::Uuid(u) => out.write_u128(u.as_u128()).map(|()| true),
                _ => Ok(false),
            },
            |input| input.read_u128().map(|bits| Value::Uuid(uuid::Uuid::from_u128(bits))),
            |v| matches!(v, Value::Uuid(_)).then_some(16),
        ),
    }
}

fn optional_chain(inner: Chain) -> Chain {
    let ord = Tag::Optional.wire_ordinal();
    let inner_writer = Arc::clone(&inner.writer);
    let inner_reader = Arc::clone(&inner.reader);
    let inner_sizer = Arc::clone(&inner.sizer);
    Chain {
        writer: Arc::new(move |d, out, v| match v {
            Value::Null => out.write_varint(0),
            Value::Optional(None) => {
                out.write_varint(ord)?;
                out.write_u8(0)
            }
            Value::Optional(Some(element)) => {
                out.write_varint(ord)?;
                out.write_u8(1)?;
                inner_writer(d, out, element)
            }
            other => Err(WireError::ValueMismatch {
                expected: "optional",
                found: other.kind_name(),
            }),
        }),
        reader: Arc::new(move |d, input| {
            let at = input.position();
            let found = input.read_varint()?;
            if found == 0 {
                return Ok(Value::Null);
            }
            if found != ord {
                return Err(DecodeError::TagMismatch {
                    at,
                    expected: Tag::Optional,
                    found,
                });
            }
            let presence_at = input.position();
            match input.read_u8()? {
                0 => Ok(Value::Optional(None)),
                1 => Ok(Value::Optional(Some(Box::new(inner_reader(d, input)?)))),
                _ => Err(DecodeError::ValueOverflow { at: presence_at }),
            }
        }),
        sizer: Arc::new(move |d, v| match v {
            Value::Null => Ok(varint_len(0)),
            Value::Optional(None) => Ok(varint_len(ord) + 1),
            Value::Optional(Some(element)) => Ok(varint_len(ord) + 1 + inner_sizer(d, element)?),
            other => Err(WireError::ValueMismatch {
                expected: "optional",
                found: other.kind_name(),
            }),
        }),
    }
}

fn list_chain(inner: Chain) -> Chain {
    let ord = Tag::List.wire_ordinal();
    let inner_writer = Arc::clone(&inner.writer);
    let inner_reader = Arc::clone(&inner.reader);
    let inner_sizer = Arc::clone(&inner.sizer);
    Chain {
        writer: Arc::new(move |d, out, v| match v {
            Value::Null => out.write_varint(0),
            Value::List(items) => {
                out.write_varint(ord)?;
                out.write_len(items.len())?;
                items.iter().try_for_each(|item| inner_writer(d, out, item))
            }
            other => Err(WireError::ValueMismatch {
                expected: "list",
                found: other.kind_name(),
            }),
        }),
        reader: Arc::new(move |d, input| {
            let at = input.position();
            let found = input.read_varint()?;
            if found == 0 {
                return Ok(Value::Null);
            }
            if found != ord {
                return Err(DecodeError::TagMismatch {
                    at,
                    expected: Tag::List,
                    found,
                });
            }
            let len = input.read_len()?;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(inner_reader(d, input)?);
            }
            Ok(Value::List(items))
        }),
        sizer: Arc::new(move |d, v| match v {
            Value::Null => Ok(varint_len(0)),
            Value::List(items) => {
                let mut total = varint_len(ord) + varint_len(items.len() as i64);
                for item in items {
                    total += inner_sizer(d, item)?;
                }
                Ok(total)
            }
            other => Err(WireError::ValueMismatch {
                expected: "list",
                found: other.kind_name(),
            }),
        }),
    }
}

fn map_chain(key: Chain, value: Chain) -> Chain {
    let ord = Tag::Map.wire_ordinal();
    let (kw, kr, ks) = (key.writer, key.reader, key.sizer);
    let (vw, vr, vs) = (value.writer, value.reader, value.sizer);
    Chain {
        writer: Arc::new(move |d, out, v| match v {
            Value::Null => out.write_varint(0),
            Value::Map(entries) => {
                out.write_varint(ord)?;
                out.write_len(entries.len())?;
                entries.iter().try_for_each(|(k, val)| {
                    kw(d, out, k)?;
                    vw(d, out, val)
                })
            }
            other => Err(WireError::ValueMismatch {
                expected: "map",
                found: other.kind_name(),
            }),
        }),
        reader: Arc::new(move |d, input| {
            let at = input.position();
            let found = input.read_varint()?;
            if found == 0 {
                return Ok(Value::Null);
            }
            if found != ord {
                return Err(DecodeError::TagMismatch {
                    at,
                    expected: Tag::Map,
                    found,
                });
            }
            let len = input.read_len()?;
            let mut entries = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                let k = kr(d, input)?;
                let v = vr(d, input)?;
                entries.push((k, v));
            }
            Ok(Value::Map(entries))
        }),
        sizer: Arc::new(move |d, v| match v {
            Value::Null => Ok(varint_len(0)),
            Value::Map(entries) => {
                let mut total = varint_len(ord) + varint_len(entries.len() as i64);
                for (k, val) in entries {
                    total += ks(d, k)?;
                    total += vs(d, val)?;
                }
                Ok(total)
            }
            other => Err(WireError::ValueMismatch {
                expected: "map",
                found: other.kind_name(),
            }),
        }),
    }
}

/// How array elements are laid out after the length varint.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ArrayLayout {
    /// Raw bytes, one per element.
    Bytes,
    /// Booleans bit-packed eight per byte.
    Bits,
    /// 32- or 64-bit integers behind a one-byte fixed/varint selector.
    Packed(IntWidth),
    /// Per-element delegation.
    General,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum IntWidth {
    W32,
    W64,
}

impl IntWidth {
    fn fixed_size(self) -> usize {
        match self {
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }
}

fn layout_for(element_tag: Tag) -> ArrayLayout {
    match element_tag {
        Tag::I8 => ArrayLayout::Bytes,
        Tag::Bool => ArrayLayout::Bits,
        Tag::I32 => ArrayLayout::Packed(IntWidth::W32),
        Tag::I64 => ArrayLayout::Packed(IntWidth::W64),
        _ => ArrayLayout::General,
    }
}

fn int_at(items: &[Value], index: usize, width: IntWidth) -> Result<i64, WireError> {
    match (width, &items[index]) {
        (IntWidth::W32, Value::I32(x)) => Ok(i64::from(*x)),
        (IntWidth::W64, Value::I64(x)) => Ok(*x),
        (_, other) => Err(WireError::ValueMismatch {
            expected: "integer array element",
            found: other.kind_name(),
        }),
    }
}

/// Sample up to 32 leading elements and choose the smaller encoding. Both
/// the writer and the sizer run this, so the selector byte and the payload
/// size always agree.
fn prefer_varint(items: &[Value], width: IntWidth) -> Result<bool, WireError> {
    let sample = items.len().min(32);
    let mut varint_total = 0;
    for i in 0..sample {
        varint_total += varint_len(int_at(items, i, width)?);
    }
    Ok(varint_total < width.fixed_size() * sample)
}

fn array_chain(element_tag: Tag, inner: Chain) -> Chain {
    let ord = Tag::Array.wire_ordinal();
    let layout = layout_for(element_tag);
    let inner_writer = Arc::clone(&inner.writer);
    let inner_reader = Arc::clone(&inner.reader);
    let inner_sizer = Arc::clone(&inner.sizer);

    let writer: Writer = Arc::new(move |d, out, v| {
        let items = match v {
            Value::Null => return out.write_varint(0),
            Value::Array(items) => items,
            other => {
                return Err(WireError::ValueMismatch {
                    expected: "array",
                    found: other.kind_name(),
                });
            }
        };
        out.write_varint(ord)?;
        out.write_len(items.len())?;
        match layout {
            ArrayLayout::Bytes => items.iter().try_for_each(|item| match item {
                Value::I8(x) => out.write_i8(*x),
                other => Err(WireError::ValueMismatch {
                    expected: "i8",
                    found: other.kind_name(),
                }),
            }),
            ArrayLayout::Bits => {
                let mut acc = 0u8;
                for (i, item) in items.iter().enumerate() {
                    let Value::Bool(bit) = item else {
                        return Err(WireError::ValueMismatch {
                            expected: "bool",
                            found: item.kind_name(),
                        });
                    };
                    acc |= u8::from(*bit) << (i % 8);
                    if i % 8 == 7 {
                        out.write_u8(acc)?;
                        acc = 0;
                    }
                }
                if items.len() % 8 != 0 {
                    out.write_u8(acc)?;
                }
                Ok(())
            }
            ArrayLayout::Packed(width) => {
                let varint = prefer_varint(items, width)?;
                out.write_u8(u8::from(varint))?;
                for i in 0..items.len() {
                    let x = int_at(items, i, width)?;
                    if varint {
                        out.write_varint(x)?;
                    } else {
                        match width {
                            IntWidth::W32 => out.write_i32(x as i32)?,
                            IntWidth::W64 => out.write_i64(x)?,
                        }
                    }
                }
                Ok(())
            }
            ArrayLayout::General => {
                items.iter().try_for_each(|item| inner_writer(d, out, item))
            }
        }
    });

    let reader: Reader = Arc::new(move |d, input| {
        let at = input.position();
        let found = input.read_varint()?;
        if found == 0 {
            return Ok(Value::Null);
        }
        if found != ord {
            return Err(DecodeError::TagMismatch {
                at,
                expected: Tag::Array,
                found,
            });
        }
        let len = input.read_len()?;
        match layout {
            ArrayLayout::Bytes => {
                let bytes = input.read_bytes(len)?;
                Ok(Value::Array(bytes.iter().map(|&b| Value::I8(b as i8)).collect()))
            }
            ArrayLayout::Bits => {
                let bytes = input.read_bytes(len.div_ceil(8))?;
                let items = (0..len)
                    .map(|i| Value::Bool((bytes[i / 8] >> (i % 8)) & 1 == 1))
                    .collect();
                Ok(Value::Array(items))
            }
            ArrayLayout::Packed(width) => {
                let selector_at = input.position();
                let varint = match input.read_u8()? {
                    0 => false,
                    1 => true,
                    _ => return Err(DecodeError::ValueOverflow { at: selector_at }),
                };
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    let element_at = input.position();
                    let item = match (width, varint) {
                        (IntWidth::W32, false) => Value::I32(input.read_i32()?),
                        (IntWidth::W64, false) => Value::I64(input.read_i64()?),
                        (IntWidth::W32, true) => {
                            let x = input.read_varint()?;
                            Value::I32(
                                i32::try_from(x)
                                    .map_err(|_| DecodeError::ValueOverflow { at: element_at })?,
                            )
                        }
                        (IntWidth::W64, true) => Value::I64(input.read_varint()?),
                    };
                    items.push(item);
                }
                Ok(Value::Array(items))
            }
            ArrayLayout::General => {
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(inner_reader(d, input)?);
                }
                Ok(Value::Array(items))
            }
        }
    });

    let sizer: Sizer = Arc::new(move |d, v| {
        let items = match v {
            Value::Null => return Ok(varint_len(0)),
            Value::Array(items) => items,
            other => {
                return Err(WireError::ValueMismatch {
                    expected: "array",
                    found: other.kind_name(),
                });
            }
        };
        let header = varint_len(ord) + varint_len(items.len() as i64);
        let body = match layout {
            ArrayLayout::Bytes => items.len(),
            ArrayLayout::Bits => items.len().div_ceil(8),
            ArrayLayout::Packed(width) => {
                let mut body = 1;
                if prefer_varint(items, width)? {
                    for i in 0..items.len() {
                        body += varint_len(int_at(items, i, width)?);
                    }
                } else {
                    body += width.fixed_size() * items.len();
                }
                body
            }
            ArrayLayout::General => {
                let mut body = 0;
                for item in items {
                    body += inner_sizer(d, item)?;
                }
                body
            }
        };
        Ok(header + body)
    });

    Chain { writer, reader, sizer }
}

fn record_chain(
    dispatch: &Dispatch,
    index: usize,
    def: &RecordDef,
    analyzer: &mut Analyzer,
    mode: Mode,
) -> Result<Chain, AnalysisError> {
    let ordinal = index as i64 + 1;
    let name = def.name;
    let arity = def.fields.len();

    let mut compiled = Vec::with_capacity(arity);
    for field in &def.fields {
        let shape = analyzer.shape_of(&field.ty)?;
        compiled.push(compile_shape(&shape, dispatch)?);
    }
    let field_chains: Arc<[Chain]> = compiled.into();
    let field_types: Arc<[TypeExpr]> = def.fields.iter().map(|f| f.ty.clone()).collect();
    let fallback_arities: Arc<[usize]> = def.fallback_arities.clone().into();

    let chains = Arc::clone(&field_chains);
    let writer: Writer = Arc::new(move |d, out, v| {
        if v.is_null() {
            return out.write_varint(0);
        }
        if v.user_name() != Some(name) {
            return Err(WireError::ValueMismatch {
                expected: name,
                found: v.kind_name(),
            });
        }
        out.write_varint(ordinal)?;
        out.write_len(arity)?;
        let accessors = d.accessors_at(index);
        for (chain, accessor) in chains.iter().zip(accessors) {
            let component = accessor(v).ok_or(WireError::ValueMismatch {
                expected: name,
                found: v.kind_name(),
            })?;
            (chain.writer)(d, out, component)?;
        }
        Ok(())
    });

    let chains = Arc::clone(&field_chains);
    let reader: Reader = Arc::new(move |d, input| {
        let at = input.position();
        let found = input.read_varint()?;
        if found == 0 {
            return Ok(Value::Null);
        }
        if found != ordinal {
            return Err(DecodeError::TagMismatch {
                at,
                expected: Tag::Record,
                found,
            });
        }
        let count = input.read_len()?;
        if count != arity {
            if mode == Mode::Strict || count > arity {
                return Err(DecodeError::ComponentCountMismatch {
                    type_name: name,
                    expected: arity,
                    found: count,
                });
            }
            if !fallback_arities.contains(&count) {
                return Err(DecodeError::NoFallbackConstructor {
                    type_name: name,
                    found: count,
                });
            }
        }
        let mut components = Vec::with_capacity(arity);
        for chain in chains.iter().take(count) {
            components.push((chain.reader)(d, input)?);
        }
        // Appended fields absent from an older stream fill with zeros.
        for ty in field_types.iter().skip(count) {
            components.push(Value::zero_of(ty));
        }
        let construct = d.constructor_at(index).expect("record constructor");
        Ok(construct(components))
    });

    let chains = field_chains;
    let sizer: Sizer = Arc::new(move |d, v| {
        if v.is_null() {
            return Ok(varint_len(0));
        }
        if v.user_name() != Some(name) {
            return Err(WireError::ValueMismatch {
                expected: name,
                found: v.kind_name(),
            });
        }
        let mut total = varint_len(ordinal) + varint_len(arity as i64);
        let accessors = d.accessors_at(index);
        for (chain, accessor) in chains.iter().zip(accessors) {
            let component = accessor(v).ok_or(WireError::ValueMismatch {
                expected: name,
                found: v.kind_name(),
            })?;
            total += (chain.sizer)(d, component)?;
        }
        Ok(total)
    });

    Ok(Chain { writer, reader, sizer })
}

fn enum_chain(index: usize, def: &EnumDef) -> Chain {
    let ordinal = index as i64 + 1;
    let name = def.name;
    let constant_count = def.constants.len();

    Chain {
        writer: Arc::new(move |_d, out, v| {
            if v.is_null() {
                return out.write_varint(0);
            }
            match v {
                Value::Enum { name: n, index: i } if *n == name && (*i as usize) < constant_count => {
                    out.write_varint(ordinal)?;
                    out.write_varint(i64::from(*i))
                }
                other => Err(WireError::ValueMismatch {
                    expected: name,
                    found: other.kind_name(),
                }),
            }
        }),
        reader: Arc::new(move |_d, input| {
            let at = input.position();
            let found = input.read_varint()?;
            if found == 0 {
                return Ok(Value::Null);
            }
            if found != ordinal {
                return Err(DecodeError::TagMismatch {
                    at,
                    expected: Tag::Enum,
                    found,
                });
            }
            let index_at = input.position();
            let constant = input.read_varint()?;
            if constant < 0 || constant as usize >= constant_count {
                return Err(DecodeError::ConstantOutOfRange {
                    at: index_at,
                    type_name: name,
                    found: constant,
                });
            }
            Ok(Value::Enum {
                name,
                index: constant as u32,
            })
        }),
        sizer: Arc::new(move |_d, v| {
            if v.is_null() {
                return Ok(varint_len(0));
            }
            match v {
                Value::Enum { name: n, index: i } if *n == name => {
                    Ok(varint_len(ordinal) + varint_len(i64::from(*i)))
                }
                other => Err(WireError::ValueMismatch {
                    expected: name,
                    found: other.kind_name(),
                }),
            }
        }),
    }
}

fn union_chain(dispatch: &Dispatch, index: usize) -> Chain {
    let name = dispatch.name_at(index);
    let permitted: Arc<[i64]> = dispatch
        .variants_at(index)
        .expect("union kind has a variant table")
        .into();

    let resolve = {
        let permitted = Arc::clone(&permitted);
        move |d: &Dispatch, v: &Value| -> Result<usize, WireError> {
            let runtime = v.user_name().ok_or(WireError::ValueMismatch {
                expected: name,
                found: v.kind_name(),
            })?;
            // The one bounded map lookup on the write path.
            let ordinal = d.ordinal_of(runtime).ok_or(WireError::ValueMismatch {
                expected: name,
                found: runtime,
            })?;
            if !permitted.contains(&ordinal) {
                return Err(WireError::ValueMismatch {
                    expected: name,
                    found: runtime,
                });
            }
            Ok((ordinal - 1) as usize)
        }
    };

    let resolve_w = resolve.clone();
    let writer: Writer = Arc::new(move |d, out, v| {
        if v.is_null() {
            return out.write_varint(0);
        }
        let variant = resolve_w(d, v)?;
        (d.chain_at(variant).writer)(d, out, v)
    });

    let reader_permitted = permitted;
    let reader: Reader = Arc::new(move |d, input| {
        let at = input.position();
        let found = input.read_varint()?;
        if found == 0 {
            return Ok(Value::Null);
        }
        let variant = d
            .index_of(found)
            .ok_or(DecodeError::UnknownOrdinal { at, found })?;
        if !reader_permitted.contains(&found) {
            return Err(DecodeError::TagMismatch {
                at,
                expected: Tag::Interface,
                found,
            });
        }
        // The variant chain re-reads its own ordinal.
        input.set_position(at);
        (d.chain_at(variant).reader)(d, input)
    });

    let sizer: Sizer = Arc::new(move |d, v| {
        if v.is_null() {
            return Ok(varint_len(0));
        }
        let variant = resolve(d, v)?;
        (d.chain_at(variant).sizer)(d, v)
    });

    Chain { writer, reader, sizer }
}
