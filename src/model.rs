//! Descriptors for user-defined kinds and the dynamic value tree.
//!
//! There is no runtime reflection to lean on, so the meta stage works over
//! descriptors the types supply themselves: a [`TypeExpr`] preserves the full
//! generic structure of a declared type, and a [`UserRef`] carries a fn
//! pointer producing the referenced kind's [`TypeDef`], which is what makes
//! the type graph traversable without a global registry.

use std::fmt;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::error::DecodeError;
use crate::tag::Tag;

/// The closed leaf vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// A single UTF-16 code unit, 2 bytes on the wire.
    Char,
    Str,
    Uuid,
}

impl Scalar {
    #[must_use]
    pub fn tag(self) -> Tag {
        match self {
            Scalar::Bool => Tag::Bool,
            Scalar::I8 => Tag::I8,
            Scalar::I16 => Tag::I16,
            Scalar::I32 => Tag::I32,
            Scalar::I64 => Tag::I64,
            Scalar::F32 => Tag::F32,
            Scalar::F64 => Tag::F64,
            Scalar::Char => Tag::Char,
            Scalar::Str => Tag::Str,
            Scalar::Uuid => Tag::Uuid,
        }
    }

    #[must_use]
    pub fn descriptor(self) -> &'static str {
        match self {
            Scalar::Bool => "bool",
            Scalar::I8 => "i8",
            Scalar::I16 => "i16",
            Scalar::I32 => "i32",
            Scalar::I64 => "i64",
            Scalar::F32 => "f32",
            Scalar::F64 => "f64",
            Scalar::Char => "char",
            Scalar::Str => "str",
            Scalar::Uuid => "uuid",
        }
    }
}

/// Reference to a user-defined kind: a stable fully-qualified name plus a
/// provider for its definition.
#[derive(Clone, Copy)]
pub struct UserRef {
    pub name: &'static str,
    pub def: fn() -> TypeDef,
}

impl UserRef {
    /// The simple (unqualified) name, used in structural signatures.
    #[must_use]
    pub fn simple_name(&self) -> &'static str {
        self.name.rsplit('.').next().unwrap_or(self.name)
    }
}

impl fmt::Debug for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserRef({})", self.name)
    }
}

impl PartialEq for UserRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for UserRef {}

impl Hash for UserRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A declared, generic-preserving type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Scalar(Scalar),
    /// Fixed-length sequence; element type invariant.
    Array(Box<TypeExpr>),
    /// Variable-length sequence; elements dispatch covariantly.
    List(Box<TypeExpr>),
    Optional(Box<TypeExpr>),
    /// Keys must be leaf scalars or enums; values are arbitrary.
    Map(Box<TypeExpr>, Box<TypeExpr>),
    User(UserRef),
}

impl TypeExpr {
    /// Canonical textual form, used for shape memoization and as schema
    /// hash input.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            TypeExpr::Scalar(s) => s.descriptor().to_owned(),
            TypeExpr::Array(e) => format!("array<{}>", e.descriptor()),
            TypeExpr::List(e) => format!("list<{}>", e.descriptor()),
            TypeExpr::Optional(e) => format!("optional<{}>", e.descriptor()),
            TypeExpr::Map(k, v) => format!("map<{},{}>", k.descriptor(), v.descriptor()),
            TypeExpr::User(u) => format!("user:{}", u.name),
        }
    }

    #[must_use]
    pub fn scalar(s: Scalar) -> Self {
        TypeExpr::Scalar(s)
    }

    #[must_use]
    pub fn array(element: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(element))
    }

    #[must_use]
    pub fn list(element: TypeExpr) -> Self {
        TypeExpr::List(Box::new(element))
    }

    #[must_use]
    pub fn optional(element: TypeExpr) -> Self {
        TypeExpr::Optional(Box::new(element))
    }

    #[must_use]
    pub fn map(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::Map(Box::new(key), Box::new(value))
    }

    #[must_use]
    pub fn user(user: UserRef) -> Self {
        TypeExpr::User(user)
    }
}

/// An ordered, named, typed field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: TypeExpr,
}

/// Product kind: constructed once, never mutated, equal iff all fields equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDef {
    pub name: &'static str,
    pub fields: Vec<FieldDef>,
    /// Component counts this record also accepts on decode in lenient mode.
    /// Missing trailing fields fill with their type's zero value.
    pub fallback_arities: Vec<usize>,
}

/// Closed sum kind: a finite, statically-known set of permitted variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionDef {
    pub name: &'static str,
    pub variants: Vec<UserRef>,
}

/// Scalar enumeration with stable declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: &'static str,
    pub constants: Vec<&'static str>,
}

/// Definition of a user kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
    Record(RecordDef),
    Union(UnionDef),
    Enum(EnumDef),
}

impl TypeDef {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TypeDef::Record(r) => r.name,
            TypeDef::Union(u) => u.name,
            TypeDef::Enum(e) => e.name,
        }
    }

    #[must_use]
    pub fn tag(&self) -> Tag {
        match self {
            TypeDef::Record(_) => Tag::Record,
            TypeDef::Union(_) => Tag::Interface,
            TypeDef::Enum(_) => Tag::Enum,
        }
    }

    #[must_use]
    pub fn simple_name(&self) -> &'static str {
        let name = self.name();
        name.rsplit('.').next().unwrap_or(name)
    }

    /// Structural signature: fingerprint input and the basis of ordinal
    /// collision detection.
    #[must_use]
    pub fn signature(&self) -> String {
        match self {
            TypeDef::Record(r) => {
                let fields: Vec<String> = r
                    .fields
                    .iter()
                    .map(|f| format!("{}:{}", f.name, f.ty.descriptor()))
                    .collect();
                format!("record {}({})", self.simple_name(), fields.join(","))
            }
            TypeDef::Union(u) => {
                let variants: Vec<&str> = u.variants.iter().map(|v| v.simple_name()).collect();
                format!("union {}[{}]", self.simple_name(), variants.join("|"))
            }
            TypeDef::Enum(e) => {
                format!("enum {}{{{}}}", self.simple_name(), e.constants.join(","))
            }
        }
    }
}

/// The dynamic value tree flowing through compiled chains.
///
/// Map entries are an ordered pair vector, which makes encoding a
/// deterministic function of the value alone.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(u16),
    Str(String),
    Uuid(Uuid),
    Array(Vec<Value>),
    List(Vec<Value>),
    Optional(Option<Box<Value>>),
    Map(Vec<(Value, Value)>),
    Record {
        name: &'static str,
        fields: Vec<Value>,
    },
    Enum {
        name: &'static str,
        index: u32,
    },
}

impl Value {
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short kind label for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::Str(_) => "str",
            Value::Uuid(_) => "uuid",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Optional(_) => "optional",
            Value::Map(_) => "map",
            Value::Record { name, .. } => name,
            Value::Enum { name, .. } => name,
        }
    }

    /// Name of the user kind this value is an instance of, if any. This is
    /// what union dispatch resolves through the ordinal map.
    #[must_use]
    pub fn user_name(&self) -> Option<&'static str> {
        match self {
            Value::Record { name, .. } | Value::Enum { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The zero value of a declared type, used to fill appended fields when
    /// a lenient decode meets an older, shorter stream.
    #[must_use]
    pub fn zero_of(ty: &TypeExpr) -> Value {
        match ty {
            TypeExpr::Scalar(Scalar::Bool) => Value::Bool(false),
            TypeExpr::Scalar(Scalar::I8) => Value::I8(0),
            TypeExpr::Scalar(Scalar::I16) => Value::I16(0),
            TypeExpr::Scalar(Scalar::I32) => Value::I32(0),
            TypeExpr::Scalar(Scalar::I64) => Value::I64(0),
            TypeExpr::Scalar(Scalar::F32) => Value::F32(0.0),
            TypeExpr::Scalar(Scalar::F64) => Value::F64(0.0),
            TypeExpr::Scalar(Scalar::Char) => Value::Char(0),
            TypeExpr::Scalar(Scalar::Str) => Value::Str(String::new()),
            TypeExpr::Scalar(Scalar::Uuid) => Value::Uuid(Uuid::nil()),
            TypeExpr::Array(_) => Value::Array(Vec::new()),
            TypeExpr::List(_) => Value::List(Vec::new()),
            TypeExpr::Optional(_) => Value::Optional(None),
            TypeExpr::Map(_, _) => Value::Map(Vec::new()),
            TypeExpr::User(_) => Value::Null,
        }
    }
}

/// Static gateway between concrete Rust types and the engine.
///
/// Fixture and application types implement this by hand; `ty()` is the
/// declared root the meta stage analyzes, and the two conversions move
/// instances across the dynamic boundary.
pub trait Reflect: Sized + 'static {
    fn ty() -> TypeExpr;
    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self, DecodeError>;
}

macro_rules! scalar_reflect {
    ($rust:ty, $scalar:ident, $variant:ident) => {
        impl Reflect for $rust {
            fn ty() -> TypeExpr {
                TypeExpr::Scalar(Scalar::$scalar)
            }

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Result<Self, DecodeError> {
                match value {
                    Value::$variant(x) => Ok(x),
                    other => Err(DecodeError::ValueMismatch {
                        expected: stringify!($rust),
                        found: other.kind_name(),
                    }),
                }
            }
        }
    };
}

scalar_reflect!(bool, Bool, Bool);
scalar_reflect!(i8, I8, I8);
scalar_reflect!(i16, I16, I16);
scalar_reflect!(i32, I32, I32);
scalar_reflect!(i64, I64, I64);
scalar_reflect!(f32, F32, F32);
scalar_reflect!(f64, F64, F64);
scalar_reflect!(String, Str, Str);
scalar_reflect!(Uuid, Uuid, Uuid);

impl<T: Reflect> Reflect for Option<T> {
    fn ty() -> TypeExpr {
        TypeExpr::optional(T::ty())
    }

    fn to_value(&self) -> Value {
        Value::Optional(self.as_ref().map(|x| Box::new(x.to_value())))
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null | Value::Optional(None) => Ok(None),
            Value::Optional(Some(inner)) => T::from_value(*inner).map(Some),
            other => Err(DecodeError::ValueMismatch {
                expected: "optional",
                found: other.kind_name(),
            }),
        }
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn ty() -> TypeExpr {
        TypeExpr::list(T::ty())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Reflect::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(DecodeError::ValueMismatch {
                expected: "list",
                found: other.kind_name(),
            }),
        }
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn ty() -> TypeExpr {
        TypeExpr::array(T::ty())
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(Reflect::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Array(items) if items.len() == N => {
                let mut decoded = Vec::with_capacity(N);
                for item in items {
                    decoded.push(T::from_value(item)?);
                }
                decoded.try_into().map_err(|_| DecodeError::ValueMismatch {
                    expected: "array",
                    found: "array",
                })
            }
            other => Err(DecodeError::ValueMismatch {
                expected: "array",
                found: other.kind_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_def() -> TypeDef {
        TypeDef::Enum(EnumDef {
            name: "paint.Color",
            constants: vec!["Red", "Green", "Blue"],
        })
    }

    #[test]
    fn descriptors_nest() {
        let ty = TypeExpr::map(
            TypeExpr::scalar(Scalar::Str),
            TypeExpr::list(TypeExpr::scalar(Scalar::I32)),
        );
        assert_eq!("map<str,list<i32>>", ty.descriptor());
        let user = TypeExpr::user(UserRef {
            name: "paint.Color",
            def: color_def,
        });
        assert_eq!("user:paint.Color", user.descriptor());
    }

    #[test]
    fn signatures_use_simple_names() {
        assert_eq!("enum Color{Red,Green,Blue}", color_def().signature());
        let rec = TypeDef::Record(RecordDef {
            name: "people.Person",
            fields: vec![
                FieldDef {
                    name: "name",
                    ty: TypeExpr::scalar(Scalar::Str),
                },
                FieldDef {
                    name: "age",
                    ty: TypeExpr::scalar(Scalar::I32),
                },
            ],
            fallback_arities: Vec::new(),
        });
        assert_eq!("record Person(name:str,age:i32)", rec.signature());
    }

    #[test]
    fn zero_values() {
        assert_eq!(
            Value::Str(String::new()),
            Value::zero_of(&TypeExpr::scalar(Scalar::Str))
        );
        assert_eq!(
            Value::Optional(None),
            Value::zero_of(&TypeExpr::optional(TypeExpr::scalar(Scalar::I64)))
        );
        let user = TypeExpr::user(UserRef {
            name: "paint.Color",
            def: color_def,
        });
        assert_eq!(Value::Null, Value::zero_of(&user));
    }

    #[test]
    fn reflect_round_trips() {
        let v = vec![1i32, 2, 3];
        assert_eq!(Ok(v.clone()), Vec::<i32>::from_value(v.to_value()));
        let opt: Option<String> = Some("hi".to_owned());
        assert_eq!(Ok(opt.clone()), Option::<String>::from_value(opt.to_value()));
        let arr = [1i8, 2, 3];
        assert_eq!(Ok(arr), <[i8; 3]>::from_value(arr.to_value()));
    }
}
