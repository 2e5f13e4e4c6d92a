//! Flattening declared types into tag/type shapes.
//!
//! A [`TypeShape`] is a depth-first, left-to-right unrolling of a declared
//! type into parallel tag and type sequences: the leftmost tag is always the
//! outermost structure, the rightmost is always a leaf. Maps contribute an
//! explicit separator position between their key and value sub-shapes.
//!
//! `list<optional<array<Person>>>` becomes
//! `[LIST, OPTIONAL, ARRAY, RECORD]`, and `map<str, list<i32>>` becomes
//! `[MAP, STR, MAP_SEPARATOR, LIST, I32]`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AnalysisError;
use crate::model::TypeExpr;
use crate::tag::Tag;

/// Flattened form of a declared type: parallel tag and type sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeShape {
    tags: Vec<Tag>,
    types: Vec<TypeExpr>,
}

impl TypeShape {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn tag_at(&self, index: usize) -> Tag {
        self.tags[index]
    }

    #[inline]
    #[must_use]
    pub fn type_at(&self, index: usize) -> &TypeExpr {
        &self.types[index]
    }

    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

/// Shape analyzer with per-build memoization: analyzing the same declared
/// type twice returns the same shape.
#[derive(Default)]
pub struct Analyzer {
    memo: HashMap<TypeExpr, Arc<TypeShape>>,
}

impl Analyzer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape_of(&mut self, ty: &TypeExpr) -> Result<Arc<TypeShape>, AnalysisError> {
        if let Some(shape) = self.memo.get(ty) {
            return Ok(Arc::clone(shape));
        }
        let mut tags = Vec::new();
        let mut types = Vec::new();
        flatten(ty, &mut tags, &mut types)?;
        let shape = Arc::new(TypeShape { tags, types });
        self.memo.insert(ty.clone(), Arc::clone(&shape));
        Ok(shape)
    }
}

fn flatten(
    ty: &TypeExpr,
    tags: &mut Vec<Tag>,
    types: &mut Vec<TypeExpr>,
) -> Result<(), AnalysisError> {
    match ty {
        TypeExpr::Scalar(s) => {
            tags.push(s.tag());
            types.push(ty.clone());
        }
        TypeExpr::Array(element) => {
            tags.push(Tag::Array);
            types.push(ty.clone());
            flatten(element, tags, types)?;
        }
        TypeExpr::List(element) => {
            tags.push(Tag::List);
            types.push(ty.clone());
            flatten(element, tags, types)?;
        }
        TypeExpr::Optional(element) => {
            tags.push(Tag::Optional);
            types.push(ty.clone());
            flatten(element, tags, types)?;
        }
        TypeExpr::Map(key, value) => {
            tags.push(Tag::Map);
            types.push(ty.clone());
            let key_start = tags.len();
            flatten(key, tags, types)?;
            let key_tag = tags[key_start];
            let legal_key = tags.len() == key_start + 1
                && key_tag.is_leaf()
                && key_tag != Tag::Record;
            if !legal_key {
                return Err(AnalysisError::IllegalMapKey(key.descriptor()));
            }
            tags.push(Tag::MapSeparator);
            types.push(key.as_ref().clone());
            flatten(value, tags, types)?;
        }
        TypeExpr::User(user) => {
            tags.push((user.def)().tag());
            types.push(ty.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnumDef, FieldDef, RecordDef, Scalar, TypeDef, UserRef};

    fn person_def() -> TypeDef {
        TypeDef::Record(RecordDef {
            name: "people.Person",
            fields: vec![FieldDef {
                name: "name",
                ty: TypeExpr::scalar(Scalar::Str),
            }],
            fallback_arities: Vec::new(),
        })
    }

    fn color_def() -> TypeDef {
        TypeDef::Enum(EnumDef {
            name: "paint.Color",
            constants: vec!["Red", "Green"],
        })
    }

    const PERSON: UserRef = UserRef {
        name: "people.Person",
        def: person_def,
    };

    const COLOR: UserRef = UserRef {
        name: "paint.Color",
        def: color_def,
    };

    #[test]
    fn containers_unroll_left_to_right() {
        let ty = TypeExpr::list(TypeExpr::optional(TypeExpr::array(TypeExpr::user(PERSON))));
        let mut analyzer = Analyzer::new();
        let shape = analyzer.shape_of(&ty).unwrap();
        assert_eq!(
            &[Tag::List, Tag::Optional, Tag::Array, Tag::Record],
            shape.tags()
        );
        assert!(shape.tag_at(0).is_container());
        assert!(shape.tag_at(shape.len() - 1).is_leaf());
    }

    #[test]
    fn map_shape_has_separator() {
        let ty = TypeExpr::map(
            TypeExpr::scalar(Scalar::Str),
            TypeExpr::list(TypeExpr::scalar(Scalar::I32)),
        );
        let mut analyzer = Analyzer::new();
        let shape = analyzer.shape_of(&ty).unwrap();
        assert_eq!(
            &[Tag::Map, Tag::Str, Tag::MapSeparator, Tag::List, Tag::I32],
            shape.tags()
        );
    }

    #[test]
    fn enum_keys_are_legal() {
        let ty = TypeExpr::map(TypeExpr::user(COLOR), TypeExpr::scalar(Scalar::I64));
        let shape = Analyzer::new().shape_of(&ty).unwrap();
        assert_eq!(
            &[Tag::Map, Tag::Enum, Tag::MapSeparator, Tag::I64],
            shape.tags()
        );
    }

    #[test]
    fn container_keys_are_refused() {
        let ty = TypeExpr::map(
            TypeExpr::list(TypeExpr::scalar(Scalar::Str)),
            TypeExpr::scalar(Scalar::I32),
        );
        assert!(matches!(
            Analyzer::new().shape_of(&ty),
            Err(AnalysisError::IllegalMapKey(_))
        ));
    }

    #[test]
    fn record_keys_are_refused() {
        let ty = TypeExpr::map(TypeExpr::user(PERSON), TypeExpr::scalar(Scalar::I32));
        assert!(matches!(
            Analyzer::new().shape_of(&ty),
            Err(AnalysisError::IllegalMapKey(_))
        ));
    }

    #[test]
    fn shapes_are_memoized() {
        let ty = TypeExpr::list(TypeExpr::scalar(Scalar::I32));
        let mut analyzer = Analyzer::new();
        let a = analyzer.shape_of(&ty).unwrap();
        let b = analyzer.shape_of(&ty).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
