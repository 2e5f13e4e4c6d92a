//! Transitive closure over reachable user kinds.
//!
//! Starting from the root type, descend into record fields, union variants
//! and container element/key/value positions, collecting every user kind
//! exactly once. Ordinals are then assigned 1-indexed in byte-wise
//! lexicographic order of the fully-qualified names, so the assignment is a
//! pure function of the reachable name set and identical across processes.

use std::collections::HashMap;

use crate::error::AnalysisError;
use crate::model::{TypeDef, TypeExpr, UserRef};

/// The discovered kind set, sorted by name. Index = ordinal - 1.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub names: Vec<&'static str>,
    pub defs: Vec<TypeDef>,
}

impl Discovery {
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub fn discover(root: &TypeExpr) -> Result<Discovery, AnalysisError> {
    let mut walker = Walker::default();
    walker.visit_expr(root)?;

    let mut names: Vec<&'static str> = walker.found.keys().copied().collect();
    names.sort_unstable();
    let defs = names
        .iter()
        .map(|name| walker.found.remove(name).unwrap())
        .collect();
    Ok(Discovery { names, defs })
}

struct PathEntry {
    name: &'static str,
    is_union: bool,
}

#[derive(Default)]
struct Walker {
    found: HashMap<&'static str, TypeDef>,
    path: Vec<PathEntry>,
}

impl Walker {
    fn visit_expr(&mut self, ty: &TypeExpr) -> Result<(), AnalysisError> {
        match ty {
            TypeExpr::Scalar(_) => Ok(()),
            TypeExpr::Array(e) | TypeExpr::List(e) | TypeExpr::Optional(e) => self.visit_expr(e),
            TypeExpr::Map(k, v) => {
                self.visit_expr(k)?;
                self.visit_expr(v)
            }
            TypeExpr::User(user) => self.visit_user(user),
        }
    }

    fn visit_user(&mut self, user: &UserRef) -> Result<(), AnalysisError> {
        if let Some(pos) = self.path.iter().position(|p| p.name == user.name) {
            // Re-entered a kind already on the walk path. Legal only when a
            // union sits on the cycle, because union dispatch indirects
            // through the ordinal table and breaks the type cycle.
            if self.path[pos..].iter().any(|p| p.is_union) {
                return Ok(());
            }
            return Err(AnalysisError::CyclicNonSumReference(user.name));
        }

        let def = (user.def)();
        if let Some(existing) = self.found.get(user.name) {
            if existing.signature() != def.signature() {
                return Err(AnalysisError::OrdinalCollision(user.name));
            }
            return Ok(());
        }
        self.found.insert(user.name, def.clone());

        self.path.push(PathEntry {
            name: user.name,
            is_union: matches!(def, TypeDef::Union(_)),
        });
        let result = match &def {
            TypeDef::Record(r) => r.fields.iter().try_for_each(|f| self.visit_expr(&f.ty)),
            TypeDef::Union(u) => u.variants.iter().try_for_each(|v| self.visit_user(v)),
            TypeDef::Enum(_) => Ok(()),
        };
        self.path.pop();
        result
    }
}
