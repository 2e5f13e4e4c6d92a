//! Per-kind dispatch tables.
//!
//! Parallel arrays indexed by ordinal - 1 hold everything the hot path
//! needs: kind tag, definition, constructor and accessor handles, permitted
//! union variants, fingerprint and the compiled chain. The single remaining
//! map is `name -> ordinal`, consulted once per union dispatch site and once
//! at the root.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::chain::Chain;
use crate::compat::fingerprint;
use crate::discover::Discovery;
use crate::model::{TypeDef, Value};
use crate::tag::Tag;

/// Handle invoking a record's canonical constructor.
pub type Constructor = Arc<dyn Fn(Vec<Value>) -> Value + Send + Sync>;

/// Handle reading one component out of a record instance.
pub type Accessor = Arc<dyn Fn(&Value) -> Option<&Value> + Send + Sync>;

pub struct Dispatch {
    tags: Vec<Tag>,
    names: Vec<&'static str>,
    defs: Vec<TypeDef>,
    constructors: Vec<Option<Constructor>>,
    accessors: Vec<Vec<Accessor>>,
    variants: Vec<Option<Vec<i64>>>,
    fingerprints: Vec<u64>,
    chains: Vec<OnceLock<Chain>>,
    ordinals: HashMap<&'static str, i64>,
}

impl Dispatch {
    pub(crate) fn from_discovery(discovery: &Discovery) -> Self {
        let count = discovery.len();
        let ordinals: HashMap<&'static str, i64> = discovery
            .names
            .iter()
            .enumerate()
            .map(|(i, &name)| (name, i as i64 + 1))
            .collect();
        let by_name: HashMap<&'static str, &TypeDef> = discovery
            .names
            .iter()
            .copied()
            .zip(discovery.defs.iter())
            .collect();

        let mut tags = Vec::with_capacity(count);
        let mut constructors = Vec::with_capacity(count);
        let mut accessors = Vec::with_capacity(count);
        let mut variants = Vec::with_capacity(count);
        let mut fingerprints = Vec::with_capacity(count);
        let mut chains = Vec::with_capacity(count);

        for def in &discovery.defs {
            tags.push(def.tag());
            fingerprints.push(fingerprint(def));
            chains.push(OnceLock::new());
            match def {
                TypeDef::Record(r) => {
                    let name = r.name;
                    constructors.push(Some(Arc::new(move |fields| Value::Record {
                        name,
                        fields,
                    }) as Constructor));
                    accessors.push(
                        (0..r.fields.len())
                            .map(|i| to_accessor(move |v: &Value| record_field(v, i)))
                            .collect(),
                    );
                    variants.push(None);
                }
                TypeDef::Union(u) => {
                    constructors.push(None);
                    accessors.push(Vec::new());
                    variants.push(Some(concrete_variants(u, &by_name, &ordinals)));
                }
                TypeDef::Enum(_) => {
                    constructors.push(None);
                    accessors.push(Vec::new());
                    variants.push(None);
                }
            }
        }

        Self {
            tags,
            names: discovery.names.clone(),
            defs: discovery.defs.clone(),
            constructors,
            accessors,
            variants,
            fingerprints,
            chains,
            ordinals,
        }
    }

    /// Number of discovered user kinds.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The one bounded map lookup on the write path.
    #[inline]
    #[must_use]
    pub fn ordinal_of(&self, name: &str) -> Option<i64> {
        self.ordinals.get(name).copied()
    }

    /// Physical table index for a positive wire ordinal, if in range.
    #[inline]
    #[must_use]
    pub fn index_of(&self, ordinal: i64) -> Option<usize> {
        if ordinal < 1 {
            return None;
        }
        let index = (ordinal - 1) as usize;
        (index < self.names.len()).then_some(index)
    }

    #[inline]
    #[must_use]
    pub fn tag_at(&self, index: usize) -> Tag {
        self.tags[index]
    }

    #[inline]
    #[must_use]
    pub fn name_at(&self, index: usize) -> &'static str {
        self.names[index]
    }

    #[inline]
    #[must_use]
    pub fn def_at(&self, index: usize) -> &TypeDef {
        &self.defs[index]
    }

    #[must_use]
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    #[must_use]
    pub fn fingerprints(&self) -> &[u64] {
        &self.fingerprints
    }

    /// Permitted variant ordinals of a union kind.
    #[must_use]
    pub fn variants_at(&self, index: usize) -> Option<&[i64]> {
        self.variants[index].as_deref()
    }

    pub(crate) fn constructor_at(&self, index: usize) -> Option<&Constructor> {
        self.constructors[index].as_ref()
    }

    pub(crate) fn accessors_at(&self, index: usize) -> &[Accessor] {
        &self.accessors[index]
    }

    /// Compiled chain of a kind. Every slot is sealed during engine build,
    /// before the dispatch becomes reachable.
    #[inline]
    pub(crate) fn chain_at(&self, index: usize) -> &Chain {
        self.chains[index].get().expect("chain sealed during build")
    }

    pub(crate) fn seal_chain(&self, index: usize, chain: Chain) {
        assert!(
            self.chains[index].set(chain).is_ok(),
            "kind chain sealed twice"
        );
    }
}

fn to_accessor<F>(f: F) -> Accessor
where
    F: for<'a> Fn(&'a Value) -> Option<&'a Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn record_field<'a>(v: &'a Value, i: usize) -> Option<&'a Value> {
    match v {
        Value::Record { fields, .. } => fields.get(i),
        _ => None,
    }
}

/// Flatten a union's variant list down to the ordinals of its permitted
/// concrete kinds, expanding nested unions in declaration order. On the
/// wire an instance always carries a concrete record or enum ordinal.
fn concrete_variants(
    union: &crate::model::UnionDef,
    by_name: &HashMap<&'static str, &TypeDef>,
    ordinals: &HashMap<&'static str, i64>,
) -> Vec<i64> {
    fn expand(
        name: &'static str,
        by_name: &HashMap<&'static str, &TypeDef>,
        ordinals: &HashMap<&'static str, i64>,
        seen_unions: &mut Vec<&'static str>,
        out: &mut Vec<i64>,
    ) {
        match by_name[name] {
            TypeDef::Union(u) => {
                if seen_unions.contains(&name) {
                    return;
                }
                seen_unions.push(name);
                for v in &u.variants {
                    expand(v.name, by_name, ordinals, seen_unions, out);
                }
            }
            _ => {
                let ordinal = ordinals[name];
                if !out.contains(&ordinal) {
                    out.push(ordinal);
                }
            }
        }
    }

    let mut out = Vec::new();
    let mut seen_unions = vec![union.name];
    for v in &union.variants {
        expand(v.name, by_name, ordinals, &mut seen_unions, &mut out);
    }
    out
}
