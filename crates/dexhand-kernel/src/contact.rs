//! Explicit contact pairs and body-pair exclusions.

use std::collections::{HashMap, HashSet};

use dexhand_ir::ContactDecl;
use tracing::warn;

use crate::error::{ModelError, Result};
use crate::registry::{GeometryRegistry, ShapeId, VALID_CONDIM};
use crate::tree::{BodyId, KinematicTree};

/// A resolved contact pair, stored with `shape1 < shape2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContactPair {
    /// Lower shape id.
    pub shape1: ShapeId,
    /// Higher shape id.
    pub shape2: ShapeId,
    /// Contact dimensionality.
    pub condim: u8,
}

fn key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Allow-list of shape pairs plus excluded body pairs.
///
/// Queries are order-independent.
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pairs: Vec<ContactPair>,
    lookup: HashMap<(ShapeId, ShapeId), usize>,
    declared: usize,
    excludes: HashSet<(BodyId, BodyId)>,
}

impl ContactFilter {
    /// Resolve the contact section against the registry and body tree.
    pub fn resolve(
        decl: &ContactDecl,
        registry: &GeometryRegistry,
        tree: &KinematicTree,
    ) -> Result<Self> {
        let mut filter = Self {
            declared: decl.pairs.len(),
            ..Self::default()
        };

        for pair in &decl.pairs {
            let label = format!("{}/{}", pair.geom1, pair.geom2);
            let context = format!("contact pair '{label}'");
            let g1 = registry.resolve_shape(&pair.geom1, &context)?;
            let g2 = registry.resolve_shape(&pair.geom2, &context)?;
            if g1 == g2 {
                return Err(ModelError::invalid_parameter(
                    label,
                    "geom2",
                    "a shape cannot be paired with itself",
                ));
            }

            let condim = pair
                .condim
                .unwrap_or_else(|| registry.shape(g1).condim.max(registry.shape(g2).condim));
            if !VALID_CONDIM.contains(&condim) {
                return Err(ModelError::invalid_parameter(
                    label,
                    "condim",
                    format!("must be one of {VALID_CONDIM:?}, got {condim}"),
                ));
            }

            let (shape1, shape2) = key(g1, g2);
            let resolved = ContactPair {
                shape1,
                shape2,
                condim,
            };
            match filter.lookup.get(&(shape1, shape2)) {
                Some(&existing) if filter.pairs[existing] == resolved => {
                    warn!(pair = %label, "duplicate contact pair collapsed");
                }
                Some(&existing) => {
                    return Err(ModelError::invalid_parameter(
                        label,
                        "condim",
                        format!(
                            "duplicate pair resolves to condim {condim}, earlier declaration has {}",
                            filter.pairs[existing].condim
                        ),
                    ));
                }
                None => {
                    filter.lookup.insert((shape1, shape2), filter.pairs.len());
                    filter.pairs.push(resolved);
                }
            }
        }

        for exclude in &decl.excludes {
            let context = format!("contact exclude '{}/{}'", exclude.body1, exclude.body2);
            let b1 = tree
                .id(&exclude.body1)
                .ok_or_else(|| ModelError::unknown_reference("body", &exclude.body1, &context))?;
            let b2 = tree
                .id(&exclude.body2)
                .ok_or_else(|| ModelError::unknown_reference("body", &exclude.body2, &context))?;
            filter.excludes.insert(key(b1, b2));
        }

        Ok(filter)
    }

    /// Declared dimensionality of the pair, or `None` if it is not on the
    /// allow-list and falls to the engine's default filtering.
    pub fn is_pair_enabled(&self, a: ShapeId, b: ShapeId) -> Option<u8> {
        self.lookup
            .get(&key(a, b))
            .map(|&i| self.pairs[i].condim)
    }

    /// Whether contacts between two bodies are excluded.
    pub fn is_body_pair_excluded(&self, a: BodyId, b: BodyId) -> bool {
        self.excludes.contains(&key(a, b))
    }

    /// Logical pairs in first-declaration order.
    pub fn pairs(&self) -> &[ContactPair] {
        &self.pairs
    }

    /// Pairs as declared, duplicates included.
    pub fn declared_count(&self) -> usize {
        self.declared
    }

    /// Excluded body pairs, each with the lower id first.
    pub fn excludes(&self) -> impl Iterator<Item = (BodyId, BodyId)> + '_ {
        self.excludes.iter().copied()
    }
}
