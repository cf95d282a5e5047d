//! Fixed tendons: linear couplings between joint positions.
//!
//! A tendon's value is `sum(coef * (q[dof] - reference))` over its terms,
//! which is zero at the rest pose by construction. The declared range must
//! contain that rest value; the host engine enforces the range while
//! integrating.

use std::collections::HashMap;

use dexhand_ir::{JointType, TendonDecl, UserTag};
use tracing::warn;

use crate::dof::{DofTable, JointId};
use crate::error::{ModelError, Result};
use crate::math::Interval;
use crate::options::LoadOptions;

/// Dense tendon index, in declaration order.
pub type TendonId = usize;

/// One resolved `(joint, coefficient)` term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TendonTerm {
    /// Source joint.
    pub joint: JointId,
    /// DOF the term reads.
    pub dof: usize,
    /// Non-zero coefficient.
    pub coef: f64,
    /// Joint rest position subtracted before weighting.
    pub reference: f64,
}

/// A resolved tendon.
#[derive(Debug, Clone, PartialEq)]
pub struct Tendon {
    /// Unique name.
    pub name: String,
    /// Terms in declaration order.
    pub terms: Vec<TendonTerm>,
    /// Allowed band for the evaluated value.
    pub range: Interval,
    /// Opaque consumer tag.
    pub user: Option<UserTag>,
}

impl Tendon {
    /// Weighted sum of joint displacements.
    ///
    /// # Panics
    ///
    /// Panics if `positions` is shorter than the model's DOF count.
    pub fn evaluate(&self, positions: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coef * (positions[t.dof] - t.reference))
            .sum()
    }

    /// Whether the tendon value lies in its range.
    pub fn is_satisfied(&self, positions: &[f64]) -> bool {
        self.range.contains(self.evaluate(positions))
    }

    /// Coefficient on `dof`, zero if the tendon does not read it.
    pub fn coefficient(&self, dof: usize) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.dof == dof)
            .map(|t| t.coef)
            .sum()
    }
}

/// All tendons of a model.
#[derive(Debug, Clone, Default)]
pub struct TendonSet {
    tendons: Vec<Tendon>,
    index: HashMap<String, TendonId>,
}

impl TendonSet {
    /// Resolve tendon declarations against the DOF table and check each one
    /// at the rest pose.
    pub fn resolve(decls: &[TendonDecl], dofs: &DofTable, options: &LoadOptions) -> Result<Self> {
        let rest = dofs.rest_positions();
        let mut set = Self::default();

        for decl in decls {
            let context = format!("tendon '{}'", decl.name);
            if decl.joints.is_empty() {
                return Err(ModelError::invalid_parameter(
                    &decl.name,
                    "joints",
                    "tendon has no terms",
                ));
            }
            let range = Interval::new(&decl.name, decl.range)?;

            let mut terms = Vec::with_capacity(decl.joints.len());
            for term in &decl.joints {
                let id = dofs.resolve(&term.joint, &context)?;
                let joint = dofs.joint(id);
                if joint.kind == JointType::Free {
                    return Err(ModelError::invalid_parameter(
                        &decl.name,
                        "joints",
                        format!("free joint '{}' cannot be coupled linearly", joint.name),
                    ));
                }
                if !term.coef.is_finite() || term.coef == 0.0 {
                    return Err(ModelError::invalid_parameter(
                        &decl.name,
                        "coef",
                        format!(
                            "coefficient on '{}' must be finite and non-zero, got {}",
                            term.joint, term.coef
                        ),
                    ));
                }
                terms.push(TendonTerm {
                    joint: id,
                    dof: joint.dof,
                    coef: term.coef,
                    reference: joint.reference,
                });
            }

            let tendon = Tendon {
                name: decl.name.clone(),
                terms,
                range,
                user: decl.user,
            };

            let value = tendon.evaluate(&rest);
            if !range.widened(options.tendon_tolerance).contains(value) {
                return Err(ModelError::UnsatisfiableConstraint {
                    tendon: decl.name.clone(),
                    value,
                    lo: range.lo(),
                    hi: range.hi(),
                });
            }
            if value == range.lo() || value == range.hi() {
                warn!(
                    tendon = %decl.name,
                    value,
                    "tendon rest value sits on its range boundary"
                );
            }

            let id = set.tendons.len();
            if set.index.insert(decl.name.clone(), id).is_some() {
                return Err(ModelError::duplicate("tendon", &decl.name));
            }
            set.tendons.push(tendon);
        }

        Ok(set)
    }

    /// Evaluate every tendon, in declaration order.
    pub fn evaluate_all(&self, positions: &[f64]) -> Vec<f64> {
        self.tendons.iter().map(|t| t.evaluate(positions)).collect()
    }

    /// Look up a tendon by name.
    pub fn id(&self, name: &str) -> Option<TendonId> {
        self.index.get(name).copied()
    }

    /// Tendon by id.
    pub fn tendon(&self, id: TendonId) -> &Tendon {
        &self.tendons[id]
    }

    /// All tendons.
    pub fn tendons(&self) -> &[Tendon] {
        &self.tendons
    }

    /// Number of tendons.
    pub fn len(&self) -> usize {
        self.tendons.len()
    }

    /// Whether there are no tendons.
    pub fn is_empty(&self) -> bool {
        self.tendons.is_empty()
    }
}
