//! Joint and DOF allocation.
//!
//! Joints are numbered in body pre-order, then in declaration order within
//! each body. A hinge takes one DOF; a free joint on the root takes six, so
//! hinges then start at index 6. This numbering is the index contract that
//! tendons, actuators, sensors and external solvers rely on.

use std::collections::HashMap;
use std::ops::Range;

use dexhand_ir::{JointDecl, JointType, UserTag};
use nalgebra::{Unit, Vector3};

use crate::classes::JointParams;
use crate::error::{ModelError, Result, StructuralKind};
use crate::math::{self, non_negative, Interval};
use crate::options::LoadOptions;
use crate::tree::BodyId;

/// Dense joint index.
pub type JointId = usize;

/// DOFs taken by a free joint.
pub const FREE_DOFS: usize = 6;

/// A resolved joint.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    /// Unique name.
    pub name: String,
    /// Owning body.
    pub body: BodyId,
    /// Joint type.
    pub kind: JointType,
    /// First DOF index.
    pub dof: usize,
    /// Motion axis in the body frame.
    pub axis: Unit<Vector3<f64>>,
    /// Pivot point in the body frame.
    pub pivot: Vector3<f64>,
    /// Position limits. `None` for unlimited joints.
    pub range: Option<Interval>,
    /// Viscous damping coefficient.
    pub damping: f64,
    /// Dry friction loss.
    pub frictionloss: f64,
    /// Reflected rotor inertia.
    pub armature: f64,
    /// Limit activation margin.
    pub margin: f64,
    /// Nominal position.
    pub reference: f64,
    /// Opaque consumer tag.
    pub user: Option<UserTag>,
}

impl Joint {
    /// Number of DOFs this joint takes.
    pub fn dof_count(&self) -> usize {
        match self.kind {
            JointType::Hinge => 1,
            JointType::Free => FREE_DOFS,
        }
    }

    /// The DOF indices this joint takes.
    pub fn dofs(&self) -> Range<usize> {
        self.dof..self.dof + self.dof_count()
    }

    /// Whether the joint has position limits.
    pub fn is_limited(&self) -> bool {
        self.range.is_some()
    }
}

/// Joints in DOF order with a name index.
#[derive(Debug, Clone, Default)]
pub struct DofTable {
    joints: Vec<Joint>,
    index: HashMap<String, JointId>,
    dof_count: usize,
}

impl DofTable {
    /// Allocate DOFs for a joint on `body`.
    pub(crate) fn allocate(
        &mut self,
        body: BodyId,
        is_root: bool,
        decl: &JointDecl,
        params: JointParams,
        options: &LoadOptions,
    ) -> Result<JointId> {
        let name = decl.name.as_str();
        let (range, reference) = match decl.kind {
            JointType::Free => {
                // Only as the very first joint of the tree.
                if !is_root || !self.joints.is_empty() || !options.allow_free_root {
                    return Err(ModelError::structural(
                        name,
                        StructuralKind::MisplacedFreeJoint,
                    ));
                }
                if let Some([lo, hi]) = params.range {
                    return Err(ModelError::invalid_range(
                        name,
                        lo,
                        hi,
                        "free joints cannot be limited",
                    ));
                }
                (None, 0.0)
            }
            JointType::Hinge => {
                let range = params.range.map(|r| Interval::new(name, r)).transpose()?;
                let reference = decl.reference.unwrap_or(0.0);
                if !reference.is_finite() {
                    return Err(ModelError::invalid_parameter(name, "ref", "must be finite"));
                }
                if let Some(range) = range {
                    if !range.contains(reference) {
                        return Err(ModelError::invalid_range(
                            name,
                            range.lo(),
                            range.hi(),
                            format!("rest position {reference} lies outside the range"),
                        ));
                    }
                }
                (range, reference)
            }
        };

        let pivot = math::vector(decl.pos);
        if !pivot.iter().all(|c| c.is_finite()) {
            return Err(ModelError::invalid_parameter(name, "pos", "non-finite component"));
        }

        let id = self.joints.len();
        if self.index.insert(name.to_string(), id).is_some() {
            return Err(ModelError::duplicate("joint", name));
        }
        let joint = Joint {
            name: name.to_string(),
            body,
            kind: decl.kind,
            dof: self.dof_count,
            axis: math::unit_axis(name, decl.axis)?,
            pivot,
            range,
            damping: non_negative(name, "damping", params.damping)?,
            frictionloss: non_negative(name, "frictionloss", params.frictionloss)?,
            armature: non_negative(name, "armature", params.armature)?,
            margin: non_negative(name, "margin", params.margin)?,
            reference,
            user: decl.user,
        };
        self.dof_count += joint.dof_count();
        self.joints.push(joint);
        Ok(id)
    }

    /// Look up a joint by name, failing with context.
    pub fn resolve(&self, name: &str, context: &str) -> Result<JointId> {
        self.id(name)
            .ok_or_else(|| ModelError::unknown_joint(name, context))
    }

    /// Look up a joint by name.
    pub fn id(&self, name: &str) -> Option<JointId> {
        self.index.get(name).copied()
    }

    /// First DOF index of the named joint.
    pub fn dof_index(&self, name: &str) -> Option<usize> {
        self.id(name).map(|id| self.joints[id].dof)
    }

    /// Joint by id.
    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id]
    }

    /// All joints in DOF order.
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Number of joints.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether there are no joints.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Total DOFs.
    pub fn dof_count(&self) -> usize {
        self.dof_count
    }

    /// The joint owning DOF `dof`.
    pub fn owner(&self, dof: usize) -> Option<JointId> {
        let id = self.joints.partition_point(|j| j.dof <= dof).checked_sub(1)?;
        self.joints[id].dofs().contains(&dof).then_some(id)
    }

    /// Nominal positions for every DOF. Free-joint DOFs are zero.
    pub fn rest_positions(&self) -> Vec<f64> {
        let mut q = vec![0.0; self.dof_count];
        for joint in &self.joints {
            if joint.kind == JointType::Hinge {
                q[joint.dof] = joint.reference;
            }
        }
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexhand_ir::{JointDefaults, Vec3};

    fn params(range: Option<[f64; 2]>) -> JointParams {
        let base = JointDefaults::default();
        JointParams {
            range,
            damping: base.damping,
            frictionloss: base.frictionloss,
            armature: base.armature,
            margin: base.margin,
        }
    }

    fn hinge(name: &str) -> JointDecl {
        JointDecl::hinge(name, Vec3::new(1.0, 0.0, 0.0))
    }

    #[test]
    fn dense_indices_from_zero() {
        let mut table = DofTable::default();
        let opts = LoadOptions::default();
        for (i, name) in ["FFJ3", "FFJ2", "FFJ1", "FFJ0"].iter().enumerate() {
            let id = table
                .allocate(i, false, &hinge(name), params(Some([0.0, 1.571])), &opts)
                .unwrap();
            assert_eq!(id, i);
            assert_eq!(table.joint(id).dof, i);
        }
        assert_eq!(table.dof_count(), 4);
        assert_eq!(table.dof_index("FFJ1"), Some(2));
        assert_eq!(table.joint(0).damping, 0.1);
        assert_eq!(table.owner(3), Some(3));
        assert_eq!(table.owner(4), None);
    }

    #[test]
    fn free_root_shifts_hinges() {
        let mut table = DofTable::default();
        let opts = LoadOptions::default();
        table
            .allocate(0, true, &JointDecl::free("float"), params(None), &opts)
            .unwrap();
        let id = table
            .allocate(1, false, &hinge("WRJ1"), params(Some([-0.489, 0.14])), &opts)
            .unwrap();
        assert_eq!(table.joint(id).dof, 6);
        assert_eq!(table.dof_count(), 7);
        assert_eq!(table.owner(5), Some(0));
        assert_eq!(table.owner(6), Some(1));
        assert_eq!(table.rest_positions(), vec![0.0; 7]);
    }

    #[test]
    fn free_joint_placement() {
        let opts = LoadOptions::default();
        let mut table = DofTable::default();
        let err = table
            .allocate(2, false, &JointDecl::free("float"), params(None), &opts)
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::structural("float", StructuralKind::MisplacedFreeJoint)
        );

        let strict = LoadOptions {
            allow_free_root: false,
            ..LoadOptions::default()
        };
        assert!(table
            .allocate(0, true, &JointDecl::free("float"), params(None), &strict)
            .is_err());

        let err = table
            .allocate(0, true, &JointDecl::free("float"), params(Some([0.0, 1.0])), &opts)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidRange { .. }));
    }

    #[test]
    fn inverted_range() {
        let mut table = DofTable::default();
        let err = table
            .allocate(0, false, &hinge("j"), params(Some([1.0, -1.0])), &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidRange { ref name, .. } if name == "j"));
    }

    #[test]
    fn rest_position_must_be_in_range() {
        let mut table = DofTable::default();
        let mut decl = hinge("LFJ4");
        decl.reference = Some(1.0);
        let err = table
            .allocate(0, false, &decl, params(Some([0.0, 0.785])), &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidRange { .. }));

        decl.reference = Some(0.5);
        let id = table
            .allocate(0, false, &decl, params(Some([0.0, 0.785])), &LoadOptions::default())
            .unwrap();
        assert_eq!(table.rest_positions()[table.joint(id).dof], 0.5);
    }

    #[test]
    fn duplicate_joint() {
        let mut table = DofTable::default();
        let opts = LoadOptions::default();
        table.allocate(0, false, &hinge("j"), params(None), &opts).unwrap();
        let err = table.allocate(1, false, &hinge("j"), params(None), &opts).unwrap_err();
        assert_eq!(err, ModelError::duplicate("joint", "j"));
    }

    #[test]
    fn resolve_unknown() {
        let table = DofTable::default();
        let err = table.resolve("FFJ1", "tendon 'T'").unwrap_err();
        assert_eq!(err, ModelError::unknown_joint("FFJ1", "tendon 'T'"));
    }
}
