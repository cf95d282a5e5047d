//! Actuation mapping: one control input per joint through an affine law.

use std::collections::HashMap;

use dexhand_ir::{ActuatorDecl, JointType, UserTag};

use crate::dof::{DofTable, JointId};
use crate::error::{ModelError, Result};
use crate::math::Interval;

/// Dense actuator index, in declaration order.
pub type ActuatorId = usize;

/// `force = gain * ctrl + bias[0] + bias[1] * position`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineLaw {
    /// Control gain.
    pub gain: f64,
    /// Constant and position bias terms.
    pub bias: [f64; 2],
}

impl AffineLaw {
    /// Raw force before any clamping.
    pub fn apply(&self, ctrl: f64, position: f64) -> f64 {
        self.gain * ctrl + self.bias[0] + self.bias[1] * position
    }
}

/// A resolved actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct Actuator {
    /// Unique name.
    pub name: String,
    /// Driven joint.
    pub joint: JointId,
    /// DOF the force is applied to.
    pub dof: usize,
    /// Control saturation.
    pub ctrl_range: Interval,
    /// Output saturation.
    pub force_range: Interval,
    /// Force law.
    pub law: AffineLaw,
    /// Opaque consumer tag.
    pub user: Option<UserTag>,
}

impl Actuator {
    /// Clamp a control value into the control range.
    ///
    /// NaN stays NaN and is caught by [`Actuator::compute_force`].
    pub fn clamp_control(&self, ctrl: f64) -> f64 {
        self.ctrl_range.clamp(ctrl)
    }

    /// Force for `ctrl` at the current joint position.
    ///
    /// The control clamp is applied before the law and the force clamp after
    /// it; the result always lies in the force range.
    pub fn compute_force(&self, ctrl: f64, position: f64) -> f64 {
        let raw = self.law.apply(self.clamp_control(ctrl), position);
        if raw.is_nan() {
            return self.force_range.clamp(0.0);
        }
        self.force_range.clamp(raw)
    }
}

/// All actuators of a model.
#[derive(Debug, Clone, Default)]
pub struct ActuatorSet {
    actuators: Vec<Actuator>,
    index: HashMap<String, ActuatorId>,
}

impl ActuatorSet {
    /// Resolve actuator declarations against the DOF table.
    pub fn resolve(decls: &[ActuatorDecl], dofs: &DofTable) -> Result<Self> {
        let mut set = Self::default();
        for decl in decls {
            let context = format!("actuator '{}'", decl.name);
            let id = dofs.resolve(&decl.joint, &context)?;
            let joint = dofs.joint(id);
            if joint.kind == JointType::Free || joint.range.is_none() {
                return Err(ModelError::invalid_range(
                    &decl.name,
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    format!("target joint '{}' must be a ranged hinge", joint.name),
                ));
            }

            let ctrl_range = Interval::new(&decl.name, decl.ctrlrange)?;
            let force_range = Interval::new(&decl.name, decl.forcerange)?;
            for value in [ctrl_range.lo(), ctrl_range.hi(), force_range.lo(), force_range.hi()] {
                if !value.is_finite() {
                    return Err(ModelError::invalid_range(
                        &decl.name,
                        value,
                        value,
                        "actuator ranges must be finite",
                    ));
                }
            }
            if !decl.gain.is_finite() || !decl.bias.iter().all(|b| b.is_finite()) {
                return Err(ModelError::invalid_parameter(
                    &decl.name,
                    "gain",
                    "gain and bias must be finite",
                ));
            }

            let actuator = Actuator {
                name: decl.name.clone(),
                joint: id,
                dof: joint.dof,
                ctrl_range,
                force_range,
                law: AffineLaw {
                    gain: decl.gain,
                    bias: decl.bias,
                },
                user: decl.user,
            };
            let aid = set.actuators.len();
            if set.index.insert(decl.name.clone(), aid).is_some() {
                return Err(ModelError::duplicate("actuator", &decl.name));
            }
            set.actuators.push(actuator);
        }
        Ok(set)
    }

    /// Forces for one control per actuator, reading positions by DOF.
    ///
    /// # Panics
    ///
    /// Panics if `ctrl` does not hold exactly one entry per actuator, or
    /// `positions` is shorter than the DOF count.
    pub fn compute_forces(&self, ctrl: &[f64], positions: &[f64]) -> Vec<f64> {
        assert_eq!(
            ctrl.len(),
            self.actuators.len(),
            "expected one control per actuator"
        );
        self.actuators
            .iter()
            .zip(ctrl)
            .map(|(a, &c)| a.compute_force(c, positions[a.dof]))
            .collect()
    }

    /// Look up an actuator by name.
    pub fn id(&self, name: &str) -> Option<ActuatorId> {
        self.index.get(name).copied()
    }

    /// Actuator by id.
    pub fn actuator(&self, id: ActuatorId) -> &Actuator {
        &self.actuators[id]
    }

    /// All actuators.
    pub fn actuators(&self) -> &[Actuator] {
        &self.actuators
    }

    /// Number of actuators.
    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    /// Whether there are no actuators.
    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::JointParams;
    use crate::options::LoadOptions;
    use approx::assert_relative_eq;
    use dexhand_ir::{JointDecl, Vec3};

    fn dofs() -> DofTable {
        let mut table = DofTable::default();
        let opts = LoadOptions::default();
        let params = |range| JointParams {
            range,
            damping: 0.1,
            frictionloss: 0.001,
            armature: 0.001,
            margin: 0.01,
        };
        let x = Vec3::new(1.0, 0.0, 0.0);
        table
            .allocate(0, false, &JointDecl::hinge("FFJ2", x), params(Some([0.0, 1.571])), &opts)
            .unwrap();
        table
            .allocate(0, false, &JointDecl::hinge("spin", x), params(None), &opts)
            .unwrap();
        table
    }

    fn servo() -> ActuatorDecl {
        ActuatorDecl::position("A_FFJ2", "FFJ2", 1.0, [0.0, 1.571], [-0.9, 0.9])
    }

    #[test]
    fn clamps_control_then_force() {
        let set = ActuatorSet::resolve(&[servo()], &dofs()).unwrap();
        let a = set.actuator(0);
        assert_eq!(a.clamp_control(10.0), 1.571);
        assert_relative_eq!(a.law.apply(1.571, 0.0), 1.571);
        assert_eq!(a.compute_force(10.0, 0.0), 0.9);
        assert_relative_eq!(a.compute_force(0.5, 0.2), 0.3);
        assert_eq!(a.compute_force(-10.0, 1.5), -0.9);
    }

    #[test]
    fn bounded_and_monotonic() {
        let set = ActuatorSet::resolve(&[servo()], &dofs()).unwrap();
        let a = set.actuator(0);
        for position in [-1.0, 0.0, 0.7, 1.571] {
            let mut last = f64::NEG_INFINITY;
            for i in -20..=40 {
                let ctrl = i as f64 * 0.1;
                let f = a.compute_force(ctrl, position);
                assert!((-0.9..=0.9).contains(&f));
                assert!(f >= last);
                last = f;
            }
        }
        for ctrl in [f64::INFINITY, f64::NEG_INFINITY, 1e300, f64::NAN] {
            let f = a.compute_force(ctrl, 0.0);
            assert!((-0.9..=0.9).contains(&f));
        }
    }

    fn servo_pair() -> ActuatorSet {
        let soft = ActuatorDecl::position("A_FFJ2_soft", "FFJ2", 0.5, [0.0, 1.571], [-0.5, 0.5]);
        ActuatorSet::resolve(&[servo(), soft], &dofs()).unwrap()
    }

    #[test]
    fn batch_forces() {
        let set = servo_pair();
        assert_eq!(set.compute_forces(&[10.0, 0.2], &[0.0, 0.0]), vec![0.9, 0.1]);
    }

    #[test]
    #[should_panic(expected = "one control per actuator")]
    fn batch_forces_short_control() {
        servo_pair().compute_forces(&[10.0], &[0.0, 0.0]);
    }

    #[test]
    fn target_must_be_ranged_hinge() {
        let decl = ActuatorDecl::position("A_spin", "spin", 1.0, [0.0, 1.0], [-1.0, 1.0]);
        let err = ActuatorSet::resolve(&[decl], &dofs()).unwrap_err();
        assert!(matches!(err, ModelError::InvalidRange { ref name, .. } if name == "A_spin"));
    }

    #[test]
    fn unknown_target() {
        let decl = ActuatorDecl::position("A_FFJ9", "FFJ9", 1.0, [0.0, 1.0], [-1.0, 1.0]);
        let err = ActuatorSet::resolve(&[decl], &dofs()).unwrap_err();
        assert_eq!(err, ModelError::unknown_joint("FFJ9", "actuator 'A_FFJ9'"));
    }

    #[test]
    fn inverted_ranges() {
        let mut decl = servo();
        decl.forcerange = [0.9, -0.9];
        assert!(matches!(
            ActuatorSet::resolve(&[decl], &dofs()).unwrap_err(),
            ModelError::InvalidRange { .. }
        ));
    }
}
