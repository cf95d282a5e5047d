//! Conversions from IR values to nalgebra types, plus closed intervals.

use dexhand_ir::{Pose, Quat, Vec3};
use nalgebra::{Isometry3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};
use serde::Serialize;

use crate::error::{ModelError, Result};

/// Norm below which axes and quaternions count as degenerate.
pub const DEGENERATE_NORM: f64 = 1e-10;

/// A closed interval `[lo, hi]` with `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    lo: f64,
    hi: f64,
}

impl Interval {
    /// Validate and build an interval owned by `name`.
    pub fn new(name: &str, [lo, hi]: [f64; 2]) -> Result<Self> {
        if lo.is_nan() || hi.is_nan() {
            return Err(ModelError::invalid_range(name, lo, hi, "bound is NaN"));
        }
        if lo > hi {
            return Err(ModelError::invalid_range(
                name,
                lo,
                hi,
                "lower bound exceeds upper bound",
            ));
        }
        Ok(Self { lo, hi })
    }

    /// Lower bound.
    pub fn lo(&self) -> f64 {
        self.lo
    }

    /// Upper bound.
    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// Whether `value` lies in the interval.
    pub fn contains(&self, value: f64) -> bool {
        self.lo <= value && value <= self.hi
    }

    /// Clamp `value` into the interval.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lo, self.hi)
    }

    /// The interval widened by `slack` on both sides. Negative or NaN
    /// slack leaves it unchanged.
    pub fn widened(&self, slack: f64) -> Self {
        let slack = slack.max(0.0);
        Self {
            lo: self.lo - slack,
            hi: self.hi + slack,
        }
    }

    /// Interval width.
    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

/// Convert a vector.
pub fn vector(v: Vec3) -> Vector3<f64> {
    Vector3::new(v.x, v.y, v.z)
}

/// Convert and normalize an axis owned by `name`.
pub fn unit_axis(name: &str, v: Vec3) -> Result<Unit<Vector3<f64>>> {
    let raw = vector(v);
    if !raw.iter().all(|c| c.is_finite()) {
        return Err(ModelError::invalid_parameter(name, "axis", "non-finite component"));
    }
    Unit::try_new(raw, DEGENERATE_NORM)
        .ok_or_else(|| ModelError::invalid_parameter(name, "axis", "axis has zero length"))
}

/// Convert and normalize a quaternion owned by `name`.
pub fn rotation(name: &str, q: Quat) -> Result<UnitQuaternion<f64>> {
    let raw = Quaternion::new(q.w, q.x, q.y, q.z);
    if !raw.coords.iter().all(|c| c.is_finite()) || raw.norm() < DEGENERATE_NORM {
        return Err(ModelError::invalid_parameter(
            name,
            "quat",
            "quaternion must be finite and non-zero",
        ));
    }
    Ok(UnitQuaternion::from_quaternion(raw))
}

/// Convert a pose owned by `name` into a rigid transform.
pub fn isometry(name: &str, pose: &Pose) -> Result<Isometry3<f64>> {
    let translation = vector(pose.pos);
    if !translation.iter().all(|c| c.is_finite()) {
        return Err(ModelError::invalid_parameter(name, "pos", "non-finite component"));
    }
    Ok(Isometry3::from_parts(
        Translation3::from(translation),
        rotation(name, pose.quat)?,
    ))
}

/// Reject non-finite or negative values.
pub fn non_negative(name: &str, parameter: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(ModelError::invalid_parameter(
            name,
            parameter,
            format!("must be finite and non-negative, got {value}"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interval_rejects_inverted() {
        assert!(Interval::new("j", [0.0, 1.0]).is_ok());
        assert!(Interval::new("j", [0.5, 0.5]).is_ok());
        let err = Interval::new("j", [1.0, 0.0]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidRange { .. }));
    }

    #[test]
    fn interval_clamp() {
        let range = Interval::new("a", [-0.9, 0.9]).unwrap();
        assert_eq!(range.clamp(10.0), 0.9);
        assert_eq!(range.clamp(-10.0), -0.9);
        assert_eq!(range.clamp(0.1), 0.1);
        assert_relative_eq!(range.width(), 1.8);
    }

    #[test]
    fn widened_never_inverts() {
        let range = Interval::new("t", [-0.001, 0.001]).unwrap();
        let wide = range.widened(0.001);
        assert_relative_eq!(wide.lo(), -0.002);
        assert_relative_eq!(wide.hi(), 0.002);
        assert_eq!(range.widened(-0.002), range);
        assert_eq!(range.widened(f64::NAN), range);
        assert_eq!(range.widened(-0.002).clamp(5.0), 0.001);
    }

    #[test]
    fn axis_is_normalized() {
        let axis = unit_axis("j", Vec3::new(0.571, 0.0, 0.821)).unwrap();
        assert_relative_eq!(axis.norm(), 1.0, epsilon = 1e-12);
        assert!(unit_axis("j", Vec3::default()).is_err());
    }

    #[test]
    fn quaternion_is_normalized() {
        let q = rotation("b", Quat::new(2.0, 0.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(q.angle(), 0.0);
        assert!(rotation("b", Quat::new(0.0, 0.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn pose_to_isometry() {
        let iso = isometry("b", &Pose::at(0.0, 0.0, 0.256)).unwrap();
        assert_relative_eq!(iso.translation.vector.z, 0.256);
    }
}
