//! Default parameters and MuJoCo-style default classes.

use serde::{Deserialize, Serialize};

use crate::GeomType;

/// Document-wide joint parameters, used where neither the joint nor any
/// class along its chain sets a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointDefaults {
    /// Limit activation margin.
    pub margin: f64,
    /// Reflected rotor inertia.
    pub armature: f64,
    /// Viscous damping coefficient.
    pub damping: f64,
    /// Dry friction loss.
    pub frictionloss: f64,
}

impl Default for JointDefaults {
    fn default() -> Self {
        Self {
            margin: 0.01,
            armature: 0.001,
            damping: 0.1,
            frictionloss: 0.001,
        }
    }
}

/// Document-wide shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeomDefaults {
    /// Collision margin.
    pub margin: f64,
    /// Contact type bitmask.
    pub contype: u32,
    /// Contact affinity bitmask.
    pub conaffinity: u32,
    /// Contact dimensionality.
    pub condim: u8,
    /// Visualization group.
    pub group: i32,
}

impl Default for GeomDefaults {
    fn default() -> Self {
        Self {
            margin: 0.0005,
            contype: 1,
            conaffinity: 1,
            condim: 3,
            group: 0,
        }
    }
}

/// Joint attributes a class may set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointOverrides {
    /// Position limits.
    pub range: Option<[f64; 2]>,
    /// Viscous damping coefficient.
    pub damping: Option<f64>,
    /// Dry friction loss.
    pub frictionloss: Option<f64>,
    /// Reflected rotor inertia.
    pub armature: Option<f64>,
    /// Limit activation margin.
    pub margin: Option<f64>,
}

/// Shape attributes a class may set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeomOverrides {
    /// Shape type.
    #[serde(rename = "type")]
    pub kind: Option<GeomType>,
    /// Contact type bitmask.
    pub contype: Option<u32>,
    /// Contact affinity bitmask.
    pub conaffinity: Option<u32>,
    /// Contact dimensionality.
    pub condim: Option<u8>,
    /// Collision margin.
    pub margin: Option<f64>,
    /// Visualization group.
    pub group: Option<i32>,
}

/// A named default class. Unset attributes fall through to `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultClass {
    /// Class name.
    pub name: String,
    /// Parent class name.
    #[serde(default)]
    pub parent: Option<String>,
    /// Joint overrides.
    #[serde(default)]
    pub joint: JointOverrides,
    /// Shape overrides.
    #[serde(default)]
    pub geom: GeomOverrides,
}

impl DefaultClass {
    /// A class with no overrides.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            joint: JointOverrides::default(),
            geom: GeomOverrides::default(),
        }
    }
}

/// The defaults section of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Document-wide joint parameters.
    pub joint: JointDefaults,
    /// Document-wide shape parameters.
    pub geom: GeomDefaults,
    /// Named classes.
    pub classes: Vec<DefaultClass>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_values() {
        let joint = JointDefaults::default();
        assert_eq!(joint.margin, 0.01);
        assert_eq!(joint.armature, 0.001);
        assert_eq!(joint.damping, 0.1);
        assert_eq!(joint.frictionloss, 0.001);
        assert_eq!(GeomDefaults::default().margin, 0.0005);
    }

    #[test]
    fn partial_override_keeps_rest() {
        let joint: JointDefaults = serde_json::from_str(r#"{ "damping": 0.5 }"#).unwrap();
        assert_eq!(joint.damping, 0.5);
        assert_eq!(joint.armature, 0.001);
    }

    #[test]
    fn class_from_json() {
        let class: DefaultClass = serde_json::from_str(
            r#"{ "name": "visual", "geom": { "contype": 0, "conaffinity": 0, "group": 1 } }"#,
        )
        .unwrap();
        assert_eq!(class.geom.contype, Some(0));
        assert_eq!(class.geom.kind, None);
        assert!(class.parent.is_none());
    }
}
