//! Intermediate representation for articulated hand models.
//!
//! This crate defines the declarative description that the kernel resolves
//! into a validated model. Every cross-reference is still a raw name here:
//! tendons name joints, contact pairs name shapes, sensors name joints or
//! sites. Resolving those names into dense indices is the kernel's job.
//!
//! The IR is purely declarative. No mesh data, no runtime state.

use serde::{Deserialize, Serialize};

mod defaults;
mod flatten;

pub use defaults::{
    DefaultClass, Defaults, GeomDefaults, GeomOverrides, JointDefaults, JointOverrides,
};
pub use flatten::FlatBody;

/// 3D vector with f64 components (meters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The +Z unit vector, the default joint axis.
    pub fn unit_z() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

/// Quaternion in `w, x, y, z` order. Need not be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    /// Scalar part.
    pub w: f64,
    /// I component.
    pub x: f64,
    /// J component.
    pub y: f64,
    /// K component.
    pub z: f64,
}

impl Quat {
    /// Create a new quaternion.
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle` radians about `axis`.
    ///
    /// A zero axis yields a zero quaternion, which the kernel rejects.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let norm = (axis.x * axis.x + axis.y * axis.y + axis.z * axis.z).sqrt();
        if norm == 0.0 {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        }
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(c, s * axis.x / norm, s * axis.y / norm, s * axis.z / norm)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::identity()
    }
}

/// Position and orientation relative to the enclosing frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation.
    #[serde(default)]
    pub pos: Vec3,
    /// Orientation.
    #[serde(default)]
    pub quat: Quat,
}

impl Pose {
    /// A pose with translation only.
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            pos: Vec3::new(x, y, z),
            quat: Quat::identity(),
        }
    }
}

/// Opaque integer payload attached to joints, actuators, sensors and tendons.
///
/// Carried through to consumers untouched; never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserTag(pub i64);

/// Mass properties of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inertial {
    /// Center of mass and principal-axis orientation, in the body frame.
    #[serde(flatten)]
    pub frame: Pose,
    /// Mass (kg).
    pub mass: f64,
    /// Principal moments of inertia (kg·m²).
    pub diag_inertia: Vec3,
}

impl Inertial {
    /// Point-like mass properties at `pos` with isotropic inertia `i`.
    pub fn new(mass: f64, pos: Vec3, i: f64) -> Self {
        Self {
            frame: Pose {
                pos,
                quat: Quat::identity(),
            },
            mass,
            diag_inertia: Vec3::new(i, i, i),
        }
    }

    /// Set the principal-axis orientation.
    pub fn with_quat(mut self, quat: Quat) -> Self {
        self.frame.quat = quat;
        self
    }
}

/// Joint type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointType {
    /// One rotational DOF about an axis.
    #[default]
    Hinge,
    /// Unconstrained 6-DOF floating base.
    Free,
}

/// A joint declaration on a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDecl {
    /// Unique joint name.
    pub name: String,
    /// Joint type.
    #[serde(default, rename = "type")]
    pub kind: JointType,
    /// Default class applied to this joint.
    #[serde(default)]
    pub class: Option<String>,
    /// Pivot point in the body frame.
    #[serde(default)]
    pub pos: Vec3,
    /// Motion axis in the body frame.
    #[serde(default = "Vec3::unit_z")]
    pub axis: Vec3,
    /// Position limits `[lo, hi]`. `None` means unlimited.
    #[serde(default)]
    pub range: Option<[f64; 2]>,
    /// Viscous damping coefficient.
    #[serde(default)]
    pub damping: Option<f64>,
    /// Dry friction loss.
    #[serde(default)]
    pub frictionloss: Option<f64>,
    /// Reflected rotor inertia.
    #[serde(default)]
    pub armature: Option<f64>,
    /// Limit activation margin.
    #[serde(default)]
    pub margin: Option<f64>,
    /// Nominal (rest) position.
    #[serde(default, rename = "ref")]
    pub reference: Option<f64>,
    /// Opaque consumer tag.
    #[serde(default)]
    pub user: Option<UserTag>,
}

impl JointDecl {
    /// A hinge about `axis` through the body origin.
    pub fn hinge(name: impl Into<String>, axis: Vec3) -> Self {
        Self {
            name: name.into(),
            kind: JointType::Hinge,
            class: None,
            pos: Vec3::default(),
            axis,
            range: None,
            damping: None,
            frictionloss: None,
            armature: None,
            margin: None,
            reference: None,
            user: None,
        }
    }

    /// A free joint, for floating bases.
    pub fn free(name: impl Into<String>) -> Self {
        Self {
            kind: JointType::Free,
            ..Self::hinge(name, Vec3::unit_z())
        }
    }

    /// Set the position limits.
    pub fn with_range(mut self, lo: f64, hi: f64) -> Self {
        self.range = Some([lo, hi]);
        self
    }

    /// Set the opaque user tag.
    pub fn with_user(mut self, tag: i64) -> Self {
        self.user = Some(UserTag(tag));
        self
    }

    /// Set damping and armature together.
    pub fn with_dynamics(mut self, damping: f64, armature: f64) -> Self {
        self.damping = Some(damping);
        self.armature = Some(armature);
        self
    }
}

/// Collision/visual shape type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeomType {
    /// Reference to a mesh asset.
    Mesh,
    /// Capsule along local Z: `[radius, half_length]`.
    Capsule,
    /// Box: `[hx, hy, hz]` half extents.
    Box,
    /// Sphere: `[radius]`.
    Sphere,
    /// Cylinder along local Z: `[radius, half_length]`.
    Cylinder,
    /// Ellipsoid: `[rx, ry, rz]`.
    Ellipsoid,
    /// Infinite plane: `[hx, hy, spacing]` rendering extents.
    Plane,
}

/// A shape attached to a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeomDecl {
    /// Shape name. Unnamed shapes cannot take part in contact pairs.
    #[serde(default)]
    pub name: Option<String>,
    /// Default class applied to this shape.
    #[serde(default)]
    pub class: Option<String>,
    /// Shape type. Inferred as mesh when `mesh` is set.
    #[serde(default, rename = "type")]
    pub kind: Option<GeomType>,
    /// Type-dependent size parameters.
    #[serde(default)]
    pub size: Vec<f64>,
    /// Mesh asset name, for mesh shapes.
    #[serde(default)]
    pub mesh: Option<String>,
    /// Pose in the body frame.
    #[serde(flatten)]
    pub pose: Pose,
    /// Contact type bitmask.
    #[serde(default)]
    pub contype: Option<u32>,
    /// Contact affinity bitmask.
    #[serde(default)]
    pub conaffinity: Option<u32>,
    /// Contact dimensionality.
    #[serde(default)]
    pub condim: Option<u8>,
    /// Collision margin.
    #[serde(default)]
    pub margin: Option<f64>,
    /// Visualization group.
    #[serde(default)]
    pub group: Option<i32>,
}

impl GeomDecl {
    fn shape(name: Option<String>, kind: Option<GeomType>, size: Vec<f64>) -> Self {
        Self {
            name,
            class: None,
            kind,
            size,
            mesh: None,
            pose: Pose::default(),
            contype: None,
            conaffinity: None,
            condim: None,
            margin: None,
            group: None,
        }
    }

    /// A named capsule.
    pub fn capsule(name: impl Into<String>, radius: f64, half_length: f64) -> Self {
        Self::shape(
            Some(name.into()),
            Some(GeomType::Capsule),
            vec![radius, half_length],
        )
    }

    /// A named box with half extents.
    pub fn cuboid(name: impl Into<String>, hx: f64, hy: f64, hz: f64) -> Self {
        Self::shape(Some(name.into()), Some(GeomType::Box), vec![hx, hy, hz])
    }

    /// A named sphere.
    pub fn sphere(name: impl Into<String>, radius: f64) -> Self {
        Self::shape(Some(name.into()), Some(GeomType::Sphere), vec![radius])
    }

    /// A shape drawn from a mesh asset.
    pub fn mesh(name: impl Into<String>, mesh: impl Into<String>) -> Self {
        let mut geom = Self::shape(Some(name.into()), Some(GeomType::Mesh), Vec::new());
        geom.mesh = Some(mesh.into());
        geom
    }

    /// Set the default class.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Set the pose.
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Set the contact dimensionality.
    pub fn with_condim(mut self, condim: u8) -> Self {
        self.condim = Some(condim);
        self
    }
}

/// Site shape, used for touch volumes and rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    /// Sphere marker.
    #[default]
    Sphere,
    /// Box volume.
    Box,
    /// Capsule volume.
    Capsule,
    /// Ellipsoid volume.
    Ellipsoid,
    /// Cylinder volume.
    Cylinder,
}

/// A named reference frame fixed to a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDecl {
    /// Unique site name.
    pub name: String,
    /// Pose in the body frame.
    #[serde(flatten)]
    pub pose: Pose,
    /// Site shape.
    #[serde(default, rename = "type")]
    pub kind: SiteType,
    /// Bounding extents, needed for touch volumes.
    #[serde(default)]
    pub size: Option<Vec<f64>>,
}

impl SiteDecl {
    /// A marker site at `pose`.
    pub fn marker(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            name: name.into(),
            pose,
            kind: SiteType::Sphere,
            size: None,
        }
    }

    /// A box-shaped touch volume at `pose` with half extents.
    pub fn touch_box(name: impl Into<String>, pose: Pose, half_extents: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            pose,
            kind: SiteType::Box,
            size: Some(half_extents.to_vec()),
        }
    }
}

/// A rigid body with its nested joints, shapes, sites and child bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDecl {
    /// Unique body name.
    pub name: String,
    /// Pose relative to the parent body.
    #[serde(flatten)]
    pub pose: Pose,
    /// Default class applied to every element in this subtree.
    #[serde(default)]
    pub childclass: Option<String>,
    /// Mass properties. `None` means massless.
    #[serde(default)]
    pub inertial: Option<Inertial>,
    /// Joints connecting this body to its parent, in DOF order.
    #[serde(default)]
    pub joints: Vec<JointDecl>,
    /// Attached shapes.
    #[serde(default)]
    pub geoms: Vec<GeomDecl>,
    /// Attached sites.
    #[serde(default)]
    pub sites: Vec<SiteDecl>,
    /// Child bodies, in declaration order.
    #[serde(default)]
    pub children: Vec<BodyDecl>,
}

impl BodyDecl {
    /// Create an empty body at the parent origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: Pose::default(),
            childclass: None,
            inertial: None,
            joints: Vec::new(),
            geoms: Vec::new(),
            sites: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set the translation relative to the parent.
    pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.pose.pos = Vec3::new(x, y, z);
        self
    }

    /// Set the orientation relative to the parent.
    pub fn with_quat(mut self, quat: Quat) -> Self {
        self.pose.quat = quat;
        self
    }

    /// Set the subtree default class.
    pub fn with_childclass(mut self, class: impl Into<String>) -> Self {
        self.childclass = Some(class.into());
        self
    }

    /// Set mass properties.
    pub fn with_inertial(mut self, inertial: Inertial) -> Self {
        self.inertial = Some(inertial);
        self
    }

    /// Append a joint.
    pub fn with_joint(mut self, joint: JointDecl) -> Self {
        self.joints.push(joint);
        self
    }

    /// Append a shape.
    pub fn with_geom(mut self, geom: GeomDecl) -> Self {
        self.geoms.push(geom);
        self
    }

    /// Append a site.
    pub fn with_site(mut self, site: SiteDecl) -> Self {
        self.sites.push(site);
        self
    }

    /// Append a child body.
    pub fn with_child(mut self, child: BodyDecl) -> Self {
        self.children.push(child);
        self
    }
}

/// A mesh asset. Only the name is meaningful to the kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshAsset {
    /// Unique mesh name.
    pub name: String,
    /// Source file, resolved by the host.
    pub file: String,
    /// Per-axis scale applied on load.
    #[serde(default)]
    pub scale: Option<Vec3>,
}

/// One `(joint, coefficient)` term of a fixed tendon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TendonJoint {
    /// Joint name.
    pub joint: String,
    /// Coefficient.
    pub coef: f64,
}

/// A linear coupling constraint over joint positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TendonDecl {
    /// Unique tendon name.
    pub name: String,
    /// Allowed band `[lo, hi]` for the weighted sum.
    pub range: [f64; 2],
    /// Terms of the weighted sum.
    pub joints: Vec<TendonJoint>,
    /// Opaque consumer tag.
    #[serde(default)]
    pub user: Option<UserTag>,
}

impl TendonDecl {
    /// Create a tendon with no terms.
    pub fn new(name: impl Into<String>, lo: f64, hi: f64) -> Self {
        Self {
            name: name.into(),
            range: [lo, hi],
            joints: Vec::new(),
            user: None,
        }
    }

    /// Append a term.
    pub fn with_joint(mut self, joint: impl Into<String>, coef: f64) -> Self {
        self.joints.push(TendonJoint {
            joint: joint.into(),
            coef,
        });
        self
    }
}

/// An explicit contact pair between two named shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDecl {
    /// First shape name.
    pub geom1: String,
    /// Second shape name.
    pub geom2: String,
    /// Contact dimensionality. Falls back to the shapes' own values.
    #[serde(default)]
    pub condim: Option<u8>,
}

impl PairDecl {
    /// A pair with explicit dimensionality.
    pub fn new(geom1: impl Into<String>, geom2: impl Into<String>, condim: u8) -> Self {
        Self {
            geom1: geom1.into(),
            geom2: geom2.into(),
            condim: Some(condim),
        }
    }
}

/// A body pair excluded from default contact generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludeDecl {
    /// First body name.
    pub body1: String,
    /// Second body name.
    pub body2: String,
}

/// Contact filtering section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDecl {
    /// Explicit contact pairs.
    #[serde(default)]
    pub pairs: Vec<PairDecl>,
    /// Body-pair exclusions.
    #[serde(default)]
    pub excludes: Vec<ExcludeDecl>,
}

/// An actuator driving one joint through an affine law.
///
/// `force = gain * ctrl + bias[0] + bias[1] * position`, with `ctrl` clamped
/// into `ctrlrange` first and the force clamped into `forcerange` after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorDecl {
    /// Unique actuator name.
    pub name: String,
    /// Target joint name.
    pub joint: String,
    /// Control range `[cmin, cmax]`.
    pub ctrlrange: [f64; 2],
    /// Force range `[fmin, fmax]`.
    pub forcerange: [f64; 2],
    /// Control gain.
    pub gain: f64,
    /// Bias terms `[constant, position]`.
    #[serde(default)]
    pub bias: [f64; 2],
    /// Opaque consumer tag.
    #[serde(default)]
    pub user: Option<UserTag>,
}

impl ActuatorDecl {
    /// A position servo with stiffness `kp`.
    pub fn position(
        name: impl Into<String>,
        joint: impl Into<String>,
        kp: f64,
        ctrlrange: [f64; 2],
        forcerange: [f64; 2],
    ) -> Self {
        Self {
            name: name.into(),
            joint: joint.into(),
            ctrlrange,
            forcerange,
            gain: kp,
            bias: [0.0, -kp],
            user: None,
        }
    }

    /// Set the opaque user tag.
    pub fn with_user(mut self, tag: i64) -> Self {
        self.user = Some(UserTag(tag));
        self
    }
}

/// What a sensor reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorSource {
    /// Scalar joint position.
    JointPos {
        /// Joint name.
        joint: String,
    },
    /// Aggregate contact-normal force inside a site volume.
    Touch {
        /// Site name.
        site: String,
    },
}

/// A read-only output channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDecl {
    /// Unique sensor name.
    pub name: String,
    /// Bound target.
    #[serde(flatten)]
    pub source: SensorSource,
    /// Absolute output clamp. Zero or absent disables it.
    #[serde(default)]
    pub cutoff: Option<f64>,
    /// Noise standard deviation, for consumers that simulate it.
    #[serde(default)]
    pub noise: Option<f64>,
    /// Opaque consumer tag.
    #[serde(default)]
    pub user: Option<UserTag>,
}

impl SensorDecl {
    /// A joint-position sensor.
    pub fn joint_pos(name: impl Into<String>, joint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: SensorSource::JointPos {
                joint: joint.into(),
            },
            cutoff: None,
            noise: None,
            user: None,
        }
    }

    /// A touch sensor on a site.
    pub fn touch(name: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: SensorSource::Touch { site: site.into() },
            cutoff: None,
            noise: None,
            user: None,
        }
    }
}

/// A hand model document.
///
/// Holds the body tree rooted at `root` plus the flat tendon, contact,
/// actuator and sensor lists that cross-reference it by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Format version string.
    pub version: String,
    /// Model name.
    pub model: String,
    /// Mesh assets.
    #[serde(default)]
    pub meshes: Vec<MeshAsset>,
    /// Default parameters and classes.
    #[serde(default)]
    pub defaults: Defaults,
    /// Root of the body tree.
    pub root: BodyDecl,
    /// Coupling tendons.
    #[serde(default)]
    pub tendons: Vec<TendonDecl>,
    /// Contact filtering.
    #[serde(default)]
    pub contact: ContactDecl,
    /// Actuators.
    #[serde(default)]
    pub actuators: Vec<ActuatorDecl>,
    /// Sensors, in output order.
    #[serde(default)]
    pub sensors: Vec<SensorDecl>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            model: "unnamed".to_string(),
            meshes: Vec::new(),
            defaults: Defaults::default(),
            root: BodyDecl::new("world"),
            tendons: Vec::new(),
            contact: ContactDecl::default(),
            actuators: Vec::new(),
            sensors: Vec::new(),
        }
    }
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document with a name and a root body.
    pub fn with_root(model: impl Into<String>, root: BodyDecl) -> Self {
        Self {
            model: model.into(),
            root,
            ..Self::default()
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from TOML string.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Total number of declared bodies.
    pub fn body_count(&self) -> usize {
        fn count(body: &BodyDecl) -> usize {
            1 + body.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }
}
