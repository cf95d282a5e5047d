//! Kinematic tree construction.
//!
//! Bodies arrive as parent-indexed records. Each parent must be declared
//! before its children; the builder then renumbers bodies in depth-first
//! pre-order, which is the order every downstream index follows.

use std::collections::HashMap;
use std::ops::Range;

use dexhand_ir::{FlatBody, Inertial};
use nalgebra::{Isometry3, Matrix3, UnitQuaternion, Vector3};

use crate::error::{ModelError, Result, StructuralKind};
use crate::math::{self, non_negative};
use crate::dof::JointId;
use crate::registry::ShapeId;
use crate::site::SiteId;

/// Dense body index. Equal to the body's pre-order rank; the root is 0.
pub type BodyId = usize;

/// Mass properties in the body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inertia {
    /// Mass (kg).
    pub mass: f64,
    /// Center of mass in the body frame.
    pub com: Vector3<f64>,
    /// Orientation of the principal axes in the body frame.
    pub principal: UnitQuaternion<f64>,
    /// Principal moments of inertia.
    pub diagonal: Vector3<f64>,
}

impl Inertia {
    /// Zero mass at the body origin.
    pub fn massless() -> Self {
        Self {
            mass: 0.0,
            com: Vector3::zeros(),
            principal: UnitQuaternion::identity(),
            diagonal: Vector3::zeros(),
        }
    }

    fn from_decl(body: &str, inertial: &Inertial) -> Result<Self> {
        let mass = non_negative(body, "mass", inertial.mass)?;
        let frame = math::isometry(body, &inertial.frame)?;
        let diagonal = math::vector(inertial.diag_inertia);
        for &moment in diagonal.iter() {
            non_negative(body, "diag_inertia", moment)?;
        }
        // Principal moments of a physical body obey the triangle inequality.
        let (a, b, c) = (diagonal.x, diagonal.y, diagonal.z);
        let slack = 1e-12 * (a + b + c);
        if a + b + slack < c || a + c + slack < b || b + c + slack < a {
            return Err(ModelError::invalid_parameter(
                body,
                "diag_inertia",
                format!("moments [{a}, {b}, {c}] violate the triangle inequality"),
            ));
        }
        Ok(Self {
            mass,
            com: frame.translation.vector,
            principal: frame.rotation,
            diagonal,
        })
    }

    /// Full inertia tensor about the center of mass, in the body frame.
    pub fn tensor(&self) -> Matrix3<f64> {
        let r = self.principal.to_rotation_matrix();
        r.matrix() * Matrix3::from_diagonal(&self.diagonal) * r.matrix().transpose()
    }
}

/// A rigid link.
#[derive(Debug, Clone)]
pub struct Body {
    /// Unique name.
    pub name: String,
    /// Parent body. `None` only for the root.
    pub parent: Option<BodyId>,
    /// Children in declaration order.
    pub children: Vec<BodyId>,
    /// Distance from the root.
    pub depth: usize,
    /// Transform from this body's frame to its parent's frame at rest.
    pub local: Isometry3<f64>,
    /// Mass properties.
    pub inertia: Inertia,
    /// Joints attached to this body, as a range into the DOF table.
    pub joints: Range<JointId>,
    /// Attached shapes.
    pub shapes: Vec<ShapeId>,
    /// Attached sites.
    pub sites: Vec<SiteId>,
}

/// The rooted body tree.
#[derive(Debug, Clone)]
pub struct KinematicTree {
    bodies: Vec<Body>,
    index: HashMap<String, BodyId>,
}

impl KinematicTree {
    /// Build the tree from parent-indexed records.
    ///
    /// Returns the tree and, for each body id, the position of its record in
    /// `records`.
    pub fn build(records: &[FlatBody<'_>]) -> Result<(Self, Vec<usize>)> {
        let mut position: HashMap<&str, usize> = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if position.insert(record.name(), i).is_some() {
                return Err(ModelError::duplicate("body", record.name()));
            }
        }

        let mut root = None;
        for record in records {
            if record.parent.is_none() {
                if root.is_some() {
                    return Err(ModelError::structural(
                        record.name(),
                        StructuralKind::MultipleRoots,
                    ));
                }
                root = Some(record);
            }
        }
        let Some(root) = root else {
            let name = records.first().map_or("<empty>", |r| r.name());
            return Err(ModelError::structural(name, StructuralKind::MissingRoot));
        };

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
        for (i, record) in records.iter().enumerate() {
            let Some(parent) = record.parent else {
                continue;
            };
            let Some(&p) = position.get(parent) else {
                return Err(ModelError::structural(
                    record.name(),
                    StructuralKind::DanglingParent {
                        parent: parent.to_string(),
                    },
                ));
            };
            if p >= i {
                return Err(Self::forward_reference(records, &position, i, parent));
            }
            children[p].push(i);
        }

        // Depth-first pre-order from the root.
        let root_pos = position[root.name()];
        let mut order = Vec::with_capacity(records.len());
        let mut id_of = vec![usize::MAX; records.len()];
        let mut stack = vec![root_pos];
        while let Some(pos) = stack.pop() {
            id_of[pos] = order.len();
            order.push(pos);
            stack.extend(children[pos].iter().rev());
        }

        let mut bodies: Vec<Body> = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());
        for &pos in &order {
            let record = &records[pos];
            let name = record.name();
            let parent = record.parent.map(|p| id_of[position[p]]);
            let depth = parent.map_or(0, |p: BodyId| bodies[p].depth + 1);
            let inertia = match &record.decl.inertial {
                Some(inertial) => Inertia::from_decl(name, inertial)?,
                None => Inertia::massless(),
            };
            index.insert(name.to_string(), bodies.len());
            bodies.push(Body {
                name: name.to_string(),
                parent,
                children: children[pos].iter().map(|&c| id_of[c]).collect(),
                depth,
                local: math::isometry(name, &record.decl.pose)?,
                inertia,
                joints: 0..0,
                shapes: Vec::new(),
                sites: Vec::new(),
            });
        }

        Ok((Self { bodies, index }, order))
    }

    /// Classify a reference to a parent declared at or after the child.
    fn forward_reference(
        records: &[FlatBody<'_>],
        position: &HashMap<&str, usize>,
        start: usize,
        parent: &str,
    ) -> ModelError {
        let mut current = start;
        for _ in 0..records.len() {
            let Some(next) = records[current].parent.and_then(|p| position.get(p)) else {
                break;
            };
            if *next == start {
                return ModelError::structural(records[start].name(), StructuralKind::Cycle);
            }
            current = *next;
        }
        ModelError::structural(
            records[start].name(),
            StructuralKind::DanglingParent {
                parent: parent.to_string(),
            },
        )
    }

    pub(crate) fn attach(
        &mut self,
        body: BodyId,
        joints: Range<JointId>,
        shapes: Vec<ShapeId>,
        sites: Vec<SiteId>,
    ) {
        let body = &mut self.bodies[body];
        body.joints = joints;
        body.shapes = shapes;
        body.sites = sites;
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the tree has no bodies. Never true for a built tree.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// The root body id.
    pub fn root(&self) -> BodyId {
        0
    }

    /// Body by id.
    pub fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id]
    }

    /// All bodies in pre-order.
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Look up a body by name.
    pub fn id(&self, name: &str) -> Option<BodyId> {
        self.index.get(name).copied()
    }

    /// Strict ancestors of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: BodyId) -> impl Iterator<Item = BodyId> + '_ {
        std::iter::successors(self.bodies[id].parent, move |&b| self.bodies[b].parent)
    }

    /// Greatest body depth.
    pub fn max_depth(&self) -> usize {
        self.bodies.iter().map(|b| b.depth).max().unwrap_or(0)
    }

    /// Rest-pose transform from `id`'s frame to the root's parent frame.
    pub fn rest_world_pose(&self, id: BodyId) -> Isometry3<f64> {
        let mut pose = self.bodies[id].local;
        for ancestor in self.ancestors(id) {
            pose = self.bodies[ancestor].local * pose;
        }
        pose
    }
}
