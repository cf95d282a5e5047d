//! Forward kinematics and subtree mass properties.
//!
//! Bodies are stored in pre-order, so a single forward pass composes world
//! poses from the root outward and a single backward pass accumulates mass
//! from the leaves inward.

use dexhand_ir::JointType;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

use crate::dof::{DofTable, Joint};
use crate::math::DEGENERATE_NORM;
use crate::tree::KinematicTree;

/// Transform contributed by one joint at the given DOF positions.
///
/// A hinge rotates by `q - reference` about its axis through the pivot. A
/// free joint translates by `q[0..3]` and then rotates by the rotation vector
/// `q[3..6]`.
pub fn joint_transform(joint: &Joint, positions: &[f64]) -> Isometry3<f64> {
    match joint.kind {
        JointType::Hinge => {
            let angle = positions[joint.dof] - joint.reference;
            let rotation = UnitQuaternion::from_axis_angle(&joint.axis, angle);
            Isometry3::rotation_wrt_point(rotation, Point3::from(joint.pivot))
        }
        JointType::Free => {
            let q = &positions[joint.dofs()];
            Isometry3::from_parts(
                Translation3::new(q[0], q[1], q[2]),
                UnitQuaternion::from_scaled_axis(Vector3::new(q[3], q[4], q[5])),
            )
        }
    }
}

/// World pose of every body, indexed by body id.
///
/// # Panics
///
/// Panics if `positions` is shorter than the DOF count.
pub fn forward_kinematics(
    tree: &KinematicTree,
    dofs: &DofTable,
    positions: &[f64],
) -> Vec<Isometry3<f64>> {
    let mut poses: Vec<Isometry3<f64>> = Vec::with_capacity(tree.len());
    for body in tree.bodies() {
        let mut pose = match body.parent {
            Some(parent) => poses[parent] * body.local,
            None => body.local,
        };
        for id in body.joints.clone() {
            pose *= joint_transform(dofs.joint(id), positions);
        }
        poses.push(pose);
    }
    poses
}

/// Mass of each body's subtree, itself included.
pub fn subtree_mass(tree: &KinematicTree) -> Vec<f64> {
    let mut mass: Vec<f64> = tree.bodies().iter().map(|b| b.inertia.mass).collect();
    for (id, body) in tree.bodies().iter().enumerate().rev() {
        if let Some(parent) = body.parent {
            mass[parent] += mass[id];
        }
    }
    mass
}

/// World center of mass of each body's subtree.
///
/// A massless subtree reports its body origin.
pub fn subtree_com(tree: &KinematicTree, poses: &[Isometry3<f64>]) -> Vec<Vector3<f64>> {
    let bodies = tree.bodies();
    let mut mass: Vec<f64> = bodies.iter().map(|b| b.inertia.mass).collect();
    let mut weighted: Vec<Vector3<f64>> = bodies
        .iter()
        .zip(poses)
        .map(|(b, pose)| (pose * Point3::from(b.inertia.com)).coords * b.inertia.mass)
        .collect();

    for (id, body) in bodies.iter().enumerate().rev() {
        if let Some(parent) = body.parent {
            mass[parent] += mass[id];
            let child = weighted[id];
            weighted[parent] += child;
        }
    }

    weighted
        .iter()
        .zip(&mass)
        .zip(poses)
        .map(|((w, &m), pose)| {
            if m > DEGENERATE_NORM {
                w / m
            } else {
                pose.translation.vector
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::JointParams;
    use crate::options::LoadOptions;
    use approx::assert_relative_eq;
    use dexhand_ir::{BodyDecl, Document, Inertial, JointDecl, Vec3};
    use std::f64::consts::FRAC_PI_2;

    fn params() -> JointParams {
        JointParams {
            range: None,
            damping: 0.1,
            frictionloss: 0.001,
            armature: 0.001,
            margin: 0.01,
        }
    }

    fn chain() -> (KinematicTree, DofTable) {
        let doc = Document::with_root(
            "chain",
            BodyDecl::new("base")
                .with_inertial(Inertial::new(1.0, Vec3::new(0.0, 0.0, 0.0), 1e-3))
                .with_child(
                    BodyDecl::new("link")
                        .at(0.0, 0.0, 1.0)
                        .with_inertial(Inertial::new(1.0, Vec3::new(0.0, 0.0, 1.0), 1e-3))
                        .with_joint(JointDecl::hinge("j", Vec3::new(1.0, 0.0, 0.0))),
                ),
        );
        let flat = doc.flatten();
        let (mut tree, order) = KinematicTree::build(&flat).unwrap();
        let mut dofs = DofTable::default();
        for id in 0..tree.len() {
            let decl = flat[order[id]].decl;
            let start = dofs.len();
            for joint in &decl.joints {
                dofs.allocate(id, id == 0, joint, params(), &LoadOptions::default())
                    .unwrap();
            }
            tree.attach(id, start..dofs.len(), Vec::new(), Vec::new());
        }
        (tree, dofs)
    }

    #[test]
    fn hinge_rotates_child() {
        let (tree, dofs) = chain();
        let poses = forward_kinematics(&tree, &dofs, &[FRAC_PI_2]);
        // link origin sits on the joint pivot; its COM swings from +z to -y.
        let com = poses[1] * Point3::new(0.0, 0.0, 1.0);
        assert_relative_eq!(com, Point3::new(0.0, -1.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(poses[1].translation.vector, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn rest_matches_tree() {
        let (tree, dofs) = chain();
        let poses = forward_kinematics(&tree, &dofs, &dofs.rest_positions());
        for id in 0..tree.len() {
            assert_relative_eq!(poses[id], tree.rest_world_pose(id), epsilon = 1e-12);
        }
    }

    #[test]
    fn mass_accumulates() {
        let (tree, dofs) = chain();
        assert_eq!(subtree_mass(&tree), vec![2.0, 1.0]);

        let poses = forward_kinematics(&tree, &dofs, &[0.0]);
        let com = subtree_com(&tree, &poses);
        assert_relative_eq!(com[0], Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(com[1], Vector3::new(0.0, 0.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn free_joint_transform() {
        let mut dofs = DofTable::default();
        dofs.allocate(0, true, &JointDecl::free("float"), params(), &LoadOptions::default())
            .unwrap();
        let q = [1.0, 2.0, 3.0, 0.0, 0.0, FRAC_PI_2];
        let t = joint_transform(dofs.joint(0), &q);
        assert_relative_eq!(t.translation.vector, Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(t * Vector3::x(), Vector3::y(), epsilon = 1e-12);
    }
}
