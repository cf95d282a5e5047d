//! The built-in 24-DOF hand.
//!
//! Mount, forearm, a two-joint wrist, the palm, four fingers and a
//! five-joint thumb. Each finger's `J1` and `J0` are coupled by a tendon,
//! so only 20 of the 24 DOFs carry actuators.

use std::f64::consts::FRAC_1_SQRT_2;

use dexhand_ir::{
    ActuatorDecl, BodyDecl, DefaultClass, Document, GeomDecl, GeomType, Inertial, JointDecl,
    MeshAsset, PairDecl, Pose, Quat, SensorDecl, SiteDecl, TendonDecl, Vec3,
};

const X: Vec3 = Vec3 {
    x: 1.0,
    y: 0.0,
    z: 0.0,
};
const Y: Vec3 = Vec3 {
    x: 0.0,
    y: 1.0,
    z: 0.0,
};

/// Finger joint ranges.
const SPREAD: f64 = 0.349;
const FLEX: f64 = 1.571;

const MESHES: [(&str, &str); 12] = [
    ("forearm", "forearm_electric.stl"),
    ("forearm_cvx", "forearm_electric_cvx.stl"),
    ("wrist", "wrist.stl"),
    ("palm", "palm.stl"),
    ("knuckle", "knuckle.stl"),
    ("F3", "F3.stl"),
    ("F2", "F2.stl"),
    ("F1", "F1.stl"),
    ("lfmetacarpal", "lfmetacarpal.stl"),
    ("TH3_z", "TH3_z.stl"),
    ("TH2_z", "TH2_z.stl"),
    ("TH1_z", "TH1_z.stl"),
];

/// Explicit contact pairs. `C_lfdistal`/`C_rfdistal` appears twice.
const PAIRS: [(&str, &str); 19] = [
    ("C_ffdistal", "C_thdistal"),
    ("C_ffmiddle", "C_thdistal"),
    ("C_ffproximal", "C_thdistal"),
    ("C_mfproximal", "C_thdistal"),
    ("C_mfdistal", "C_thdistal"),
    ("C_rfdistal", "C_thdistal"),
    ("C_lfdistal", "C_thdistal"),
    ("C_palm0", "C_thdistal"),
    ("C_mfdistal", "C_ffdistal"),
    ("C_rfdistal", "C_mfdistal"),
    ("C_lfdistal", "C_rfdistal"),
    ("C_mfproximal", "C_ffproximal"),
    ("C_rfproximal", "C_mfproximal"),
    ("C_lfproximal", "C_rfproximal"),
    ("C_lfdistal", "C_rfdistal"),
    ("C_lfdistal", "C_mfdistal"),
    ("C_lfdistal", "C_rfmiddle"),
    ("C_lfmiddle", "C_rfdistal"),
    ("C_lfmiddle", "C_rfmiddle"),
];

fn inertial(mass: f64, pos: [f64; 3], diag: [f64; 3]) -> Inertial {
    Inertial {
        frame: Pose::at(pos[0], pos[1], pos[2]),
        mass,
        diag_inertia: Vec3::new(diag[0], diag[1], diag[2]),
    }
}

fn visual(mesh: &str) -> GeomDecl {
    let mut geom = GeomDecl::mesh(mesh, mesh).with_class("visual");
    geom.name = None;
    geom
}

fn collision(geom: GeomDecl) -> GeomDecl {
    geom.with_class("collision")
}

fn hinge(name: &str, axis: Vec3, lo: f64, hi: f64, user: i64) -> JointDecl {
    JointDecl::hinge(name, axis)
        .with_range(lo, hi)
        .with_user(user)
}

fn fingertip(prefix: &str) -> [SiteDecl; 2] {
    [
        SiteDecl::marker(format!("S_{prefix}tip"), Pose::at(0.0, 0.0, 0.026)),
        SiteDecl::touch_box(
            format!("Tch_{prefix}tip"),
            Pose::at(0.0, -0.004, 0.018),
            [0.009, 0.004, 0.013],
        ),
    ]
}

/// A four-joint finger rooted at its knuckle. `tags` are the user tags of
/// `J3`, `J2`, `J1`, `J0`.
fn finger(prefix: &str, pos: [f64; 3], tags: [i64; 4]) -> BodyDecl {
    let joint = |n: usize| format!("{}J{n}", prefix.to_uppercase());
    let [tip, touch] = fingertip(prefix);

    let distal = BodyDecl::new(format!("{prefix}distal"))
        .at(0.0, 0.0, 0.025)
        .with_inertial(
            inertial(0.01, [0.0, 0.0, 0.015], [1e-5; 3]).with_quat(Quat::new(0.707, -0.003, 0.003, 0.707)),
        )
        .with_joint(hinge(&joint(0), X, 0.0, FLEX, tags[3]))
        .with_geom(visual("F1"))
        .with_geom(collision(
            GeomDecl::capsule(format!("C_{prefix}distal"), 0.00705, 0.012)
                .with_pose(Pose::at(0.0, 0.0, 0.012))
                .with_condim(4),
        ))
        .with_site(tip)
        .with_site(touch);

    let middle = BodyDecl::new(format!("{prefix}middle"))
        .at(0.0, 0.0, 0.045)
        .with_inertial(inertial(0.012, [0.0, 0.0, 0.011], [1e-5; 3]))
        .with_joint(hinge(&joint(1), X, 0.0, FLEX, tags[2]))
        .with_geom(visual("F2"))
        .with_geom(collision(
            GeomDecl::capsule(format!("C_{prefix}middle"), 0.00805, 0.0125)
                .with_pose(Pose::at(0.0, 0.0, 0.0125)),
        ))
        .with_child(distal);

    let proximal = BodyDecl::new(format!("{prefix}proximal"))
        .with_inertial(
            inertial(0.014, [0.0, 0.0, 0.023], [1e-5; 3]).with_quat(Quat::new(0.707, -0.004, 0.004, 0.707)),
        )
        .with_joint(hinge(&joint(2), X, 0.0, FLEX, tags[1]))
        .with_geom(visual("F3"))
        .with_geom(collision(
            GeomDecl::capsule(format!("C_{prefix}proximal"), 0.01, 0.0225)
                .with_pose(Pose::at(0.0, 0.0, 0.0225)),
        ))
        .with_child(middle);

    BodyDecl::new(format!("{prefix}knuckle"))
        .at(pos[0], pos[1], pos[2])
        .with_inertial(
            inertial(0.008, [0.0; 3], [2.6e-7; 3]).with_quat(Quat::new(0.52, 0.854, 0.006, -0.003)),
        )
        .with_joint(hinge(&joint(3), Y, -SPREAD, SPREAD, tags[0]))
        .with_geom(visual("knuckle"))
        .with_child(proximal)
}

fn little_finger() -> BodyDecl {
    BodyDecl::new("lfmetacarpal")
        .at(-0.017, 0.0, 0.044)
        .with_inertial(inertial(0.075, [-0.014, 0.001, 0.014], [1e-5; 3]))
        .with_joint(hinge("LFJ4", Vec3::new(0.571, 0.0, 0.821), 0.0, 0.785, 1116))
        .with_geom(visual("lfmetacarpal"))
        .with_geom(collision(
            GeomDecl::cuboid("C_lfmetacarpal", 0.0095, 0.0111, 0.025)
                .with_pose(Pose::at(-0.016, 0.0, 0.014)),
        ))
        .with_child(finger("lf", [-0.017, 0.0, 0.044], [1115, 1114, 1113, 1112]))
}

fn thumb() -> BodyDecl {
    let z_down = Vec3::new(0.0, 0.0, -1.0);

    let distal = BodyDecl::new("thdistal")
        .at(0.0, 0.0, 0.032)
        .with_inertial(inertial(0.016, [0.0, 0.0, 0.016], [1e-5; 3]))
        .with_joint(hinge("THJ0", Y, -FLEX, 0.0, 1117))
        .with_geom(visual("TH1_z"))
        .with_geom(collision(
            GeomDecl::capsule("C_thdistal", 0.00918, 0.013)
                .with_pose(Pose::at(0.0, 0.0, 0.013))
                .with_condim(4),
        ))
        .with_site(SiteDecl::marker("S_thtip", Pose::at(0.0, 0.0, 0.0275)))
        .with_site(SiteDecl::touch_box(
            "Tch_thtip",
            Pose::at(-0.005, 0.0, 0.016),
            [0.005, 0.011, 0.016],
        ));

    let middle = BodyDecl::new("thmiddle")
        .with_inertial(inertial(0.016, [0.0, 0.0, 0.016], [1e-5; 3]))
        .with_joint(hinge("THJ1", Y, -0.524, 0.524, 1118))
        .with_geom(visual("TH2_z"))
        .with_geom(collision(
            GeomDecl::capsule("C_thmiddle", 0.011, 0.016).with_pose(Pose::at(0.0, 0.0, 0.016)),
        ))
        .with_child(distal);

    let hub = BodyDecl::new("thhub")
        .at(0.0, 0.0, 0.038)
        .with_inertial(inertial(0.002, [0.0; 3], [1e-5; 3]))
        .with_joint(hinge("THJ2", X, -0.209, 0.209, 1119))
        .with_child(middle);

    let proximal = BodyDecl::new("thproximal")
        .with_inertial(inertial(0.016, [0.0, 0.0, 0.017], [1e-5; 3]))
        .with_joint(hinge("THJ3", X, 0.0, 1.222, 1120))
        .with_geom(visual("TH3_z"))
        .with_geom(collision(
            GeomDecl::capsule("C_thproximal", 0.013, 0.019).with_pose(Pose::at(0.0, 0.0, 0.019)),
        ))
        .with_child(hub);

    BodyDecl::new("thbase")
        .at(0.034, -0.009, 0.029)
        .with_quat(Quat::from_axis_angle(Y, 0.785))
        .with_inertial(inertial(0.01, [0.0; 3], [1e-5; 3]))
        .with_joint(hinge("THJ4", z_down, -1.047, 1.047, 1121))
        .with_child(proximal)
}

fn arm() -> BodyDecl {
    let palm = BodyDecl::new("palm")
        .at(0.0, 0.0, 0.034)
        .with_inertial(
            inertial(0.3, [0.006, 0.0, 0.036], [1e-3; 3]).with_quat(Quat::new(0.716, 0.044, 0.075, 0.693)),
        )
        .with_joint(
            hinge("WRJ0", X, -0.698, 0.489, 1122).with_dynamics(0.5, 0.005),
        )
        .with_geom(visual("palm"))
        .with_geom(collision(
            GeomDecl::cuboid("C_palm0", 0.032, 0.0111, 0.049).with_pose(Pose::at(0.011, 0.0, 0.038)),
        ))
        .with_geom(collision(
            GeomDecl::cuboid("C_palm1", 0.011, 0.0111, 0.025).with_pose(Pose::at(-0.032, 0.0, 0.014)),
        ))
        .with_site(SiteDecl::marker("S_grasp", Pose::at(0.007, -0.05, 0.07)))
        .with_child(finger("ff", [0.033, 0.0, 0.095], [1103, 1102, 1101, 1100]))
        .with_child(finger("mf", [0.011, 0.0, 0.099], [1107, 1106, 1105, 1104]))
        .with_child(finger("rf", [-0.011, 0.0, 0.095], [1111, 1110, 1109, 1108]))
        .with_child(little_finger())
        .with_child(thumb());

    let wrist = BodyDecl::new("wrist")
        .at(0.0, 0.0, 0.256)
        .with_inertial(
            inertial(0.3, [0.003, 0.0, 0.016], [1e-3; 3]).with_quat(Quat::new(0.504, 0.496, 0.495, 0.504)),
        )
        .with_joint(hinge("WRJ1", Y, -0.489, 0.14, 1123).with_dynamics(0.5, 0.005))
        .with_geom(visual("wrist"))
        .with_geom(collision(
            GeomDecl::capsule("C_wrist", 0.015, 0.01).with_pose(Pose {
                pos: Vec3::default(),
                quat: Quat::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0, 0.0),
            }),
        ))
        .with_child(palm);

    let forearm = BodyDecl::new("forearm")
        .at(0.0, 0.01, 0.0)
        .with_inertial(
            inertial(4.0, [0.001, -0.002, 0.29], [0.01, 0.01, 0.0075])
                .with_quat(Quat::new(0.982, -0.016, 0.0, -0.188)),
        )
        .with_geom(visual("forearm"))
        .with_geom(collision(GeomDecl::mesh("C_forearm", "forearm_cvx")))
        .with_child(wrist);

    BodyDecl::new("hand_mount")
        .at(1.0, 1.25, 0.15)
        .with_quat(Quat::new(0.0, 0.0, -FRAC_1_SQRT_2, FRAC_1_SQRT_2))
        .with_childclass("hand")
        .with_inertial(inertial(0.1, [0.0; 3], [1e-3; 3]))
        .with_child(forearm)
}

fn classes() -> Vec<DefaultClass> {
    let hand = DefaultClass::new("hand");

    let mut visual = DefaultClass::new("visual");
    visual.parent = Some("hand".to_string());
    visual.geom.kind = Some(GeomType::Mesh);
    visual.geom.contype = Some(0);
    visual.geom.conaffinity = Some(0);
    visual.geom.group = Some(1);

    let mut collision = DefaultClass::new("collision");
    collision.parent = Some("hand".to_string());
    collision.geom.contype = Some(1);
    collision.geom.conaffinity = Some(0);
    collision.geom.group = Some(4);

    vec![hand, visual, collision]
}

/// Joint names in DOF order.
pub const JOINTS: [&str; 24] = [
    "WRJ1", "WRJ0", "FFJ3", "FFJ2", "FFJ1", "FFJ0", "MFJ3", "MFJ2", "MFJ1", "MFJ0", "RFJ3",
    "RFJ2", "RFJ1", "RFJ0", "LFJ4", "LFJ3", "LFJ2", "LFJ1", "LFJ0", "THJ4", "THJ3", "THJ2",
    "THJ1", "THJ0",
];

/// `(joint, force limit)` for every actuated joint, in actuator order.
const ACTUATED: [(&str, f64); 20] = [
    ("WRJ1", 4.785),
    ("WRJ0", 2.175),
    ("FFJ3", 0.9),
    ("FFJ2", 0.9),
    ("FFJ1", 0.7245),
    ("MFJ3", 0.9),
    ("MFJ2", 0.9),
    ("MFJ1", 0.7245),
    ("RFJ3", 0.9),
    ("RFJ2", 0.9),
    ("RFJ1", 0.7245),
    ("LFJ4", 0.9),
    ("LFJ3", 0.9),
    ("LFJ2", 0.9),
    ("LFJ1", 0.7245),
    ("THJ4", 2.3722),
    ("THJ3", 1.45),
    ("THJ2", 0.99),
    ("THJ1", 0.99),
    ("THJ0", 0.81),
];

/// Control range of a position actuator: the range of the joint it drives.
fn joint_range(joint: &str) -> [f64; 2] {
    match joint {
        "WRJ1" => [-0.489, 0.14],
        "WRJ0" => [-0.698, 0.489],
        "LFJ4" => [0.0, 0.785],
        "THJ4" => [-1.047, 1.047],
        "THJ3" => [0.0, 1.222],
        "THJ2" => [-0.209, 0.209],
        "THJ1" => [-0.524, 0.524],
        "THJ0" => [-FLEX, 0.0],
        j if j.ends_with('3') => [-SPREAD, SPREAD],
        _ => [0.0, FLEX],
    }
}

/// The built-in hand description, unvalidated.
pub fn shadow_hand() -> Document {
    let mut doc = Document::with_root("shadow_hand", arm());
    doc.version = "1.0".to_string();

    doc.meshes = MESHES
        .iter()
        .map(|(name, file)| MeshAsset {
            name: name.to_string(),
            file: file.to_string(),
            scale: Some(Vec3::new(0.001, 0.001, 0.001)),
        })
        .collect();
    doc.defaults.classes = classes();

    doc.tendons = ["FF", "MF", "RF", "LF"]
        .iter()
        .map(|f| {
            TendonDecl::new(format!("T_{f}J1c"), -0.001, 0.001)
                .with_joint(format!("{f}J1"), -0.00805)
                .with_joint(format!("{f}J0"), 0.00705)
        })
        .collect();

    doc.contact.pairs = PAIRS
        .iter()
        .map(|(a, b)| PairDecl::new(*a, *b, 1))
        .collect();

    doc.actuators = ACTUATED
        .iter()
        .map(|&(joint, limit)| {
            let kp = if joint.starts_with("WR") { 5.0 } else { 1.0 };
            ActuatorDecl::position(
                format!("A_{joint}"),
                joint,
                kp,
                joint_range(joint),
                [-limit, limit],
            )
        })
        .collect();

    doc.sensors = JOINTS
        .iter()
        .map(|j| SensorDecl::joint_pos(format!("Sjp_{j}"), *j))
        .chain(
            ["ff", "mf", "rf", "lf", "th"]
                .iter()
                .map(|f| SensorDecl::touch(format!("ST_Tch_{f}tip"), format!("Tch_{f}tip"))),
        )
        .collect();

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dexhand_ir::UserTag;
    use dexhand_kernel::{Model, ModelError, StateSnapshot, StructuralKind};
    use std::sync::Arc;

    fn model() -> Model {
        Model::from_document(shadow_hand()).unwrap()
    }

    #[test]
    fn dof_layout() {
        let model = model();
        assert_eq!(model.dof_count(), 24);
        assert_eq!(model.dofs().len(), 24);
        for (i, name) in JOINTS.iter().enumerate() {
            assert_eq!(model.dof_index(name), Some(i), "{name}");
        }
        let joint = model.dofs().joint(0);
        assert_eq!(joint.user, Some(UserTag(1123)));
        assert_eq!(joint.damping, 0.5);
        assert_eq!(model.dofs().joint(4).damping, 0.1);
        assert_eq!(model.dofs().joint(4).margin, 0.01);
    }

    #[test]
    fn ranges_match_actuator_control() {
        let model = model();
        for actuator in model.actuators().actuators() {
            let joint = model.dofs().joint(actuator.joint);
            assert_eq!(joint.range, Some(actuator.ctrl_range), "{}", actuator.name);
        }
    }

    #[test]
    fn parent_walk_terminates_at_root() {
        let model = model();
        let tree = model.tree();
        assert_eq!(tree.len(), 26);
        for id in 0..tree.len() {
            let ancestors: Vec<_> = tree.ancestors(id).collect();
            assert!(ancestors.len() <= tree.max_depth());
            assert_eq!(ancestors.last().copied().unwrap_or(id), tree.root());
        }
    }

    #[test]
    fn tendons_hold_at_rest_and_are_linear() {
        let model = model();
        let rest = model.rest_positions();
        assert_eq!(model.tendons().len(), 4);
        for tendon in model.tendons().tendons() {
            assert_eq!(tendon.evaluate(&rest), 0.0);
            assert!(tendon.is_satisfied(&rest));
            for term in &tendon.terms {
                let eps = 0.01;
                let mut q = rest.clone();
                q[term.dof] += eps;
                assert_relative_eq!(tendon.evaluate(&q), term.coef * eps, epsilon = 1e-15);
            }
        }
        let t = model.tendons().tendon(model.tendon_id("T_FFJ1c").unwrap());
        assert_eq!(t.terms[0].dof, model.dof_index("FFJ1").unwrap());
        assert_eq!(t.terms[0].coef, -0.00805);
    }

    #[test]
    fn actuator_clamps() {
        let model = model();
        assert_eq!(model.actuators().len(), 20);
        let a = model.actuators().actuator(model.actuator_id("A_FFJ2").unwrap());
        assert_eq!(a.compute_force(10.0, 0.0), 0.9);

        for actuator in model.actuators().actuators() {
            let range = actuator.force_range;
            for ctrl in [-1e9, -1.0, 0.0, 0.3, 1e9] {
                let f = actuator.compute_force(ctrl, 0.2);
                assert!(range.contains(f), "{} {ctrl} -> {f}", actuator.name);
            }
        }
        let wrist = model.actuators().actuator(0);
        assert_eq!(wrist.law.gain, 5.0);
        assert_eq!(wrist.law.bias, [0.0, -5.0]);
    }

    #[test]
    fn contact_pairs() {
        let model = model();
        let contacts = model.contacts();
        assert_eq!(contacts.declared_count(), 19);
        assert_eq!(contacts.pairs().len(), 18);
        for (a, b) in PAIRS {
            assert_eq!(model.is_pair_enabled(a, b), Some(1));
            assert_eq!(model.is_pair_enabled(a, b), model.is_pair_enabled(b, a));
        }
        assert_eq!(model.is_pair_enabled("C_palm1", "C_thdistal"), None);
    }

    #[test]
    fn class_resolution() {
        let model = model();
        let palm = model.geometry().shape(model.shape_id("C_palm0").unwrap());
        assert_eq!((palm.contype, palm.conaffinity, palm.group), (1, 0, 4));
        assert_eq!(palm.margin, 0.0005);
        let tip = model.geometry().shape(model.shape_id("C_thdistal").unwrap());
        assert_eq!(tip.condim, 4);

        let visual = model
            .geometry()
            .shapes()
            .iter()
            .filter(|s| s.name.is_none())
            .collect::<Vec<_>>();
        assert_eq!(visual.len(), 23);
        assert!(visual.iter().all(|s| s.contype == 0 && s.group == 1));
    }

    #[test]
    fn sensors_in_declaration_order() {
        let model = model();
        let sensors = model.sensors();
        assert_eq!(sensors.len(), 29);
        assert_eq!(sensors.sensor(0).name, "Sjp_WRJ1");
        assert_eq!(sensors.sensor(28).name, "ST_Tch_thtip");

        let positions: Vec<f64> = (0..24).map(|i| i as f64 * 0.01).collect();
        let touch = vec![0.0; model.sites().len()];
        let mut snapshot = StateSnapshot { positions, touch };
        snapshot.touch[model.site_id("Tch_thtip").unwrap()] = 2.5;
        let values = model.read_sensors(&snapshot);
        assert_eq!(&values[..24], &snapshot.positions[..]);
        assert_eq!(values[28], 2.5);
    }

    #[test]
    fn duplicate_body_name() {
        let mut doc = shadow_hand();
        doc.root.children[0].name = "palm".to_string();
        let err = Model::from_document(doc).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Structural {
                kind: StructuralKind::DuplicateName { namespace: "body" },
                ..
            }
        ));
    }

    #[test]
    fn mass_and_kinematics() {
        let model = model();
        assert_relative_eq!(model.total_mass(), 5.011, epsilon = 1e-9);

        let ff = model.body_id("ffproximal").unwrap();
        let distal = model.body_id("ffdistal").unwrap();
        let mut q = model.rest_positions();
        let rest = model.forward_kinematics(&q);
        q[model.dof_index("FFJ2").unwrap()] = 1.2;
        let bent = model.forward_kinematics(&q);

        let span = |poses: &[nalgebra::Isometry3<f64>]| {
            (poses[distal].translation.vector - poses[ff].translation.vector).norm()
        };
        assert_relative_eq!(span(&rest), 0.07, epsilon = 1e-12);
        assert_relative_eq!(span(&bent), 0.07, epsilon = 1e-12);
        assert!((bent[distal].translation.vector - rest[distal].translation.vector).norm() > 0.01);
    }

    #[test]
    fn json_roundtrip_validates() {
        let doc = shadow_hand();
        let json = doc.to_json().unwrap();
        let parsed = Document::from_json(&json).unwrap();
        assert_eq!(parsed, doc);
        let model = Model::from_document(parsed).unwrap();
        assert_eq!(model.summary(), self::model().summary());
    }

    #[test]
    fn shared_across_threads() {
        let model = Arc::new(model());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let model = Arc::clone(&model);
                std::thread::spawn(move || {
                    let snapshot = StateSnapshot {
                        positions: vec![i as f64; 24],
                        touch: Vec::new(),
                    };
                    model.read_sensors(&snapshot)[0]
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), i as f64);
        }
    }
}
