#![warn(missing_docs)]

//! Resolution and validation of hand model documents.
//!
//! This crate turns a [`dexhand_ir::Document`] (raw names) into a
//! [`Model`] (dense indices). Every cross-reference is resolved once; any
//! failure rejects the whole document.
//!
//! # Index contract
//!
//! - Body ids are pre-order ranks; the root is 0 and parents precede children.
//! - DOF indices follow the same pre-order, then joint declaration order. A
//!   free joint on the root takes DOFs 0..6.
//! - Shape and site ids follow body pre-order, then declaration order.
//! - Tendon, actuator and sensor ids follow declaration order. Sensor ids are
//!   also output slots for [`SensorSet::read_all`].
//!
//! # Example
//!
//! ```
//! use dexhand_ir::{BodyDecl, Document, JointDecl, Vec3};
//! use dexhand_kernel::UnvalidatedModel;
//!
//! let root = BodyDecl::new("palm").with_child(
//!     BodyDecl::new("ffproximal")
//!         .with_joint(JointDecl::hinge("FFJ2", Vec3::new(1.0, 0.0, 0.0)).with_range(0.0, 1.571)),
//! );
//! let model = UnvalidatedModel::new(Document::with_root("finger", root))
//!     .validate()
//!     .unwrap();
//! assert_eq!(model.dof_index("FFJ2"), Some(0));
//! ```

pub mod actuator;
pub mod classes;
pub mod contact;
pub mod dof;
pub mod error;
pub mod kinematics;
pub mod math;
pub mod model;
pub mod options;
pub mod registry;
pub mod sensor;
pub mod site;
pub mod tendon;
pub mod tree;

pub use actuator::{Actuator, ActuatorId, ActuatorSet, AffineLaw};
pub use classes::{ClassResolver, GeomParams, JointParams};
pub use contact::{ContactFilter, ContactPair};
pub use dof::{DofTable, Joint, JointId, FREE_DOFS};
pub use error::{ModelError, Result, StructuralKind};
pub use math::Interval;
pub use model::{Model, ModelSummary, UnvalidatedModel};
pub use options::LoadOptions;
pub use registry::{GeometryRegistry, Mesh, MeshId, Shape, ShapeId, ShapeKind, VALID_CONDIM};
pub use sensor::{EngineState, Sensor, SensorId, SensorSet, SensorTarget, StateSnapshot};
pub use site::{Site, SiteId, SiteTable};
pub use tendon::{Tendon, TendonId, TendonSet, TendonTerm};
pub use tree::{Body, BodyId, Inertia, KinematicTree};
