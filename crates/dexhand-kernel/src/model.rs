//! The validation pass and the validated model.
//!
//! A [`Document`] enters as an [`UnvalidatedModel`], which exposes no name
//! resolution. [`UnvalidatedModel::validate`] consumes it and either yields
//! an immutable [`Model`] or the first error found; nothing partial survives.

use dexhand_ir::Document;
use nalgebra::{Isometry3, Vector3};
use serde::Serialize;
use tracing::debug;

use crate::actuator::{ActuatorId, ActuatorSet};
use crate::classes::ClassResolver;
use crate::contact::ContactFilter;
use crate::dof::{DofTable, JointId};
use crate::error::Result;
use crate::kinematics;
use crate::options::LoadOptions;
use crate::registry::{GeometryRegistry, ShapeId};
use crate::sensor::{EngineState, SensorId, SensorSet};
use crate::site::{SiteId, SiteTable};
use crate::tendon::{TendonId, TendonSet};
use crate::tree::{BodyId, KinematicTree};

/// A parsed document that has not been checked.
#[derive(Debug, Clone)]
pub struct UnvalidatedModel {
    document: Document,
    options: LoadOptions,
}

impl UnvalidatedModel {
    /// Wrap a document with default options.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            options: LoadOptions::default(),
        }
    }

    /// Replace the validation options.
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// The wrapped document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Resolve every name and check every invariant.
    pub fn validate(self) -> Result<Model> {
        let Self { document, options } = self;
        options.check()?;

        let classes = ClassResolver::new(&document.defaults)?;
        let mut registry = GeometryRegistry::with_meshes(&document.meshes)?;
        let flat = document.flatten();
        let (mut tree, order) = KinematicTree::build(&flat)?;

        let mut dofs = DofTable::default();
        let mut sites = SiteTable::default();
        for id in 0..tree.len() {
            let record = &flat[order[id]];
            let decl = record.decl;
            let inherited = record.childclass;

            let first_joint = dofs.len();
            for joint in &decl.joints {
                let params = classes.joint(joint, inherited)?;
                dofs.allocate(id, id == tree.root(), joint, params, &options)?;
            }

            let mut shapes = Vec::with_capacity(decl.geoms.len());
            for (i, geom) in decl.geoms.iter().enumerate() {
                let label = geom
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{}/geom{i}", decl.name));
                let params = classes.geom(geom, &label, inherited)?;
                shapes.push(registry.add_shape(id, geom, &label, params)?);
            }

            let body_sites = decl
                .sites
                .iter()
                .map(|site| sites.add(id, site))
                .collect::<Result<Vec<_>>>()?;

            tree.attach(id, first_joint..dofs.len(), shapes, body_sites);
        }

        let tendons = TendonSet::resolve(&document.tendons, &dofs, &options)?;
        let contacts = ContactFilter::resolve(&document.contact, &registry, &tree)?;
        let actuators = ActuatorSet::resolve(&document.actuators, &dofs)?;
        let sensors = SensorSet::resolve(&document.sensors, &dofs, &sites, &options)?;

        let model = Model {
            name: document.model.clone(),
            options,
            tree,
            dofs,
            registry,
            sites,
            tendons,
            contacts,
            actuators,
            sensors,
        };
        let summary = model.summary();
        debug!(
            model = %summary.name,
            bodies = summary.bodies,
            dofs = summary.dofs,
            tendons = summary.tendons,
            contact_pairs = summary.contact_pairs,
            actuators = summary.actuators,
            sensors = summary.sensors,
            "model validated"
        );
        Ok(model)
    }
}

/// A validated, immutable hand model.
///
/// Every index stored inside is in bounds and every name lookup is O(1).
/// The model has no interior mutability and is shared freely across threads.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    options: LoadOptions,
    tree: KinematicTree,
    dofs: DofTable,
    registry: GeometryRegistry,
    sites: SiteTable,
    tendons: TendonSet,
    contacts: ContactFilter,
    actuators: ActuatorSet,
    sensors: SensorSet,
}

/// Entity counts of a validated model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    /// Model name.
    pub name: String,
    /// Bodies.
    pub bodies: usize,
    /// Deepest body.
    pub max_depth: usize,
    /// Joints.
    pub joints: usize,
    /// Degrees of freedom.
    pub dofs: usize,
    /// Shapes.
    pub shapes: usize,
    /// Sites.
    pub sites: usize,
    /// Tendons.
    pub tendons: usize,
    /// Logical contact pairs.
    pub contact_pairs: usize,
    /// Actuators.
    pub actuators: usize,
    /// Sensors.
    pub sensors: usize,
}

impl Model {
    /// Validate a document with default options.
    pub fn from_document(document: Document) -> Result<Self> {
        UnvalidatedModel::new(document).validate()
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options the model was validated with.
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Body tree.
    pub fn tree(&self) -> &KinematicTree {
        &self.tree
    }

    /// Joints and DOF layout.
    pub fn dofs(&self) -> &DofTable {
        &self.dofs
    }

    /// Meshes and shapes.
    pub fn geometry(&self) -> &GeometryRegistry {
        &self.registry
    }

    /// Sites.
    pub fn sites(&self) -> &SiteTable {
        &self.sites
    }

    /// Coupling tendons.
    pub fn tendons(&self) -> &TendonSet {
        &self.tendons
    }

    /// Contact allow-list and exclusions.
    pub fn contacts(&self) -> &ContactFilter {
        &self.contacts
    }

    /// Actuators.
    pub fn actuators(&self) -> &ActuatorSet {
        &self.actuators
    }

    /// Sensors.
    pub fn sensors(&self) -> &SensorSet {
        &self.sensors
    }

    /// Body id by name.
    pub fn body_id(&self, name: &str) -> Option<BodyId> {
        self.tree.id(name)
    }

    /// Joint id by name.
    pub fn joint_id(&self, name: &str) -> Option<JointId> {
        self.dofs.id(name)
    }

    /// First DOF index of the named joint.
    pub fn dof_index(&self, name: &str) -> Option<usize> {
        self.dofs.dof_index(name)
    }

    /// Shape id by name.
    pub fn shape_id(&self, name: &str) -> Option<ShapeId> {
        self.registry.shape_id(name)
    }

    /// Site id by name.
    pub fn site_id(&self, name: &str) -> Option<SiteId> {
        self.sites.id(name)
    }

    /// Tendon id by name.
    pub fn tendon_id(&self, name: &str) -> Option<TendonId> {
        self.tendons.id(name)
    }

    /// Actuator id by name.
    pub fn actuator_id(&self, name: &str) -> Option<ActuatorId> {
        self.actuators.id(name)
    }

    /// Sensor id by name.
    pub fn sensor_id(&self, name: &str) -> Option<SensorId> {
        self.sensors.id(name)
    }

    /// Total DOFs.
    pub fn dof_count(&self) -> usize {
        self.dofs.dof_count()
    }

    /// Declared contact dimensionality between two named shapes, or `None`
    /// if the pair is not on the allow-list or either name is unknown.
    pub fn is_pair_enabled(&self, a: &str, b: &str) -> Option<u8> {
        let a = self.registry.shape_id(a)?;
        let b = self.registry.shape_id(b)?;
        self.contacts.is_pair_enabled(a, b)
    }

    /// Nominal position of every DOF.
    pub fn rest_positions(&self) -> Vec<f64> {
        self.dofs.rest_positions()
    }

    /// World pose of every body at the given DOF positions.
    ///
    /// # Panics
    ///
    /// Panics if `positions` is shorter than [`Model::dof_count`].
    pub fn forward_kinematics(&self, positions: &[f64]) -> Vec<Isometry3<f64>> {
        kinematics::forward_kinematics(&self.tree, &self.dofs, positions)
    }

    /// World pose of every body at rest.
    pub fn rest_world_poses(&self) -> Vec<Isometry3<f64>> {
        self.forward_kinematics(&self.rest_positions())
    }

    /// Mass of each body's subtree.
    pub fn subtree_mass(&self) -> Vec<f64> {
        kinematics::subtree_mass(&self.tree)
    }

    /// World center of mass of each body's subtree at the given positions.
    pub fn subtree_com(&self, positions: &[f64]) -> Vec<Vector3<f64>> {
        kinematics::subtree_com(&self.tree, &self.forward_kinematics(positions))
    }

    /// Sum of all body masses.
    pub fn total_mass(&self) -> f64 {
        self.tree.bodies().iter().map(|b| b.inertia.mass).sum()
    }

    /// Every sensor value, in declaration order.
    pub fn read_sensors(&self, state: &impl EngineState) -> Vec<f64> {
        self.sensors.read_all(state)
    }

    /// Entity counts.
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            name: self.name.clone(),
            bodies: self.tree.len(),
            max_depth: self.tree.max_depth(),
            joints: self.dofs.len(),
            dofs: self.dofs.dof_count(),
            shapes: self.registry.shapes().len(),
            sites: self.sites.len(),
            tendons: self.tendons.len(),
            contact_pairs: self.contacts.pairs().len(),
            actuators: self.actuators.len(),
            sensors: self.sensors.len(),
        }
    }
}
