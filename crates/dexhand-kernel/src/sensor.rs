//! Sensing layer: named read-only output channels.
//!
//! This layer owns the binding and the output order. Values come from the
//! host engine through [`EngineState`].

use std::collections::HashMap;

use dexhand_ir::{SensorDecl, SensorSource, UserTag};
use tracing::warn;

use crate::dof::{DofTable, JointId};
use crate::error::{ModelError, Result};
use crate::options::LoadOptions;
use crate::site::{SiteId, SiteTable};

/// Dense sensor index, in declaration order. Also the output slot.
pub type SensorId = usize;

/// Live state owned by the host engine.
pub trait EngineState {
    /// Position of one DOF.
    fn dof_position(&self, dof: usize) -> f64;

    /// Aggregate contact-normal force inside a site's volume.
    fn site_touch(&self, site: SiteId) -> f64;
}

/// A plain state buffer, indexed by DOF and by site.
///
/// Missing entries read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    /// Positions by DOF.
    pub positions: Vec<f64>,
    /// Touch magnitudes by site.
    pub touch: Vec<f64>,
}

impl EngineState for StateSnapshot {
    fn dof_position(&self, dof: usize) -> f64 {
        self.positions.get(dof).copied().unwrap_or(0.0)
    }

    fn site_touch(&self, site: SiteId) -> f64 {
        self.touch.get(site).copied().unwrap_or(0.0)
    }
}

/// What a sensor is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorTarget {
    /// Position of a hinge joint.
    JointPosition {
        /// Joint.
        joint: JointId,
        /// Its DOF.
        dof: usize,
    },
    /// Touch magnitude at a site.
    Touch {
        /// Site.
        site: SiteId,
    },
}

/// A resolved sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    /// Unique name.
    pub name: String,
    /// Binding.
    pub target: SensorTarget,
    /// Absolute output clamp; zero disables it.
    pub cutoff: f64,
    /// Noise standard deviation, not applied here.
    pub noise: f64,
    /// Opaque consumer tag.
    pub user: Option<UserTag>,
}

impl Sensor {
    /// Read the current value from the engine.
    pub fn read(&self, state: &impl EngineState) -> f64 {
        let value = match self.target {
            SensorTarget::JointPosition { dof, .. } => state.dof_position(dof),
            SensorTarget::Touch { site } => state.site_touch(site).max(0.0),
        };
        if self.cutoff > 0.0 {
            value.clamp(-self.cutoff, self.cutoff)
        } else {
            value
        }
    }
}

/// All sensors of a model, in output order.
#[derive(Debug, Clone, Default)]
pub struct SensorSet {
    sensors: Vec<Sensor>,
    index: HashMap<String, SensorId>,
}

impl SensorSet {
    /// Resolve sensor declarations against joints and sites.
    pub fn resolve(
        decls: &[SensorDecl],
        dofs: &DofTable,
        sites: &SiteTable,
        options: &LoadOptions,
    ) -> Result<Self> {
        let mut set = Self::default();
        for decl in decls {
            let context = format!("sensor '{}'", decl.name);
            let target = match &decl.source {
                SensorSource::JointPos { joint } => {
                    let id = dofs.resolve(joint, &context)?;
                    let resolved = dofs.joint(id);
                    if resolved.dof_count() != 1 {
                        return Err(ModelError::invalid_parameter(
                            &decl.name,
                            "joint",
                            format!("joint '{joint}' is not a scalar joint"),
                        ));
                    }
                    SensorTarget::JointPosition {
                        joint: id,
                        dof: resolved.dof,
                    }
                }
                SensorSource::Touch { site } => {
                    let id = sites
                        .id(site)
                        .ok_or_else(|| ModelError::unknown_reference("site", site, &context))?;
                    if sites.site(id).extents.is_none() {
                        if options.strict_touch_sites {
                            return Err(ModelError::invalid_parameter(
                                &decl.name,
                                "site",
                                format!("touch site '{site}' has no extents"),
                            ));
                        }
                        warn!(sensor = %decl.name, site = %site, "touch sensor on a site without extents");
                    }
                    SensorTarget::Touch { site: id }
                }
            };

            let cutoff = decl.cutoff.unwrap_or(0.0);
            if !cutoff.is_finite() || cutoff < 0.0 {
                return Err(ModelError::invalid_parameter(
                    &decl.name,
                    "cutoff",
                    format!("must be finite and non-negative, got {cutoff}"),
                ));
            }
            let noise = decl.noise.unwrap_or(0.0);
            if !noise.is_finite() || noise < 0.0 {
                return Err(ModelError::invalid_parameter(
                    &decl.name,
                    "noise",
                    format!("must be finite and non-negative, got {noise}"),
                ));
            }

            let id = set.sensors.len();
            if set.index.insert(decl.name.clone(), id).is_some() {
                return Err(ModelError::duplicate("sensor", &decl.name));
            }
            set.sensors.push(Sensor {
                name: decl.name.clone(),
                target,
                cutoff,
                noise,
                user: decl.user,
            });
        }
        Ok(set)
    }

    /// Read every sensor, in declaration order.
    pub fn read_all(&self, state: &impl EngineState) -> Vec<f64> {
        self.sensors.iter().map(|s| s.read(state)).collect()
    }

    /// Look up a sensor by name.
    pub fn id(&self, name: &str) -> Option<SensorId> {
        self.index.get(name).copied()
    }

    /// Sensor by id.
    pub fn sensor(&self, id: SensorId) -> &Sensor {
        &self.sensors[id]
    }

    /// All sensors.
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Number of sensors.
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// Whether there are no sensors.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}
