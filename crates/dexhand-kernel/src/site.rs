//! Sites: named frames fixed to bodies.

use std::collections::HashMap;

use dexhand_ir::{SiteDecl, SiteType};
use nalgebra::Isometry3;

use crate::error::{ModelError, Result};
use crate::math::{self, non_negative};
use crate::tree::BodyId;

/// Dense site index, in body pre-order then declaration order.
pub type SiteId = usize;

/// A named reference frame on a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    /// Unique name.
    pub name: String,
    /// Owning body.
    pub body: BodyId,
    /// Pose in the body frame.
    pub local: Isometry3<f64>,
    /// Volume shape.
    pub kind: SiteType,
    /// Bounding extents. Touch sensors aggregate contacts inside them.
    pub extents: Option<Vec<f64>>,
}

/// All sites with a name index.
#[derive(Debug, Clone, Default)]
pub struct SiteTable {
    sites: Vec<Site>,
    index: HashMap<String, SiteId>,
}

impl SiteTable {
    pub(crate) fn add(&mut self, body: BodyId, decl: &SiteDecl) -> Result<SiteId> {
        if let Some(extents) = &decl.size {
            let arity = extent_count(decl.kind);
            if extents.len() != arity {
                return Err(ModelError::invalid_parameter(
                    &decl.name,
                    "size",
                    format!("{:?} site takes {arity} extents, got {}", decl.kind, extents.len()),
                ));
            }
            for &e in extents {
                non_negative(&decl.name, "size", e)?;
            }
        }
        let id = self.sites.len();
        if self.index.insert(decl.name.clone(), id).is_some() {
            return Err(ModelError::duplicate("site", &decl.name));
        }
        self.sites.push(Site {
            name: decl.name.clone(),
            body,
            local: math::isometry(&decl.name, &decl.pose)?,
            kind: decl.kind,
            extents: decl.size.clone(),
        });
        Ok(id)
    }

    /// Look up a site by name.
    pub fn id(&self, name: &str) -> Option<SiteId> {
        self.index.get(name).copied()
    }

    /// Site by id.
    pub fn site(&self, id: SiteId) -> &Site {
        &self.sites[id]
    }

    /// All sites.
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether there are no sites.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Number of extents each site shape takes.
fn extent_count(kind: SiteType) -> usize {
    match kind {
        SiteType::Sphere => 1,
        SiteType::Capsule | SiteType::Cylinder => 2,
        SiteType::Box | SiteType::Ellipsoid => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexhand_ir::Pose;

    #[test]
    fn add_and_lookup() {
        let mut table = SiteTable::default();
        let tip = SiteDecl::marker("S_fftip", Pose::at(0.0, 0.0, 0.026));
        let touch = SiteDecl::touch_box("Tch_fftip", Pose::at(0.0, -0.004, 0.018), [0.009, 0.004, 0.013]);
        table.add(4, &tip).unwrap();
        let id = table.add(4, &touch).unwrap();
        assert_eq!(table.id("Tch_fftip"), Some(id));
        assert_eq!(table.site(id).kind, SiteType::Box);
        assert_eq!(table.site(id).extents.as_deref(), Some(&[0.009, 0.004, 0.013][..]));
        assert!(table.site(0).extents.is_none());
    }

    #[test]
    fn rejects_duplicates_and_negative_extents() {
        let mut table = SiteTable::default();
        let tip = SiteDecl::marker("S", Pose::default());
        table.add(0, &tip).unwrap();
        assert_eq!(table.add(1, &tip).unwrap_err(), ModelError::duplicate("site", "S"));

        let bad = SiteDecl::touch_box("T", Pose::default(), [0.01, -0.01, 0.01]);
        assert!(table.add(0, &bad).is_err());
    }

    #[test]
    fn extents_match_site_shape() {
        let mut table = SiteTable::default();
        let mut empty = SiteDecl::touch_box("T_empty", Pose::default(), [0.01; 3]);
        empty.size = Some(Vec::new());
        assert!(matches!(
            table.add(0, &empty),
            Err(ModelError::InvalidParameter { parameter: "size", .. })
        ));

        let mut short = SiteDecl::touch_box("T_short", Pose::default(), [0.01; 3]);
        short.size = Some(vec![0.01, 0.01]);
        assert!(table.add(0, &short).is_err());

        let mut ball = SiteDecl::marker("T_ball", Pose::default());
        ball.size = Some(vec![0.005]);
        assert!(table.add(0, &ball).is_ok());
        assert_eq!(table.len(), 1);
    }
}
