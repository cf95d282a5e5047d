//! Geometry registry: mesh assets and the shapes attached to bodies.

use std::collections::HashMap;

use dexhand_ir::{GeomDecl, GeomType, MeshAsset};
use nalgebra::{Isometry3, Vector3};

use crate::classes::GeomParams;
use crate::error::{ModelError, Result};
use crate::math::{self, non_negative};
use crate::tree::BodyId;

/// Dense mesh index, in declaration order.
pub type MeshId = usize;

/// Dense shape index, in body pre-order then declaration order.
pub type ShapeId = usize;

/// Contact dimensionalities the collision layer understands.
pub const VALID_CONDIM: [u8; 4] = [1, 3, 4, 6];

/// A registered mesh asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Unique name.
    pub name: String,
    /// Source file, opaque to the kernel.
    pub file: String,
    /// Per-axis scale.
    pub scale: Vector3<f64>,
}

/// Resolved shape geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    /// Mesh asset.
    Mesh {
        /// Referenced mesh.
        mesh: MeshId,
    },
    /// Capsule along local Z.
    Capsule {
        /// Radius.
        radius: f64,
        /// Half length of the cylindrical part.
        half_length: f64,
    },
    /// Box.
    Box {
        /// Half extents.
        half_extents: Vector3<f64>,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Cylinder along local Z.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Half length.
        half_length: f64,
    },
    /// Ellipsoid.
    Ellipsoid {
        /// Semi-axes.
        radii: Vector3<f64>,
    },
    /// Infinite plane through the local origin with +Z normal.
    Plane,
}

/// A collision/visual shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// Name, if declared.
    pub name: Option<String>,
    /// Owning body.
    pub body: BodyId,
    /// Geometry.
    pub kind: ShapeKind,
    /// Pose in the body frame.
    pub local: Isometry3<f64>,
    /// Contact type bitmask.
    pub contype: u32,
    /// Contact affinity bitmask.
    pub conaffinity: u32,
    /// Contact dimensionality.
    pub condim: u8,
    /// Collision margin.
    pub margin: f64,
    /// Visualization group.
    pub group: i32,
}

/// Named meshes and shapes.
#[derive(Debug, Clone, Default)]
pub struct GeometryRegistry {
    meshes: Vec<Mesh>,
    mesh_index: HashMap<String, MeshId>,
    shapes: Vec<Shape>,
    shape_index: HashMap<String, ShapeId>,
}

impl GeometryRegistry {
    /// Register mesh assets.
    pub fn with_meshes(assets: &[MeshAsset]) -> Result<Self> {
        let mut registry = Self::default();
        for asset in assets {
            let scale = asset.scale.map_or(Vector3::repeat(1.0), math::vector);
            if !scale.iter().all(|s| s.is_finite() && *s > 0.0) {
                return Err(ModelError::invalid_parameter(
                    &asset.name,
                    "scale",
                    "components must be finite and positive",
                ));
            }
            let id = registry.meshes.len();
            if registry.mesh_index.insert(asset.name.clone(), id).is_some() {
                return Err(ModelError::duplicate("mesh", &asset.name));
            }
            registry.meshes.push(Mesh {
                name: asset.name.clone(),
                file: asset.file.clone(),
                scale,
            });
        }
        Ok(registry)
    }

    /// Register a shape on `body`. `label` names the shape in errors.
    pub(crate) fn add_shape(
        &mut self,
        body: BodyId,
        decl: &GeomDecl,
        label: &str,
        params: GeomParams,
    ) -> Result<ShapeId> {
        if !VALID_CONDIM.contains(&params.condim) {
            return Err(ModelError::invalid_parameter(
                label,
                "condim",
                format!("must be one of {VALID_CONDIM:?}, got {}", params.condim),
            ));
        }
        let margin = non_negative(label, "margin", params.margin)?;
        let kind = self.shape_kind(decl, label, params.kind)?;
        let local = math::isometry(label, &decl.pose)?;

        let id = self.shapes.len();
        if let Some(name) = &decl.name {
            if self.shape_index.insert(name.clone(), id).is_some() {
                return Err(ModelError::duplicate("shape", name));
            }
        }
        self.shapes.push(Shape {
            name: decl.name.clone(),
            body,
            kind,
            local,
            contype: params.contype,
            conaffinity: params.conaffinity,
            condim: params.condim,
            margin,
            group: params.group,
        });
        Ok(id)
    }

    fn shape_kind(&self, decl: &GeomDecl, label: &str, kind: GeomType) -> Result<ShapeKind> {
        let size = |count: usize| sizes(decl, label, kind, count);

        Ok(match kind {
            GeomType::Mesh => {
                let name = decl.mesh.as_deref().ok_or_else(|| {
                    ModelError::invalid_parameter(label, "mesh", "mesh shape names no mesh asset")
                })?;
                let mesh = self.mesh_id(name).ok_or_else(|| {
                    ModelError::unknown_reference("mesh", name, format!("shape '{label}'"))
                })?;
                ShapeKind::Mesh { mesh }
            }
            GeomType::Capsule => {
                let s = size(2)?;
                ShapeKind::Capsule {
                    radius: s[0],
                    half_length: s[1],
                }
            }
            GeomType::Cylinder => {
                let s = size(2)?;
                ShapeKind::Cylinder {
                    radius: s[0],
                    half_length: s[1],
                }
            }
            GeomType::Box => ShapeKind::Box {
                half_extents: Vector3::from_column_slice(size(3)?),
            },
            GeomType::Ellipsoid => ShapeKind::Ellipsoid {
                radii: Vector3::from_column_slice(size(3)?),
            },
            GeomType::Sphere => ShapeKind::Sphere { radius: size(1)?[0] },
            GeomType::Plane => ShapeKind::Plane,
        })
    }

    /// Look up a shape by name, failing with context.
    pub(crate) fn resolve_shape(&self, name: &str, context: &str) -> Result<ShapeId> {
        self.shape_id(name)
            .ok_or_else(|| ModelError::unknown_shape(name, context))
    }

    /// Look up a shape by name.
    pub fn shape_id(&self, name: &str) -> Option<ShapeId> {
        self.shape_index.get(name).copied()
    }

    /// Look up a mesh by name.
    pub fn mesh_id(&self, name: &str) -> Option<MeshId> {
        self.mesh_index.get(name).copied()
    }

    /// Shape by id.
    pub fn shape(&self, id: ShapeId) -> &Shape {
        &self.shapes[id]
    }

    /// All shapes.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// All meshes.
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }
}

/// The first `count` size values, checked finite and positive.
fn sizes<'d>(decl: &'d GeomDecl, label: &str, kind: GeomType, count: usize) -> Result<&'d [f64]> {
    let values = decl.size.get(..count).ok_or_else(|| {
        ModelError::invalid_parameter(
            label,
            "size",
            format!("{kind:?} needs {count} size values, got {}", decl.size.len()),
        )
    })?;
    if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(ModelError::invalid_parameter(
            label,
            "size",
            format!("{kind:?} sizes must be finite and positive, got {values:?}"),
        ));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexhand_ir::{GeomDefaults, Vec3};

    fn params(kind: GeomType) -> GeomParams {
        let base = GeomDefaults::default();
        GeomParams {
            kind,
            contype: base.contype,
            conaffinity: base.conaffinity,
            condim: base.condim,
            margin: base.margin,
            group: base.group,
        }
    }

    fn meshes() -> GeometryRegistry {
        GeometryRegistry::with_meshes(&[MeshAsset {
            name: "palm".to_string(),
            file: "palm.stl".to_string(),
            scale: Some(Vec3::new(0.001, 0.001, 0.001)),
        }])
        .unwrap()
    }

    #[test]
    fn registers_primitives_and_meshes() {
        let mut reg = meshes();
        let cap = GeomDecl::capsule("C_ffdistal", 0.00705, 0.012);
        let id = reg
            .add_shape(3, &cap, "C_ffdistal", params(GeomType::Capsule))
            .unwrap();
        assert_eq!(reg.shape_id("C_ffdistal"), Some(id));
        assert_eq!(reg.shape(id).body, 3);
        assert_eq!(reg.shape(id).margin, 0.0005);
        assert_eq!(
            reg.shape(id).kind,
            ShapeKind::Capsule {
                radius: 0.00705,
                half_length: 0.012
            }
        );

        let vis = GeomDecl::mesh("V_palm", "palm");
        let id = reg.add_shape(2, &vis, "V_palm", params(GeomType::Mesh)).unwrap();
        assert_eq!(reg.shape(id).kind, ShapeKind::Mesh { mesh: 0 });
        assert_eq!(reg.meshes()[0].scale.x, 0.001);
    }

    #[test]
    fn unknown_mesh() {
        let mut reg = meshes();
        let vis = GeomDecl::mesh("V_wrist", "wrist");
        let err = reg
            .add_shape(0, &vis, "V_wrist", params(GeomType::Mesh))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownReference { namespace: "mesh", .. }));
    }

    #[test]
    fn bad_sizes() {
        let mut reg = GeometryRegistry::default();
        let mut geom = GeomDecl::cuboid("C_palm0", 0.032, 0.0111, 0.049);
        geom.size.truncate(2);
        assert!(reg.add_shape(0, &geom, "C_palm0", params(GeomType::Box)).is_err());

        let geom = GeomDecl::sphere("s", -1.0);
        assert!(reg.add_shape(0, &geom, "s", params(GeomType::Sphere)).is_err());
    }

    #[test]
    fn duplicate_shape_name() {
        let mut reg = GeometryRegistry::default();
        let geom = GeomDecl::sphere("s", 0.01);
        reg.add_shape(0, &geom, "s", params(GeomType::Sphere)).unwrap();
        let err = reg.add_shape(1, &geom, "s", params(GeomType::Sphere)).unwrap_err();
        assert_eq!(err, ModelError::duplicate("shape", "s"));
    }

    #[test]
    fn condim_domain() {
        let mut reg = GeometryRegistry::default();
        let geom = GeomDecl::sphere("s", 0.01);
        let mut p = params(GeomType::Sphere);
        p.condim = 2;
        assert!(reg.add_shape(0, &geom, "s", p).is_err());
    }

    #[test]
    fn unnamed_shapes_are_not_indexed() {
        let mut reg = GeometryRegistry::default();
        let mut geom = GeomDecl::sphere("s", 0.01);
        geom.name = None;
        reg.add_shape(0, &geom, "body/geom0", params(GeomType::Sphere)).unwrap();
        reg.add_shape(0, &geom, "body/geom1", params(GeomType::Sphere)).unwrap();
        assert_eq!(reg.shapes().len(), 2);
        assert!(reg.resolve_shape("body/geom0", "pair").is_err());
    }
}
