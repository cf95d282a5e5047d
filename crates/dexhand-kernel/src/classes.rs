//! Default-class resolution.
//!
//! Each attribute resolves as: element value, then the class chain (nearest
//! class first), then the document-wide defaults.

use std::collections::{HashMap, HashSet};

use dexhand_ir::{DefaultClass, Defaults, GeomDecl, GeomType, JointDecl};

use crate::error::{ModelError, Result, StructuralKind};

/// Effective joint parameters after class resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointParams {
    /// Position limits.
    pub range: Option<[f64; 2]>,
    /// Viscous damping coefficient.
    pub damping: f64,
    /// Dry friction loss.
    pub frictionloss: f64,
    /// Reflected rotor inertia.
    pub armature: f64,
    /// Limit activation margin.
    pub margin: f64,
}

/// Effective shape parameters after class resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeomParams {
    /// Shape type.
    pub kind: GeomType,
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

/// Resolves element attributes through the default-class hierarchy.
pub struct ClassResolver<'a> {
    defaults: &'a Defaults,
    classes: HashMap<&'a str, &'a DefaultClass>,
}

impl<'a> ClassResolver<'a> {
    /// Index the classes and check the hierarchy is a forest.
    pub fn new(defaults: &'a Defaults) -> Result<Self> {
        let mut classes = HashMap::with_capacity(defaults.classes.len());
        for class in &defaults.classes {
            if classes.insert(class.name.as_str(), class).is_some() {
                return Err(ModelError::duplicate("class", &class.name));
            }
        }

        for class in &defaults.classes {
            let mut seen = HashSet::new();
            let mut current = class;
            seen.insert(current.name.as_str());
            while let Some(parent) = current.parent.as_deref() {
                current = classes.get(parent).copied().ok_or_else(|| {
                    ModelError::unknown_reference(
                        "class",
                        parent,
                        format!("class '{}'", current.name),
                    )
                })?;
                if !seen.insert(current.name.as_str()) {
                    return Err(ModelError::structural(&class.name, StructuralKind::Cycle));
                }
            }
        }

        Ok(Self { defaults, classes })
    }

    /// The class chain starting at `class`, nearest first.
    fn chain(&self, class: Option<&str>, context: &str) -> Result<Vec<&'a DefaultClass>> {
        let mut chain = Vec::new();
        let Some(name) = class else {
            return Ok(chain);
        };
        let mut current = self
            .classes
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::unknown_reference("class", name, context))?;
        chain.push(current);
        // Parents were checked in `new`.
        while let Some(parent) = current.parent.as_deref() {
            match self.classes.get(parent) {
                Some(next) => {
                    current = next;
                    chain.push(current);
                }
                None => break,
            }
        }
        Ok(chain)
    }

    /// Resolve a joint's parameters.
    ///
    /// `inherited` is the subtree class of the enclosing body.
    pub fn joint(&self, decl: &JointDecl, inherited: Option<&str>) -> Result<JointParams> {
        let context = format!("joint '{}'", decl.name);
        let chain = self.chain(decl.class.as_deref().or(inherited), &context)?;
        let base = &self.defaults.joint;

        Ok(JointParams {
            range: decl
                .range
                .or_else(|| chain.iter().find_map(|c| c.joint.range)),
            damping: decl
                .damping
                .or_else(|| chain.iter().find_map(|c| c.joint.damping))
                .unwrap_or(base.damping),
            frictionloss: decl
                .frictionloss
                .or_else(|| chain.iter().find_map(|c| c.joint.frictionloss))
                .unwrap_or(base.frictionloss),
            armature: decl
                .armature
                .or_else(|| chain.iter().find_map(|c| c.joint.armature))
                .unwrap_or(base.armature),
            margin: decl
                .margin
                .or_else(|| chain.iter().find_map(|c| c.joint.margin))
                .unwrap_or(base.margin),
        })
    }

    /// Resolve a shape's parameters.
    pub fn geom(&self, decl: &GeomDecl, label: &str, inherited: Option<&str>) -> Result<GeomParams> {
        let context = format!("shape '{label}'");
        let chain = self.chain(decl.class.as_deref().or(inherited), &context)?;
        let base = &self.defaults.geom;

        let kind = decl
            .kind
            .or_else(|| chain.iter().find_map(|c| c.geom.kind))
            .unwrap_or(if decl.mesh.is_some() {
                GeomType::Mesh
            } else {
                GeomType::Sphere
            });

        Ok(GeomParams {
            kind,
            contype: decl
                .contype
                .or_else(|| chain.iter().find_map(|c| c.geom.contype))
                .unwrap_or(base.contype),
            conaffinity: decl
                .conaffinity
                .or_else(|| chain.iter().find_map(|c| c.geom.conaffinity))
                .unwrap_or(base.conaffinity),
            condim: decl
                .condim
                .or_else(|| chain.iter().find_map(|c| c.geom.condim))
                .unwrap_or(base.condim),
            margin: decl
                .margin
                .or_else(|| chain.iter().find_map(|c| c.geom.margin))
                .unwrap_or(base.margin),
            group: decl
                .group
                .or_else(|| chain.iter().find_map(|c| c.geom.group))
                .unwrap_or(base.group),
        })
    }
}
