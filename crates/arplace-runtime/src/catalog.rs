//! Placeable prototypes.
//!
//! Prototypes live in a private library [`SceneGraph`] that is never part of
//! the rendered scene.  Every placement copies a prototype subtree into the
//! live scene, so placed objects never share nodes with each other or with
//! the prototype.

use std::collections::BTreeMap;

use arplace_perception::{Transform3D, Vec3};
use arplace_scene::{Geometry, Node, NodeId, SceneGraph};
use arplace_types::ArError;

/// Named prototypes available for placement.
#[derive(Debug, Clone)]
pub struct ObjectCatalog {
    library: SceneGraph,
    prototypes: BTreeMap<String, NodeId>,
}

fn at(x: f32, y: f32, z: f32) -> Transform3D {
    Transform3D::from_translation(Vec3::new(x, y, z))
}

impl ObjectCatalog {
    pub fn empty() -> Self {
        Self {
            library: SceneGraph::new(),
            prototypes: BTreeMap::new(),
        }
    }

    /// The five tabletop objects of the demo.  Each prototype's origin sits
    /// at its base so it rests on the surface it is placed on.
    pub fn builtin() -> Result<Self, ArError> {
        let mut catalog = Self::empty();

        catalog.register(
            Node::new("cup").with_geometry(Geometry::Cylinder { radius: 0.04, height: 0.09 })
                .with_transform(at(0.0, 0.045, 0.0)),
            vec![Node::new("cup-handle")
                .with_geometry(Geometry::Box { width: 0.02, height: 0.05, length: 0.01 })
                .with_transform(at(0.05, 0.0, 0.0))],
        )?;
        catalog.register(
            Node::new("vase").with_geometry(Geometry::Cylinder { radius: 0.06, height: 0.25 })
                .with_transform(at(0.0, 0.125, 0.0)),
            vec![Node::new("vase-rim")
                .with_geometry(Geometry::Sphere { radius: 0.065 })
                .with_transform(at(0.0, 0.1, 0.0))],
        )?;
        catalog.register(
            Node::new("chair").with_geometry(Geometry::Box { width: 0.45, height: 0.05, length: 0.45 })
                .with_transform(at(0.0, 0.45, 0.0)),
            vec![
                Node::new("chair-back")
                    .with_geometry(Geometry::Box { width: 0.45, height: 0.5, length: 0.04 })
                    .with_transform(at(0.0, 0.27, -0.2)),
                Node::new("chair-leg-fl")
                    .with_geometry(Geometry::Cylinder { radius: 0.02, height: 0.45 })
                    .with_transform(at(0.2, -0.22, 0.2)),
                Node::new("chair-leg-fr")
                    .with_geometry(Geometry::Cylinder { radius: 0.02, height: 0.45 })
                    .with_transform(at(-0.2, -0.22, 0.2)),
                Node::new("chair-leg-bl")
                    .with_geometry(Geometry::Cylinder { radius: 0.02, height: 0.45 })
                    .with_transform(at(0.2, -0.22, -0.2)),
                Node::new("chair-leg-br")
                    .with_geometry(Geometry::Cylinder { radius: 0.02, height: 0.45 })
                    .with_transform(at(-0.2, -0.22, -0.2)),
            ],
        )?;
        catalog.register(
            Node::new("lamp").with_geometry(Geometry::Cylinder { radius: 0.01, height: 0.4 })
                .with_transform(at(0.0, 0.2, 0.0)),
            vec![Node::new("lamp-shade")
                .with_geometry(Geometry::Sphere { radius: 0.09 })
                .with_transform(at(0.0, 0.22, 0.0))],
        )?;
        catalog.register(
            Node::new("candle").with_geometry(Geometry::Cylinder { radius: 0.02, height: 0.12 })
                .with_transform(at(0.0, 0.06, 0.0)),
            vec![Node::new("candle-flame")
                .with_geometry(Geometry::Sphere { radius: 0.008 })
                .with_transform(at(0.0, 0.07, 0.0))
                .with_opacity(0.8)],
        )?;

        Ok(catalog)
    }

    /// Add a prototype made of `body` (named after the prototype) and its
    /// `parts`.  Wrapped in an empty pivot node so a placement transform can
    /// be applied without losing the body's own offset.
    ///
    /// Registering an existing name replaces that prototype.
    pub fn register(&mut self, body: Node, parts: Vec<Node>) -> Result<NodeId, ArError> {
        let name = body.name.clone();
        if let Some(previous) = self.prototypes.remove(&name) {
            self.library.remove_subtree(previous)?;
        }
        let pivot = self.library.add_node(Node::new(name.clone()));
        let body_id = self.library.add_child(pivot, body)?;
        for part in parts {
            self.library.add_child(body_id, part)?;
        }
        self.prototypes.insert(name, pivot);
        Ok(pivot)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.prototypes.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.prototypes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// Deep-copy prototype `name` into `scene`.  The copy is detached.
    ///
    /// # Errors
    ///
    /// [`ArError::UnknownPrototype`] when `name` is not in the catalog.
    pub fn instantiate(&self, name: &str, scene: &mut SceneGraph) -> Result<NodeId, ArError> {
        let proto = self
            .prototypes
            .get(name)
            .ok_or_else(|| ArError::UnknownPrototype(name.to_string()))?;
        scene.import_subtree(&self.library, *proto)
    }
}
