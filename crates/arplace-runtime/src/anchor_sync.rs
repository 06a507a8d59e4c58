//! Anchor → scene synchronisation.
//!
//! Every tracked anchor gets an anchor node under the scene root that
//! follows the anchor's pose.  Horizontal planes and recognised images also
//! get a flat visual as a child of that node:
//!
//! | Anchor | Visual | Resized on update |
//! |---|---|---|
//! | horizontal plane | [`NodeTag::PlaneSurface`], opacity 0.25 | yes |
//! | vertical plane | none | – |
//! | image | [`NodeTag::ImageSurface`], opacity 0.1 | no |
//!
//! Each anchor has at most one visual.  An add for an anchor that already
//! has one is handled as an update.

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use arplace_perception::{extent_to_size, Anchor, ImageAnchor, PlaneAnchor, PlaneSize, Quaternion, Transform3D, Vec3};
use arplace_scene::{Geometry, Node, NodeId, NodeTag, SceneGraph};
use arplace_types::{AnchorId, ArError, PlaneAlignment};
use tracing::{debug, info};

/// Opacity of the generated surface visuals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualStyle {
    pub plane_opacity: f32,
    pub image_opacity: f32,
}

impl Default for VisualStyle {
    fn default() -> Self {
        Self {
            plane_opacity: 0.25,
            image_opacity: 0.1,
        }
    }
}

/// What a sync call did to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new surface visual was created.
    VisualCreated(NodeId),
    /// An existing surface visual was resized / re-centred.
    VisualUpdated(NodeId),
    /// Only the anchor node's pose was touched.
    AnchorOnly,
}

/// Keeps scene nodes in step with the tracking session's anchors.
#[derive(Debug, Default)]
pub struct AnchorSync {
    style: VisualStyle,
    anchor_nodes: HashMap<AnchorId, NodeId>,
    plane_visuals: HashMap<AnchorId, NodeId>,
    image_visuals: HashMap<AnchorId, NodeId>,
}

/// Flat visuals are modelled in their local XY plane; this lays them on the
/// anchor's XZ plane.
fn lay_flat(center: Vec3) -> Transform3D {
    Transform3D::new(
        center,
        Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), -FRAC_PI_2),
    )
}

impl AnchorSync {
    pub fn new(style: VisualStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    pub fn anchor_node(&self, id: AnchorId) -> Option<NodeId> {
        self.anchor_nodes.get(&id).copied()
    }

    pub fn plane_visual(&self, id: AnchorId) -> Option<NodeId> {
        self.plane_visuals.get(&id).copied()
    }

    pub fn image_visual(&self, id: AnchorId) -> Option<NodeId> {
        self.image_visuals.get(&id).copied()
    }

    pub fn plane_visual_count(&self) -> usize {
        self.plane_visuals.len()
    }

    pub fn image_visual_count(&self) -> usize {
        self.image_visuals.len()
    }

    pub fn tracked_anchor_count(&self) -> usize {
        self.anchor_nodes.len()
    }

    /// Current size of the plane visual for `id`.
    pub fn plane_size(&self, scene: &SceneGraph, id: AnchorId) -> Option<PlaneSize> {
        let node = scene.node(self.plane_visual(id)?).ok()?;
        match node.geometry {
            Geometry::Plane { width, height } => Some(PlaneSize {
                width,
                depth: height,
            }),
            _ => None,
        }
    }

    /// Create or move the anchor node for `anchor`.
    fn upsert_anchor_node(&mut self, scene: &mut SceneGraph, anchor: &Anchor) -> Result<NodeId, ArError> {
        let id = anchor.id();
        if let Some(node) = self.anchor_node(id).filter(|n| scene.contains(*n)) {
            scene.set_transform(node, anchor.transform())?;
            return Ok(node);
        }
        let node = scene.add_child(
            scene.root(),
            Node::new(format!("anchor-{id}"))
                .with_transform(anchor.transform())
                .with_tag(NodeTag::Anchor),
        )?;
        self.anchor_nodes.insert(id, node);
        Ok(node)
    }

    /// A new anchor was detected.
    ///
    /// `planes_hidden` is the current global plane-visibility flag; new plane
    /// visuals start with it.
    pub fn on_anchor_added(
        &mut self,
        scene: &mut SceneGraph,
        anchor: &Anchor,
        planes_hidden: bool,
    ) -> Result<SyncOutcome, ArError> {
        let id = anchor.id();
        if self.plane_visuals.contains_key(&id) || self.image_visuals.contains_key(&id) {
            debug!(anchor = %id, "Anchor already has a visual; treating add as update");
            return self.on_anchor_updated(scene, anchor);
        }
        let anchor_node = self.upsert_anchor_node(scene, anchor)?;

        match anchor {
            Anchor::Plane(plane) => match plane.alignment {
                PlaneAlignment::Horizontal => {
                    let visual = self.add_plane_visual(scene, anchor_node, plane, planes_hidden)?;
                    Ok(SyncOutcome::VisualCreated(visual))
                }
                PlaneAlignment::Vertical => {
                    debug!(anchor = %id, "Vertical plane tracked without visual");
                    Ok(SyncOutcome::AnchorOnly)
                }
            },
            Anchor::Image(image) => {
                let visual = self.add_image_visual(scene, anchor_node, image)?;
                Ok(SyncOutcome::VisualCreated(visual))
            }
        }
    }

    fn add_plane_visual(
        &mut self,
        scene: &mut SceneGraph,
        anchor_node: NodeId,
        plane: &PlaneAnchor,
        hidden: bool,
    ) -> Result<NodeId, ArError> {
        let size = extent_to_size(plane.extent);
        let visual = scene.add_child(
            anchor_node,
            Node::new(format!("plane-{}", plane.id))
                .with_geometry(Geometry::Plane {
                    width: size.width,
                    height: size.depth,
                })
                .with_transform(lay_flat(plane.center))
                .with_opacity(self.style.plane_opacity)
                .with_hidden(hidden)
                .with_tag(NodeTag::PlaneSurface),
        )?;
        self.plane_visuals.insert(plane.id, visual);
        info!(
            anchor = %plane.id,
            width = size.width,
            depth = size.depth,
            hidden,
            "Horizontal plane detected"
        );
        Ok(visual)
    }

    fn add_image_visual(
        &mut self,
        scene: &mut SceneGraph,
        anchor_node: NodeId,
        image: &ImageAnchor,
    ) -> Result<NodeId, ArError> {
        let reference = &image.reference_image;
        let visual = scene.add_child(
            anchor_node,
            Node::new(format!("image-{}", reference.name))
                .with_geometry(Geometry::Plane {
                    width: reference.physical_width,
                    height: reference.physical_height,
                })
                .with_transform(lay_flat(Vec3::zero()))
                .with_opacity(self.style.image_opacity)
                .with_tag(NodeTag::ImageSurface),
        )?;
        self.image_visuals.insert(image.id, visual);
        info!(anchor = %image.id, image = %reference.name, "Reference image detected");
        Ok(visual)
    }

    /// Tracking refined an existing anchor.
    ///
    /// # Errors
    ///
    /// [`ArError::MissingVisual`] when a horizontal plane has no registered
    /// visual.  This is a consistency warning: the scene is left untouched
    /// and the caller should log and carry on.
    pub fn on_anchor_updated(
        &mut self,
        scene: &mut SceneGraph,
        anchor: &Anchor,
    ) -> Result<SyncOutcome, ArError> {
        let visual = match anchor {
            Anchor::Plane(plane) if plane.alignment == PlaneAlignment::Horizontal => Some(
                self.plane_visual(plane.id)
                    .ok_or(ArError::MissingVisual(plane.id))?,
            ),
            _ => None,
        };
        self.upsert_anchor_node(scene, anchor)?;
        match (anchor, visual) {
            (Anchor::Plane(plane), Some(visual)) => {
                let size = extent_to_size(plane.extent);
                let node = scene.node_mut(visual)?;
                node.geometry = Geometry::Plane {
                    width: size.width,
                    height: size.depth,
                };
                node.transform.translation = plane.center;
                debug!(anchor = %plane.id, width = size.width, depth = size.depth, "Plane refined");
                Ok(SyncOutcome::VisualUpdated(visual))
            }
            // Image covers keep their creation size.
            _ => Ok(SyncOutcome::AnchorOnly),
        }
    }

    /// Tracking dropped an anchor: free its node and visual.
    pub fn on_anchor_removed(&mut self, scene: &mut SceneGraph, id: AnchorId) -> Result<(), ArError> {
        let node = self.anchor_nodes.remove(&id).ok_or(ArError::UnknownAnchor(id))?;
        self.plane_visuals.remove(&id);
        self.image_visuals.remove(&id);
        if scene.contains(node) {
            scene.remove_subtree(node)?;
        }
        info!(anchor = %id, "Anchor removed");
        Ok(())
    }

    /// Apply the global plane-visibility flag to every plane visual.
    ///
    /// Runs to completion inside one `&mut` borrow of the scene, so no reader
    /// can observe a partially updated set.  Returns the number of visuals
    /// touched.
    pub fn set_planes_hidden(&self, scene: &mut SceneGraph, hidden: bool) -> usize {
        let mut touched = 0;
        for visual in self.plane_visuals.values() {
            if let Ok(node) = scene.node_mut(*visual) {
                node.hidden = hidden;
                touched += 1;
            }
        }
        touched
    }

    /// Forget every anchor.  The caller is responsible for clearing the scene.
    pub fn clear(&mut self) {
        self.anchor_nodes.clear();
        self.plane_visuals.clear();
        self.image_visuals.clear();
    }
}
