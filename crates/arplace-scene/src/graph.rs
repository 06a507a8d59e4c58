//! Arena-backed scene graph.
//!
//! Nodes live in a flat arena and are addressed by [`NodeId`] handles.
//! Parent/child relations are explicit links stored on each node, so there
//! is no shared ownership and no reference cycles.  Freed slots are
//! recycled under a bumped generation, so a stale handle is reported as
//! [`ArError::UnknownNode`] instead of silently aliasing a newer node.
//!
//! # Example
//!
//! ```rust
//! use arplace_scene::graph::{Geometry, Node, SceneGraph};
//!
//! let mut scene = SceneGraph::new();
//! let cup = scene.add_node(Node::new("cup").with_geometry(Geometry::Cylinder {
//!     radius: 0.04,
//!     height: 0.1,
//! }));
//!
//! // Clones are independent arena entries.
//! let copy = scene.deep_clone(cup).unwrap();
//! assert_ne!(cup, copy);
//! scene.attach(copy, scene.root()).unwrap();
//! assert_eq!(scene.node(scene.root()).unwrap().children(), &[copy]);
//! ```

use std::fmt;

use arplace_perception::Transform3D;
use arplace_types::ArError;
use tracing::{trace, warn};

// ────────────────────────────────────────────────────────────────────────────
// Handles & node payload
// ────────────────────────────────────────────────────────────────────────────

/// Handle to a node inside a [`SceneGraph`]: an arena slot plus the
/// generation the slot had when the node was inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}v{}", self.index, self.generation)
        }
    }
}

/// Visual shape attached to a node, in node-local coordinates (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Geometry {
    /// Grouping node without a shape.
    #[default]
    Empty,
    /// Flat rectangle in the local XY plane, facing +Z.
    Plane { width: f32, height: f32 },
    /// Axis-aligned box centred on the origin.
    Box { width: f32, height: f32, length: f32 },
    Sphere { radius: f32 },
    /// Upright cylinder along local Y, centred on the origin.
    Cylinder { radius: f32, height: f32 },
}

/// Role markers used by hit-testing and anchor bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    /// Grouping node that follows a tracking anchor's pose.
    Anchor,
    /// Generated visual marking a detected plane.
    PlaneSurface,
    /// Generated cover marking a recognised reference image.
    ImageSurface,
}

/// A single scene node.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Pose relative to the parent node.
    pub transform: Transform3D,
    pub geometry: Geometry,
    /// 0 = fully transparent, 1 = opaque.
    pub opacity: f32,
    pub hidden: bool,
    pub tag: Option<NodeTag>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    /// Detached, opaque, visible node with no geometry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform3D::identity(),
            geometry: Geometry::Empty,
            opacity: 1.0,
            hidden: false,
            tag: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_transform(mut self, transform: Transform3D) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_tag(mut self, tag: NodeTag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SceneGraph
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of [`Node`]s rooted at a single root node.
///
/// Nodes created with [`SceneGraph::add_node`] start detached; only nodes
/// reachable from [`SceneGraph::root`] are part of the visible scene.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    /// Indices of empty slots, reused last-freed first.
    free: Vec<usize>,
    live: usize,
    root: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a graph containing only the root node.
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node::new("root")),
            }],
            free: Vec::new(),
            live: 1,
            root: NodeId {
                index: 0,
                generation: 0,
            },
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Number of arena slots allocated so far, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// `true` when only the root is left.
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, ArError> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(ArError::UnknownNode { index: id.index })
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ArError> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(ArError::UnknownNode { index: id.index })
    }

    /// Live nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|n| {
                let id = NodeId {
                    index,
                    generation: slot.generation,
                };
                (id, n)
            })
        })
    }

    /// Insert a detached node.  Any parent/child links carried by `node`
    /// are discarded.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        node.parent = None;
        node.children.clear();
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Empty the slot behind `id` and bump its generation.
    fn free_slot(&mut self, id: NodeId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index) else {
            return false;
        };
        if slot.generation != id.generation || slot.node.take().is_none() {
            return false;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        true
    }

    /// Insert `node` and attach it under `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: Node) -> Result<NodeId, ArError> {
        self.node(parent)?;
        let id = self.add_node(node);
        self.attach(id, parent)?;
        Ok(id)
    }

    /// Attach `child` under `parent`, detaching it from its previous parent.
    ///
    /// # Errors
    ///
    /// [`ArError::UnknownNode`] for stale handles;
    /// [`ArError::CycleDetected`] when `parent` is `child` or one of its
    /// descendants (the root can never be re-parented for the same reason).
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> Result<(), ArError> {
        self.node(child)?;
        self.node(parent)?;
        if child == self.root || self.ancestors(parent)?.contains(&child) {
            warn!(child = %child, parent = %parent, "Refusing attach that would create a cycle");
            return Err(ArError::CycleDetected {
                child: child.index,
                parent: parent.index,
            });
        }
        self.detach(child)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Unlink `child` from its parent.  Detaching a detached node is a no-op.
    pub fn detach(&mut self, child: NodeId) -> Result<(), ArError> {
        let parent = self.node(child)?.parent;
        if let Some(parent) = parent {
            if let Ok(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != child);
            }
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    /// Remove `id` and all its descendants from the arena.
    ///
    /// Removing the root only removes its descendants.  Returns the number of
    /// nodes freed.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<usize, ArError> {
        let doomed = self.descendants(id)?;
        self.detach(id)?;
        let mut freed = 0;
        for node in doomed {
            if node == self.root {
                continue;
            }
            if self.free_slot(node) {
                freed += 1;
            }
        }
        if id == self.root {
            self.node_mut(self.root)?.children.clear();
        }
        trace!(node = %id, freed, "Subtree removed");
        Ok(freed)
    }

    /// Remove everything except the root.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate().skip(1) {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
        self.live = 1;
        if let Some(root) = self.slots.first_mut().and_then(|slot| slot.node.as_mut()) {
            root.children.clear();
        }
    }

    /// Copy the subtree rooted at `id` into new arena entries.
    ///
    /// The copy is detached; its descendants are linked to each other the
    /// same way the originals are.
    pub fn deep_clone(&mut self, id: NodeId) -> Result<NodeId, ArError> {
        let source = self.node(id)?.clone();
        let copy = self.add_node(source.clone());
        for child in source.children {
            let child_copy = self.deep_clone(child)?;
            self.attach(child_copy, copy)?;
        }
        Ok(copy)
    }

    /// Copy the subtree rooted at `id` in `other` into this graph, detached.
    pub fn import_subtree(&mut self, other: &SceneGraph, id: NodeId) -> Result<NodeId, ArError> {
        let source = other.node(id)?;
        let copy = self.add_node(source.clone());
        for &child in source.children() {
            let child_copy = self.import_subtree(other, child)?;
            self.attach(child_copy, copy)?;
        }
        Ok(copy)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform3D) -> Result<(), ArError> {
        self.node_mut(id)?.transform = transform;
        Ok(())
    }

    /// `id` followed by its parent chain, ending at the top-most ancestor.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, ArError> {
        let mut chain = vec![id];
        let mut current = self.node(id)?.parent;
        while let Some(p) = current {
            chain.push(p);
            current = self.node(p)?.parent;
        }
        Ok(chain)
    }

    /// `id` and every node below it, parents before children.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, ArError> {
        self.node(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            let node = self.node(n)?;
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Pose of `id` in the frame of its top-most ancestor (world space for
    /// nodes attached to the root).
    pub fn world_transform(&self, id: NodeId) -> Result<Transform3D, ArError> {
        let chain = self.ancestors(id)?;
        let mut world = Transform3D::identity();
        for n in chain.into_iter().rev() {
            world = world.compose(self.node(n)?.transform);
        }
        Ok(world)
    }

    /// `true` when `id` or any of its ancestors is hidden.
    pub fn is_effectively_hidden(&self, id: NodeId) -> Result<bool, ArError> {
        for n in self.ancestors(id)? {
            if self.node(n)?.hidden {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `true` when `id` is reachable from the root.
    pub fn is_in_scene(&self, id: NodeId) -> bool {
        self.ancestors(id)
            .map(|chain| chain.last() == Some(&self.root))
            .unwrap_or(false)
    }

    /// Nearest node (starting at `id` itself) carrying `tag`.
    pub fn find_tagged_ancestor(&self, id: NodeId, tag: NodeTag) -> Option<NodeId> {
        self.ancestors(id)
            .ok()?
            .into_iter()
            .find(|n| self.node(*n).map(|node| node.tag == Some(tag)).unwrap_or(false))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use arplace_perception::{Quaternion, Vec3};
    use std::f32::consts::FRAC_PI_2;

    fn leaf(name: &str) -> Node {
        Node::new(name).with_geometry(Geometry::Sphere { radius: 0.1 })
    }

    #[test]
    fn new_graph_has_only_root() {
        let scene = SceneGraph::new();
        assert_eq!(scene.len(), 1);
        assert!(scene.is_empty());
        assert!(scene.is_in_scene(scene.root()));
    }

    #[test]
    fn add_child_links_both_directions() {
        let mut scene = SceneGraph::new();
        let a = scene.add_child(scene.root(), leaf("a")).unwrap();
        assert_eq!(scene.node(a).unwrap().parent(), Some(scene.root()));
        assert_eq!(scene.node(scene.root()).unwrap().children(), &[a]);
    }

    #[test]
    fn attach_moves_node_between_parents() {
        let mut scene = SceneGraph::new();
        let a = scene.add_child(scene.root(), leaf("a")).unwrap();
        let b = scene.add_child(scene.root(), leaf("b")).unwrap();
        let c = scene.add_child(a, leaf("c")).unwrap();

        scene.attach(c, b).unwrap();
        assert!(scene.node(a).unwrap().children().is_empty());
        assert_eq!(scene.node(b).unwrap().children(), &[c]);
        assert_eq!(scene.node(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut scene = SceneGraph::new();
        let a = scene.add_child(scene.root(), leaf("a")).unwrap();
        let b = scene.add_child(a, leaf("b")).unwrap();

        assert!(matches!(scene.attach(a, b), Err(ArError::CycleDetected { .. })));
        assert!(matches!(scene.attach(a, a), Err(ArError::CycleDetected { .. })));
        assert!(matches!(
            scene.attach(scene.root(), a),
            Err(ArError::CycleDetected { .. })
        ));
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut scene = SceneGraph::new();
        let a = scene.add_child(scene.root(), leaf("a")).unwrap();
        scene.remove_subtree(a).unwrap();
        assert!(matches!(scene.node(a), Err(ArError::UnknownNode { .. })));
        // The freed slot comes back under a new generation.
        let b = scene.add_node(leaf("b"));
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(!scene.contains(a));
        assert!(matches!(scene.set_transform(a, Transform3D::identity()), Err(ArError::UnknownNode { .. })));
        assert_eq!(scene.node(b).unwrap().name, "b");
    }

    #[test]
    fn arena_does_not_grow_across_place_and_clear_cycles() {
        let mut scene = SceneGraph::new();
        for _ in 0..3 {
            let a = scene.add_child(scene.root(), leaf("a")).unwrap();
            scene.add_child(a, leaf("b")).unwrap();
            scene.add_child(scene.root(), leaf("c")).unwrap();
            scene.clear();
        }
        assert_eq!(scene.capacity(), 4);
        assert_eq!(scene.len(), 1);

        let mut last = None;
        for _ in 0..5 {
            let n = scene.add_child(scene.root(), leaf("n")).unwrap();
            scene.remove_subtree(n).unwrap();
            last = Some(n);
        }
        assert_eq!(scene.capacity(), 4);
        assert!(!scene.contains(last.unwrap()));
        assert_eq!(scene.iter().count(), 1);
    }

    #[test]
    fn remove_subtree_frees_descendants() {
        let mut scene = SceneGraph::new();
        let a = scene.add_child(scene.root(), leaf("a")).unwrap();
        let b = scene.add_child(a, leaf("b")).unwrap();
        scene.add_child(b, leaf("c")).unwrap();

        assert_eq!(scene.remove_subtree(a).unwrap(), 3);
        assert_eq!(scene.len(), 1);
        assert!(scene.node(scene.root()).unwrap().children().is_empty());
    }

    #[test]
    fn removing_root_keeps_root() {
        let mut scene = SceneGraph::new();
        scene.add_child(scene.root(), leaf("a")).unwrap();
        scene.add_child(scene.root(), leaf("b")).unwrap();
        assert_eq!(scene.remove_subtree(scene.root()).unwrap(), 2);
        assert!(scene.contains(scene.root()));
        assert!(scene.is_empty());
    }

    #[test]
    fn deep_clone_copies_whole_subtree_independently() {
        let mut scene = SceneGraph::new();
        let body = scene.add_node(leaf("body"));
        let handle = scene.add_child(body, leaf("handle")).unwrap();

        let copy = scene.deep_clone(body).unwrap();
        let copy_children = scene.node(copy).unwrap().children().to_vec();
        assert_eq!(copy_children.len(), 1);
        assert_ne!(copy_children[0], handle);
        assert_eq!(scene.node(copy_children[0]).unwrap().name, "handle");
        assert_eq!(scene.node(copy).unwrap().parent(), None);

        // Mutating the copy leaves the original untouched.
        scene.node_mut(copy_children[0]).unwrap().opacity = 0.3;
        assert_eq!(scene.node(handle).unwrap().opacity, 1.0);
    }

    #[test]
    fn import_subtree_copies_across_graphs() {
        let mut library = SceneGraph::new();
        let proto = library.add_node(leaf("proto"));
        library.add_child(proto, leaf("part")).unwrap();

        let mut scene = SceneGraph::new();
        let copy = scene.import_subtree(&library, proto).unwrap();
        assert_eq!(scene.descendants(copy).unwrap().len(), 2);
        assert_eq!(library.len(), 3);
    }

    #[test]
    fn world_transform_composes_parent_chain() {
        let mut scene = SceneGraph::new();
        let turned = Transform3D::new(
            Vec3::new(1.0, 0.0, 0.0),
            Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2),
        );
        let a = scene
            .add_child(scene.root(), Node::new("a").with_transform(turned))
            .unwrap();
        let b = scene
            .add_child(
                a,
                Node::new("b").with_transform(Transform3D::from_translation(Vec3::new(1.0, 0.0, 0.0))),
            )
            .unwrap();

        let world = scene.world_transform(b).unwrap();
        assert!((world.translation.x - 1.0).abs() < 1e-5);
        assert!((world.translation.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hidden_is_inherited() {
        let mut scene = SceneGraph::new();
        let a = scene
            .add_child(scene.root(), leaf("a").with_hidden(true))
            .unwrap();
        let b = scene.add_child(a, leaf("b")).unwrap();
        assert!(scene.is_effectively_hidden(b).unwrap());
        scene.node_mut(a).unwrap().hidden = false;
        assert!(!scene.is_effectively_hidden(b).unwrap());
    }

    #[test]
    fn find_tagged_ancestor_walks_up() {
        let mut scene = SceneGraph::new();
        let cover = scene
            .add_child(scene.root(), leaf("cover").with_tag(NodeTag::ImageSurface))
            .unwrap();
        let inner = scene.add_child(cover, leaf("inner")).unwrap();
        assert_eq!(scene.find_tagged_ancestor(inner, NodeTag::ImageSurface), Some(cover));
        assert_eq!(scene.find_tagged_ancestor(inner, NodeTag::PlaneSurface), None);
    }

    #[test]
    fn detached_nodes_are_not_in_scene() {
        let mut scene = SceneGraph::new();
        let a = scene.add_node(leaf("a"));
        assert!(!scene.is_in_scene(a));
        scene.attach(a, scene.root()).unwrap();
        assert!(scene.is_in_scene(a));
    }

    #[test]
    fn clear_resets_to_root() {
        let mut scene = SceneGraph::new();
        scene.add_child(scene.root(), leaf("a")).unwrap();
        scene.add_node(leaf("b"));
        scene.clear();
        assert!(scene.is_empty());
        assert!(scene.node(scene.root()).unwrap().children().is_empty());
    }
}
