//! `arplace-scene` – retained scene graph for placed content.
//!
//! # Modules
//!
//! - [`graph`] – [`SceneGraph`][graph::SceneGraph]: arena of nodes addressed
//!   by [`NodeId`][graph::NodeId] handles, with explicit parent links and
//!   deep cloning of subtrees.
//! - [`raycast`] – [`Ray`][raycast::Ray] intersection against node geometry
//!   and plane extents; the building block of touch hit-testing.

pub mod graph;
pub mod raycast;

pub use graph::{Geometry, Node, NodeId, NodeTag, SceneGraph};
pub use raycast::{raycast_scene, Ray, SceneHit};
