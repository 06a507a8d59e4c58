//! `arplace-perception` – pose math and anchor model.
//!
//! Everything in this crate is pure: no scene graph, no tracking session.
//!
//! # Modules
//!
//! - [`transform`] – [`Transform3D`][transform::Transform3D] rigid poses,
//!   [`forward_pose`][transform::forward_pose] for in-front-of-camera
//!   placement and [`extent_to_size`][transform::extent_to_size] for plane
//!   visuals.
//! - [`anchor`] – [`Anchor`][anchor::Anchor]: tagged union over the plane and
//!   image anchors reported by a tracking session.
//! - [`placement`] – [`is_far_enough`][placement::is_far_enough]: minimum
//!   spacing check between consecutive placements.

pub mod anchor;
pub mod placement;
pub mod transform;

pub use anchor::{Anchor, ImageAnchor, PlaneAnchor, ReferenceImage};
pub use placement::{is_far_enough, PlacementFilter, DEFAULT_MINIMUM_DISTANCE_M};
pub use transform::{
    extent_to_size, forward_pose, forward_pose_with_offset, PlaneSize, Quaternion, Transform3D, Vec3,
    FORWARD_OFFSET_M,
};
