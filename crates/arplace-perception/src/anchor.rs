//! Anchors reported by the tracking session.
//!
//! An [`Anchor`] is read-only to the placement core: the tracking session
//! creates, refines and removes anchors; the core only reacts to them.

use arplace_types::{AnchorId, PlaneAlignment};
use serde::{Deserialize, Serialize};

use crate::transform::{Transform3D, Vec3};

/// A detected planar surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneAnchor {
    pub id: AnchorId,
    /// Pose of the anchor in world space.
    pub transform: Transform3D,
    /// Centre of the detected extent, in anchor-local coordinates.
    #[serde(default = "Vec3::zero")]
    pub center: Vec3,
    /// Size of the detected extent along the anchor's local axes (metres).
    pub extent: Vec3,
    pub alignment: PlaneAlignment,
}

/// A reference image the tracking session has been asked to look for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub name: String,
    /// Printed width of the image (metres).
    pub physical_width: f32,
    /// Printed height of the image (metres).
    pub physical_height: f32,
}

/// A recognised reference image lying in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnchor {
    pub id: AnchorId,
    pub transform: Transform3D,
    pub reference_image: ReferenceImage,
}

/// Tagged union over the anchor kinds the core understands.
///
/// Serialised with an internal `kind` tag (`"plane"` / `"image"`); any other
/// tag fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Anchor {
    Plane(PlaneAnchor),
    Image(ImageAnchor),
}

impl Anchor {
    pub fn id(&self) -> AnchorId {
        match self {
            Anchor::Plane(p) => p.id,
            Anchor::Image(i) => i.id,
        }
    }

    /// World pose of the anchor.
    pub fn transform(&self) -> Transform3D {
        match self {
            Anchor::Plane(p) => p.transform,
            Anchor::Image(i) => i.transform,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Anchor::Plane(_) => "plane",
            Anchor::Image(_) => "image",
        }
    }

    pub fn is_horizontal_plane(&self) -> bool {
        matches!(
            self,
            Anchor::Plane(PlaneAnchor {
                alignment: PlaneAlignment::Horizontal,
                ..
            })
        )
    }
}
