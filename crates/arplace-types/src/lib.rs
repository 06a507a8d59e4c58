use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Stable identity of an anchor reported by the tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(pub Uuid);

impl AnchorId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic identifier, used by scripted sessions and tests.
    pub const fn from_u128(v: u128) -> Self {
        Self(Uuid::from_u128(v))
    }
}

impl Default for AnchorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell anchors apart in logs and the REPL.
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// Orientation class of a detected plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneAlignment {
    Horizontal,
    Vertical,
}

/// Strategy used to turn a touch into an object placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementMode {
    /// Place a fixed distance in front of the camera; the touch point is ignored.
    #[default]
    Freeform,
    /// Place on a detected horizontal plane under the touch point.
    Plane,
    /// Place on a detected reference image under the touch point.
    Image,
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementMode::Freeform => write!(f, "freeform"),
            PlacementMode::Plane => write!(f, "plane"),
            PlacementMode::Image => write!(f, "image"),
        }
    }
}

impl FromStr for PlacementMode {
    type Err = ArError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "freeform" | "free" => Ok(PlacementMode::Freeform),
            "plane" => Ok(PlacementMode::Plane),
            "image" => Ok(PlacementMode::Image),
            other => Err(ArError::InvalidMode(other.to_string())),
        }
    }
}

/// A 2-D touch location in screen pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Phase of a discrete touch event delivered by the UI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    Began,
    Moved,
}

/// Error type shared by the scene graph, anchor sync and placement layers.
///
/// Expected placement no-ops (no hit, too close) are not errors; they are
/// reported as rejected placement outcomes instead.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArError {
    #[error("Unknown scene node #{index}")]
    UnknownNode { index: usize },

    #[error("Attaching node #{child} under #{parent} would create a cycle")]
    CycleDetected { child: usize, parent: usize },

    #[error("No visual registered for anchor {0}")]
    MissingVisual(AnchorId),

    #[error("Unknown anchor {0}")]
    UnknownAnchor(AnchorId),

    #[error("Unknown prototype '{0}'")]
    UnknownPrototype(String),

    #[error("Invalid placement mode '{0}' (expected freeform, plane or image)")]
    InvalidMode(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Tracking Session Error: {0}")]
    Tracking(String),

    #[error("Recording Error: {0}")]
    Recording(String),

    #[error("Session worker is no longer running")]
    SessionClosed,

    #[error("Session worker could not be started: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_mode_parses_case_insensitively() {
        assert_eq!("Plane".parse::<PlacementMode>().unwrap(), PlacementMode::Plane);
        assert_eq!(" image ".parse::<PlacementMode>().unwrap(), PlacementMode::Image);
        assert_eq!("free".parse::<PlacementMode>().unwrap(), PlacementMode::Freeform);
        assert!(matches!(
            "wall".parse::<PlacementMode>(),
            Err(ArError::InvalidMode(m)) if m == "wall"
        ));
    }

    #[test]
    fn placement_mode_display_matches_parse() {
        for mode in [PlacementMode::Freeform, PlacementMode::Plane, PlacementMode::Image] {
            assert_eq!(mode.to_string().parse::<PlacementMode>().unwrap(), mode);
        }
    }

    #[test]
    fn anchor_id_serializes_as_plain_uuid() {
        let id = AnchorId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
        let back: AnchorId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn anchor_id_display_is_short() {
        let id = AnchorId::new();
        assert_eq!(id.to_string().len(), 8);
    }

    #[test]
    fn alignment_uses_lowercase_tags() {
        let json = serde_json::to_string(&PlaneAlignment::Horizontal).unwrap();
        assert_eq!(json, "\"horizontal\"");
    }

    #[test]
    fn ar_error_display() {
        let err = ArError::UnknownPrototype("teapot".to_string());
        assert!(err.to_string().contains("teapot"));

        let err = ArError::CycleDetected { child: 1, parent: 4 };
        assert!(err.to_string().contains("cycle"));
    }
}
