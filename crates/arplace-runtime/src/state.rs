//! Session-scoped placement state.
//!
//! [`PlacementState`] replaces the process-wide mutable globals of a typical
//! AR view controller (mode, selection, plane visibility, last placement)
//! with one value owned by the session, reset through
//! [`PlacementState::reset`].

use arplace_perception::transform::FORWARD_OFFSET_M;
use arplace_perception::DEFAULT_MINIMUM_DISTANCE_M;
use arplace_scene::NodeId;
use arplace_types::PlacementMode;
use serde::{Deserialize, Serialize};

/// Tunables for placement and generated visuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementSettings {
    /// Minimum spacing between consecutive placements (metres).
    pub minimum_distance_m: f32,
    /// Freeform placement distance in front of the camera (metres).
    pub forward_offset_m: f32,
    pub plane_opacity: f32,
    pub image_opacity: f32,
    /// Initial value of the global plane-visibility flag.
    pub planes_hidden: bool,
    pub default_mode: PlacementMode,
    /// Prototype selected when the session starts or is reset.
    pub default_object: Option<String>,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            minimum_distance_m: DEFAULT_MINIMUM_DISTANCE_M,
            forward_offset_m: FORWARD_OFFSET_M,
            plane_opacity: 0.25,
            image_opacity: 0.1,
            planes_hidden: false,
            default_mode: PlacementMode::Freeform,
            default_object: Some("cup".to_string()),
        }
    }
}

/// Mutable UI-facing state of one AR session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementState {
    pub mode: PlacementMode,
    /// Name of the selected prototype in the object catalog.
    pub selected: Option<String>,
    /// Most recently placed object, used for spacing.
    pub last_placed: Option<NodeId>,
    pub planes_hidden: bool,
}

impl PlacementState {
    pub fn new(settings: &PlacementSettings) -> Self {
        Self {
            mode: settings.default_mode,
            selected: settings.default_object.clone(),
            last_placed: None,
            planes_hidden: settings.planes_hidden,
        }
    }

    /// Back to the configured defaults.
    pub fn reset(&mut self, settings: &PlacementSettings) {
        *self = Self::new(settings);
    }
}
