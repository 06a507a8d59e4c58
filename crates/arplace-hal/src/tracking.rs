//! Generic [`TrackingSession`] trait and the events it reports.

use arplace_perception::{Anchor, ReferenceImage, Transform3D};
use arplace_types::{AnchorId, ArError};
use serde::{Deserialize, Serialize};

/// What the tracking session is asked to detect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Name of the reference image catalog (asset group) to load.
    pub image_catalog: String,
    /// Images the session should recognise.
    #[serde(default)]
    pub reference_images: Vec<ReferenceImage>,
    /// Report horizontal/vertical plane anchors.
    #[serde(default = "default_plane_detection")]
    pub plane_detection: bool,
}

fn default_plane_detection() -> bool {
    true
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            image_catalog: "AR Resources".to_string(),
            reference_images: Vec::new(),
            plane_detection: default_plane_detection(),
        }
    }
}

impl TrackingConfig {
    /// `true` when `name` is part of the configured image catalog.
    pub fn knows_image(&self, name: &str) -> bool {
        self.reference_images.iter().any(|img| img.name == name)
    }
}

/// A change reported by the tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackingEvent {
    AnchorAdded { anchor: Anchor },
    AnchorUpdated { anchor: Anchor },
    AnchorRemoved { id: AnchorId },
    CameraMoved { pose: Transform3D },
}

/// A camera-tracking session (visual-inertial odometry, plane detection,
/// image recognition).
///
/// Drivers implement this trait; the placement runtime only consumes it.
/// Events are pulled with [`TrackingSession::poll_events`] from the thread
/// that owns the scene, which keeps all scene mutation on one thread.
pub trait TrackingSession: Send {
    /// (Re)start tracking with `config`, discarding every existing anchor.
    ///
    /// # Errors
    ///
    /// Returns [`ArError::Tracking`] if the session cannot be started.
    fn start(&mut self, config: &TrackingConfig) -> Result<(), ArError>;

    /// Pause tracking.  No events are reported until the next `start`.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Current pose of the device camera in world space.
    fn camera_pose(&self) -> Transform3D;

    /// Reposition the camera.
    ///
    /// # Errors
    ///
    /// Sessions whose pose comes from the device cannot be moved and return
    /// [`ArError::Tracking`], which is the default.
    fn move_camera(&mut self, _pose: Transform3D) -> Result<(), ArError> {
        Err(ArError::Tracking("camera pose is driven by the device".to_string()))
    }

    /// Every anchor currently tracked.
    fn anchors(&self) -> Vec<Anchor>;

    /// Drain the events produced since the previous call.
    fn poll_events(&mut self) -> Vec<TrackingEvent>;
}
