//! Scripted tracking session for headless runs and tests.
//!
//! [`SimTrackingSession`] replays a [`TrackingRecording`]: one
//! [`RecordedFrame`] per [`TrackingSession::poll_events`] call.  Recordings
//! are plain JSON so sessions captured on a device can be replayed here.
//!
//! Events the core cannot represent (e.g. an anchor `kind` other than
//! `plane` / `image`) are decoded as [`RecordedEvent::Unknown`], logged and
//! skipped.
//!
//! # Example
//!
//! ```rust
//! use arplace_hal::sim::SimTrackingSession;
//! use arplace_hal::tracking::{TrackingConfig, TrackingSession};
//!
//! let mut session = SimTrackingSession::demo();
//! session.start(&SimTrackingSession::demo_config()).unwrap();
//!
//! let mut total = 0;
//! while !session.is_finished() {
//!     total += session.poll_events().len();
//! }
//! assert!(total > 0);
//! assert!(!session.anchors().is_empty());
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::f32::consts::FRAC_PI_2;
use std::fs;
use std::path::Path;

use arplace_perception::{Anchor, ImageAnchor, PlaneAnchor, Quaternion, ReferenceImage, Transform3D, Vec3};
use arplace_types::{AnchorId, ArError, PlaneAlignment};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::tracking::{TrackingConfig, TrackingEvent, TrackingSession};

// ────────────────────────────────────────────────────────────────────────────
// Recording format
// ────────────────────────────────────────────────────────────────────────────

/// A recorded event; anything that is not a valid [`TrackingEvent`] is kept
/// as raw JSON so the rest of the frame can still be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordedEvent {
    Known(TrackingEvent),
    Unknown(serde_json::Value),
}

/// Events delivered together in one tracking update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Camera pose for this frame; the previous pose is kept when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<Transform3D>,
    #[serde(default)]
    pub events: Vec<RecordedEvent>,
}

/// A replayable tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecording {
    #[serde(default)]
    pub initial_camera: Transform3D,
    pub frames: Vec<RecordedFrame>,
}

impl TrackingRecording {
    pub fn from_json(raw: &str) -> Result<Self, ArError> {
        serde_json::from_str(raw).map_err(|e| ArError::Recording(format!("Failed to parse recording: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, ArError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ArError::Recording(format!("Failed to read recording at {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String, ArError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ArError::Recording(format!("Failed to serialize recording: {e}")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimTrackingSession
// ────────────────────────────────────────────────────────────────────────────

/// [`TrackingSession`] that replays a [`TrackingRecording`].
///
/// The session applies the active [`TrackingConfig`] the way a device
/// session would: plane events are dropped when plane detection is off and
/// image anchors are only reported for images in the catalog.
#[derive(Debug, Clone)]
pub struct SimTrackingSession {
    recording: TrackingRecording,
    pending: VecDeque<RecordedFrame>,
    camera: Transform3D,
    anchors: BTreeMap<AnchorId, Anchor>,
    config: TrackingConfig,
    running: bool,
}

impl SimTrackingSession {
    pub fn new(recording: TrackingRecording) -> Self {
        Self {
            camera: recording.initial_camera,
            pending: VecDeque::new(),
            recording,
            anchors: BTreeMap::new(),
            config: TrackingConfig::default(),
            running: false,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ArError> {
        Ok(Self::new(TrackingRecording::load(path)?))
    }

    /// `true` once every recorded frame has been delivered.
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn remaining_frames(&self) -> usize {
        self.pending.len()
    }

    fn accepts(&self, anchor: &Anchor) -> bool {
        match anchor {
            Anchor::Plane(_) => self.config.plane_detection,
            Anchor::Image(img) => self.config.knows_image(&img.reference_image.name),
        }
    }

    /// Apply one known event to the session's own anchor table.  Returns the
    /// event when it should be reported.
    fn apply(&mut self, event: TrackingEvent) -> Option<TrackingEvent> {
        match &event {
            TrackingEvent::AnchorAdded { anchor } | TrackingEvent::AnchorUpdated { anchor } => {
                if !self.accepts(anchor) {
                    debug!(anchor = %anchor.id(), kind = anchor.kind_name(), "Anchor filtered by tracking config");
                    return None;
                }
                self.anchors.insert(anchor.id(), anchor.clone());
            }
            TrackingEvent::AnchorRemoved { id } => {
                self.anchors.remove(id)?;
            }
            TrackingEvent::CameraMoved { pose } => self.camera = *pose,
        }
        Some(event)
    }

    // ── Built-in demo ──────────────────────────────────────────────────────

    /// Reference images used by [`SimTrackingSession::demo`].
    pub fn demo_reference_images() -> Vec<ReferenceImage> {
        vec![ReferenceImage {
            name: "poster".to_string(),
            physical_width: 0.3,
            physical_height: 0.2,
        }]
    }

    /// Tracking configuration matching [`SimTrackingSession::demo`].
    pub fn demo_config() -> TrackingConfig {
        TrackingConfig {
            reference_images: Self::demo_reference_images(),
            ..TrackingConfig::default()
        }
    }

    /// Camera used by the demo: 1.4 m high, tilted 35° towards the floor.
    pub fn demo_camera() -> Transform3D {
        Transform3D::new(
            Vec3::new(0.0, 1.4, 0.5),
            Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), -35f32.to_radians()),
        )
    }

    /// A small room: a floor that grows as detection refines, a wall, and a
    /// poster lying on a book.
    pub fn demo() -> Self {
        let floor = AnchorId::from_u128(0xF100);
        let wall = AnchorId::from_u128(0xA11);
        let poster = AnchorId::from_u128(0x9057);

        let floor_anchor = |center: Vec3, extent: Vec3| {
            Anchor::Plane(PlaneAnchor {
                id: floor,
                transform: Transform3D::from_translation(Vec3::new(0.0, 0.0, -1.0)),
                center,
                extent,
                alignment: PlaneAlignment::Horizontal,
            })
        };
        let wall_anchor = Anchor::Plane(PlaneAnchor {
            id: wall,
            transform: Transform3D::new(
                Vec3::new(0.0, 1.0, -3.0),
                Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), FRAC_PI_2),
            ),
            center: Vec3::zero(),
            extent: Vec3::new(3.0, 0.0, 2.0),
            alignment: PlaneAlignment::Vertical,
        });
        let poster_anchor = Anchor::Image(ImageAnchor {
            id: poster,
            transform: Transform3D::new(
                Vec3::new(0.25, 0.03, -0.8),
                Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.3),
            ),
            reference_image: Self::demo_reference_images().remove(0),
        });

        let known = |event: TrackingEvent| RecordedEvent::Known(event);
        let frames = vec![
            RecordedFrame {
                camera: Some(Self::demo_camera()),
                events: vec![known(TrackingEvent::AnchorAdded {
                    anchor: floor_anchor(Vec3::zero(), Vec3::new(1.0, 0.0, 0.8)),
                })],
            },
            RecordedFrame {
                camera: None,
                events: vec![known(TrackingEvent::AnchorUpdated {
                    anchor: floor_anchor(Vec3::zero(), Vec3::new(2.0, 0.0, 1.5)),
                })],
            },
            RecordedFrame {
                camera: None,
                events: vec![
                    known(TrackingEvent::AnchorAdded { anchor: wall_anchor }),
                    known(TrackingEvent::AnchorAdded { anchor: poster_anchor }),
                ],
            },
            RecordedFrame {
                camera: None,
                events: vec![known(TrackingEvent::AnchorUpdated {
                    anchor: floor_anchor(Vec3::new(0.2, 0.0, -0.1), Vec3::new(3.0, 0.0, 2.0)),
                })],
            },
        ];

        Self::new(TrackingRecording {
            initial_camera: Self::demo_camera(),
            frames,
        })
    }
}

impl TrackingSession for SimTrackingSession {
    fn start(&mut self, config: &TrackingConfig) -> Result<(), ArError> {
        if self.recording.frames.is_empty() {
            warn!("Starting simulated tracking with an empty recording");
        }
        self.config = config.clone();
        self.pending = self.recording.frames.iter().cloned().collect();
        self.anchors.clear();
        self.camera = self.recording.initial_camera;
        self.running = true;
        info!(
            catalog = %config.image_catalog,
            images = config.reference_images.len(),
            plane_detection = config.plane_detection,
            frames = self.pending.len(),
            "Simulated tracking session started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn camera_pose(&self) -> Transform3D {
        self.camera
    }

    /// Move the simulated device.  Later recorded frames that carry a camera
    /// pose override it again.
    fn move_camera(&mut self, pose: Transform3D) -> Result<(), ArError> {
        self.camera = pose;
        debug!(x = pose.translation.x, y = pose.translation.y, z = pose.translation.z, "Simulated camera moved");
        Ok(())
    }

    fn anchors(&self) -> Vec<Anchor> {
        self.anchors.values().cloned().collect()
    }

    fn poll_events(&mut self) -> Vec<TrackingEvent> {
        if !self.running {
            return Vec::new();
        }
        let Some(frame) = self.pending.pop_front() else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(frame.events.len() + 1);
        if let Some(pose) = frame.camera {
            self.camera = pose;
            out.push(TrackingEvent::CameraMoved { pose });
        }
        for event in frame.events {
            match event {
                RecordedEvent::Known(event) => {
                    if let Some(event) = self.apply(event) {
                        out.push(event);
                    }
                }
                RecordedEvent::Unknown(raw) => {
                    let kind = raw
                        .get("anchor")
                        .and_then(|a| a.get("kind"))
                        .and_then(|k| k.as_str())
                        .unwrap_or("?")
                        .to_string();
                    warn!(kind = %kind, "Skipping unrecognised tracking event");
                }
            }
        }
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(session: &mut SimTrackingSession) -> Vec<TrackingEvent> {
        let mut all = Vec::new();
        while !session.is_finished() {
            all.extend(session.poll_events());
        }
        all
    }

    #[test]
    fn nothing_reported_before_start() {
        let mut session = SimTrackingSession::demo();
        assert!(!session.is_running());
        assert!(session.poll_events().is_empty());
    }

    #[test]
    fn demo_replays_all_anchors() {
        let mut session = SimTrackingSession::demo();
        session.start(&SimTrackingSession::demo_config()).unwrap();
        let events = drain(&mut session);

        assert!(matches!(events[0], TrackingEvent::CameraMoved { .. }));
        assert_eq!(session.anchors().len(), 3);
        assert_eq!(session.camera_pose(), SimTrackingSession::demo_camera());
    }

    #[test]
    fn image_outside_catalog_is_dropped() {
        let mut session = SimTrackingSession::demo();
        session.start(&TrackingConfig::default()).unwrap();
        let events = drain(&mut session);
        assert!(events.iter().all(|e| !matches!(
            e,
            TrackingEvent::AnchorAdded { anchor: Anchor::Image(_) }
        )));
        assert_eq!(session.anchors().len(), 2);
    }

    #[test]
    fn plane_detection_disabled_drops_planes() {
        let mut session = SimTrackingSession::demo();
        let config = TrackingConfig {
            plane_detection: false,
            ..SimTrackingSession::demo_config()
        };
        session.start(&config).unwrap();
        drain(&mut session);
        let anchors = session.anchors();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].kind_name(), "image");
    }

    #[test]
    fn restart_discards_existing_anchors() {
        let mut session = SimTrackingSession::demo();
        session.start(&SimTrackingSession::demo_config()).unwrap();
        drain(&mut session);
        session.start(&SimTrackingSession::demo_config()).unwrap();
        assert!(session.anchors().is_empty());
        assert_eq!(session.remaining_frames(), 4);
    }

    #[test]
    fn stop_pauses_delivery() {
        let mut session = SimTrackingSession::demo();
        session.start(&SimTrackingSession::demo_config()).unwrap();
        session.stop();
        assert!(session.poll_events().is_empty());
        assert_eq!(session.remaining_frames(), 4);
    }

    #[test]
    fn camera_can_be_moved_until_restart() {
        let mut session = SimTrackingSession::demo();
        session.start(&SimTrackingSession::demo_config()).unwrap();
        drain(&mut session);

        let moved = Transform3D::from_translation(Vec3::new(0.3, 1.2, 0.0));
        session.move_camera(moved).unwrap();
        assert_eq!(session.camera_pose(), moved);

        session.start(&SimTrackingSession::demo_config()).unwrap();
        assert_eq!(session.camera_pose(), SimTrackingSession::demo_camera());
    }

    #[test]
    fn unknown_anchor_kind_is_skipped() {
        let raw = serde_json::json!({
            "frames": [{
                "events": [
                    {
                        "event": "anchor_added",
                        "anchor": { "kind": "face", "id": AnchorId::from_u128(1) }
                    },
                    {
                        "event": "anchor_added",
                        "anchor": {
                            "kind": "plane",
                            "id": AnchorId::from_u128(2),
                            "transform": Transform3D::identity(),
                            "extent": { "x": 1.0, "y": 0.0, "z": 1.0 },
                            "alignment": "horizontal"
                        }
                    }
                ]
            }]
        });
        let recording = TrackingRecording::from_json(&raw.to_string()).unwrap();
        assert!(matches!(recording.frames[0].events[0], RecordedEvent::Unknown(_)));

        let mut session = SimTrackingSession::new(recording);
        session.start(&TrackingConfig::default()).unwrap();
        let events = session.poll_events();
        assert_eq!(events.len(), 1);
        assert_eq!(session.anchors()[0].id(), AnchorId::from_u128(2));
    }

    #[test]
    fn removal_of_unknown_anchor_is_not_reported() {
        let recording = TrackingRecording {
            initial_camera: Transform3D::identity(),
            frames: vec![RecordedFrame {
                camera: None,
                events: vec![RecordedEvent::Known(TrackingEvent::AnchorRemoved {
                    id: AnchorId::from_u128(5),
                })],
            }],
        };
        let mut session = SimTrackingSession::new(recording);
        session.start(&TrackingConfig::default()).unwrap();
        assert!(session.poll_events().is_empty());
    }

    #[test]
    fn recording_file_roundtrip() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("session.json");
        let recording = SimTrackingSession::demo().recording;
        std::fs::write(&path, recording.to_json().unwrap()).unwrap();

        let mut session = SimTrackingSession::from_path(&path).unwrap();
        session.start(&SimTrackingSession::demo_config()).unwrap();
        drain(&mut session);
        assert_eq!(session.anchors().len(), 3);
    }

    #[test]
    fn missing_recording_file_is_an_error() {
        let err = SimTrackingSession::from_path(Path::new("/nonexistent/arplace.json")).unwrap_err();
        assert!(matches!(err, ArError::Recording(_)));
    }
}
