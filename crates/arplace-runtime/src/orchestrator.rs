//! Placement orchestration.
//!
//! Turns a touch point into a placement pose according to the active
//! [`PlacementMode`], enforces minimum spacing between consecutive
//! placements, and instantiates the selected prototype into the scene.
//!
//! Expected no-ops (no hit, too close, wrong surface) are reported as
//! [`PlacementOutcome::Rejected`] and logged at `debug!`; only genuine
//! inconsistencies surface as [`ArError`].

use arplace_hal::{HitTester, TrackingSession};
use arplace_perception::{forward_pose_with_offset, PlacementFilter, Transform3D, Vec3};
use arplace_scene::{NodeId, NodeTag, SceneGraph};
use arplace_types::{ArError, PlacementMode, PlaneAlignment, ScreenPoint};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::catalog::ObjectCatalog;
use crate::state::{PlacementSettings, PlacementState};

/// Why a touch did not place anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    NoSelection,
    TrackingStopped,
    NoHit,
    /// Plane mode hit a vertical plane.
    NotHorizontal,
    /// Image mode hit something that is not an image cover.
    NotImageSurface,
    /// Candidate within the minimum distance of the last placement.
    TooClose { distance: f32 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NoSelection => write!(f, "no object selected"),
            RejectReason::TrackingStopped => write!(f, "tracking is not running"),
            RejectReason::NoHit => write!(f, "nothing under the touch point"),
            RejectReason::NotHorizontal => write!(f, "plane is not horizontal"),
            RejectReason::NotImageSurface => write!(f, "not a reference image"),
            RejectReason::TooClose { distance } => {
                write!(f, "too close to the last object ({distance:.3} m)")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementOutcome {
    Placed(NodeId),
    Rejected(RejectReason),
}

impl PlacementOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, PlacementOutcome::Placed(_))
    }
}

/// Record of one placed object, kept in placement order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    pub node: NodeId,
    pub prototype: String,
    pub transform: Transform3D,
    pub mode: PlacementMode,
    pub placed_at: DateTime<Utc>,
}

/// Owns the placement state and the list of placed objects.
#[derive(Debug)]
pub struct PlacementOrchestrator {
    state: PlacementState,
    filter: PlacementFilter,
    forward_offset: f32,
    placed: Vec<PlacedObject>,
}

impl PlacementOrchestrator {
    pub fn new(settings: &PlacementSettings) -> Self {
        Self {
            state: PlacementState::new(settings),
            filter: PlacementFilter::new(settings.minimum_distance_m),
            forward_offset: settings.forward_offset_m,
            placed: Vec::new(),
        }
    }

    pub fn state(&self) -> &PlacementState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PlacementState {
        &mut self.state
    }

    pub fn filter(&self) -> PlacementFilter {
        self.filter
    }

    pub fn placed(&self) -> &[PlacedObject] {
        &self.placed
    }

    /// World position of the most recent placement, if it is still alive.
    fn last_position(&self, scene: &SceneGraph) -> Option<Vec3> {
        let node = self.state.last_placed?;
        scene.world_transform(node).ok().map(|t| t.translation)
    }

    /// Resolve the placement pose for a touch in the current mode.
    fn resolve_pose(
        &self,
        point: ScreenPoint,
        scene: &SceneGraph,
        tracking: &dyn TrackingSession,
        hit_tester: &dyn HitTester,
    ) -> Result<Transform3D, RejectReason> {
        let camera = tracking.camera_pose();
        match self.state.mode {
            PlacementMode::Freeform => Ok(forward_pose_with_offset(camera, self.forward_offset)),
            PlacementMode::Plane => {
                let hit = hit_tester
                    .hit_test_planes(point, camera, &tracking.anchors())
                    .ok_or(RejectReason::NoHit)?;
                if hit.alignment != PlaneAlignment::Horizontal {
                    return Err(RejectReason::NotHorizontal);
                }
                Ok(hit.world_transform)
            }
            PlacementMode::Image => {
                let hit = hit_tester
                    .hit_test_scene(point, camera, scene)
                    .ok_or(RejectReason::NoHit)?;
                let surface = scene
                    .find_tagged_ancestor(hit.node, NodeTag::ImageSurface)
                    .ok_or(RejectReason::NotImageSurface)?;
                let world = scene
                    .world_transform(surface)
                    .map_err(|_| RejectReason::NotImageSurface)?;
                Ok(world.level_pitch())
            }
        }
    }

    /// Handle a touch event: resolve a pose and place the selected prototype.
    pub fn handle_touch(
        &mut self,
        point: ScreenPoint,
        scene: &mut SceneGraph,
        catalog: &ObjectCatalog,
        tracking: &dyn TrackingSession,
        hit_tester: &dyn HitTester,
    ) -> Result<PlacementOutcome, ArError> {
        let Some(prototype) = self.state.selected.clone() else {
            debug!("Touch ignored: no object selected");
            return Ok(PlacementOutcome::Rejected(RejectReason::NoSelection));
        };
        if !tracking.is_running() {
            debug!("Touch ignored: tracking stopped");
            return Ok(PlacementOutcome::Rejected(RejectReason::TrackingStopped));
        }
        match self.resolve_pose(point, scene, tracking, hit_tester) {
            Ok(pose) => self.place(scene, catalog, &prototype, pose),
            Err(reason) => {
                debug!(mode = %self.state.mode, x = point.x, y = point.y, %reason, "Placement rejected");
                Ok(PlacementOutcome::Rejected(reason))
            }
        }
    }

    /// Place a copy of `prototype` at `pose`, subject to the spacing filter.
    ///
    /// The new subtree is attached to the scene root only after its
    /// transform is set, so no reader ever sees it at the origin.
    pub fn place(
        &mut self,
        scene: &mut SceneGraph,
        catalog: &ObjectCatalog,
        prototype: &str,
        pose: Transform3D,
    ) -> Result<PlacementOutcome, ArError> {
        let last = self.last_position(scene);
        let candidate = pose.translation;
        if !self.filter.accepts(last, candidate) {
            let distance = last.map(|l| candidate.sub(l).length()).unwrap_or_default();
            debug!(distance, minimum = self.filter.minimum_distance(), "Placement rejected: too close");
            return Ok(PlacementOutcome::Rejected(RejectReason::TooClose { distance }));
        }

        let node = catalog.instantiate(prototype, scene)?;
        scene.set_transform(node, pose)?;
        self.placed.push(PlacedObject {
            node,
            prototype: prototype.to_string(),
            transform: pose,
            mode: self.state.mode,
            placed_at: Utc::now(),
        });
        self.state.last_placed = Some(node);
        scene.attach(node, scene.root())?;

        info!(
            object = prototype,
            node = %node,
            mode = %self.state.mode,
            x = candidate.x,
            y = candidate.y,
            z = candidate.z,
            "Object placed"
        );
        Ok(PlacementOutcome::Placed(node))
    }

    /// Remove the most recent placement.  The previous one (if any) becomes
    /// the spacing reference again.
    pub fn undo(&mut self, scene: &mut SceneGraph) -> Result<PlacedObject, ArError> {
        let last = self.placed.pop().ok_or(ArError::NothingToUndo)?;
        if scene.contains(last.node) {
            scene.remove_subtree(last.node)?;
        }
        self.state.last_placed = self.placed.last().map(|p| p.node);
        info!(object = %last.prototype, node = %last.node, "Placement undone");
        Ok(last)
    }

    /// Forget every placement and restore the configured defaults.  The
    /// caller is responsible for clearing the scene.
    pub fn reset(&mut self, settings: &PlacementSettings) {
        self.placed.clear();
        self.state.reset(settings);
        self.filter = PlacementFilter::new(settings.minimum_distance_m);
        self.forward_offset = settings.forward_offset_m;
    }
}
