//! AR session ownership and thread confinement.
//!
//! [`ArSession`] owns everything a running AR view needs (scene graph,
//! anchor sync, placement state, tracking session and hit tester).  Every
//! mutation goes through [`ArSession::handle`], which takes `&mut self`, so
//! the scene is never touched from two places at once.
//!
//! [`SessionHandle`] moves an `ArSession` onto a dedicated worker thread and
//! exposes it through a FIFO command queue.  Commands sent from any thread
//! are applied one at a time in submission order.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use arplace_hal::{HitTester, TrackingConfig, TrackingEvent, TrackingSession, Viewport};
use arplace_perception::{Anchor, PlaneSize, Transform3D, Vec3};
use arplace_scene::SceneGraph;
use arplace_types::{AnchorId, ArError, PlacementMode, PlaneAlignment, ScreenPoint, TouchPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::anchor_sync::{AnchorSync, VisualStyle};
use crate::catalog::ObjectCatalog;
use crate::orchestrator::{PlacementOrchestrator, PlacementOutcome};
use crate::state::PlacementSettings;

// ────────────────────────────────────────────────────────────────────────────
// Commands
// ────────────────────────────────────────────────────────────────────────────

/// Everything that can be configured for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub placement: PlacementSettings,
    pub tracking: TrackingConfig,
    /// Used to project anchors back to screen points in snapshots.
    pub viewport: Viewport,
}

/// Input to [`ArSession::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Touch { phase: TouchPhase, point: ScreenPoint },
    SetMode(PlacementMode),
    SelectObject(String),
    SetPlanesHidden(bool),
    /// Reposition the camera of a simulated tracking session.
    MoveCamera(Transform3D),
    Undo,
    Reset,
    /// Poll the tracking session and apply its anchor events.
    Tick,
}

/// Anchor events applied by one [`SessionCommand::Tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Consistency problems logged and skipped.
    pub warnings: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Placement(PlacementOutcome),
    ModeChanged(PlacementMode),
    Selected(String),
    PlanesHidden { hidden: bool, visuals: usize },
    CameraMoved(Transform3D),
    Undone { prototype: String },
    Reset,
    Ticked(TickReport),
}

// ────────────────────────────────────────────────────────────────────────────
// Snapshot
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedSummary {
    pub node: usize,
    pub prototype: String,
    pub position: Vec3,
    pub mode: PlacementMode,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorSummary {
    pub id: AnchorId,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<PlaneAlignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub position: Vec3,
    /// Current plane visual size, for horizontal planes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_size: Option<PlaneSize>,
    pub has_visual: bool,
    /// Where the anchor appears on screen, when it is in view.
    pub screen: Option<ScreenPoint>,
}

/// Read-only view of a session, safe to send across threads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub mode: PlacementMode,
    pub selected: Option<String>,
    pub planes_hidden: bool,
    pub tracking_running: bool,
    pub camera: Transform3D,
    pub minimum_distance_m: f32,
    pub scene_nodes: usize,
    pub plane_visuals: usize,
    pub image_visuals: usize,
    pub prototypes: Vec<String>,
    pub placed: Vec<PlacedSummary>,
    pub anchors: Vec<AnchorSummary>,
}

// ────────────────────────────────────────────────────────────────────────────
// ArSession
// ────────────────────────────────────────────────────────────────────────────

pub struct ArSession {
    settings: SessionSettings,
    scene: SceneGraph,
    sync: AnchorSync,
    orchestrator: PlacementOrchestrator,
    catalog: ObjectCatalog,
    tracking: Box<dyn TrackingSession>,
    hit_tester: Box<dyn HitTester>,
}

impl std::fmt::Debug for ArSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArSession")
            .field("mode", &self.orchestrator.state().mode)
            .field("scene_nodes", &self.scene.len())
            .field("placed", &self.orchestrator.placed().len())
            .finish_non_exhaustive()
    }
}

impl ArSession {
    /// Build a session with the builtin object catalog and start tracking.
    pub fn new(
        settings: SessionSettings,
        tracking: Box<dyn TrackingSession>,
        hit_tester: Box<dyn HitTester>,
    ) -> Result<Self, ArError> {
        Self::with_catalog(settings, ObjectCatalog::builtin()?, tracking, hit_tester)
    }

    pub fn with_catalog(
        settings: SessionSettings,
        catalog: ObjectCatalog,
        mut tracking: Box<dyn TrackingSession>,
        hit_tester: Box<dyn HitTester>,
    ) -> Result<Self, ArError> {
        if let Some(name) = &settings.placement.default_object
            && !catalog.contains(name)
        {
            return Err(ArError::UnknownPrototype(name.clone()));
        }
        tracking.start(&settings.tracking)?;
        let style = VisualStyle {
            plane_opacity: settings.placement.plane_opacity,
            image_opacity: settings.placement.image_opacity,
        };
        info!(
            mode = %settings.placement.default_mode,
            prototypes = catalog.len(),
            "AR session started"
        );
        Ok(Self {
            orchestrator: PlacementOrchestrator::new(&settings.placement),
            sync: AnchorSync::new(style),
            scene: SceneGraph::new(),
            settings,
            catalog,
            tracking,
            hit_tester,
        })
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn anchor_sync(&self) -> &AnchorSync {
        &self.sync
    }

    pub fn orchestrator(&self) -> &PlacementOrchestrator {
        &self.orchestrator
    }

    pub fn catalog(&self) -> &ObjectCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Apply one command.
    pub fn handle(&mut self, command: SessionCommand) -> Result<CommandOutcome, ArError> {
        match command {
            SessionCommand::Touch { phase, point } => {
                debug!(?phase, x = point.x, y = point.y, "Touch");
                let outcome = self.orchestrator.handle_touch(
                    point,
                    &mut self.scene,
                    &self.catalog,
                    self.tracking.as_ref(),
                    self.hit_tester.as_ref(),
                )?;
                Ok(CommandOutcome::Placement(outcome))
            }
            SessionCommand::SetMode(mode) => {
                self.orchestrator.state_mut().mode = mode;
                info!(%mode, "Placement mode changed");
                Ok(CommandOutcome::ModeChanged(mode))
            }
            SessionCommand::SelectObject(name) => {
                if !self.catalog.contains(&name) {
                    return Err(ArError::UnknownPrototype(name));
                }
                self.orchestrator.state_mut().selected = Some(name.clone());
                info!(object = %name, "Object selected");
                Ok(CommandOutcome::Selected(name))
            }
            SessionCommand::SetPlanesHidden(hidden) => {
                self.orchestrator.state_mut().planes_hidden = hidden;
                let visuals = self.sync.set_planes_hidden(&mut self.scene, hidden);
                info!(hidden, visuals, "Plane visibility changed");
                Ok(CommandOutcome::PlanesHidden { hidden, visuals })
            }
            SessionCommand::MoveCamera(pose) => {
                self.tracking.move_camera(pose)?;
                let t = pose.translation;
                info!(x = t.x, y = t.y, z = t.z, "Camera moved");
                Ok(CommandOutcome::CameraMoved(pose))
            }
            SessionCommand::Undo => {
                let undone = self.orchestrator.undo(&mut self.scene)?;
                Ok(CommandOutcome::Undone {
                    prototype: undone.prototype,
                })
            }
            SessionCommand::Reset => {
                self.reset()?;
                Ok(CommandOutcome::Reset)
            }
            SessionCommand::Tick => Ok(CommandOutcome::Ticked(self.tick())),
        }
    }

    /// Drop all placements and anchors, restore defaults and restart
    /// tracking from scratch.
    ///
    /// Tracking is restarted first; when that fails the session is left
    /// exactly as it was.
    pub fn reset(&mut self) -> Result<(), ArError> {
        if let Err(e) = self.tracking.start(&self.settings.tracking) {
            error!(error = %e, "Tracking restart failed; session not reset");
            return Err(e);
        }
        self.scene.clear();
        self.sync.clear();
        self.orchestrator.reset(&self.settings.placement);
        info!("AR session reset");
        Ok(())
    }

    /// Poll tracking once and mirror its anchor events into the scene.
    ///
    /// Consistency errors (missing visual, unknown anchor) are logged and
    /// counted; they never abort the tick.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let planes_hidden = self.orchestrator.state().planes_hidden;
        for event in self.tracking.poll_events() {
            let result = match &event {
                TrackingEvent::AnchorAdded { anchor } => self
                    .sync
                    .on_anchor_added(&mut self.scene, anchor, planes_hidden)
                    .map(|_| report.added += 1),
                TrackingEvent::AnchorUpdated { anchor } => self
                    .sync
                    .on_anchor_updated(&mut self.scene, anchor)
                    .map(|_| report.updated += 1),
                TrackingEvent::AnchorRemoved { id } => self
                    .sync
                    .on_anchor_removed(&mut self.scene, *id)
                    .map(|_| report.removed += 1),
                TrackingEvent::CameraMoved { pose } => {
                    debug!(x = pose.translation.x, y = pose.translation.y, z = pose.translation.z, "Camera moved");
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!(error = %e, "Anchor sync inconsistency");
                report.warnings += 1;
            }
        }
        report
    }

    fn summarize_anchor(&self, anchor: &Anchor, camera: Transform3D) -> AnchorSummary {
        let id = anchor.id();
        let position = anchor.transform().translation;
        let viewport = self.settings.viewport;
        let screen = viewport
            .project(position, camera)
            .filter(|p| viewport.contains(*p));
        let (alignment, image) = match anchor {
            Anchor::Plane(p) => (Some(p.alignment), None),
            Anchor::Image(i) => (None, Some(i.reference_image.name.clone())),
        };
        AnchorSummary {
            id,
            kind: anchor.kind_name().to_string(),
            alignment,
            image,
            position,
            visual_size: self.sync.plane_size(&self.scene, id),
            has_visual: self.sync.plane_visual(id).is_some() || self.sync.image_visual(id).is_some(),
            screen,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.orchestrator.state();
        let camera = self.tracking.camera_pose();
        let placed = self
            .orchestrator
            .placed()
            .iter()
            .map(|p| PlacedSummary {
                node: p.node.index(),
                prototype: p.prototype.clone(),
                position: p.transform.translation,
                mode: p.mode,
                placed_at: p.placed_at,
            })
            .collect();
        let anchors = self
            .tracking
            .anchors()
            .iter()
            .map(|a| self.summarize_anchor(a, camera))
            .collect();
        SessionSnapshot {
            mode: state.mode,
            selected: state.selected.clone(),
            planes_hidden: state.planes_hidden,
            tracking_running: self.tracking.is_running(),
            camera,
            minimum_distance_m: self.orchestrator.filter().minimum_distance(),
            scene_nodes: self.scene.len(),
            plane_visuals: self.sync.plane_visual_count(),
            image_visuals: self.sync.image_visual_count(),
            prototypes: self.catalog.names().map(str::to_string).collect(),
            placed,
            anchors,
        }
    }
}

impl Drop for ArSession {
    fn drop(&mut self) {
        self.tracking.stop();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Worker thread
// ────────────────────────────────────────────────────────────────────────────

enum Request {
    Command(SessionCommand, Sender<Result<CommandOutcome, ArError>>),
    Snapshot(Sender<SessionSnapshot>),
    Shutdown,
}

/// Cloneable sender side of a [`SessionHandle`].
#[derive(Debug, Clone)]
pub struct SessionClient {
    tx: Sender<Request>,
}

impl SessionClient {
    /// Queue a command and wait for its outcome.
    pub fn send(&self, command: SessionCommand) -> Result<CommandOutcome, ArError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Request::Command(command, reply_tx))
            .map_err(|_| ArError::SessionClosed)?;
        reply_rx.recv().map_err(|_| ArError::SessionClosed)?
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, ArError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Request::Snapshot(reply_tx))
            .map_err(|_| ArError::SessionClosed)?;
        reply_rx.recv().map_err(|_| ArError::SessionClosed)
    }
}

/// Owns the worker thread running an [`ArSession`].  Dropping the handle
/// stops the worker and waits for it.
#[derive(Debug)]
pub struct SessionHandle {
    client: SessionClient,
    worker: Option<JoinHandle<()>>,
}

fn run_worker(mut session: ArSession, rx: Receiver<Request>) {
    debug!("Session worker running");
    while let Ok(request) = rx.recv() {
        match request {
            Request::Command(command, reply) => {
                let result = session.handle(command);
                if let Err(e) = &result {
                    debug!(error = %e, "Command failed");
                }
                // The caller may have given up waiting.
                let _ = reply.send(result);
            }
            Request::Snapshot(reply) => {
                let _ = reply.send(session.snapshot());
            }
            Request::Shutdown => break,
        }
    }
    debug!("Session worker stopped");
}

impl SessionHandle {
    pub fn spawn(session: ArSession) -> Result<Self, ArError> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("arplace-session".to_string())
            .spawn(move || run_worker(session, rx))
            .map_err(|e| ArError::Worker(e.to_string()))?;
        Ok(Self {
            client: SessionClient { tx },
            worker: Some(worker),
        })
    }

    pub fn client(&self) -> SessionClient {
        self.client.clone()
    }

    pub fn send(&self, command: SessionCommand) -> Result<CommandOutcome, ArError> {
        self.client.send(command)
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, ArError> {
        self.client.snapshot()
    }

    /// Stop the worker after it has drained the commands queued so far.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.client.tx.send(Request::Shutdown);
        if worker.join().is_err() {
            error!("Session worker panicked");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
