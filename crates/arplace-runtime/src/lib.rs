//! `arplace-runtime` – placement engine and session ownership.
//!
//! # Modules
//!
//! - [`anchor_sync`] – [`AnchorSync`]: mirrors tracking anchors into the
//!   scene, creating plane visuals for horizontal planes and covers for
//!   recognised reference images.
//! - [`orchestrator`] – [`PlacementOrchestrator`]: resolves a touch into a
//!   placement pose for the active [`PlacementMode`][arplace_types::PlacementMode],
//!   enforces minimum spacing and instantiates the selected prototype.
//! - [`catalog`] – [`ObjectCatalog`]: named prototypes kept outside the
//!   visible scene and deep-copied on every placement.
//! - [`state`] – [`PlacementState`] and [`PlacementSettings`].
//! - [`session`] – [`ArSession`] (single owner of the scene) and
//!   [`SessionHandle`], which runs a session on its own worker thread behind
//!   a serialized command queue.
//! - [`telemetry`] – [`init_tracing`]: `tracing` subscriber with optional
//!   OTLP export.

pub mod anchor_sync;
pub mod catalog;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod telemetry;

pub use anchor_sync::{AnchorSync, SyncOutcome, VisualStyle};
pub use catalog::ObjectCatalog;
pub use orchestrator::{PlacedObject, PlacementOrchestrator, PlacementOutcome, RejectReason};
pub use session::{
    AnchorSummary, ArSession, CommandOutcome, PlacedSummary, SessionClient, SessionCommand,
    SessionHandle, SessionSettings, SessionSnapshot, TickReport,
};
pub use state::{PlacementSettings, PlacementState};
pub use telemetry::{init_tracing, LogFormat, TracerProviderGuard};
