//! `arplace-hal` – seams to the device tracking stack.
//!
//! The placement core never talks to a camera-tracking SDK directly.  It
//! goes through two traits:
//!
//! - [`TrackingSession`][tracking::TrackingSession]: anchor events, current
//!   camera pose, start/stop lifecycle.
//! - [`HitTester`][hit_test::HitTester]: turns a touch point into the nearest
//!   plane anchor or scene node under it.
//!
//! [`sim`] provides a scripted [`SimTrackingSession`][sim::SimTrackingSession]
//! that replays recorded anchor events, and [`hit_test`] ships a
//! [`RaycastHitTester`][hit_test::RaycastHitTester] that works with any
//! session, so the whole stack runs headless.

pub mod camera;
pub mod sim;
pub mod tracking;

pub use camera::Viewport;
pub use hit_test::{HitTester, PlaneHit, RaycastHitTester};
pub use sim::{RecordedEvent, RecordedFrame, SimTrackingSession, TrackingRecording};
pub use tracking::{TrackingConfig, TrackingEvent, TrackingSession};
