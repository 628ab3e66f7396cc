//! Guided session engine: countdown-driven playback of phased activities
//! (breathing exercises, meditations, narrated visualizations) with
//! per-phase narration hooks and per-activity ratings.
//!
//! The core is a discrete state machine: an external scheduler feeds
//! [`GuidedSession::tick`] once per elapsed time unit and renders the
//! events it gets back, so the engine never touches a platform timer and
//! whole sessions replay synchronously in tests. [`SessionController`] is
//! that scheduler for tokio embedders.

mod activity;
mod clock;
mod error;
mod events;
mod narration;
mod session;

pub use activity::{load_activities, parse_activities, Activity, Phase};
pub use clock::{ClockState, PhaseClock};
pub use error::EngineError;
pub use events::SessionEvent;
pub use narration::{
    LogNarration, NarrationChannel, NarrationCommand, NarrationHandle, NullNarration,
};
pub use session::{
    ActivityQueue, ControllerConfig, GuidedSession, SessionController, SessionSnapshot,
    SessionSummary,
};
