pub mod controller;
pub mod engine;
pub mod queue;

pub use controller::{ControllerConfig, SessionController, SessionSnapshot, SessionSummary};
pub use engine::GuidedSession;
pub use queue::ActivityQueue;
