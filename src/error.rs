use thiserror::Error;

/// Errors surfaced by the session engine.
///
/// Every variant indicates a caller or content-authoring bug; none of them
/// is a recoverable runtime condition, so there is no retry machinery.
/// Narration failures are deliberately absent: they are swallowed at the
/// narration channel boundary and never reach the clock.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The activity configuration cannot be played back.
    #[error("invalid activity: {0}")]
    InvalidActivity(String),

    /// An operation was invoked in a state that forbids it.
    #[error("cannot {op} while {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },

    /// `advance` was called before a rating was recorded for the current
    /// activity.
    #[error("no rating recorded for activity {activity_index} before advance")]
    PrematureAdvance { activity_index: usize },

    /// The activity queue has no current activity left.
    #[error("activity queue is exhausted")]
    QueueExhausted,
}
