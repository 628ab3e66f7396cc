use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::activity::Phase;

/// Events the engine emits as playback advances.
///
/// Subscribers render, narrate, or persist; the engine itself only counts.
/// Payloads are camelCase-serializable so they can cross an event-bus or
/// IPC boundary unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    /// A phase was entered, including re-entry into phase 0 on every cycle
    /// boundary. Narration, when the phase carries text, fires on this.
    PhaseEntered {
        activity_index: usize,
        phase_index: usize,
        cycle_index: u32,
        phase: Phase,
    },
    /// One time unit elapsed inside the current phase.
    TickOccurred { seconds_remaining: u32 },
    /// The last tick of the last cycle landed.
    ActivityCompleted { activity_index: usize },
    /// The queue advanced past its final activity; ratings are complete.
    QueueFinished { ratings: BTreeMap<usize, u8> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_camel_case() {
        let event = SessionEvent::PhaseEntered {
            activity_index: 0,
            phase_index: 2,
            cycle_index: 1,
            phase: Phase::new("exhale", 8),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "phaseEntered");
        assert_eq!(json["phaseIndex"], 2);
        assert_eq!(json["phase"]["durationSeconds"], 8);
    }

    #[test]
    fn finished_event_keeps_ratings_in_activity_order() {
        let mut ratings = BTreeMap::new();
        ratings.insert(1usize, 8u8);
        ratings.insert(0usize, 6u8);

        let json = serde_json::to_string(&SessionEvent::QueueFinished { ratings }).unwrap();
        assert!(json.contains(r#""ratings":{"0":6,"1":8}"#));
    }
}
