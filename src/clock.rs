use serde::{Deserialize, Serialize};

use crate::activity::Activity;
use crate::error::EngineError;
use crate::events::SessionEvent;

/// Discrete playback state of one activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClockState {
    Idle,
    Running {
        activity_index: usize,
        phase_index: usize,
        cycle_index: u32,
        secs_remaining: u32,
    },
    Paused {
        activity_index: usize,
        phase_index: usize,
        cycle_index: u32,
        secs_remaining: u32,
    },
    Complete {
        activity_index: usize,
    },
}

impl Default for ClockState {
    fn default() -> Self {
        ClockState::Idle
    }
}

impl ClockState {
    pub fn label(&self) -> &'static str {
        match self {
            ClockState::Idle => "idle",
            ClockState::Running { .. } => "running",
            ClockState::Paused { .. } => "paused",
            ClockState::Complete { .. } => "complete",
        }
    }
}

/// Unit-tick countdown over one activity's phases and cycles.
///
/// The clock never measures real time. An external scheduler calls [`tick`]
/// once per elapsed unit, so every transition can be reproduced in a test by
/// ticking in a loop. Operations return the events they produced; the caller
/// decides what to render or speak.
///
/// [`tick`]: PhaseClock::tick
#[derive(Debug, Clone, Default)]
pub struct PhaseClock {
    state: ClockState,
    activity: Option<Activity>,
}

impl PhaseClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ClockState::Running { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, ClockState::Complete { .. })
    }

    /// The phase the clock currently sits in, while running or paused.
    pub fn current_phase(&self) -> Option<&crate::activity::Phase> {
        let phase_index = match self.state {
            ClockState::Running { phase_index, .. } | ClockState::Paused { phase_index, .. } => {
                phase_index
            }
            _ => return None,
        };
        self.activity.as_ref().and_then(|a| a.phases.get(phase_index))
    }

    /// Begin playback at the first playable phase of cycle 0, discarding any
    /// previous state. Zero-duration phases are skipped on entry, never
    /// played and never narrated.
    pub fn start(
        &mut self,
        activity: Activity,
        activity_index: usize,
    ) -> Result<Vec<SessionEvent>, EngineError> {
        activity.validate()?;

        // Validation guarantees at least one positive-duration phase.
        let phase_index = next_playable_phase(&activity, 0)
            .ok_or_else(|| EngineError::InvalidActivity("no playable phase".into()))?;
        let secs_remaining = activity.phases[phase_index].duration_seconds;

        self.state = ClockState::Running {
            activity_index,
            phase_index,
            cycle_index: 0,
            secs_remaining,
        };

        let entered = SessionEvent::PhaseEntered {
            activity_index,
            phase_index,
            cycle_index: 0,
            phase: activity.phases[phase_index].clone(),
        };
        self.activity = Some(activity);

        Ok(vec![entered])
    }

    /// Advance one time unit. Only valid while running.
    ///
    /// When the current phase's countdown reaches zero this moves to the
    /// next playable phase, wraps into the next cycle (re-entering phase 0,
    /// which re-triggers its narration), or completes the activity.
    pub fn tick(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let (activity_index, phase_index, cycle_index, secs_remaining) = match self.state {
            ClockState::Running {
                activity_index,
                phase_index,
                cycle_index,
                secs_remaining,
            } => (activity_index, phase_index, cycle_index, secs_remaining),
            ref other => {
                return Err(EngineError::InvalidState {
                    op: "tick",
                    state: other.label(),
                })
            }
        };
        let activity = self.activity.as_ref().ok_or(EngineError::InvalidState {
            op: "tick",
            state: "idle",
        })?;

        let remaining = secs_remaining.saturating_sub(1);
        let mut events = vec![SessionEvent::TickOccurred {
            seconds_remaining: remaining,
        }];

        if remaining > 0 {
            self.state = ClockState::Running {
                activity_index,
                phase_index,
                cycle_index,
                secs_remaining: remaining,
            };
            return Ok(events);
        }

        // Phase exhausted: next playable phase in this cycle, then the next
        // cycle, then completion.
        if let Some(next) = next_playable_phase(activity, phase_index + 1) {
            self.state = ClockState::Running {
                activity_index,
                phase_index: next,
                cycle_index,
                secs_remaining: activity.phases[next].duration_seconds,
            };
            events.push(SessionEvent::PhaseEntered {
                activity_index,
                phase_index: next,
                cycle_index,
                phase: activity.phases[next].clone(),
            });
        } else if cycle_index + 1 < activity.cycle_count {
            let first = next_playable_phase(activity, 0).ok_or(EngineError::InvalidState {
                op: "tick",
                state: "running",
            })?;
            self.state = ClockState::Running {
                activity_index,
                phase_index: first,
                cycle_index: cycle_index + 1,
                secs_remaining: activity.phases[first].duration_seconds,
            };
            events.push(SessionEvent::PhaseEntered {
                activity_index,
                phase_index: first,
                cycle_index: cycle_index + 1,
                phase: activity.phases[first].clone(),
            });
        } else {
            self.state = ClockState::Complete { activity_index };
            events.push(SessionEvent::ActivityCompleted { activity_index });
        }

        Ok(events)
    }

    /// Freeze the countdown. Only valid while running.
    pub fn pause(&mut self) -> Result<(), EngineError> {
        match self.state {
            ClockState::Running {
                activity_index,
                phase_index,
                cycle_index,
                secs_remaining,
            } => {
                self.state = ClockState::Paused {
                    activity_index,
                    phase_index,
                    cycle_index,
                    secs_remaining,
                };
                Ok(())
            }
            ref other => Err(EngineError::InvalidState {
                op: "pause",
                state: other.label(),
            }),
        }
    }

    /// Continue with identical counters. Only valid while paused.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        match self.state {
            ClockState::Paused {
                activity_index,
                phase_index,
                cycle_index,
                secs_remaining,
            } => {
                self.state = ClockState::Running {
                    activity_index,
                    phase_index,
                    cycle_index,
                    secs_remaining,
                };
                Ok(())
            }
            ref other => Err(EngineError::InvalidState {
                op: "resume",
                state: other.label(),
            }),
        }
    }

    /// Return to idle from any state, discarding all counters. Does not
    /// emit `ActivityCompleted`.
    pub fn reset(&mut self) {
        self.state = ClockState::Idle;
        self.activity = None;
    }
}

/// First phase at or after `from` with a positive duration.
fn next_playable_phase(activity: &Activity, from: usize) -> Option<usize> {
    activity
        .phases
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, p)| p.duration_seconds > 0)
        .map(|(i, _)| i)
}
