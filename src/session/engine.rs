use std::collections::BTreeMap;

use log::info;

use crate::activity::Activity;
use crate::clock::{ClockState, PhaseClock};
use crate::error::EngineError;
use crate::events::SessionEvent;
use crate::narration::NarrationChannel;
use crate::session::queue::ActivityQueue;

/// The surface a caller drives: activity queue, phase clock, and narration
/// behind one facade.
///
/// Operations return the events they produced so the embedding scheduler
/// can fan them out to renderers. Narration side effects are applied here,
/// on the way out, which keeps the clock itself pure and the timing
/// independent of any speech backend.
pub struct GuidedSession {
    queue: ActivityQueue,
    clock: PhaseClock,
    narration: Box<dyn NarrationChannel>,
}

impl GuidedSession {
    pub fn new(
        activities: Vec<Activity>,
        narration: Box<dyn NarrationChannel>,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            queue: ActivityQueue::new(activities)?,
            clock: PhaseClock::new(),
            narration,
        })
    }

    /// Begin (or restart) playback of the activity at the cursor.
    pub fn start_current(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let index = self.queue.current_index();
        let activity = self.queue.current_activity()?.clone();
        info!("starting activity {index}: {}", activity.name);

        let events = self.clock.start(activity, index)?;
        self.apply_narration(&events);
        Ok(events)
    }

    /// Advance one time unit. The scheduler calls this once per second (or
    /// whatever unit it runs at); the engine never measures time itself.
    pub fn tick(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let events = self.clock.tick()?;
        self.apply_narration(&events);
        Ok(events)
    }

    /// Freeze the countdown and ask the narration backend to hold. A
    /// backend that cannot pause keeps talking; the clock freezes either
    /// way.
    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.clock.pause()?;
        self.narration.pause_speech();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.clock.resume()?;
        self.narration.resume_speech();
        Ok(())
    }

    /// Abandon the current activity without completing it. Valid from any
    /// state; in-flight narration is cancelled immediately.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.narration.cancel_speech();
    }

    /// Store the rating for the just-completed activity. The clock must be
    /// in its complete state; range validation stays with the caller.
    pub fn record_rating(&mut self, rating: u8) -> Result<(), EngineError> {
        if !self.clock.is_complete() {
            return Err(EngineError::InvalidState {
                op: "record_rating",
                state: self.clock.state().label(),
            });
        }
        self.queue.record_rating(rating)
    }

    /// Move to the next activity, or finish the session when none remain.
    /// Requires a recorded rating for the current activity.
    pub fn advance(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let finished = self.queue.advance()?;
        self.clock.reset();

        if finished {
            self.narration.cancel_speech();
            info!("session finished, {} activities rated", self.queue.ratings().len());
            return Ok(vec![SessionEvent::QueueFinished {
                ratings: self.queue.ratings().clone(),
            }]);
        }

        Ok(Vec::new())
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_finished()
    }

    pub fn clock_state(&self) -> &ClockState {
        self.clock.state()
    }

    pub fn current_activity_index(&self) -> usize {
        self.queue.current_index()
    }

    pub fn activity_count(&self) -> usize {
        self.queue.activity_count()
    }

    pub fn ratings(&self) -> &BTreeMap<usize, u8> {
        self.queue.ratings()
    }

    /// One utterance is live at a time: any in-flight speech is cancelled
    /// before the new phase's line starts.
    fn apply_narration(&self, events: &[SessionEvent]) {
        for event in events {
            if let SessionEvent::PhaseEntered { phase, .. } = event {
                if let Some(text) = &phase.narration_text {
                    self.narration.cancel_speech();
                    self.narration.speak(text);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Phase;
    use crate::narration::{NarrationCommand, NarrationHandle, NullNarration};

    fn narrated_activity() -> Activity {
        Activity::new(
            "body scan",
            vec![
                Phase::with_narration("settle", 2, "Find a comfortable position"),
                Phase::new("breathe", 2),
                Phase::with_narration("release", 1, "Let your shoulders drop"),
            ],
            2,
        )
    }

    #[test]
    fn narration_fires_cancel_then_speak_per_entered_phase() {
        let (handle, rx) = NarrationHandle::channel();
        let mut session =
            GuidedSession::new(vec![narrated_activity()], Box::new(handle)).unwrap();

        session.start_current().unwrap();
        for _ in 0..5 {
            session.tick().unwrap();
        }

        // Cycle 1: settle narrated, breathe silent, release narrated; then
        // the wrap re-narrates settle.
        let commands: Vec<NarrationCommand> = rx.try_iter().collect();
        assert_eq!(
            commands,
            vec![
                NarrationCommand::Cancel,
                NarrationCommand::Speak("Find a comfortable position".into()),
                NarrationCommand::Cancel,
                NarrationCommand::Speak("Let your shoulders drop".into()),
                NarrationCommand::Cancel,
                NarrationCommand::Speak("Find a comfortable position".into()),
            ]
        );
    }

    #[test]
    fn pause_and_reset_reach_the_narration_channel() {
        let (handle, rx) = NarrationHandle::channel();
        let mut session =
            GuidedSession::new(vec![narrated_activity()], Box::new(handle)).unwrap();

        session.start_current().unwrap();
        session.pause().unwrap();
        session.resume().unwrap();
        session.reset();

        let commands: Vec<NarrationCommand> = rx.try_iter().collect();
        assert_eq!(
            &commands[2..],
            &[
                NarrationCommand::Pause,
                NarrationCommand::Resume,
                NarrationCommand::Cancel,
            ]
        );
    }

    #[test]
    fn rating_requires_a_completed_clock() {
        let mut session =
            GuidedSession::new(vec![narrated_activity()], Box::new(NullNarration)).unwrap();
        session.start_current().unwrap();

        assert!(matches!(
            session.record_rating(7),
            Err(EngineError::InvalidState {
                op: "record_rating",
                ..
            })
        ));
    }

    #[test]
    fn advance_before_rating_is_fatal_and_harmless() {
        let mut session =
            GuidedSession::new(vec![narrated_activity()], Box::new(NullNarration)).unwrap();
        session.start_current().unwrap();
        for _ in 0..10 {
            session.tick().unwrap();
        }
        assert!(session.clock_state().label() == "complete");

        assert!(matches!(
            session.advance(),
            Err(EngineError::PrematureAdvance { activity_index: 0 })
        ));
        assert_eq!(session.current_activity_index(), 0);

        session.record_rating(8).unwrap();
        let events = session.advance().unwrap();
        assert!(matches!(events[0], SessionEvent::QueueFinished { .. }));
        assert!(session.is_finished());
    }
}
