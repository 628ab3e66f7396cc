use std::collections::BTreeMap;

use crate::activity::Activity;
use crate::error::EngineError;

/// Ordered activities for one session.
///
/// The cursor only moves forward, and only after a rating has been recorded
/// for the activity it points at. Past the last activity the queue is
/// finished and the ratings map is complete.
#[derive(Debug, Clone)]
pub struct ActivityQueue {
    activities: Vec<Activity>,
    cursor: usize,
    ratings: BTreeMap<usize, u8>,
}

impl ActivityQueue {
    pub fn new(activities: Vec<Activity>) -> Result<Self, EngineError> {
        if activities.is_empty() {
            return Err(EngineError::InvalidActivity(
                "a session needs at least one activity".into(),
            ));
        }
        for activity in &activities {
            activity.validate()?;
        }

        Ok(Self {
            activities,
            cursor: 0,
            ratings: BTreeMap::new(),
        })
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    pub fn current_activity(&self) -> Result<&Activity, EngineError> {
        self.activities.get(self.cursor).ok_or(EngineError::QueueExhausted)
    }

    /// Store the caller-supplied result for the current activity. Range
    /// validation is the caller's concern; re-recording before `advance`
    /// overwrites the earlier value.
    pub fn record_rating(&mut self, rating: u8) -> Result<(), EngineError> {
        if self.is_finished() {
            return Err(EngineError::QueueExhausted);
        }
        self.ratings.insert(self.cursor, rating);
        Ok(())
    }

    /// Move past the current activity. Returns true when the queue is now
    /// finished.
    pub fn advance(&mut self) -> Result<bool, EngineError> {
        if self.is_finished() {
            return Err(EngineError::QueueExhausted);
        }
        if !self.ratings.contains_key(&self.cursor) {
            return Err(EngineError::PrematureAdvance {
                activity_index: self.cursor,
            });
        }

        self.cursor += 1;
        Ok(self.is_finished())
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.activities.len()
    }

    pub fn ratings(&self) -> &BTreeMap<usize, u8> {
        &self.ratings
    }
}
