use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One timed segment of an activity: a breath stage or a narrated step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub name: String,
    /// Countdown length in whole tick units. A zero-duration phase is
    /// skipped on entry, never played.
    pub duration_seconds: u32,
    /// Spoken once each time the phase is entered, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_text: Option<String>,
}

impl Phase {
    pub fn new(name: impl Into<String>, duration_seconds: u32) -> Self {
        Self {
            name: name.into(),
            duration_seconds,
            narration_text: None,
        }
    }

    pub fn with_narration(
        name: impl Into<String>,
        duration_seconds: u32,
        narration_text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            duration_seconds,
            narration_text: Some(narration_text.into()),
        }
    }
}

/// One complete exercise: an ordered phase sequence repeated `cycle_count`
/// times. Immutable during playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub name: String,
    pub phases: Vec<Phase>,
    pub cycle_count: u32,
}

impl Activity {
    pub fn new(name: impl Into<String>, phases: Vec<Phase>, cycle_count: u32) -> Self {
        Self {
            name: name.into(),
            phases,
            cycle_count,
        }
    }

    /// Total playable length across all cycles. Renderers use this for
    /// progress bars; the clock never consults it.
    pub fn total_duration_secs(&self) -> u32 {
        let per_cycle: u32 = self.phases.iter().map(|p| p.duration_seconds).sum();
        self.cycle_count.saturating_mul(per_cycle)
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.phases.is_empty() {
            return Err(EngineError::InvalidActivity(format!(
                "activity '{}' has no phases",
                self.name
            )));
        }
        if self.cycle_count < 1 {
            return Err(EngineError::InvalidActivity(format!(
                "activity '{}' has cycle_count {}, expected at least 1",
                self.name, self.cycle_count
            )));
        }
        if self.phases.iter().all(|p| p.duration_seconds == 0) {
            return Err(EngineError::InvalidActivity(format!(
                "activity '{}' has only zero-duration phases",
                self.name
            )));
        }
        Ok(())
    }
}

/// Load an activity set (a JSON array of activities) from disk.
pub fn load_activities(path: &Path) -> Result<Vec<Activity>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read activities from {}", path.display()))?;
    parse_activities(&contents)
        .with_context(|| format!("Failed to parse activities from {}", path.display()))
}

/// Parse an activity set from a JSON string.
pub fn parse_activities(json: &str) -> Result<Vec<Activity>> {
    serde_json::from_str(json).context("invalid activity definitions")
}
