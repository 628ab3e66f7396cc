use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    activity::Activity,
    clock::ClockState,
    events::SessionEvent,
    narration::NarrationChannel,
    session::engine::GuidedSession,
};

/// Point-in-time view of a session, for UI polling.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub clock: ClockState,
    pub activity_index: usize,
    pub activity_count: usize,
    pub finished: bool,
}

/// Produced once, when the queue finishes. Whatever stores results reads
/// the ratings from here.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ratings: BTreeMap<usize, u8>,
}

/// Tuning knobs for the driver. One engine tick per second unless
/// overridden; shorten the interval for sub-second phase resolution.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub tick_interval: Duration,
    pub event_buffer: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            event_buffer: 64,
        }
    }
}

struct TickerGuard {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Owns the scheduler the engine deliberately does not have.
///
/// A ticker task feeds [`GuidedSession::tick`] once per interval and
/// rebroadcasts the resulting events; subscribers render or persist. The
/// ticker stops itself when an activity completes; the caller records a
/// rating, advances, and starts the next activity, which spawns a fresh
/// ticker. Pause aborts the ticker task outright so `tick` is never
/// invoked against a paused engine.
#[derive(Clone)]
pub struct SessionController {
    session_id: String,
    started_at: DateTime<Utc>,
    session: Arc<Mutex<GuidedSession>>,
    events: broadcast::Sender<SessionEvent>,
    ticker: Arc<Mutex<Option<TickerGuard>>>,
    tick_interval: Duration,
}

impl SessionController {
    pub fn new(
        activities: Vec<Activity>,
        narration: Box<dyn NarrationChannel>,
        config: ControllerConfig,
    ) -> Result<Self> {
        let session = GuidedSession::new(activities, narration)?;
        let (events, _) = broadcast::channel(config.event_buffer);

        Ok(Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            session: Arc::new(Mutex::new(session)),
            events,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: config.tick_interval,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Subscribe to the event stream. Late subscribers only see events
    /// emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        SessionSnapshot {
            session_id: self.session_id.clone(),
            clock: session.clock_state().clone(),
            activity_index: session.current_activity_index(),
            activity_count: session.activity_count(),
            finished: session.is_finished(),
        }
    }

    /// Start playback of the activity at the cursor and spawn the ticker.
    pub async fn start_activity(&self) -> Result<()> {
        let batch = {
            let mut session = self.session.lock().await;
            session.start_current()?
        };
        self.broadcast(batch);
        self.spawn_ticker().await;
        Ok(())
    }

    /// Freeze the session. The ticker task is aborted, not just skipped, so
    /// no tick can land while paused.
    pub async fn pause(&self) -> Result<()> {
        self.cancel_ticker().await;
        self.session.lock().await.pause()?;
        info!("session {} paused", self.session_id);
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.session.lock().await.resume()?;
        self.spawn_ticker().await;
        info!("session {} resumed", self.session_id);
        Ok(())
    }

    /// Abandon the current activity: stop the ticker, reset the clock, and
    /// cancel any in-flight narration.
    pub async fn stop_activity(&self) -> Result<()> {
        self.cancel_ticker().await;
        self.session.lock().await.reset();
        Ok(())
    }

    /// Record the rating for the just-completed activity.
    pub async fn record_rating(&self, rating: u8) -> Result<()> {
        self.session.lock().await.record_rating(rating)?;
        Ok(())
    }

    /// Advance the queue. Returns the session summary when this was the
    /// last activity; otherwise the caller is expected to call
    /// [`start_activity`] again.
    ///
    /// [`start_activity`]: SessionController::start_activity
    pub async fn advance(&self) -> Result<Option<SessionSummary>> {
        let (batch, summary) = {
            let mut session = self.session.lock().await;
            let batch = session.advance()?;
            let summary = session.is_finished().then(|| SessionSummary {
                session_id: self.session_id.clone(),
                started_at: self.started_at,
                finished_at: Utc::now(),
                ratings: session.ratings().clone(),
            });
            (batch, summary)
        };
        self.broadcast(batch);

        if let Some(summary) = &summary {
            self.cancel_ticker().await;
            info!(
                "session {} finished with {} ratings",
                summary.session_id,
                summary.ratings.len()
            );
        }
        Ok(summary)
    }

    async fn spawn_ticker(&self) {
        let mut guard = self.ticker.lock().await;
        if let Some(old) = guard.take() {
            old.cancel.cancel();
            old.handle.abort();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let session = self.session.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval fire is immediate; consume it so the first
            // engine tick lands one full interval after start.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let batch = {
                            let mut session = session.lock().await;
                            if !matches!(session.clock_state(), ClockState::Running { .. }) {
                                break;
                            }
                            match session.tick() {
                                Ok(batch) => batch,
                                Err(err) => {
                                    error!("ticker stopped: {err}");
                                    break;
                                }
                            }
                        };

                        let mut completed = false;
                        for event in batch {
                            if matches!(event, SessionEvent::ActivityCompleted { .. }) {
                                completed = true;
                            }
                            let _ = events.send(event);
                        }
                        if completed {
                            // The caller records a rating and advances.
                            break;
                        }
                    }
                }
            }
        });

        *guard = Some(TickerGuard { handle, cancel });
    }

    async fn cancel_ticker(&self) {
        if let Some(TickerGuard { handle, cancel }) = self.ticker.lock().await.take() {
            cancel.cancel();
            handle.abort();
        }
    }

    fn broadcast(&self, batch: Vec<SessionEvent>) {
        for event in batch {
            // Send only fails with zero subscribers, which is fine.
            let _ = self.events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Phase;
    use crate::narration::NullNarration;

    fn two_phase_activity() -> Activity {
        Activity::new(
            "one minute pause",
            vec![Phase::new("settle", 1), Phase::new("breathe", 2)],
            1,
        )
    }

    fn controller_for(activities: Vec<Activity>) -> SessionController {
        SessionController::new(activities, Box::new(NullNarration), ControllerConfig::default())
            .unwrap()
    }

    async fn collect_until_complete(
        rx: &mut broadcast::Receiver<SessionEvent>,
    ) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        loop {
            let event = rx.recv().await.unwrap();
            let done = matches!(event, SessionEvent::ActivityCompleted { .. });
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_drives_an_activity_to_completion() {
        let controller = controller_for(vec![two_phase_activity()]);
        let mut rx = controller.subscribe();

        controller.start_activity().await.unwrap();
        let events = collect_until_complete(&mut rx).await;

        let ticks = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::TickOccurred { .. }))
            .count();
        let entries = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::PhaseEntered { .. }))
            .count();
        assert_eq!(ticks, 3);
        assert_eq!(entries, 2);

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.clock, ClockState::Complete { activity_index: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_ticks_and_resume_continues() {
        let controller = controller_for(vec![two_phase_activity()]);
        let mut rx = controller.subscribe();
        controller.start_activity().await.unwrap();

        // Startup entry, then let the first tick land (it also enters the
        // second phase), then pause.
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::PhaseEntered { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::TickOccurred { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::PhaseEntered { .. }
        ));
        controller.pause().await.unwrap();

        let frozen = controller.snapshot().await;
        time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert_eq!(controller.snapshot().await.clock, frozen.clock);

        controller.resume().await.unwrap();
        let events = collect_until_complete(&mut rx).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::ActivityCompleted { activity_index: 0 })));
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_produces_a_summary() {
        let controller = controller_for(vec![two_phase_activity(), two_phase_activity()]);
        let mut rx = controller.subscribe();

        controller.start_activity().await.unwrap();
        collect_until_complete(&mut rx).await;
        controller.record_rating(6).await.unwrap();
        assert!(controller.advance().await.unwrap().is_none());

        controller.start_activity().await.unwrap();
        collect_until_complete(&mut rx).await;
        controller.record_rating(9).await.unwrap();
        let summary = controller.advance().await.unwrap().expect("queue finished");

        assert_eq!(
            summary.ratings.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![(0, 6), (1, 9)]
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::QueueFinished { .. }
        ));
        assert!(controller.snapshot().await.finished);
    }
}
