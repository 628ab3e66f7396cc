use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, info};

/// Boundary to a text-to-speech backend.
///
/// Methods are infallible on purpose: narration is best-effort and a speech
/// failure must never stall the clock. Implementations swallow their own
/// errors; a session that loses audio keeps perfect time.
pub trait NarrationChannel: Send {
    /// Speak `text` now. Fire-and-forget; must not block the caller.
    fn speak(&self, text: &str);
    /// Best-effort pause of the in-flight utterance.
    fn pause_speech(&self);
    /// Best-effort resume of a paused utterance.
    fn resume_speech(&self);
    /// Drop whatever is in flight. Issued before every new utterance and
    /// when a session ends, so no narration outlives its owner.
    fn cancel_speech(&self);
}

/// Narration sink for sessions that run silent.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNarration;

impl NarrationChannel for NullNarration {
    fn speak(&self, _text: &str) {}
    fn pause_speech(&self) {}
    fn resume_speech(&self) {}
    fn cancel_speech(&self) {}
}

/// Routes utterances to the log. Used by the companion binary and handy in
/// headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNarration;

impl NarrationChannel for LogNarration {
    fn speak(&self, text: &str) {
        info!("narration: {text}");
    }

    fn pause_speech(&self) {
        debug!("narration paused");
    }

    fn resume_speech(&self) {
        debug!("narration resumed");
    }

    fn cancel_speech(&self) {
        debug!("narration cancelled");
    }
}

/// Commands forwarded to a speech backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationCommand {
    Speak(String),
    Pause,
    Resume,
    Cancel,
}

/// Channel-backed narration handle.
///
/// Speech objects are rarely `Send`, so the embedding application owns the
/// receiving end on a dedicated thread and drives whatever synthesizer it
/// has. Send failures are dropped: a dead backend silences narration but
/// never surfaces an error into the session.
#[derive(Debug, Clone)]
pub struct NarrationHandle {
    tx: Sender<NarrationCommand>,
}

impl NarrationHandle {
    /// Create a handle plus the receiver the backend thread consumes.
    pub fn channel() -> (Self, Receiver<NarrationCommand>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl NarrationChannel for NarrationHandle {
    fn speak(&self, text: &str) {
        let _ = self.tx.send(NarrationCommand::Speak(text.to_string()));
    }

    fn pause_speech(&self) {
        let _ = self.tx.send(NarrationCommand::Pause);
    }

    fn resume_speech(&self) {
        let _ = self.tx.send(NarrationCommand::Resume);
    }

    fn cancel_speech(&self) {
        let _ = self.tx.send(NarrationCommand::Cancel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_forwards_commands_in_order() {
        let (handle, rx) = NarrationHandle::channel();

        handle.cancel_speech();
        handle.speak("Breathe in");
        handle.pause_speech();
        handle.resume_speech();

        let received: Vec<NarrationCommand> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                NarrationCommand::Cancel,
                NarrationCommand::Speak("Breathe in".into()),
                NarrationCommand::Pause,
                NarrationCommand::Resume,
            ]
        );
    }

    #[test]
    fn handle_survives_a_dead_backend() {
        let (handle, rx) = NarrationHandle::channel();
        drop(rx);

        // Nothing to assert beyond "does not panic".
        handle.speak("anyone there?");
        handle.cancel_speech();
    }
}
