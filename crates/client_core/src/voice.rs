use std::sync::Arc;

use engine_integration::{CaptureConfig, CaptureHandle, SpeechCapability, SpeechEvent};
use shared::{
    domain::{ListeningState, VoiceErrorKind},
    error::VoiceError,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Engine notifications for one capture, tagged so that late events from a
/// capture that was stopped can be told apart.
pub struct CaptureTicket {
    pub capture_id: u64,
    pub events: mpsc::UnboundedReceiver<SpeechEvent>,
}

pub enum VoiceStart {
    Started(CaptureTicket),
    /// `start` was called while listening and stopped the capture instead.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    Transcript(String),
    Failed(VoiceError),
    Ended,
    Ignored,
}

struct ActiveCapture {
    capture_id: u64,
    handle: Box<dyn CaptureHandle>,
}

pub struct VoiceInputController {
    capability: Arc<dyn SpeechCapability>,
    config: CaptureConfig,
    state: ListeningState,
    active: Option<ActiveCapture>,
    next_capture_id: u64,
}

impl VoiceInputController {
    pub fn new(capability: Arc<dyn SpeechCapability>, config: CaptureConfig) -> Self {
        Self {
            capability,
            config,
            state: ListeningState::Idle,
            active: None,
            next_capture_id: 0,
        }
    }

    pub fn state(&self) -> &ListeningState {
        &self.state
    }

    pub fn is_supported(&self) -> bool {
        self.capability.is_available()
    }

    /// Starts a single-utterance capture, or stops the running one.
    pub fn start(&mut self) -> Result<VoiceStart, VoiceError> {
        if self.state.is_listening() {
            self.stop();
            return Ok(VoiceStart::Stopped);
        }
        if !self.capability.is_available() {
            return Err(VoiceError::UnsupportedCapability);
        }

        let session = self.capability.start(&self.config).map_err(|err| {
            let failure = VoiceError::StartFailed(err.to_string());
            warn!(code = ?failure.code(), "failed to start voice recognition: {err:#}");
            self.state = ListeningState::Idle;
            failure
        })?;

        self.next_capture_id += 1;
        let capture_id = self.next_capture_id;
        self.active = Some(ActiveCapture {
            capture_id,
            handle: session.handle,
        });
        self.state = ListeningState::Listening;
        info!(capture_id, lang = %self.config.lang, "voice recognition started");
        Ok(VoiceStart::Started(CaptureTicket {
            capture_id,
            events: session.events,
        }))
    }

    /// Cancels the running capture without delivering a transcript.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.handle.stop();
            debug!(capture_id = active.capture_id, "voice recognition stopped");
        }
        if self.state.is_listening() {
            self.state = ListeningState::Idle;
        }
    }

    pub fn dismiss_error(&mut self) {
        if matches!(self.state, ListeningState::Error { .. }) {
            self.state = ListeningState::Idle;
        }
    }

    pub fn handle_event(&mut self, capture_id: u64, event: SpeechEvent) -> VoiceOutcome {
        let is_current = self
            .active
            .as_ref()
            .is_some_and(|active| active.capture_id == capture_id);
        if !is_current {
            debug!(capture_id, ?event, "ignoring event from inactive capture");
            return VoiceOutcome::Ignored;
        }

        match event {
            SpeechEvent::Result { transcript } => {
                info!(capture_id, "voice input received");
                self.finish(ListeningState::Idle);
                VoiceOutcome::Transcript(transcript)
            }
            SpeechEvent::Error { code } => {
                let kind = VoiceErrorKind::from_engine_code(&code);
                self.finish(ListeningState::Error {
                    kind,
                    code: code.clone(),
                });
                let err = VoiceError::Recognition { kind, code };
                warn!(capture_id, error_code = ?err.code(), ?kind, "{err}");
                VoiceOutcome::Failed(err)
            }
            SpeechEvent::End => {
                debug!(capture_id, "voice recognition ended without result");
                self.finish(ListeningState::Idle);
                VoiceOutcome::Ended
            }
        }
    }

    fn finish(&mut self, next: ListeningState) {
        self.active = None;
        self.state = next;
    }
}

#[cfg(test)]
#[path = "tests/voice_tests.rs"]
mod tests;
