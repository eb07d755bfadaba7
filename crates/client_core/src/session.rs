use std::{
    str::FromStr,
    sync::{Arc, Weak},
    time::Duration,
};

use engine_integration::{CaptureConfig, SpeechCapability, SpeechEvent, SurfaceId, ViewerOptions};
use serde::Deserialize;
use shared::{
    domain::{
        ListeningState, MoleculeRequest, RequestLifecycle, ResultSet, SessionId, SessionState,
        SubmissionOrigin, ViewerState,
    },
    error::{ErrorCode, ResolveError, VoiceError},
};
use tokio::{
    sync::{
        broadcast::{self, error::TryRecvError},
        Mutex,
    },
    task::JoinHandle,
};
use tracing::{debug, error, info, info_span, Instrument};

use crate::{
    engine::SharedEngine,
    export::StructureExport,
    pipeline::PipelineOrchestrator,
    viewer::ViewerLifecycle,
    voice::{CaptureTicket, VoiceInputController, VoiceOutcome, VoiceStart},
};

const AUTO_SUBMIT_DELAY: Duration = Duration::from_millis(500);

/// How completions of overlapping runs are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPolicy {
    /// Each run is numbered; a run that completes after a newer submission
    /// is discarded.
    #[default]
    LatestWins,
    /// Every completion overwrites the session, in completion order.
    LastCompletedWins,
}

impl FromStr for RunPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "latest_wins" => Ok(Self::LatestWins),
            "last_completed_wins" => Ok(Self::LastCompletedWins),
            other => Err(format!("unknown run policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub auto_submit_delay: Duration,
    pub run_policy: RunPolicy,
    pub viewer: ViewerOptions,
    pub capture: CaptureConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_submit_delay: AUTO_SUBMIT_DELAY,
            run_policy: RunPolicy::default(),
            viewer: ViewerOptions::default(),
            capture: CaptureConfig::default(),
        }
    }
}

/// Viewer transitions caused by a run are sent before that run's final
/// `LifecycleChanged`.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    InputChanged(String),
    LifecycleChanged(RequestLifecycle),
    ResultsReplaced,
    RunDiscarded { generation: u64 },
    Viewer(ViewerState),
    Listening(ListeningState),
    TranscriptReceived(String),
    VoiceError(VoiceError),
}

struct SessionInner {
    input: String,
    lifecycle: RequestLifecycle,
    error: Option<String>,
    error_code: Option<ErrorCode>,
    result: ResultSet,
    latest_generation: u64,
}

/// The viewer plus its transition feed, drained while the lock is held.
struct ViewerSlot {
    lifecycle: ViewerLifecycle,
    transitions: broadcast::Receiver<ViewerState>,
}

/// One sample: input, pipeline runs, 3D viewer and voice input. Sessions share
/// nothing but the engine handle.
pub struct SampleSession {
    id: SessionId,
    pipeline: Arc<PipelineOrchestrator>,
    options: SessionOptions,
    inner: Mutex<SessionInner>,
    viewer: Mutex<ViewerSlot>,
    voice: Mutex<VoiceInputController>,
    events: broadcast::Sender<SessionEvent>,
}

impl SampleSession {
    /// Must be called inside a tokio runtime; waiting for the engine runs as a
    /// background task.
    pub fn new(
        id: SessionId,
        pipeline: Arc<PipelineOrchestrator>,
        engine: Arc<SharedEngine>,
        speech: Arc<dyn SpeechCapability>,
        options: SessionOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        // The engine flag is read once; a load finishing after this read is
        // picked up by the waiter.
        let loaded = engine.loaded();
        let waiting_for_engine = loaded.is_none();
        let lifecycle = ViewerLifecycle::new(
            id,
            SurfaceId(format!("sample-{}-viewer", id.0)),
            options.viewer.clone(),
            loaded,
        );
        let transitions = lifecycle.subscribe();
        let voice = VoiceInputController::new(speech, options.capture.clone());

        let session = Arc::new(Self {
            id,
            pipeline,
            options,
            inner: Mutex::new(SessionInner {
                input: String::new(),
                lifecycle: RequestLifecycle::Idle,
                error: None,
                error_code: None,
                result: ResultSet::absent(),
                latest_generation: 0,
            }),
            viewer: Mutex::new(ViewerSlot {
                lifecycle,
                transitions,
            }),
            voice: Mutex::new(voice),
            events,
        });

        if waiting_for_engine {
            spawn_engine_wait(Arc::downgrade(&session), engine);
        }
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        let inner = self.inner.lock().await;
        let viewer = self.viewer.lock().await.lifecycle.state().clone();
        let listening = self.voice.lock().await.state().clone();
        SessionState {
            session_id: self.id,
            input: inner.input.clone(),
            lifecycle: inner.lifecycle,
            error: inner.error.clone(),
            error_code: inner.error_code,
            result: inner.result.clone(),
            viewer,
            listening,
        }
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.inner.lock().await.input = text.clone();
        self.emit(SessionEvent::InputChanged(text));
    }

    /// Submits the current input, as pressing Enter would.
    pub async fn submit_input(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let input = self.inner.lock().await.input.clone();
        self.submit(&input, SubmissionOrigin::Typed).await
    }

    /// Starts a pipeline run and returns its task. Blank text is a no-op.
    ///
    /// A run already in flight is not cancelled; how its late completion is
    /// applied depends on the session's `RunPolicy`.
    pub async fn submit(
        self: &Arc<Self>,
        text: &str,
        origin: SubmissionOrigin,
    ) -> Option<JoinHandle<()>> {
        let Some(request) = MoleculeRequest::new(text, origin) else {
            debug!(session = %self.id, code = ?ErrorCode::InputEmpty, "ignoring blank submission");
            return None;
        };

        let generation = {
            let mut inner = self.inner.lock().await;
            inner.latest_generation += 1;
            inner.lifecycle = RequestLifecycle::InFlight;
            inner.error = None;
            inner.error_code = None;
            inner.latest_generation
        };
        info!(session = %self.id, generation, origin = ?origin, "pipeline run submitted");
        self.emit(SessionEvent::LifecycleChanged(RequestLifecycle::InFlight));

        let session = Arc::clone(self);
        let span = info_span!("pipeline_run", session = %self.id, generation);
        Some(tokio::spawn(
            async move {
                let outcome = session.pipeline.run(&request).await;
                session.complete_run(generation, outcome).await;
            }
            .instrument(span),
        ))
    }

    async fn complete_run(&self, generation: u64, outcome: Result<ResultSet, ResolveError>) {
        let mut inner = self.inner.lock().await;
        if self.options.run_policy == RunPolicy::LatestWins && generation != inner.latest_generation
        {
            info!(
                session = %self.id,
                generation,
                latest = inner.latest_generation,
                "discarding stale pipeline run"
            );
            self.emit(SessionEvent::RunDiscarded { generation });
            return;
        }

        match outcome {
            Ok(result) => {
                inner.lifecycle = RequestLifecycle::Succeeded;
                inner.error = None;
                inner.error_code = None;
                inner.result = result;
            }
            Err(err) => {
                error!(session = %self.id, code = ?err.code(), "pipeline run failed: {err}");
                inner.lifecycle = RequestLifecycle::Failed;
                inner.error = Some(err.to_string());
                inner.error_code = Some(err.code());
                inner.result = ResultSet::absent();
            }
        }
        let structure = inner.result.structure_blob().cloned();
        let lifecycle = inner.lifecycle;
        self.emit(SessionEvent::ResultsReplaced);

        // Still holding `inner` so viewer updates apply in result order.
        let mut viewer = self.viewer.lock().await;
        viewer.lifecycle.set_structure(structure);
        self.forward_viewer_transitions(&mut viewer);
        drop(viewer);

        self.emit(SessionEvent::LifecycleChanged(lifecycle));
    }

    fn forward_viewer_transitions(&self, slot: &mut ViewerSlot) {
        loop {
            match slot.transitions.try_recv() {
                Ok(state) => self.emit(SessionEvent::Viewer(state)),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(session = %self.id, skipped, "viewer transitions lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Starts voice capture, or stops it when already listening.
    pub async fn toggle_voice(self: &Arc<Self>) -> Result<(), VoiceError> {
        let (start, listening) = {
            let mut voice = self.voice.lock().await;
            let start = voice.start();
            (start, voice.state().clone())
        };

        match start {
            Err(err) => {
                error!(session = %self.id, code = ?err.code(), "voice input unavailable: {err}");
                self.emit(SessionEvent::VoiceError(err.clone()));
                Err(err)
            }
            Ok(VoiceStart::Stopped) => {
                self.emit(SessionEvent::Listening(listening));
                Ok(())
            }
            Ok(VoiceStart::Started(ticket)) => {
                self.emit(SessionEvent::Listening(listening));
                self.spawn_capture_listener(ticket);
                Ok(())
            }
        }
    }

    pub async fn stop_voice(&self) {
        let listening = {
            let mut voice = self.voice.lock().await;
            voice.stop();
            voice.state().clone()
        };
        self.emit(SessionEvent::Listening(listening));
    }

    pub async fn dismiss_voice_error(&self) {
        let listening = {
            let mut voice = self.voice.lock().await;
            voice.dismiss_error();
            voice.state().clone()
        };
        self.emit(SessionEvent::Listening(listening));
    }

    pub async fn structure_export(&self) -> Option<StructureExport> {
        let inner = self.inner.lock().await;
        inner
            .result
            .structure_blob()
            .cloned()
            .map(|blob| StructureExport::new(self.id, blob))
    }

    fn spawn_capture_listener(self: &Arc<Self>, ticket: CaptureTicket) {
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            let CaptureTicket {
                capture_id,
                mut events,
            } = ticket;
            while let Some(event) = events.recv().await {
                let Some(current) = session.upgrade() else {
                    return;
                };
                if current.apply_capture_event(capture_id, event).await {
                    return;
                }
            }
            // The engine went away without a final notification.
            if let Some(current) = session.upgrade() {
                current.apply_capture_event(capture_id, SpeechEvent::End).await;
            }
        });
    }

    /// Returns true once the capture has finished.
    async fn apply_capture_event(self: &Arc<Self>, capture_id: u64, event: SpeechEvent) -> bool {
        let (outcome, listening) = {
            let mut voice = self.voice.lock().await;
            let outcome = voice.handle_event(capture_id, event);
            (outcome, voice.state().clone())
        };

        match outcome {
            VoiceOutcome::Ignored => false,
            VoiceOutcome::Ended => {
                self.emit(SessionEvent::Listening(listening));
                true
            }
            VoiceOutcome::Failed(err) => {
                self.emit(SessionEvent::Listening(listening));
                self.emit(SessionEvent::VoiceError(err));
                true
            }
            VoiceOutcome::Transcript(transcript) => {
                // Observers see the transcript before listening returns to idle.
                self.emit(SessionEvent::TranscriptReceived(transcript.clone()));
                self.emit(SessionEvent::Listening(listening));
                self.accept_transcript(transcript);
                true
            }
        }
    }

    fn accept_transcript(self: &Arc<Self>, transcript: String) {
        let session = Arc::downgrade(self);
        let delay = self.options.auto_submit_delay;
        tokio::spawn(async move {
            let Some(current) = session.upgrade() else {
                return;
            };
            current.set_input(transcript.clone()).await;
            drop(current);

            if transcript.trim().is_empty() {
                return;
            }
            tokio::time::sleep(delay).await;
            if let Some(current) = session.upgrade() {
                current.submit(&transcript, SubmissionOrigin::Voice).await;
            }
        });
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

fn spawn_engine_wait(session: Weak<SampleSession>, engine: Arc<SharedEngine>) {
    tokio::spawn(async move {
        match engine.ensure_loaded().await {
            Ok(render_engine) => {
                if let Some(session) = session.upgrade() {
                    let mut viewer = session.viewer.lock().await;
                    viewer.lifecycle.engine_ready(render_engine);
                    session.forward_viewer_transitions(&mut viewer);
                }
            }
            Err(err) => {
                if let Some(session) = session.upgrade() {
                    error!(
                        session = %session.id,
                        code = ?ErrorCode::RenderInitFailed,
                        "3D viewer stays unavailable: {err}"
                    );
                }
            }
        }
    });
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
