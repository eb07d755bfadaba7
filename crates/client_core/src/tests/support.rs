//! Fakes for the remote service and the engine capabilities.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex as StdMutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use engine_integration::{
    AtomSelector, CaptureConfig, CaptureHandle, CaptureSession, EngineLoader, RenderEngine,
    SpeechCapability, SpeechEvent, StyleSpec, SurfaceId, ViewerInstance, ViewerOptions,
};
use shared::{
    domain::{DepictionResult, ResolvedIdentifier, StageResult, StructureBlob, StructureResult},
    error::ResolveError,
};
use tokio::sync::{broadcast, mpsc, oneshot, Notify};

use crate::{session::SessionEvent, DepictionFetcher, IdentifierResolver, StructureFetcher};

pub type CallLog = Arc<StdMutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(StdMutex::new(Vec::new()))
}

pub fn entries(log: &CallLog) -> Vec<String> {
    log.lock().expect("log lock").clone()
}

#[derive(Default)]
pub struct ScriptedResolver {
    responses: StdMutex<HashMap<String, Result<ResolvedIdentifier, ResolveError>>>,
    gates: StdMutex<HashMap<String, oneshot::Receiver<()>>>,
    pub log: CallLog,
}

impl ScriptedResolver {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn respond(&self, text: &str, identifier: &str) {
        self.responses.lock().expect("responses lock").insert(
            text.to_string(),
            Ok(ResolvedIdentifier(identifier.to_string())),
        );
    }

    pub fn fail(&self, text: &str, err: ResolveError) {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(text.to_string(), Err(err));
    }

    /// Holds the next resolution of `text` until the returned sender fires.
    pub fn gate(&self, text: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .expect("gates lock")
            .insert(text.to_string(), rx);
        tx
    }
}

#[async_trait]
impl IdentifierResolver for ScriptedResolver {
    async fn resolve(&self, text: &str) -> Result<ResolvedIdentifier, ResolveError> {
        self.log
            .lock()
            .expect("log lock")
            .push(format!("resolve:{text}"));
        let gate = self.gates.lock().expect("gates lock").remove(text);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.responses
            .lock()
            .expect("responses lock")
            .get(text)
            .cloned()
            .unwrap_or(Err(ResolveError::NotFound))
    }
}

/// Depiction and structure fetcher answering from fixed tables; unknown
/// identifiers come back absent.
#[derive(Default)]
pub struct StaticFetchers {
    depictions: StdMutex<HashMap<String, DepictionResult>>,
    structures: StdMutex<HashMap<String, StructureResult>>,
    pub log: CallLog,
}

impl StaticFetchers {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn depiction(&self, identifier: &str, bytes: &[u8]) {
        self.depictions
            .lock()
            .expect("depictions lock")
            .insert(identifier.to_string(), StageResult::Present(Arc::from(bytes)));
    }

    pub fn structure(&self, identifier: &str, blob: &str) {
        self.structures.lock().expect("structures lock").insert(
            identifier.to_string(),
            StageResult::Present(StructureBlob::new(blob)),
        );
    }
}

#[async_trait]
impl DepictionFetcher for StaticFetchers {
    async fn fetch_depiction(&self, identifier: &ResolvedIdentifier) -> DepictionResult {
        self.log
            .lock()
            .expect("log lock")
            .push(format!("depiction:{identifier}"));
        self.depictions
            .lock()
            .expect("depictions lock")
            .get(identifier.as_str())
            .cloned()
            .unwrap_or_else(|| StageResult::failed("request failed with status 404: "))
    }
}

#[async_trait]
impl StructureFetcher for StaticFetchers {
    async fn fetch_structure(&self, identifier: &ResolvedIdentifier) -> StructureResult {
        self.log
            .lock()
            .expect("log lock")
            .push(format!("structure:{identifier}"));
        self.structures
            .lock()
            .expect("structures lock")
            .get(identifier.as_str())
            .cloned()
            .unwrap_or_else(|| StageResult::failed("received empty payload"))
    }
}

/// Rendering engine that records every contract call as `op#viewer`.
#[derive(Default)]
pub struct RecordingEngine {
    pub log: CallLog,
    created: AtomicUsize,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    fail_create: bool,
    fail_model_containing: Option<String>,
}

impl RecordingEngine {
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn failing_models_containing(marker: &str) -> Self {
        Self {
            fail_model_containing: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RenderEngine for RecordingEngine {
    fn create_viewer(
        &self,
        surface: &SurfaceId,
        options: &ViewerOptions,
    ) -> Result<Box<dyn ViewerInstance>> {
        if self.fail_create {
            return Err(anyhow!("WebGL context unavailable"));
        }
        let number = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        self.log.lock().expect("log lock").push(format!(
            "create#{number}:{}:{}x{}",
            surface.0, options.width, options.height
        ));
        Ok(Box::new(RecordingViewer {
            number,
            log: Arc::clone(&self.log),
            live: Arc::clone(&self.live),
            fail_model_containing: self.fail_model_containing.clone(),
        }))
    }
}

struct RecordingViewer {
    number: usize,
    log: CallLog,
    live: Arc<AtomicUsize>,
    fail_model_containing: Option<String>,
}

impl RecordingViewer {
    fn record(&self, op: &str) {
        self.log
            .lock()
            .expect("log lock")
            .push(format!("{op}#{}", self.number));
    }
}

impl ViewerInstance for RecordingViewer {
    fn add_model(&mut self, data: &str, format: &str) -> Result<()> {
        self.record(&format!("add_model:{format}"));
        match &self.fail_model_containing {
            Some(marker) if data.contains(marker.as_str()) => Err(anyhow!("unparseable model")),
            _ => Ok(()),
        }
    }

    fn set_style(&mut self, selector: &AtomSelector, style: &StyleSpec) -> Result<()> {
        assert_eq!(selector, &AtomSelector::default());
        assert_eq!(style, &StyleSpec::ball_and_stick());
        self.record("set_style");
        Ok(())
    }

    fn zoom_to(&mut self) -> Result<()> {
        self.record("zoom_to");
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        self.record("render");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.record("clear");
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine loader that blocks until released and counts loads.
pub struct GatedLoader {
    pub gate: Arc<Notify>,
    pub engine: Arc<RecordingEngine>,
    pub loads: AtomicUsize,
}

impl GatedLoader {
    pub fn new(engine: Arc<RecordingEngine>) -> Self {
        Self {
            gate: Arc::new(Notify::new()),
            engine,
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EngineLoader for GatedLoader {
    async fn load(&self) -> Result<Arc<dyn RenderEngine>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(self.engine.clone())
    }
}

pub struct ReadyLoader(pub Arc<RecordingEngine>);

#[async_trait]
impl EngineLoader for ReadyLoader {
    async fn load(&self) -> Result<Arc<dyn RenderEngine>> {
        Ok(self.0.clone())
    }
}

/// Speech capability whose captures are driven by the test.
#[derive(Default)]
pub struct ScriptedSpeech {
    pub available: bool,
    pub refuse_start: bool,
    senders: StdMutex<Vec<mpsc::UnboundedSender<SpeechEvent>>>,
    pub configs: StdMutex<Vec<CaptureConfig>>,
    pub stops: Arc<AtomicUsize>,
}

impl ScriptedSpeech {
    pub fn available() -> Self {
        Self {
            available: true,
            ..Self::default()
        }
    }

    pub fn refusing() -> Self {
        Self {
            available: true,
            refuse_start: true,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.senders.lock().expect("senders lock").len()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Sends an engine event on the `index`-th capture started.
    pub fn emit(&self, index: usize, event: SpeechEvent) {
        let senders = self.senders.lock().expect("senders lock");
        let _ = senders[index].send(event);
    }
}

struct ScriptedHandle {
    stops: Arc<AtomicUsize>,
}

impl CaptureHandle for ScriptedHandle {
    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl SpeechCapability for ScriptedSpeech {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&self, config: &CaptureConfig) -> Result<CaptureSession> {
        if self.refuse_start {
            return Err(anyhow!("recognition has already started"));
        }
        self.configs
            .lock()
            .expect("configs lock")
            .push(config.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().expect("senders lock").push(tx);
        Ok(CaptureSession {
            events: rx,
            handle: Box::new(ScriptedHandle {
                stops: Arc::clone(&self.stops),
            }),
        })
    }
}

pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut predicate: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}
