use std::sync::Arc;

use engine_integration::{
    AtomSelector, RenderEngine, StyleSpec, SurfaceId, ViewerInstance, ViewerOptions,
};
use shared::{
    domain::{SessionId, StructureBlob, ViewerState},
    error::RenderError,
    protocol::STRUCTURE_FORMAT,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// A viewer instance owned by a lifecycle. Released exactly once, either
/// explicitly or when dropped.
struct OwnedViewer {
    instance: Box<dyn ViewerInstance>,
    released: bool,
}

impl OwnedViewer {
    fn new(instance: Box<dyn ViewerInstance>) -> Self {
        Self {
            instance,
            released: false,
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.instance.clear() {
            warn!("failed to clear 3D viewer instance: {err:#}");
        }
    }
}

impl Drop for OwnedViewer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Turns (engine ready, structure blob) into a rendered view for one session.
///
/// Every change of structure rebuilds the viewer from scratch: the previous
/// instance is cleared before the replacement is created.
pub struct ViewerLifecycle {
    session_id: SessionId,
    surface: SurfaceId,
    options: ViewerOptions,
    engine: Option<Arc<dyn RenderEngine>>,
    state: ViewerState,
    pending: Option<StructureBlob>,
    shown: Option<StructureBlob>,
    instance: Option<OwnedViewer>,
    transitions: broadcast::Sender<ViewerState>,
}

impl ViewerLifecycle {
    pub fn new(
        session_id: SessionId,
        surface: SurfaceId,
        options: ViewerOptions,
        engine: Option<Arc<dyn RenderEngine>>,
    ) -> Self {
        let state = if engine.is_some() {
            ViewerState::EngineReadyNoData
        } else {
            ViewerState::EngineLoading
        };
        let (transitions, _) = broadcast::channel(64);
        Self {
            session_id,
            surface,
            options,
            engine,
            state,
            pending: None,
            shown: None,
            instance: None,
            transitions,
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn surface(&self) -> &SurfaceId {
        &self.surface
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewerState> {
        self.transitions.subscribe()
    }

    /// Engine load finished. A structure that arrived while loading is
    /// rendered right away.
    pub fn engine_ready(&mut self, engine: Arc<dyn RenderEngine>) {
        if self.engine.is_some() {
            return;
        }
        self.engine = Some(engine);
        self.transition(ViewerState::EngineReadyNoData);
        if let Some(blob) = self.pending.clone() {
            self.initialize(blob);
        }
    }

    pub fn set_structure(&mut self, blob: Option<StructureBlob>) {
        let Some(blob) = blob else {
            self.pending = None;
            self.shown = None;
            self.release_instance();
            if self.engine.is_some() {
                self.transition(ViewerState::EngineReadyNoData);
            }
            return;
        };

        if self.shown.as_ref() == Some(&blob) {
            debug!(session = %self.session_id, "structure unchanged; keeping viewer");
            return;
        }

        self.pending = Some(blob.clone());
        if self.engine.is_none() {
            debug!(session = %self.session_id, "structure pending until engine loads");
            return;
        }
        self.initialize(blob);
    }

    fn initialize(&mut self, blob: StructureBlob) {
        self.transition(ViewerState::Initializing);
        self.release_instance();
        self.shown = Some(blob.clone());

        match self.build_instance(&blob) {
            Ok(instance) => {
                self.instance = Some(instance);
                info!(
                    session = %self.session_id,
                    bytes = blob.len(),
                    "3D viewer rendered"
                );
                self.transition(ViewerState::Rendered);
            }
            Err(err) => {
                warn!(session = %self.session_id, code = ?err.code(), "{err}");
                self.transition(ViewerState::Failed {
                    reason: err.to_string(),
                });
            }
        }
    }

    fn build_instance(&self, blob: &StructureBlob) -> Result<OwnedViewer, RenderError> {
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| RenderError::new("create_viewer", "engine not loaded"))?;
        let instance = engine
            .create_viewer(&self.surface, &self.options)
            .map_err(|err| RenderError::new("create_viewer", err.to_string()))?;

        // From here on a failing step drops `viewer`, which clears it.
        let mut viewer = OwnedViewer::new(instance);
        viewer
            .instance
            .add_model(blob.as_str(), STRUCTURE_FORMAT)
            .map_err(|err| RenderError::new("add_model", err.to_string()))?;
        viewer
            .instance
            .set_style(&AtomSelector::default(), &StyleSpec::ball_and_stick())
            .map_err(|err| RenderError::new("set_style", err.to_string()))?;
        viewer
            .instance
            .zoom_to()
            .map_err(|err| RenderError::new("zoom_to", err.to_string()))?;
        viewer
            .instance
            .render()
            .map_err(|err| RenderError::new("render", err.to_string()))?;
        Ok(viewer)
    }

    fn release_instance(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            instance.release();
        }
    }

    fn transition(&mut self, next: ViewerState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(&next) {
            warn!(
                session = %self.session_id,
                from = self.state.label(),
                to = next.label(),
                "unexpected viewer transition"
            );
        }
        debug!(
            session = %self.session_id,
            from = self.state.label(),
            to = next.label(),
            "viewer transition"
        );
        self.state = next.clone();
        let _ = self.transitions.send(next);
    }
}

#[cfg(test)]
#[path = "tests/viewer_tests.rs"]
mod tests;
