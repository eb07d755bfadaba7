use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use engine_integration::{EngineLoader, RenderEngine};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info};

#[derive(Debug, Clone, Error)]
#[error("failed to load 3D rendering engine: {0}")]
pub struct EngineLoadError(pub String);

/// Process-wide handle to the rendering engine.
///
/// The first `ensure_loaded` call starts the load; concurrent callers await
/// the same load and later callers get the stored outcome. A failed load is
/// stored too and never re-attempted.
pub struct SharedEngine {
    loader: Arc<dyn EngineLoader>,
    cell: OnceCell<Result<Arc<dyn RenderEngine>, EngineLoadError>>,
    load_attempts: AtomicUsize,
}

impl SharedEngine {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Arc<Self> {
        Arc::new(Self {
            loader,
            cell: OnceCell::new(),
            load_attempts: AtomicUsize::new(0),
        })
    }

    /// The engine-loaded flag; safe to read from any session.
    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    pub fn loaded(&self) -> Option<Arc<dyn RenderEngine>> {
        match self.cell.get() {
            Some(Ok(engine)) => Some(Arc::clone(engine)),
            _ => None,
        }
    }

    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    pub async fn ensure_loaded(&self) -> Result<Arc<dyn RenderEngine>, EngineLoadError> {
        self.cell
            .get_or_init(|| async {
                self.load_attempts.fetch_add(1, Ordering::SeqCst);
                match self.loader.load().await {
                    Ok(engine) => {
                        info!("3D rendering engine loaded");
                        Ok(engine)
                    }
                    Err(err) => {
                        error!("3D rendering engine failed to load: {err:#}");
                        Err(EngineLoadError(err.to_string()))
                    }
                }
            })
            .await
            .clone()
    }
}
