use async_trait::async_trait;
use shared::{
    domain::{DepictionResult, ResolvedIdentifier, StructureResult},
    error::ResolveError,
};

pub mod engine;
pub mod export;
pub mod pipeline;
pub mod session;
pub mod transport;
pub mod viewer;
pub mod voice;

pub use engine::{EngineLoadError, SharedEngine};
pub use export::StructureExport;
pub use pipeline::PipelineOrchestrator;
pub use session::{RunPolicy, SampleSession, SessionEvent, SessionOptions};
pub use transport::{DepictionStrategy, HttpMoleculeService};
pub use viewer::ViewerLifecycle;
pub use voice::{CaptureTicket, VoiceInputController, VoiceOutcome, VoiceStart};

/// Resolves free text to the identifier the render endpoints understand.
/// Callers must not pass blank text.
#[async_trait]
pub trait IdentifierResolver: Send + Sync {
    async fn resolve(&self, text: &str) -> Result<ResolvedIdentifier, ResolveError>;
}

/// Failures are captured in the returned result, never raised.
#[async_trait]
pub trait DepictionFetcher: Send + Sync {
    async fn fetch_depiction(&self, identifier: &ResolvedIdentifier) -> DepictionResult;
}

#[async_trait]
pub trait StructureFetcher: Send + Sync {
    async fn fetch_structure(&self, identifier: &ResolvedIdentifier) -> StructureResult;
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
