//! Contracts for the externally provided capabilities a sample session
//! drives: the 3D rendering engine and the speech capture engine.

pub mod headless;
pub mod render;
pub mod speech;

pub use headless::{HeadlessEngineLoader, HeadlessRenderEngine};
pub use render::{
    AtomSelector, EngineLoader, MissingEngineLoader, RenderEngine, SphereStyle, StickStyle,
    StyleSpec, SurfaceId, ViewerInstance, ViewerOptions,
};
pub use speech::{
    CaptureConfig, CaptureHandle, CaptureSession, MissingSpeechCapability, SpeechCapability,
    SpeechEvent,
};
