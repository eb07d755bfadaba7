use anyhow::anyhow;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub lang: String,
    pub interim_results: bool,
    pub max_alternatives: u8,
    pub continuous: bool,
}

impl Default for CaptureConfig {
    /// One-shot, single-utterance capture with final results only.
    fn default() -> Self {
        Self {
            lang: "en-US".into(),
            interim_results: false,
            max_alternatives: 1,
            continuous: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Result { transcript: String },
    Error { code: String },
    End,
}

pub trait CaptureHandle: Send {
    fn stop(&mut self);
}

/// A running capture: engine notifications arrive on `events`, `handle`
/// stops the engine early.
pub struct CaptureSession {
    pub events: mpsc::UnboundedReceiver<SpeechEvent>,
    pub handle: Box<dyn CaptureHandle>,
}

pub trait SpeechCapability: Send + Sync {
    fn is_available(&self) -> bool;
    fn start(&self, config: &CaptureConfig) -> anyhow::Result<CaptureSession>;
}

pub struct MissingSpeechCapability;

impl SpeechCapability for MissingSpeechCapability {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&self, _config: &CaptureConfig) -> anyhow::Result<CaptureSession> {
        Err(anyhow!("speech capture is unavailable"))
    }
}
