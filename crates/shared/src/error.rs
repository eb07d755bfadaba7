use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::VoiceErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InputEmpty,
    NotFound,
    Transport,
    EmptyPayload,
    UnsupportedCapability,
    PermissionDenied,
    NoMicrophone,
    NoSpeechDetected,
    NetworkError,
    RenderInitFailed,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputEmpty => "input_empty",
            Self::NotFound => "not_found",
            Self::Transport => "transport",
            Self::EmptyPayload => "empty_payload",
            Self::UnsupportedCapability => "unsupported_capability",
            Self::PermissionDenied => "permission_denied",
            Self::NoMicrophone => "no_microphone",
            Self::NoSpeechDetected => "no_speech_detected",
            Self::NetworkError => "network_error",
            Self::RenderInitFailed => "render_init_failed",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No molecules found")]
    NotFound,
    #[error("Failed to get SMILES: {status}")]
    Status { status: u16, body: String },
    #[error("resolution request failed: {0}")]
    Transport(String),
}

impl ResolveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound => ErrorCode::NotFound,
            Self::Status { .. } | Self::Transport(_) => ErrorCode::Transport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("received empty payload")]
    EmptyPayload,
    #[error("transport failure: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyPayload => ErrorCode::EmptyPayload,
            Self::Status { .. } | Self::Transport(_) => ErrorCode::Transport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("Your environment doesn't support voice recognition.")]
    UnsupportedCapability,
    #[error("Failed to start voice recognition. Please try again.")]
    StartFailed(String),
    #[error("{}", voice_error_message(.kind, .code))]
    Recognition { kind: VoiceErrorKind, code: String },
}

impl VoiceError {
    pub fn from_engine_code(code: &str) -> Self {
        Self::Recognition {
            kind: VoiceErrorKind::from_engine_code(code),
            code: code.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedCapability => ErrorCode::UnsupportedCapability,
            Self::StartFailed(_) => ErrorCode::Internal,
            Self::Recognition { kind, .. } => match kind {
                VoiceErrorKind::NoSpeechDetected => ErrorCode::NoSpeechDetected,
                VoiceErrorKind::NoMicrophone => ErrorCode::NoMicrophone,
                VoiceErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
                VoiceErrorKind::NetworkError => ErrorCode::NetworkError,
                VoiceErrorKind::Other => ErrorCode::Internal,
            },
        }
    }
}

impl VoiceErrorKind {
    pub fn from_engine_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeechDetected,
            "audio-capture" => Self::NoMicrophone,
            "not-allowed" => Self::PermissionDenied,
            "network" => Self::NetworkError,
            _ => Self::Other,
        }
    }
}

fn voice_error_message(kind: &VoiceErrorKind, code: &str) -> String {
    match kind {
        VoiceErrorKind::NoSpeechDetected => "No speech detected. Please try again.".to_string(),
        VoiceErrorKind::NoMicrophone => {
            "No microphone found. Please check your microphone.".to_string()
        }
        VoiceErrorKind::PermissionDenied => {
            "Microphone access denied. Please allow microphone access.".to_string()
        }
        VoiceErrorKind::NetworkError => "Network error. Please check your connection.".to_string(),
        VoiceErrorKind::Other => format!("Voice recognition error: {code}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("3D viewer initialization failed during {stage}: {message}")]
pub struct RenderError {
    pub stage: &'static str,
    pub message: String,
}

impl RenderError {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::RenderInitFailed
    }
}
