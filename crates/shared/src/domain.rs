use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u8);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(SessionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOrigin {
    Typed,
    Voice,
}

/// Free-text description of a molecule as submitted by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoleculeRequest {
    pub text: String,
    pub origin: SubmissionOrigin,
}

impl MoleculeRequest {
    /// Returns `None` for blank input; submitting blank text is a no-op.
    pub fn new(text: impl Into<String>, origin: SubmissionOrigin) -> Option<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            text: trimmed.to_string(),
            origin,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedIdentifier(pub String);

impl ResolvedIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Textual 3D coordinate blob. Cloning shares the underlying text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureBlob(Arc<str>);

impl StructureBlob {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of one fetch stage. `Absent` keeps the error that was captured
/// so it can be logged or shown; it never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult<T> {
    Present(T),
    Absent { error: Option<String> },
}

impl<T> StageResult<T> {
    pub fn absent() -> Self {
        Self::Absent { error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Absent {
            error: Some(error.into()),
        }
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent { .. } => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Absent { error } => error.as_deref(),
            Self::Present(_) => None,
        }
    }
}

pub type DepictionResult = StageResult<Arc<[u8]>>;
pub type StructureResult = StageResult<StructureBlob>;

/// Result of one pipeline run. Built in one piece and only ever replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    identifier: Option<ResolvedIdentifier>,
    depiction: DepictionResult,
    structure: StructureResult,
}

impl ResultSet {
    pub fn new(
        identifier: ResolvedIdentifier,
        depiction: DepictionResult,
        structure: StructureResult,
    ) -> Self {
        Self {
            identifier: Some(identifier),
            depiction,
            structure,
        }
    }

    pub fn absent() -> Self {
        Self {
            identifier: None,
            depiction: StageResult::absent(),
            structure: StageResult::absent(),
        }
    }

    pub fn identifier(&self) -> Option<&ResolvedIdentifier> {
        self.identifier.as_ref()
    }

    pub fn depiction(&self) -> &DepictionResult {
        &self.depiction
    }

    pub fn structure(&self) -> &StructureResult {
        &self.structure
    }

    pub fn structure_blob(&self) -> Option<&StructureBlob> {
        self.structure.present()
    }

    pub fn is_absent(&self) -> bool {
        self.identifier.is_none() && !self.depiction.is_present() && !self.structure.is_present()
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::absent()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerState {
    EngineLoading,
    EngineReadyNoData,
    Initializing,
    Rendered,
    Failed { reason: String },
}

impl ViewerState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::EngineLoading => "engine_loading",
            Self::EngineReadyNoData => "engine_ready_no_data",
            Self::Initializing => "initializing",
            Self::Rendered => "rendered",
            Self::Failed { .. } => "failed",
        }
    }

    /// Edges of the viewer state machine. Clearing the structure is allowed
    /// from every state.
    pub fn can_transition_to(&self, next: &ViewerState) -> bool {
        match (self, next) {
            (_, Self::EngineReadyNoData) => true,
            (Self::EngineReadyNoData, Self::Initializing)
            | (Self::Rendered, Self::Initializing)
            | (Self::Failed { .. }, Self::Initializing) => true,
            (Self::Initializing, Self::Rendered) | (Self::Initializing, Self::Failed { .. }) => {
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceErrorKind {
    NoSpeechDetected,
    NoMicrophone,
    PermissionDenied,
    NetworkError,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListeningState {
    Idle,
    Listening,
    Error { kind: VoiceErrorKind, code: String },
}

impl ListeningState {
    pub fn is_listening(&self) -> bool {
        matches!(self, Self::Listening)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestLifecycle {
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session_id: SessionId,
    pub input: String,
    pub lifecycle: RequestLifecycle,
    pub error: Option<String>,
    /// Machine-readable kind of `error`.
    pub error_code: Option<ErrorCode>,
    pub result: ResultSet,
    pub viewer: ViewerState,
    pub listening: ListeningState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    Idle,
    Loading,
    Error,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSummary {
    pub session_id: SessionId,
    pub status: SampleStatus,
    pub has_depiction: bool,
    pub has_structure: bool,
}

impl SessionState {
    pub fn summary(&self) -> SampleSummary {
        let has_depiction = self.result.depiction().is_present();
        let status = match self.lifecycle {
            RequestLifecycle::InFlight => SampleStatus::Loading,
            RequestLifecycle::Failed => SampleStatus::Error,
            _ if has_depiction => SampleStatus::Ready,
            _ => SampleStatus::Idle,
        };
        SampleSummary {
            session_id: self.session_id,
            status,
            has_depiction,
            has_structure: self.result.structure().is_present(),
        }
    }
}
