use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Display surface a viewer instance is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerOptions {
    pub background_color: String,
    pub width: u32,
    pub height: u32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            background_color: "white".into(),
            width: 300,
            height: 200,
        }
    }
}

/// Atom selection for styling. The empty selector matches every atom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StickStyle {
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereStyle {
    pub scale: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stick: Option<StickStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere: Option<SphereStyle>,
}

impl StyleSpec {
    /// Stick + sphere representation applied to every rendered structure.
    pub fn ball_and_stick() -> Self {
        Self {
            stick: Some(StickStyle { radius: 0.1 }),
            sphere: Some(SphereStyle { scale: 0.3 }),
        }
    }
}

/// One live viewer created by the engine. Owners must call `clear` before
/// dropping it.
pub trait ViewerInstance: Send {
    fn add_model(&mut self, data: &str, format: &str) -> anyhow::Result<()>;
    fn set_style(&mut self, selector: &AtomSelector, style: &StyleSpec) -> anyhow::Result<()>;
    fn zoom_to(&mut self) -> anyhow::Result<()>;
    fn render(&mut self) -> anyhow::Result<()>;
    fn clear(&mut self) -> anyhow::Result<()>;
}

pub trait RenderEngine: Send + Sync {
    fn create_viewer(
        &self,
        surface: &SurfaceId,
        options: &ViewerOptions,
    ) -> anyhow::Result<Box<dyn ViewerInstance>>;
}

/// Loads the rendering engine. Called at most once per process through the
/// shared loader in `client_core`.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<Arc<dyn RenderEngine>>;
}

pub struct MissingEngineLoader;

#[async_trait]
impl EngineLoader for MissingEngineLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn RenderEngine>> {
        Err(anyhow!("3D rendering engine is unavailable"))
    }
}
