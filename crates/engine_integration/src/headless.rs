//! Rendering engine without a display, used by the command-line front end.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use tracing::debug;

use crate::render::{
    AtomSelector, EngineLoader, RenderEngine, StyleSpec, SurfaceId, ViewerInstance, ViewerOptions,
};

const SUPPORTED_FORMATS: &[&str] = &["mol2", "sdf", "pdb", "xyz"];

#[derive(Default)]
pub struct HeadlessRenderEngine {
    live_viewers: Arc<AtomicUsize>,
}

impl HeadlessRenderEngine {
    pub fn live_viewers(&self) -> usize {
        self.live_viewers.load(Ordering::SeqCst)
    }
}

impl RenderEngine for HeadlessRenderEngine {
    fn create_viewer(
        &self,
        surface: &SurfaceId,
        options: &ViewerOptions,
    ) -> anyhow::Result<Box<dyn ViewerInstance>> {
        if options.width == 0 || options.height == 0 {
            bail!(
                "viewer surface {} has zero size {}x{}",
                surface.0,
                options.width,
                options.height
            );
        }
        self.live_viewers.fetch_add(1, Ordering::SeqCst);
        debug!(surface = %surface.0, "headless viewer created");
        Ok(Box::new(HeadlessViewer {
            surface: surface.clone(),
            models: 0,
            styled: false,
            cleared: false,
            live_viewers: Arc::clone(&self.live_viewers),
        }))
    }
}

struct HeadlessViewer {
    surface: SurfaceId,
    models: usize,
    styled: bool,
    cleared: bool,
    live_viewers: Arc<AtomicUsize>,
}

impl ViewerInstance for HeadlessViewer {
    fn add_model(&mut self, data: &str, format: &str) -> anyhow::Result<()> {
        if !SUPPORTED_FORMATS.contains(&format) {
            bail!("unsupported model format '{format}'");
        }
        if data.trim().is_empty() {
            bail!("model data is empty");
        }
        self.models += 1;
        Ok(())
    }

    fn set_style(&mut self, _selector: &AtomSelector, _style: &StyleSpec) -> anyhow::Result<()> {
        self.styled = true;
        Ok(())
    }

    fn zoom_to(&mut self) -> anyhow::Result<()> {
        if self.models == 0 {
            return Err(anyhow!("nothing to zoom to on surface {}", self.surface.0));
        }
        Ok(())
    }

    fn render(&mut self) -> anyhow::Result<()> {
        debug!(
            surface = %self.surface.0,
            models = self.models,
            styled = self.styled,
            "headless render"
        );
        Ok(())
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        if !self.cleared {
            self.cleared = true;
            self.models = 0;
            self.live_viewers.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct HeadlessEngineLoader {
    engine: Arc<HeadlessRenderEngine>,
}

impl HeadlessEngineLoader {
    pub fn engine(&self) -> Arc<HeadlessRenderEngine> {
        Arc::clone(&self.engine)
    }
}

#[async_trait]
impl EngineLoader for HeadlessEngineLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn RenderEngine>> {
        Ok(self.engine.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_releases_the_viewer_once() {
        let engine = HeadlessRenderEngine::default();
        let surface = SurfaceId("sample-1".into());
        let mut viewer = engine
            .create_viewer(&surface, &ViewerOptions::default())
            .expect("viewer");
        assert_eq!(engine.live_viewers(), 1);

        viewer.add_model("@<TRIPOS>MOLECULE\nethanol\n", "mol2").expect("model");
        viewer
            .set_style(&AtomSelector::default(), &StyleSpec::ball_and_stick())
            .expect("style");
        viewer.zoom_to().expect("zoom");
        viewer.render().expect("render");

        viewer.clear().expect("clear");
        viewer.clear().expect("second clear");
        assert_eq!(engine.live_viewers(), 0);
    }

    #[test]
    fn rejects_empty_models_and_unknown_formats() {
        let engine = HeadlessRenderEngine::default();
        let mut viewer = engine
            .create_viewer(&SurfaceId("s".into()), &ViewerOptions::default())
            .expect("viewer");
        assert!(viewer.add_model("  ", "mol2").is_err());
        assert!(viewer.add_model("data", "cif2").is_err());
        assert!(viewer.zoom_to().is_err());
    }

    #[tokio::test]
    async fn loader_hands_out_the_same_engine() {
        let loader = HeadlessEngineLoader::default();
        let engine = loader.load().await.expect("load");
        let _viewer = engine
            .create_viewer(&SurfaceId("s".into()), &ViewerOptions::default())
            .expect("viewer");
        assert_eq!(loader.engine().live_viewers(), 1);
    }
}
