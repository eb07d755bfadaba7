use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use client_core::RunPolicy;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "molview.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub service_url: String,
    pub auto_submit_delay_ms: u64,
    pub run_policy: RunPolicy,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8003".into(),
            auto_submit_delay_ms: 500,
            run_policy: RunPolicy::LatestWins,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn auto_submit_delay(&self) -> Duration {
        Duration::from_millis(self.auto_submit_delay_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    service_url: Option<String>,
    auto_submit_delay_ms: Option<u64>,
    run_policy: Option<RunPolicy>,
    output_dir: Option<PathBuf>,
}

/// Defaults, then the config file (if present), then environment variables.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file_config(&mut settings, &raw, path);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file_config(settings: &mut Settings, raw: &str, path: &Path) {
    let file_cfg = match toml::from_str::<FileConfig>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!(path = %path.display(), "ignoring unreadable config file: {err}");
            return;
        }
    };

    if let Some(v) = file_cfg.service_url {
        settings.service_url = v;
    }
    if let Some(v) = file_cfg.auto_submit_delay_ms {
        settings.auto_submit_delay_ms = v;
    }
    if let Some(v) = file_cfg.run_policy {
        settings.run_policy = v;
    }
    if let Some(v) = file_cfg.output_dir {
        settings.output_dir = v;
    }
}

fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("MOLVIEW_SERVICE_URL") {
        settings.service_url = v;
    }
    if let Some(v) = var("APP__SERVICE_URL") {
        settings.service_url = v;
    }

    if let Some(v) = var("APP__AUTO_SUBMIT_DELAY_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.auto_submit_delay_ms = parsed,
            Err(_) => warn!(value = %v, "ignoring invalid APP__AUTO_SUBMIT_DELAY_MS"),
        }
    }

    if let Some(v) = var("APP__RUN_POLICY") {
        match v.parse::<RunPolicy>() {
            Ok(parsed) => settings.run_policy = parsed,
            Err(err) => warn!("ignoring APP__RUN_POLICY: {err}"),
        }
    }

    if let Some(v) = var("APP__OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(v);
    }
}
