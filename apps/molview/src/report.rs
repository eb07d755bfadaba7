use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use client_core::{export::depiction_file_name, StructureExport};
use shared::domain::{ListeningState, SampleStatus, SessionState};

fn status_label(status: SampleStatus) -> &'static str {
    match status {
        SampleStatus::Idle => "idle",
        SampleStatus::Loading => "loading",
        SampleStatus::Error => "error",
        SampleStatus::Ready => "ready",
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn listening_label(listening: &ListeningState) -> String {
    match listening {
        ListeningState::Idle => "idle".into(),
        ListeningState::Listening => "listening".into(),
        ListeningState::Error { code, .. } => format!("error ({code})"),
    }
}

/// One line per sample, in the order given.
pub fn summary_table(states: &[SessionState]) -> String {
    let mut out = format!(
        "{:<8}{:<9}{:<5}{:<5}{:<22}{:<12}{}\n",
        "sample", "status", "2D", "3D", "viewer", "voice", "identifier"
    );
    for state in states {
        let summary = state.summary();
        let detail = match (&state.error, state.result.identifier()) {
            (Some(err), _) => match state.error_code {
                Some(code) => format!("{err} [{code}]"),
                None => err.clone(),
            },
            (None, Some(identifier)) => identifier.to_string(),
            (None, None) => "-".into(),
        };
        out.push_str(&format!(
            "{:<8}{:<9}{:<5}{:<5}{:<22}{:<12}{}\n",
            summary.session_id.to_string(),
            status_label(summary.status),
            yes_no(summary.has_depiction),
            yes_no(summary.has_structure),
            state.viewer.label(),
            listening_label(&state.listening),
            detail
        ));
    }
    out
}

/// Writes the depiction image and the structure export of one sample.
pub async fn write_artifacts(state: &SessionState, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if let Some(image) = state.result.depiction().present() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
        let path = dir.join(depiction_file_name(state.session_id));
        tokio::fs::write(&path, &image[..])
            .await
            .with_context(|| format!("failed to write depiction '{}'", path.display()))?;
        written.push(path);
    }

    if let Some(blob) = state.result.structure_blob() {
        let export = StructureExport::new(state.session_id, blob.clone());
        written.push(export.write_to(dir).await?);
    }

    Ok(written)
}
