use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shared::{
    domain::{SessionId, StructureBlob},
    protocol::STRUCTURE_MIME_TYPE,
};

/// The raw structure blob of a session, offered as a downloadable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureExport {
    pub file_name: String,
    pub mime_type: &'static str,
    pub contents: StructureBlob,
}

impl StructureExport {
    pub fn new(session_id: SessionId, contents: StructureBlob) -> Self {
        Self {
            file_name: structure_file_name(session_id),
            mime_type: STRUCTURE_MIME_TYPE,
            contents,
        }
    }

    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create export directory '{}'", dir.display()))?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, self.contents.as_str().as_bytes())
            .await
            .with_context(|| format!("failed to write structure export '{}'", path.display()))?;
        Ok(path)
    }
}

pub fn structure_file_name(session_id: SessionId) -> String {
    format!("sample_{}_3d_structure.mol2", session_id.0)
}

pub fn depiction_file_name(session_id: SessionId) -> String {
    format!("sample_{}_2d_structure.jpg", session_id.0)
}
