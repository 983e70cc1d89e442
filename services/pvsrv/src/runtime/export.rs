//! JSON snapshot export
//!
//! After each successful poll the latest snapshot is written to a file.
//! The write goes to a sibling temp file which is then renamed over the
//! target, so readers see either the previous export or the new one.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::core::snapshot::Snapshot;
use crate::error::Result;

/// Writes snapshots to a fixed path
#[derive(Debug, Clone)]
pub struct SnapshotExporter {
    path: PathBuf,
    verbose: bool,
}

impl SnapshotExporter {
    pub fn new(path: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            path: path.into(),
            verbose,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Serialize `snapshot` with 2-space indentation and replace the file
    pub async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let body = serde_json::to_string_pretty(&Value::Object(snapshot.export(self.verbose)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Snapshot exported to {}", self.path.display());
        Ok(())
    }
}
