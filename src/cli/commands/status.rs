//! `switchboard status`: print the last system snapshot written by `run`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::store::MarkdownStoreProvider;

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub path: String,
    pub snapshot: Option<String>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        match &self.snapshot {
            Some(snapshot) => snapshot.clone(),
            None => format!("No snapshot at {}. Start `switchboard run` first.", self.path),
        }
    }
}

/// Read the snapshot document, `None` when it has not been written yet.
pub async fn read_snapshot(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let path = MarkdownStoreProvider::new(&config.memory.dir).snapshot_path();
    let out = StatusOutput {
        snapshot: read_snapshot(&path).await?,
        path: path.display().to_string(),
    };
    output(&out, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_snapshot_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system").join("system_state.md");
        assert!(read_snapshot(&path).await.unwrap().is_none());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "# System State\n").unwrap();
        assert_eq!(read_snapshot(&path).await.unwrap().as_deref(), Some("# System State\n"));
    }
}
