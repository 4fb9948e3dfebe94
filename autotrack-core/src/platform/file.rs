use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::Platform;
use crate::error::{Error, Result};
use crate::types::Event;

/// Appends each event as one JSON line to a local file.
pub struct FilePlatform {
    name: String,
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl FilePlatform {
    /// Open (or create) `path` for appending.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Config(format!("failed to open event file {:?}: {}", path, e)))?;

        Ok(Self {
            name: name.into(),
            path,
            file: Mutex::new(tokio::fs::File::from_std(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Platform for FilePlatform {
    fn name(&self) -> &str {
        &self.name
    }

    async fn track(&self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Properties;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/events.jsonl");
        let platform = FilePlatform::open("file", &path).unwrap();

        for name in ["first", "second"] {
            let event = Event {
                name: name.into(),
                properties: Properties::new(),
                timestamp: 1,
                session_id: "s".into(),
                user_id: Some("u".into()),
            };
            platform.track(&event).await.unwrap();
        }

        let content = std::fs::read_to_string(platform.path()).unwrap();
        let names: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<Event>(l).unwrap().name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
