//! Named waypoint lookup
//!
//! Waypoints are stored per bot as a JSON array in
//! `<directory>/<bot>_waypoints.json`:
//!
//! ```json
//! [{"name": "home", "x": 10, "y": 64, "z": -3}]
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::world::BlockPos;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Waypoint {
    pub fn position(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaypointError {
    #[error("failed to read waypoints from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid waypoint file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Resolves waypoint names to coordinates
#[async_trait]
pub trait WaypointStore: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<Option<Waypoint>, WaypointError>;
}

/// Waypoints read from the bot's JSON file on every lookup
#[derive(Debug, Clone)]
pub struct FileWaypointStore {
    path: PathBuf,
}

impl FileWaypointStore {
    pub fn new(directory: impl AsRef<Path>, bot: &str) -> Self {
        Self {
            path: directory.as_ref().join(format!("{}_waypoints.json", bot)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WaypointStore for FileWaypointStore {
    async fn lookup(&self, name: &str) -> Result<Option<Waypoint>, WaypointError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No waypoint file");
                return Ok(None);
            }
            Err(source) => {
                return Err(WaypointError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let waypoints: Vec<Waypoint> =
            serde_json::from_str(&text).map_err(|source| WaypointError::Json {
                path: self.path.clone(),
                source,
            })?;
        Ok(waypoints.into_iter().find(|w| w.name == name))
    }
}

/// Fixed set of waypoints
#[derive(Debug, Clone, Default)]
pub struct MemoryWaypoints {
    waypoints: HashMap<String, Waypoint>,
}

impl MemoryWaypoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, pos: BlockPos) -> Self {
        self.waypoints.insert(
            name.to_string(),
            Waypoint {
                name: name.to_string(),
                x: pos.x,
                y: pos.y,
                z: pos.z,
            },
        );
        self
    }
}

#[async_trait]
impl WaypointStore for MemoryWaypoints {
    async fn lookup(&self, name: &str) -> Result<Option<Waypoint>, WaypointError> {
        Ok(self.waypoints.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("scout_waypoints.json"),
            r#"[{"name": "home", "x": 10, "y": 64, "z": -3}, {"name": "mine", "x": 0, "y": 12, "z": 0}]"#,
        )
        .unwrap();

        let store = FileWaypointStore::new(dir.path(), "scout");
        let home = store.lookup("home").await.unwrap().unwrap();
        assert_eq!(home.position(), BlockPos::new(10, 64, -3));
        assert!(store.lookup("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWaypointStore::new(dir.path(), "ghost");
        assert!(store.lookup("home").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bot_waypoints.json"), "{not json").unwrap();
        let store = FileWaypointStore::new(dir.path(), "bot");
        assert!(matches!(
            store.lookup("home").await,
            Err(WaypointError::Json { .. })
        ));
    }
}
