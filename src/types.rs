use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, EngineResult};

/// A playable track as handed to the engine by the hosting application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: u64,
    /// Identifier of the account the track belongs to.
    #[serde(default)]
    pub owner_id: i64,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
    /// Reported duration as an `mm:ss` display string, empty when unknown.
    #[serde(default)]
    pub duration: String,
    /// Direct stream or HLS playlist URL.
    pub url: String,
}

impl Track {
    /// Human-readable label used in events and logs.
    pub fn display(&self) -> String {
        match (self.artist.is_empty(), self.title.is_empty()) {
            (false, false) => format!("{} - {}", self.artist, self.title),
            (true, false) => self.title.clone(),
            (false, true) => self.artist.clone(),
            (true, true) => self.url.clone(),
        }
    }
}

/// Source of the track list to play.
///
/// The engine itself never resolves catalogue metadata; the hosting
/// application supplies tracks through an implementation of this trait.
#[async_trait]
pub trait TrackProvider: Send + Sync {
    async fn load_tracks(&self) -> EngineResult<Vec<Track>>;
}

/// Track provider backed by a JSON file containing an array of tracks.
pub struct FileTrackProvider {
    path: PathBuf,
}

impl FileTrackProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TrackProvider for FileTrackProvider {
    async fn load_tracks(&self) -> EngineResult<Vec<Track>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let tracks: Vec<Track> = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("{}: {e}", self.path.display())))?;
        Ok(tracks)
    }
}
