//! Music-folder byte source
//!
//! Resolves a track id to `{folder}/{id}.{ext}` for the first extension that
//! exists.

use super::AudioByteSource;
use crate::audio::decoder::AudioPayload;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use ytmp_common::TrackId;

const EXTENSIONS: &[&str] = &["mp3", "m4a", "flac", "ogg", "wav", "aac"];

/// Audio bytes from a local folder
pub struct FileAudioSource {
    folder: PathBuf,
}

impl FileAudioSource {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// First existing `{folder}/{id}.{ext}`, or `None` when no file matches.
    ///
    /// Errors other than "not found" (permissions, a folder that is a file)
    /// are reported rather than treated as a missing track.
    async fn locate(&self, track_id: &TrackId) -> Result<Option<(PathBuf, &'static str)>> {
        // Ids come from the catalog; refuse anything that walks out of the folder
        if track_id.as_str().contains(['/', '\\']) || track_id.as_str().starts_with('.') {
            return Ok(None);
        }

        for ext in EXTENSIONS {
            let path = self.folder.join(format!("{}.{}", track_id, ext));
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| Error::fetch(track_id, format!("{}: {}", path.display(), e)))?;
            if exists {
                return Ok(Some((path, ext)));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl AudioByteSource for FileAudioSource {
    async fn fetch_audio_bytes(&self, track_id: &TrackId) -> Result<AudioPayload> {
        let (path, ext) = self.locate(track_id).await?.ok_or_else(|| {
            Error::fetch(
                track_id,
                format!("no audio file in {}", self.folder.display()),
            )
        })?;

        debug!("Reading audio for {} from {}", track_id, path.display());
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::fetch(track_id, format!("{}: {}", path.display(), e)))?;

        Ok(AudioPayload::new(bytes, Some(ext.to_string())))
    }
}
