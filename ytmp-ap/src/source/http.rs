//! HTTP byte source
//!
//! Fetches `GET {base_url}/tracks/{id}/audio` and returns the whole body.

use super::{extension_for_content_type, AudioByteSource};
use crate::audio::decoder::AudioPayload;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;
use ytmp_common::TrackId;

const USER_AGENT: &str = concat!("ytmp/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Audio bytes over HTTP
pub struct HttpAudioSource {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAudioSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn audio_url(&self, track_id: &TrackId) -> String {
        format!("{}/tracks/{}/audio", self.base_url, track_id)
    }
}

#[async_trait]
impl AudioByteSource for HttpAudioSource {
    async fn fetch_audio_bytes(&self, track_id: &TrackId) -> Result<AudioPayload> {
        let url = self.audio_url(track_id);
        debug!("Fetching audio for {} from {}", track_id, url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::fetch(track_id, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(track_id, format!("HTTP {}", status.as_u16())));
        }

        let extension = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extension_for_content_type)
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::fetch(track_id, format!("Failed to read body: {}", e)))?;

        debug!("Fetched {} bytes for {}", bytes.len(), track_id);
        Ok(AudioPayload::new(bytes.to_vec(), extension))
    }
}
