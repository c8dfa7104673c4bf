//! YouTube Data API v3 uploader.

use super::{LocalizedText, Uploader, VideoMetadata};
use crate::config::UploadSettings;
use crate::error::{FortellError, Result};
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::Response;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";

/// Uploads videos with an OAuth bearer token.
pub struct YoutubeUploader {
    http: reqwest::Client,
    access_token: String,
}

impl YoutubeUploader {
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            access_token: access_token.into(),
        })
    }

    /// Read the access token from the configured environment variable.
    pub fn from_env(settings: &UploadSettings, timeout: Duration) -> Result<Self> {
        let token = std::env::var(&settings.access_token_env)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                FortellError::Config(format!("{} is not set", settings.access_token_env))
            })?;
        Self::new(token, timeout)
    }
}

/// Turn a non-success response into a classified error.
async fn check(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FortellError::from_status(status.as_u16(), context, &body))
}

/// Request body for a video insert.
fn insert_body(metadata: &VideoMetadata) -> Value {
    let mut status = json!({
        "privacyStatus": metadata.privacy,
        "selfDeclaredMadeForKids": false,
        "embeddable": true,
    });
    if let Some(at) = metadata.publish_at {
        status["publishAt"] = json!(at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    }
    json!({
        "snippet": {
            "title": metadata.title,
            "description": metadata.description,
            "tags": metadata.tags,
            "categoryId": metadata.category_id,
            "defaultLanguage": metadata.default_language,
            "defaultAudioLanguage": metadata.default_audio_language,
        },
        "status": status,
    })
}

#[async_trait]
impl Uploader for YoutubeUploader {
    #[instrument(skip(self, metadata), fields(video = %video.display()))]
    async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> Result<String> {
        let bytes = tokio::fs::read(video).await?;
        info!("Uploading {} ({} bytes)", metadata.title, bytes.len());

        let session = self
            .http
            .post(format!(
                "{}/videos?uploadType=resumable&part=snippet,status",
                UPLOAD_BASE
            ))
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", bytes.len().to_string())
            .json(&insert_body(metadata))
            .send()
            .await?;
        let session = check(session, "YouTube upload session").await?;

        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                FortellError::Upload("upload session response has no Location".to_string())
            })?
            .to_string();
        debug!("Upload session opened");

        let response = self
            .http
            .put(&location)
            .bearer_auth(&self.access_token)
            .header("Content-Type", "video/mp4")
            .body(bytes)
            .send()
            .await?;
        let response = check(response, "YouTube upload").await?;

        let body: Value = response.json().await?;
        body.get("id")
            .and_then(|id| id.as_str())
            .map(|id| id.to_string())
            .ok_or_else(|| FortellError::Upload("upload response has no video id".to_string()))
    }

    #[instrument(skip(self))]
    async fn add_to_playlist(&self, video_id: &str, playlist_id: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/playlistItems?part=snippet", API_BASE))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "snippet": {
                    "playlistId": playlist_id,
                    "resourceId": { "kind": "youtube#video", "videoId": video_id },
                }
            }))
            .send()
            .await?;
        check(response, "YouTube playlist insert").await?;
        Ok(())
    }

    #[instrument(skip(self, localizations))]
    async fn update_localizations(
        &self,
        video_id: &str,
        localizations: &BTreeMap<String, LocalizedText>,
    ) -> Result<()> {
        let current = self
            .http
            .get(format!("{}/videos", API_BASE))
            .query(&[("part", "localizations"), ("id", video_id)])
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let current: Value = check(current, "YouTube video lookup").await?.json().await?;

        let item = current
            .get("items")
            .and_then(|items| items.get(0))
            .ok_or_else(|| FortellError::Upload(format!("video {} not found", video_id)))?;
        let mut merged = item
            .get("localizations")
            .and_then(|l| l.as_object())
            .cloned()
            .unwrap_or_default();
        for (locale, text) in localizations {
            merged.insert(locale.clone(), serde_json::to_value(text)?);
        }

        let response = self
            .http
            .put(format!("{}/videos?part=localizations", API_BASE))
            .bearer_auth(&self.access_token)
            .json(&json!({ "id": video_id, "localizations": merged }))
            .send()
            .await?;
        check(response, "YouTube localization update").await?;
        Ok(())
    }

    fn video_url(&self, video_id: &str) -> String {
        format!("https://youtu.be/{}", video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_insert_body_scheduled() {
        let settings = UploadSettings::default();
        let at = Utc.with_ymd_and_hms(2024, 3, 11, 17, 0, 0).unwrap();
        let metadata = VideoMetadata::for_story("snow-white", &settings, Some(at));

        let body = insert_body(&metadata);
        assert_eq!(body["snippet"]["title"], "snow-white");
        assert_eq!(body["snippet"]["defaultAudioLanguage"], "zh-Hans");
        assert_eq!(body["status"]["privacyStatus"], "private");
        assert_eq!(body["status"]["publishAt"], "2024-03-11T17:00:00Z");
    }

    #[test]
    fn test_insert_body_immediate() {
        let metadata = VideoMetadata::for_story("snow-white", &UploadSettings::default(), None);
        let body = insert_body(&metadata);
        assert_eq!(body["status"]["privacyStatus"], "public");
        assert!(body["status"].get("publishAt").is_none());
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let settings = UploadSettings {
            access_token_env: "FORTELL_TEST_UNSET_TOKEN".to_string(),
            ..UploadSettings::default()
        };
        let err = YoutubeUploader::from_env(&settings, Duration::from_secs(5)).err();
        assert!(matches!(err, Some(FortellError::Config(_))));
    }

    #[test]
    fn test_video_url() {
        let uploader = YoutubeUploader::new("token", Duration::from_secs(5)).unwrap();
        assert_eq!(uploader.video_url("abc123"), "https://youtu.be/abc123");
    }
}
