//! Publishing finished videos: upload, scheduling and localized metadata.

mod translate;
mod youtube;

pub use translate::OpenAITranslator;
pub use youtube::YoutubeUploader;

use crate::config::UploadSettings;
use crate::error::{FortellError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata sent with an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub default_language: String,
    pub default_audio_language: String,
    pub privacy: String,
    /// Scheduled publish time; scheduled videos stay private until then.
    pub publish_at: Option<DateTime<Utc>>,
}

impl VideoMetadata {
    /// Metadata for a story video titled with its display name.
    pub fn for_story(
        display_name: &str,
        settings: &UploadSettings,
        publish_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut tags = settings.tags.clone();
        if !tags.iter().any(|t| t == display_name) {
            tags.push(display_name.to_string());
        }
        Self {
            title: display_name.to_string(),
            description: settings.description.clone(),
            tags,
            category_id: settings.category_id.clone(),
            default_language: settings.default_language.clone(),
            default_audio_language: settings.default_audio_language.clone(),
            privacy: if publish_at.is_some() {
                "private".to_string()
            } else {
                settings.privacy.clone()
            },
            publish_at,
        }
    }
}

/// Record of a completed upload, persisted as the upload stage artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub video_id: String,
    pub url: String,
    pub title: String,
    pub privacy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Title and description in one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub title: String,
    pub description: String,
}

/// Localized metadata applied to an uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationRecord {
    pub video_id: String,
    pub localizations: BTreeMap<String, LocalizedText>,
    pub localized_at: DateTime<Utc>,
}

/// A video hosting platform.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload a video file and return the platform's video id.
    async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> Result<String>;

    async fn add_to_playlist(&self, video_id: &str, playlist_id: &str) -> Result<()>;

    /// Merge localized titles and descriptions into the video's existing ones.
    async fn update_localizations(
        &self,
        video_id: &str,
        localizations: &BTreeMap<String, LocalizedText>,
    ) -> Result<()>;

    /// Public URL of an uploaded video.
    fn video_url(&self, video_id: &str) -> String;
}

/// Translates video metadata.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn localize(&self, title: &str, locale: &str) -> Result<LocalizedText>;
}

/// Publish time of the `slot`-th scheduled video.
///
/// Slot 0 publishes tomorrow at `hour` local time (`utc_offset_hours` from
/// UTC), and each further slot one day later.
pub fn publish_slot(
    slot: u32,
    now: DateTime<Utc>,
    hour: u32,
    utc_offset_hours: i32,
) -> Result<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600).ok_or_else(|| {
        FortellError::Config(format!("invalid UTC offset {}h", utc_offset_hours))
    })?;
    let time = NaiveTime::from_hms_opt(hour, 0, 0)
        .ok_or_else(|| FortellError::Config(format!("invalid publish hour {}", hour)))?;

    let local_date = now.with_timezone(&offset).date_naive();
    let date = local_date
        .checked_add_days(Days::new(1 + slot as u64))
        .ok_or_else(|| FortellError::Config("publish date out of range".to_string()))?;

    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| FortellError::Config("ambiguous publish time".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_slot_is_tomorrow_morning() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let at = publish_slot(0, now, 9, -8).unwrap();
        // 20:00 UTC is 12:00 on Mar 10 at UTC-8; tomorrow 09:00 local is 17:00 UTC.
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 11, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_slots_are_one_day_apart() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let first = publish_slot(0, now, 9, -8).unwrap();
        let third = publish_slot(2, now, 9, -8).unwrap();
        assert_eq!(third - first, chrono::Duration::days(2));
    }

    #[test]
    fn test_local_date_drives_tomorrow() {
        // 03:00 UTC on Mar 11 is still Mar 10 at UTC-8.
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 3, 0, 0).unwrap();
        let at = publish_slot(0, now, 9, -8).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 11, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_hour_rejected() {
        assert!(publish_slot(0, Utc::now(), 24, 0).is_err());
    }

    #[test]
    fn test_scheduled_metadata_is_private() {
        let settings = UploadSettings::default();
        let now = Utc::now();
        let scheduled = VideoMetadata::for_story("red-hood", &settings, Some(now));
        assert_eq!(scheduled.privacy, "private");
        assert!(scheduled.tags.contains(&"red-hood".to_string()));

        let immediate = VideoMetadata::for_story("red-hood", &settings, None);
        assert_eq!(immediate.privacy, "public");
    }

    #[test]
    fn test_receipt_json() {
        let receipt = UploadReceipt {
            video_id: "abc".to_string(),
            url: "https://youtu.be/abc".to_string(),
            title: "red-hood".to_string(),
            privacy: "public".to_string(),
            publish_at: None,
            playlist_id: None,
            uploaded_at: Utc::now(),
        };
        let json = serde_json::to_string(&receipt).unwrap();
        assert!(!json.contains("publish_at"));
        let parsed: UploadReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, receipt);
    }
}
