//! ElevenLabs text-to-speech.

use super::{Synthesizer, VoiceConfig, CHANNELS, SAMPLE_RATE};
use crate::audio::PcmAudio;
use crate::error::{FortellError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

const API_BASE: &str = "https://api.elevenlabs.io/v1";
pub const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs synthesizer requesting raw 24 kHz PCM.
pub struct ElevenLabsSynthesizer {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
        })
    }

    /// Build from the `ELEVENLABS_API_KEY` environment variable.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| FortellError::Config(format!("{} is not set", API_KEY_ENV)))?;
        Self::new(key, timeout)
    }

    fn speech_url(&self, voice_id: &str) -> String {
        format!(
            "{}/text-to-speech/{}?output_format=pcm_{}",
            self.base_url, voice_id, SAMPLE_RATE
        )
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    #[instrument(skip(self, text, voice), fields(chars = text.chars().count()))]
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<PcmAudio> {
        let body = SpeechRequest {
            text,
            model_id: &voice.model,
            voice_settings: VoiceSettings {
                stability: 0.4,
                similarity_boost: 0.8,
            },
        };

        let response = self
            .http
            .post(self.speech_url(&voice.voice))
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FortellError::from_status(
                status.as_u16(),
                "ElevenLabs text-to-speech",
                &text,
            ));
        }

        let bytes = response.bytes().await?;
        debug!("Received {} bytes of PCM", bytes.len());
        PcmAudio::from_le_bytes(&bytes, SAMPLE_RATE, CHANNELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_url_requests_pcm() {
        let synth = ElevenLabsSynthesizer::new("key", Duration::from_secs(5)).unwrap();
        assert_eq!(
            synth.speech_url("voice123"),
            "https://api.elevenlabs.io/v1/text-to-speech/voice123?output_format=pcm_24000"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = SpeechRequest {
            text: "Hi",
            model_id: "eleven_multilingual_v2",
            voice_settings: VoiceSettings {
                stability: 0.4,
                similarity_boost: 0.8,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model_id"], "eleven_multilingual_v2");
        assert!(json["voice_settings"]["stability"].is_number());
    }
}
