//! OpenAI speech synthesis.

use super::{Synthesizer, VoiceConfig, CHANNELS, SAMPLE_RATE};
use crate::audio::PcmAudio;
use crate::error::{FortellError, Result};
use crate::openai::{classify_error, create_client_with_timeout};
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// OpenAI speech API synthesizer producing 24 kHz mono PCM.
pub struct OpenAISynthesizer {
    client: Client<OpenAIConfig>,
}

impl OpenAISynthesizer {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout)?,
        })
    }
}

fn speech_model(model: &str) -> SpeechModel {
    match model {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    }
}

fn speech_voice(voice: &str) -> Voice {
    match voice.to_lowercase().as_str() {
        "alloy" => Voice::Alloy,
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        other => {
            warn!("Unknown OpenAI voice '{}', using alloy", other);
            Voice::Alloy
        }
    }
}

#[async_trait]
impl Synthesizer for OpenAISynthesizer {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, text, voice), fields(chars = text.chars().count()))]
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<PcmAudio> {
        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .model(speech_model(&voice.model))
            .voice(speech_voice(&voice.voice))
            .response_format(SpeechResponseFormat::Pcm)
            .speed(voice.speed)
            .build()
            .map_err(|e| FortellError::Synthesis(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| classify_error("OpenAI speech", e))?;

        debug!("Received {} bytes of PCM", response.bytes.len());
        PcmAudio::from_le_bytes(&response.bytes, SAMPLE_RATE, CHANNELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_mapping() {
        assert!(matches!(speech_model("tts-1"), SpeechModel::Tts1));
        assert!(matches!(speech_model("tts-1-hd"), SpeechModel::Tts1Hd));
        assert!(matches!(speech_model("gpt-4o-mini-tts"), SpeechModel::Other(_)));
    }

    #[test]
    fn test_voice_mapping_falls_back() {
        assert!(matches!(speech_voice("Nova"), Voice::Nova));
        assert!(matches!(speech_voice("someone"), Voice::Alloy));
    }
}
