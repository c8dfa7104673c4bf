//! OpenAI image generation.

use super::ImageGenerator;
use crate::config::CoverSettings;
use crate::error::{FortellError, Result};
use crate::openai::{classify_error, create_client_with_timeout};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    CreateImageRequestArgs, Image, ImageModel, ImageQuality, ImageResponseFormat, ImageSize,
};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Cover generator backed by the OpenAI images API.
pub struct OpenAIImageGenerator {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    settings: CoverSettings,
}

impl OpenAIImageGenerator {
    pub fn new(settings: CoverSettings, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            http: reqwest::Client::builder().timeout(timeout).build()?,
            settings,
        })
    }
}

fn image_model(model: &str) -> ImageModel {
    match model {
        "dall-e-3" => ImageModel::DallE3,
        "dall-e-2" => ImageModel::DallE2,
        other => ImageModel::Other(other.to_string()),
    }
}

fn image_size(size: &str) -> ImageSize {
    match size {
        "256x256" => ImageSize::S256x256,
        "512x512" => ImageSize::S512x512,
        "1024x1024" => ImageSize::S1024x1024,
        "1024x1792" => ImageSize::S1024x1792,
        "1792x1024" => ImageSize::S1792x1024,
        other => {
            warn!("Unsupported image size '{}', using 1792x1024", other);
            ImageSize::S1792x1024
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAIImageGenerator {
    #[instrument(skip(self, prompt))]
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let quality = if self.settings.hd {
            ImageQuality::HD
        } else {
            ImageQuality::Standard
        };

        let request = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(image_model(&self.settings.model))
            .n(1)
            .size(image_size(&self.settings.size))
            .quality(quality)
            .response_format(ImageResponseFormat::Url)
            .build()
            .map_err(|e| FortellError::Artwork(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .images()
            .create(request)
            .await
            .map_err(|e| classify_error("OpenAI images", e))?;

        let url = response
            .data
            .iter()
            .find_map(|image| match image.as_ref() {
                Image::Url { url, .. } => Some(url.clone()),
                _ => None,
            })
            .ok_or_else(|| FortellError::Artwork("image response had no URL".to_string()))?;

        let download = self.http.get(&url).send().await?;
        let status = download.status();
        if !status.is_success() {
            let body = download.text().await.unwrap_or_default();
            return Err(FortellError::from_status(status.as_u16(), "image download", &body));
        }

        let bytes = download.bytes().await?;
        debug!("Downloaded {} byte cover", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mapping() {
        assert!(matches!(image_size("1024x1024"), ImageSize::S1024x1024));
        assert!(matches!(image_size("1792x1024"), ImageSize::S1792x1024));
        assert!(matches!(image_size("4k"), ImageSize::S1792x1024));
    }

    #[test]
    fn test_model_mapping() {
        assert!(matches!(image_model("dall-e-3"), ImageModel::DallE3));
        assert!(matches!(image_model("gpt-image-1"), ImageModel::Other(_)));
    }
}
