//! Localized video metadata through OpenAI chat completions.

use super::{LocalizedText, Translator};
use crate::config::Prompts;
use crate::error::{FortellError, Result};
use crate::openai::{classify_error, create_client_with_timeout};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct TranslatedTitle {
    title: String,
    #[serde(default)]
    story_name: Option<String>,
}

/// Translates titles with a chat model in JSON mode.
pub struct OpenAITranslator {
    client: Client<OpenAIConfig>,
    model: String,
    prompts: Prompts,
}

impl OpenAITranslator {
    pub fn new(model: &str, prompts: Prompts, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            model: model.to_string(),
            prompts,
        })
    }
}

/// Build localized text from the model's JSON answer.
fn parse_answer(content: &str, prompts: &Prompts) -> Result<LocalizedText> {
    let parsed: TranslatedTitle = serde_json::from_str(content)
        .map_err(|e| FortellError::Localization(format!("Invalid JSON: {}", e)))?;
    if parsed.title.trim().is_empty() {
        return Err(FortellError::Localization("empty translated title".to_string()));
    }

    let story_name = parsed
        .story_name
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| parsed.title.clone());
    let vars = HashMap::from([("story_name".to_string(), story_name)]);

    Ok(LocalizedText {
        title: parsed.title.trim().to_string(),
        description: prompts.render_with_custom(&prompts.localization.description, &vars),
    })
}

#[async_trait]
impl Translator for OpenAITranslator {
    #[instrument(skip(self))]
    async fn localize(&self, title: &str, locale: &str) -> Result<LocalizedText> {
        let vars = HashMap::from([
            ("title".to_string(), title.to_string()),
            ("locale".to_string(), locale.to_string()),
        ]);
        let user_prompt = self
            .prompts
            .render_with_custom(&self.prompts.localization.user, &vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.localization.system.clone())
                .build()
                .map_err(|e| FortellError::Localization(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| FortellError::Localization(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| FortellError::Localization(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| classify_error("OpenAI translation", e))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| FortellError::Localization("Empty response".to_string()))?;

        debug!("Translation for {}: {}", locale, content);
        parse_answer(content, &self.prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer_renders_description() {
        let prompts = Prompts::default();
        let text = parse_answer(
            r#"{"title": "The Frog Prince | Mandarin Bedtime Story", "story_name": "The Frog Prince"}"#,
            &prompts,
        )
        .unwrap();
        assert_eq!(text.title, "The Frog Prince | Mandarin Bedtime Story");
        assert!(text.description.starts_with("The Frog Prince - "));
    }

    #[test]
    fn test_parse_answer_without_story_name() {
        let text = parse_answer(r#"{"title": "Snow White"}"#, &Prompts::default()).unwrap();
        assert!(text.description.starts_with("Snow White - "));
    }

    #[test]
    fn test_parse_answer_rejects_bad_json() {
        assert!(parse_answer("not json", &Prompts::default()).is_err());
        assert!(parse_answer(r#"{"title": "  "}"#, &Prompts::default()).is_err());
    }
}
