//! Prompt templates for Fortell.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    /// Prompts for cover image generation.
    pub cover: CoverPrompts,
    /// Prompts for localized video metadata.
    pub localization: LocalizationPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for cover image generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverPrompts {
    /// Scene description; `{{title}}` is the story title.
    pub subject: String,
    pub style_prefix: String,
    pub style_suffix: String,
}

impl Default for CoverPrompts {
    fn default() -> Self {
        Self {
            subject: "A fairy tale scene depicting {{title}}.".to_string(),
            style_prefix: "Classical oil painting style fairy tale illustration \
                in the style of Pre-Raphaelite masters. "
                .to_string(),
            style_suffix: "\nWarm color palette with rich tones and detailed brushwork \
                texture like a Renaissance masterpiece. \
                No text, no words, no letters anywhere in the image."
                .to_string(),
        }
    }
}

/// Prompts for translating video titles and descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationPrompts {
    pub system: String,
    /// `{{title}}` is the source title, `{{locale}}` the target locale.
    pub user: String,
    /// Description written for the target locale; `{{story_name}}` is the translated story name.
    pub description: String,
}

impl Default for LocalizationPrompts {
    fn default() -> Self {
        Self {
            system: "You write search-optimized video metadata for children's story videos. \
                Respond with JSON only."
                .to_string(),
            user: r#"Translate this children's story video title for the "{{locale}}" locale as an SEO-optimized title.

TITLE: {{title}}

Rules:
1. Translate the story name
2. Mention the language the story is narrated in so parents know it
3. Include "bedtime story" or "kids story" and the age range 3-6
4. Keep under 100 characters

Return JSON: {"title": "...", "story_name": "..."}"#
                .to_string(),
            description: "{{story_name}} - A gentle bedtime story for children ages 3-8.\n\n\
                Perfect for bilingual families, language immersion, and calm listening time.\n\
                Subscribe for new classic stories every week!"
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let cover_path = custom_path.join("cover.toml");
            if cover_path.exists() {
                let content = std::fs::read_to_string(&cover_path)?;
                prompts.cover = toml::from_str(&content)?;
            }

            let localization_path = custom_path.join("localization.toml");
            if localization_path.exists() {
                let content = std::fs::read_to_string(&localization_path)?;
                prompts.localization = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Full image prompt for a story title.
    pub fn cover_prompt(&self, title: &str) -> String {
        let vars = HashMap::from([("title".to_string(), title.to_string())]);
        let subject = self.render_with_custom(&self.cover.subject, &vars);
        format!("{}{}{}", self.cover.style_prefix, subject, self.cover.style_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.cover.subject.is_empty());
        assert!(!prompts.localization.user.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_cover_prompt_wraps_subject_in_style() {
        let prompts = Prompts::default();
        let prompt = prompts.cover_prompt("Little Red Riding Hood");
        assert!(prompt.starts_with("Classical oil painting"));
        assert!(prompt.contains("depicting Little Red Riding Hood."));
        assert!(prompt.ends_with("anywhere in the image."));
    }

    #[test]
    fn test_custom_variables_are_overridden_by_call_site() {
        let mut prompts = Prompts::default();
        prompts
            .variables
            .insert("title".to_string(), "ignored".to_string());
        prompts
            .variables
            .insert("audience".to_string(), "toddlers".to_string());
        let vars = HashMap::from([("title".to_string(), "Snow White".to_string())]);
        let out = prompts.render_with_custom("{{title}} for {{audience}}", &vars);
        assert_eq!(out, "Snow White for toddlers");
    }
}
