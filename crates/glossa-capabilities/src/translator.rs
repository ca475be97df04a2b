use serde::{Deserialize, Serialize};

use crate::errors::SetupError;
use crate::prompts::{self, PromptTemplates};
use crate::task::{Instructions, Sampling, Task};
use crate::text;

const TRANSLATION_TEMPERATURE: f32 = 0.2;

/// Language pair served by one translator session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatorConfig {
    /// BCP 47 tag of the input language.
    pub source_language: String,
    /// BCP 47 tag of the output language.
    pub target_language: String,
}

impl TranslatorConfig {
    pub fn new(source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }
}

/// Translation task.
pub struct Translate;

impl Task for Translate {
    type Config = TranslatorConfig;

    const NAME: &'static str = "translator";

    fn validate(config: &TranslatorConfig) -> Result<(), String> {
        let source = config.source_language.trim();
        let target = config.target_language.trim();
        if source.is_empty() || target.is_empty() {
            return Err("source and target language are required".into());
        }
        if source.eq_ignore_ascii_case(target) {
            return Err(format!("cannot translate from {source} to itself"));
        }
        Ok(())
    }

    fn instructions(
        config: &TranslatorConfig,
        templates: &PromptTemplates,
    ) -> Result<Instructions, SetupError> {
        let system_prompt = templates.render(
            prompts::TRANSLATE,
            &serde_json::json!({
                "source_language": text::language_name(config.source_language.trim()),
                "target_language": text::language_name(config.target_language.trim()),
            }),
        )?;
        Ok(Instructions {
            system_prompt,
            sampling: Sampling {
                temperature: Some(TRANSLATION_TEMPERATURE),
                top_k: None,
            },
        })
    }

    fn preprocess(input: &str) -> String {
        text::normalize_line_breaks(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_or_missing_languages_are_rejected() {
        assert!(Translate::validate(&TranslatorConfig::new("en", "EN")).is_err());
        assert!(Translate::validate(&TranslatorConfig::new(" ", "es")).is_err());
        assert!(Translate::validate(&TranslatorConfig::new("en", "es")).is_ok());
    }

    #[test]
    fn instructions_name_both_languages() {
        let templates = PromptTemplates::new().expect("templates");
        let instructions =
            Translate::instructions(&TranslatorConfig::new("en", "ja"), &templates).expect("instructions");
        assert!(instructions.system_prompt.contains("from English to Japanese"));
        assert_eq!(instructions.sampling.temperature, Some(TRANSLATION_TEMPERATURE));
    }

    #[test]
    fn config_serializes_in_camel_case() {
        let json = serde_json::to_string(&TranslatorConfig::new("en", "es")).expect("json");
        assert_eq!(json, r#"{"sourceLanguage":"en","targetLanguage":"es"}"#);
    }
}
