use serde::{Deserialize, Serialize};

use crate::errors::SetupError;
use crate::prompts::{self, PromptTemplates};
use crate::task::{Instructions, Sampling, Task};
use crate::text;

pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_TOP_K: u32 = 3;
const MAX_TEMPERATURE: f32 = 2.0;

/// What a prompt session is set up to do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PromptTask {
    /// Phrase by phrase grammar breakdown of sentences in `language`.
    #[serde(rename_all = "camelCase")]
    GrammarAnalysis {
        language: String,
        explanation_language: String,
    },
    /// IPA transcription and tips for text in `language`.
    Pronunciation { language: String, romanization: bool },
    /// Caller supplied system instructions.
    #[serde(rename_all = "camelCase")]
    Custom { system_prompt: String },
}

/// Prompt session settings: the task plus sampling parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    pub task: PromptTask,
    pub temperature: f32,
    /// Only reaches the cloud backend when `CloudConfig::send_top_k` is set.
    pub top_k: u32,
}

impl PromptConfig {
    pub fn new(task: PromptTask) -> Self {
        Self {
            task,
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn grammar(language: impl Into<String>, explanation_language: impl Into<String>) -> Self {
        Self::new(PromptTask::GrammarAnalysis {
            language: language.into(),
            explanation_language: explanation_language.into(),
        })
    }

    pub fn pronunciation(language: impl Into<String>, romanization: bool) -> Self {
        Self::new(PromptTask::Pronunciation {
            language: language.into(),
            romanization,
        })
    }

    pub fn custom(system_prompt: impl Into<String>) -> Self {
        Self::new(PromptTask::Custom {
            system_prompt: system_prompt.into(),
        })
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Free-form prompting task.
pub struct Prompt;

impl Task for Prompt {
    type Config = PromptConfig;

    const NAME: &'static str = "prompt";

    fn validate(config: &PromptConfig) -> Result<(), String> {
        if !config.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&config.temperature)
        {
            return Err(format!(
                "temperature must be between 0 and {MAX_TEMPERATURE}, got {}",
                config.temperature
            ));
        }
        if config.top_k == 0 {
            return Err("top_k must be at least 1".into());
        }
        let missing = match &config.task {
            PromptTask::GrammarAnalysis {
                language,
                explanation_language,
            } => language.trim().is_empty() || explanation_language.trim().is_empty(),
            PromptTask::Pronunciation { language, .. } => language.trim().is_empty(),
            PromptTask::Custom { system_prompt } => system_prompt.trim().is_empty(),
        };
        if missing {
            return Err("prompt task has an empty field".into());
        }
        Ok(())
    }

    fn instructions(
        config: &PromptConfig,
        templates: &PromptTemplates,
    ) -> Result<Instructions, SetupError> {
        let system_prompt = match &config.task {
            PromptTask::GrammarAnalysis {
                language,
                explanation_language,
            } => templates.render(
                prompts::GRAMMAR,
                &serde_json::json!({
                    "language": text::language_name(language.trim()),
                    "explanation_language": text::language_name(explanation_language.trim()),
                }),
            )?,
            PromptTask::Pronunciation {
                language,
                romanization,
            } => templates.render(
                prompts::PRONUNCIATION,
                &serde_json::json!({
                    "language": text::language_name(language.trim()),
                    "romanization": romanization,
                }),
            )?,
            PromptTask::Custom { system_prompt } => system_prompt.trim().to_owned(),
        };
        Ok(Instructions {
            system_prompt,
            sampling: Sampling {
                temperature: Some(config.temperature),
                top_k: Some(config.top_k),
            },
        })
    }

    fn preprocess(input: &str) -> String {
        text::trimmed(input)
    }
}
