use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SetupError;
use crate::prompts::{self, PromptTemplates};
use crate::task::{Instructions, Sampling, Task};
use crate::text;

const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Shape of the summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryKind {
    Tldr,
    #[default]
    KeyPoints,
    Teaser,
    Headline,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryFormat {
    #[default]
    Markdown,
    PlainText,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

/// Settings for one summarizer session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizerConfig {
    pub kind: SummaryKind,
    pub format: SummaryFormat,
    pub length: SummaryLength,
    /// Background that applies to every text summarized by the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_context: Option<String>,
}

impl SummarizerConfig {
    pub fn kind(mut self, kind: SummaryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn format(mut self, format: SummaryFormat) -> Self {
        self.format = format;
        self
    }

    pub fn length(mut self, length: SummaryLength) -> Self {
        self.length = length;
        self
    }

    pub fn shared_context(mut self, context: impl Into<String>) -> Self {
        self.shared_context = Some(context.into());
        self
    }
}

fn kind_instruction(kind: SummaryKind, length: SummaryLength) -> &'static str {
    use SummaryKind::*;
    use SummaryLength::*;
    match (kind, length) {
        (Tldr, Short) => "Give a one sentence overview.",
        (Tldr, Medium) => "Give a three sentence overview.",
        (Tldr, Long) => "Give a five sentence overview.",
        (KeyPoints, Short) => "List the 3 most important points as bullets.",
        (KeyPoints, Medium) => "List the 5 most important points as bullets.",
        (KeyPoints, Long) => "List the 7 most important points as bullets.",
        (Teaser, Short) => "Write a one sentence teaser that makes the reader want more.",
        (Teaser, Medium) => "Write a three sentence teaser that makes the reader want more.",
        (Teaser, Long) => "Write a five sentence teaser that makes the reader want more.",
        (Headline, Short) => "Write a single headline of at most 12 words.",
        (Headline, Medium) => "Write a single headline of at most 17 words.",
        (Headline, Long) => "Write a single headline of at most 22 words.",
    }
}

fn length_instruction(length: SummaryLength) -> &'static str {
    match length {
        SummaryLength::Short => "short",
        SummaryLength::Medium => "concise",
        SummaryLength::Long => "thorough but free of filler",
    }
}

/// Summarization task.
pub struct Summarize;

impl Task for Summarize {
    type Config = SummarizerConfig;

    const NAME: &'static str = "summarizer";

    fn validate(_config: &SummarizerConfig) -> Result<(), String> {
        Ok(())
    }

    fn instructions(
        config: &SummarizerConfig,
        templates: &PromptTemplates,
    ) -> Result<Instructions, SetupError> {
        let context = config
            .shared_context
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let system_prompt = templates.render(
            prompts::SUMMARIZE,
            &serde_json::json!({
                "kind_instruction": kind_instruction(config.kind, config.length),
                "length_instruction": length_instruction(config.length),
                "plain_text": config.format == SummaryFormat::PlainText,
                "context": context,
            }),
        )?;
        Ok(Instructions {
            system_prompt,
            sampling: Sampling {
                temperature: Some(SUMMARY_TEMPERATURE),
                top_k: None,
            },
        })
    }

    fn preprocess(input: &str) -> String {
        text::tidy_paragraphs(input)
    }
}

macro_rules! kebab_enum_text {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self { $(Self::$variant => $text),+ })
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(
                        "unknown value `{other}` (expected one of: {})",
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

kebab_enum_text!(SummaryKind {
    Tldr => "tldr",
    KeyPoints => "key-points",
    Teaser => "teaser",
    Headline => "headline",
});
kebab_enum_text!(SummaryFormat {
    Markdown => "markdown",
    PlainText => "plain-text",
});
kebab_enum_text!(SummaryLength {
    Short => "short",
    Medium => "medium",
    Long => "long",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_key_points_markdown_medium() {
        let json = serde_json::to_string(&SummarizerConfig::default()).expect("json");
        assert_eq!(json, r#"{"kind":"key-points","format":"markdown","length":"medium"}"#);
    }

    #[test]
    fn instructions_reflect_kind_length_and_context() {
        let templates = PromptTemplates::new().expect("templates");
        let config = SummarizerConfig::default()
            .kind(SummaryKind::Headline)
            .length(SummaryLength::Short)
            .format(SummaryFormat::PlainText)
            .shared_context("A cooking blog");
        let instructions = Summarize::instructions(&config, &templates).expect("instructions");

        assert!(instructions.system_prompt.contains("at most 12 words"));
        assert!(instructions.system_prompt.contains("plain text"));
        assert!(instructions.system_prompt.contains("A cooking blog"));
    }

    #[test]
    fn blank_context_is_dropped() {
        let templates = PromptTemplates::new().expect("templates");
        let config = SummarizerConfig::default().shared_context("   ");
        let instructions = Summarize::instructions(&config, &templates).expect("instructions");
        assert!(!instructions.system_prompt.contains("Background"));
    }

    #[test]
    fn enums_parse_from_cli_text() {
        assert_eq!("Key-Points".parse::<SummaryKind>(), Ok(SummaryKind::KeyPoints));
        assert_eq!("plain-text".parse::<SummaryFormat>(), Ok(SummaryFormat::PlainText));
        assert_eq!(SummaryLength::Long.to_string(), "long");
        let err = "huge".parse::<SummaryLength>().expect_err("invalid");
        assert!(err.contains("short, medium, long"));
    }
}
