use handlebars::Handlebars;

use crate::errors::SetupError;

pub const TRANSLATE: &str = "translate";
pub const SUMMARIZE: &str = "summarize";
pub const GRAMMAR: &str = "grammar";
pub const PRONUNCIATION: &str = "pronunciation";

const TRANSLATE_TEMPLATE: &str = "You are a translation engine inside a reading assistant.
Translate the user's text from {{source_language}} to {{target_language}}.
Preserve line breaks and formatting. Reply with the translation only, without notes or quotes.";

const SUMMARIZE_TEMPLATE: &str = "Summarize the user's text.
{{kind_instruction}} Keep it {{length_instruction}}.
{{#if plain_text}}Write plain text without markdown.{{else}}Format the answer as markdown.{{/if}}
{{#if context}}Background for the reader: {{context}}{{/if}}";

const GRAMMAR_TEMPLATE: &str = "You are a {{language}} grammar tutor.
Break the user's sentence into phrases and give the grammatical role of each.
Explain conjugations, particles and agreement, and point out mistakes with a corrected sentence.
Write the explanation in {{explanation_language}}.";

const PRONUNCIATION_TEMPLATE: &str = "You are a {{language}} pronunciation coach.
For the user's text give the IPA transcription{{#if romanization}} and a romanization{{/if}}, mark stressed syllables,
and add short tips for sounds a learner is likely to get wrong. Keep the answer brief.";

/// Registry of system-instruction templates.
///
/// Rendering is plain text: HTML escaping is disabled.
pub struct PromptTemplates {
    registry: Handlebars<'static>,
}

impl PromptTemplates {
    /// Builds the registry with the built-in templates.
    pub fn new() -> Result<Self, SetupError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        let mut templates = Self { registry };
        for (name, template) in [
            (TRANSLATE, TRANSLATE_TEMPLATE),
            (SUMMARIZE, SUMMARIZE_TEMPLATE),
            (GRAMMAR, GRAMMAR_TEMPLATE),
            (PRONUNCIATION, PRONUNCIATION_TEMPLATE),
        ] {
            templates.set(name, template)?;
        }
        Ok(templates)
    }

    /// Registers or replaces the template stored under `name`.
    pub fn set(&mut self, name: &str, template: &str) -> Result<(), SetupError> {
        self.registry
            .register_template_string(name, template)
            .map_err(|e| SetupError::Template(format!("{name}: {e}")))
    }

    pub fn render(&self, name: &str, data: &serde_json::Value) -> Result<String, SetupError> {
        self.registry
            .render(name, data)
            .map(|rendered| rendered.trim().to_owned())
            .map_err(|e| SetupError::Template(format!("{name}: {e}")))
    }
}
