use std::sync::Arc;

use glossa_core::{Capability, OperationStream, SessionError, SessionManager};

use crate::errors::SetupError;
use crate::prompt::PromptConfig;
use crate::prompts::PromptTemplates;
use crate::summarizer::SummarizerConfig;
use crate::translator::TranslatorConfig;
use crate::vendors::cloud::{CloudConfig, CloudPrompt, CloudSummarizer, CloudTranslator};

/// One [`SessionManager`] per concern, sharing nothing but the backend setup.
///
/// Each manager keeps its own session, status listeners and cancellation, so a
/// running translation is unaffected by a summary request.
pub struct Toolkit<T = CloudTranslator, S = CloudSummarizer, P = CloudPrompt>
where
    T: Capability<Config = TranslatorConfig>,
    S: Capability<Config = SummarizerConfig>,
    P: Capability<Config = PromptConfig>,
{
    translator: SessionManager<T>,
    summarizer: SessionManager<S>,
    prompt: SessionManager<P>,
}

impl Toolkit {
    /// Cloud backed toolkit with the built-in prompt templates.
    pub fn cloud(config: CloudConfig) -> Result<Self, SetupError> {
        Self::cloud_with_templates(config, PromptTemplates::new()?)
    }

    /// Cloud backed toolkit with caller supplied templates.
    pub fn cloud_with_templates(
        config: CloudConfig,
        templates: PromptTemplates,
    ) -> Result<Self, SetupError> {
        let client = crate::vendors::cloud::build_client(&config)?;
        let config = Arc::new(config);
        let templates = Arc::new(templates);
        Ok(Self::new(
            CloudTranslator::with_client(client.clone(), Arc::clone(&config), Arc::clone(&templates)),
            CloudSummarizer::with_client(client.clone(), Arc::clone(&config), Arc::clone(&templates)),
            CloudPrompt::with_client(client, config, templates),
        ))
    }
}

impl<T, S, P> Toolkit<T, S, P>
where
    T: Capability<Config = TranslatorConfig>,
    S: Capability<Config = SummarizerConfig>,
    P: Capability<Config = PromptConfig>,
{
    pub fn new(translator: T, summarizer: S, prompt: P) -> Self {
        Self {
            translator: SessionManager::new(translator),
            summarizer: SessionManager::new(summarizer),
            prompt: SessionManager::new(prompt),
        }
    }

    pub fn translator(&self) -> &SessionManager<T> {
        &self.translator
    }

    pub fn summarizer(&self) -> &SessionManager<S> {
        &self.summarizer
    }

    pub fn prompter(&self) -> &SessionManager<P> {
        &self.prompt
    }

    pub async fn translate(
        &self,
        text: &str,
        config: &TranslatorConfig,
    ) -> Result<OperationStream, SessionError> {
        self.translator.stream_operation(text, config).await
    }

    pub async fn summarize(
        &self,
        text: &str,
        config: &SummarizerConfig,
    ) -> Result<OperationStream, SessionError> {
        self.summarizer.stream_operation(text, config).await
    }

    pub async fn prompt(
        &self,
        text: &str,
        config: &PromptConfig,
    ) -> Result<OperationStream, SessionError> {
        self.prompt.stream_operation(text, config).await
    }

    /// Cancels in-flight streams and initializations on every manager.
    pub fn abort_all(&self) {
        self.translator.abort_stream();
        self.translator.abort_initialization();
        self.summarizer.abort_stream();
        self.summarizer.abort_initialization();
        self.prompt.abort_stream();
        self.prompt.abort_initialization();
    }

    pub fn destroy_all(&self) {
        self.translator.destroy_session();
        self.summarizer.destroy_session();
        self.prompt.destroy_session();
    }
}
