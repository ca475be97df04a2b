use std::fmt;

use crate::errors::SetupError;
use crate::prompts::PromptTemplates;

/// Sampling parameters forwarded to backends that support them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sampling {
    pub temperature: Option<f32>,
    pub top_k: Option<u32>,
}

/// What a session is told before it sees any user input.
#[derive(Clone, Debug, PartialEq)]
pub struct Instructions {
    pub system_prompt: String,
    pub sampling: Sampling,
}

/// One concern served through a capability: its configuration, how the
/// configuration is validated, how it turns into instructions, and how input
/// is prepared.
///
/// Backends are generic over `Task` so every binding shares a single
/// implementation of the capability contract.
pub trait Task: Send + Sync + 'static {
    type Config: serde::Serialize + Clone + fmt::Debug + Send + Sync + 'static;

    /// Capability name used in errors, statuses and logs.
    const NAME: &'static str;

    /// `Err(reason)` when the configuration cannot be served.
    fn validate(config: &Self::Config) -> Result<(), String>;

    fn instructions(
        config: &Self::Config,
        templates: &PromptTemplates,
    ) -> Result<Instructions, SetupError>;

    /// Pure, deterministic input transform.
    fn preprocess(input: &str) -> String;
}
