pub use crate::vendors::cloud::{CloudCapability, CloudConfig};
pub use crate::{
    PromptConfig, PromptTask, PromptTemplates, SetupError, SummarizerConfig, SummaryFormat,
    SummaryKind, SummaryLength, Toolkit, TranslatorConfig,
};
pub use glossa_core::prelude::*;
