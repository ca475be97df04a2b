//! Concrete capabilities for glossa: translation, summarization and prompting
//! (grammar analysis, pronunciation, free-form), each usable with any backend
//! that implements [`glossa_core::Capability`].
//!
//! The cloud backend under [`vendors::cloud`] talks to any OpenAI-compatible
//! chat completions endpoint.
//!
//! ```no_run
//! use glossa_capabilities::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let toolkit = Toolkit::cloud(CloudConfig::from_env()?)?;
//! let text = toolkit
//!     .translate("Good morning", &TranslatorConfig::new("en", "es"))
//!     .await?
//!     .collect_text()
//!     .await?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

/// Setup errors for templates and backend configuration.
pub mod errors;
/// Common imports.
pub mod prelude;
/// Free-form prompting: grammar analysis, pronunciation, custom instructions.
pub mod prompt;
/// Handlebars templates for system instructions.
pub mod prompts;
/// Summarization settings and task.
pub mod summarizer;
/// The task abstraction shared by every binding.
pub mod task;
/// Pure input transforms applied before operations.
pub mod text;
/// One session manager per concern, composed.
pub mod toolkit;
/// Translation settings and task.
pub mod translator;
/// Backend integrations.
pub mod vendors;

pub use errors::SetupError;
pub use prompt::{Prompt, PromptConfig, PromptTask};
pub use prompts::PromptTemplates;
pub use summarizer::{Summarize, SummarizerConfig, SummaryFormat, SummaryKind, SummaryLength};
pub use task::{Instructions, Sampling, Task};
pub use toolkit::Toolkit;
pub use translator::{Translate, TranslatorConfig};
