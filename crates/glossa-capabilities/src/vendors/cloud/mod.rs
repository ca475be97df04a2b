//! Backend for any OpenAI-compatible `/v1/chat/completions` endpoint
//! (OpenAI itself, a proxy, or a local server such as Ollama or llama.cpp).
//!
//! Each task gets its own [`CloudCapability`]; sessions are cheap because the
//! remote model is always ready, so availability only reflects configuration
//! validity.
mod adapter;
mod config;
pub(crate) mod transport;

pub use adapter::{CloudCapability, CloudSession};
pub(crate) use adapter::build_client;
pub use config::CloudConfig;

use crate::prompt::Prompt;
use crate::summarizer::Summarize;
use crate::translator::Translate;

pub type CloudTranslator = CloudCapability<Translate>;
pub type CloudSummarizer = CloudCapability<Summarize>;
pub type CloudPrompt = CloudCapability<Prompt>;
