/// Errors raised while assembling capabilities, before any session exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    /// Invalid backend configuration.
    #[error("config error: {0}")]
    Config(String),
    /// A prompt template failed to parse or render.
    #[error("template error: {0}")]
    Template(String),
}
