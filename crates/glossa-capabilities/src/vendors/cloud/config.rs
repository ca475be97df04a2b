use std::time::Duration;

use crate::errors::SetupError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection settings for the cloud backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudConfig {
    /// Base URL of the OpenAI-compatible endpoint, without the `/v1` suffix.
    pub base_url: String,
    /// Bearer token. Local servers usually run without one.
    pub api_key: Option<String>,
    /// Model name sent with every request.
    pub model: String,
    /// HTTP timeout for a whole request, including the streamed body.
    pub timeout: Duration,
    /// Send `top_k` as a request field. The OpenAI API rejects it; llama.cpp
    /// and vLLM servers accept it.
    pub send_top_k: bool,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            send_top_k: false,
        }
    }
}

impl CloudConfig {
    /// Builds a config from the process environment.
    ///
    /// Reads `GLOSSA_BASE_URL`, `GLOSSA_API_KEY` (falling back to
    /// `OPENAI_API_KEY`), `GLOSSA_MODEL`, `GLOSSA_TIMEOUT_SECS` and
    /// `GLOSSA_SEND_TOP_K`. Unset or blank variables keep their defaults.
    pub fn from_env() -> Result<Self, SetupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, SetupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(base_url) = read("GLOSSA_BASE_URL") {
            config.base_url = base_url;
        }
        config.api_key = read("GLOSSA_API_KEY").or_else(|| read("OPENAI_API_KEY"));
        if let Some(model) = read("GLOSSA_MODEL") {
            config.model = model;
        }
        if let Some(raw) = read("GLOSSA_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| {
                SetupError::Config(format!("GLOSSA_TIMEOUT_SECS must be whole seconds, got `{raw}`"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = read("GLOSSA_SEND_TOP_K") {
            config.send_top_k = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(SetupError::Config(format!(
                        "GLOSSA_SEND_TOP_K must be true or false, got `{raw}`"
                    )));
                }
            };
        }
        Ok(config)
    }

    /// Overrides the API base URL (for proxies, local servers or tests).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn send_top_k(mut self, send_top_k: bool) -> Self {
        self.send_top_k = send_top_k;
        self
    }

    /// Whether the base URL uses a scheme the HTTP client can reach.
    pub fn has_http_base_url(&self) -> bool {
        let url = self.base_url.trim();
        url.starts_with("http://") || url.starts_with("https://")
    }

    pub(crate) fn chat_completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim().trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_keeps_defaults() {
        let config = CloudConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, CloudConfig::default());
        assert_eq!(config.chat_completions_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn glossa_key_wins_over_openai_key() {
        let config = CloudConfig::from_lookup(lookup(&[
            ("GLOSSA_API_KEY", "glossa"),
            ("OPENAI_API_KEY", "openai"),
        ]))
        .expect("config");
        assert_eq!(config.api_key.as_deref(), Some("glossa"));

        let fallback =
            CloudConfig::from_lookup(lookup(&[("GLOSSA_API_KEY", " "), ("OPENAI_API_KEY", "openai")]))
                .expect("config");
        assert_eq!(fallback.api_key.as_deref(), Some("openai"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = CloudConfig::from_lookup(lookup(&[
            ("GLOSSA_BASE_URL", "http://localhost:11434/"),
            ("GLOSSA_MODEL", "llama3.2"),
            ("GLOSSA_TIMEOUT_SECS", "5"),
        ]))
        .expect("config");
        assert_eq!(config.chat_completions_url(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_timeout_is_a_config_error() {
        let err = CloudConfig::from_lookup(lookup(&[("GLOSSA_TIMEOUT_SECS", "soon")]))
            .expect_err("invalid");
        assert!(matches!(err, SetupError::Config(message) if message.contains("soon")));
    }

    #[test]
    fn send_top_k_is_parsed_as_a_flag() {
        let config = CloudConfig::from_lookup(lookup(&[("GLOSSA_SEND_TOP_K", "True")])).expect("config");
        assert!(config.send_top_k);
        let err = CloudConfig::from_lookup(lookup(&[("GLOSSA_SEND_TOP_K", "maybe")]))
            .expect_err("invalid");
        assert!(matches!(err, SetupError::Config(message) if message.contains("maybe")));
    }

    #[test]
    fn only_http_schemes_are_supported() {
        assert!(CloudConfig::default().has_http_base_url());
        assert!(CloudConfig::default().base_url("http://127.0.0.1:8080").has_http_base_url());
        assert!(!CloudConfig::default().base_url("ftp://example.com").has_http_base_url());
        assert!(!CloudConfig::default().base_url("").has_http_base_url());
    }
}
