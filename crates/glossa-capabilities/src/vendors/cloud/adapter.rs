use std::collections::VecDeque;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt as _;
use futures::stream;
use glossa_core::{
    Availability, Capability, CapabilityError, CapabilitySession, ChunkStream, CreateMonitor,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::SetupError;
use crate::prompts::PromptTemplates;
use crate::task::{Instructions, Task};

use super::config::CloudConfig;
use super::transport::{ChatEvent, SseDecoder, map_chat_frame};

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Serves task `T` through an OpenAI-compatible chat completions endpoint.
pub struct CloudCapability<T: Task> {
    client: reqwest::Client,
    config: Arc<CloudConfig>,
    templates: Arc<PromptTemplates>,
    _task: PhantomData<fn() -> T>,
}

impl<T: Task> CloudCapability<T> {
    /// Creates a capability with its own HTTP client.
    pub fn new(config: CloudConfig, templates: Arc<PromptTemplates>) -> Result<Self, SetupError> {
        let client = build_client(&config)?;
        Ok(Self::with_client(client, Arc::new(config), templates))
    }

    pub(crate) fn with_client(
        client: reqwest::Client,
        config: Arc<CloudConfig>,
        templates: Arc<PromptTemplates>,
    ) -> Self {
        Self {
            client,
            config,
            templates,
            _task: PhantomData,
        }
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }
}

pub(crate) fn build_client(config: &CloudConfig) -> Result<reqwest::Client, SetupError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| SetupError::Config(format!("failed to build HTTP client: {e}")))
}

#[async_trait::async_trait]
impl<T: Task> Capability for CloudCapability<T> {
    type Config = T::Config;
    type Session = CloudSession;

    fn name(&self) -> &str {
        T::NAME
    }

    fn is_supported(&self) -> bool {
        self.config.has_http_base_url()
    }

    fn unsupported_reason(&self) -> String {
        format!(
            "{} needs an http(s) base URL, got `{}`",
            T::NAME,
            self.config.base_url
        )
    }

    async fn availability(&self, config: &T::Config) -> Result<Availability, CapabilityError> {
        Ok(match T::validate(config) {
            Ok(()) => Availability::Available,
            Err(reason) => Availability::unavailable(reason),
        })
    }

    async fn create(
        &self,
        config: &T::Config,
        monitor: CreateMonitor,
    ) -> Result<CloudSession, CapabilityError> {
        if monitor.is_cancelled() {
            return Err(CapabilityError::Aborted);
        }
        let instructions = T::instructions(config, &self.templates)
            .map_err(|e| CapabilityError::backend(e.to_string(), None))?;
        debug!(capability = T::NAME, model = %self.config.model, "cloud session configured");
        Ok(CloudSession {
            capability: T::NAME,
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            instructions,
            destroyed: AtomicBool::new(false),
        })
    }

    fn preprocess(&self, input: &str) -> String {
        T::preprocess(input)
    }
}

/// A configured conversation head: system instructions plus sampling. Each
/// operation is an independent request.
pub struct CloudSession {
    capability: &'static str,
    client: reqwest::Client,
    config: Arc<CloudConfig>,
    instructions: Instructions,
    destroyed: AtomicBool,
}

impl CloudSession {
    pub fn instructions(&self) -> &Instructions {
        &self.instructions
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl CapabilitySession for CloudSession {
    async fn operate(
        &self,
        input: String,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, CapabilityError> {
        if self.is_destroyed() {
            return Err(CapabilityError::Unavailable(format!(
                "{} session was destroyed",
                self.capability
            )));
        }
        let body = build_request_body(&self.config, &self.instructions, &input);
        debug!(capability = self.capability, model = %self.config.model, input_len = input.len(), "starting chat completions stream");

        let mut request = self.client.post(self.config.chat_completions_url()).json(&body);
        if let Some(api_key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(api_key);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CapabilityError::Aborted),
            sent = request.send() => sent
                .map_err(|e| CapabilityError::transport(format!("chat completions request failed: {e}")))?,
        };
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CapabilityError::backend(
                format!("chat completions request failed with status {status}: {}", body.trim()),
                Some(status.as_u16()),
            ));
        }

        let bytes: ByteStream = Box::pin(response.bytes_stream());
        Ok(Box::pin(chat_chunk_stream(bytes)))
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            debug!(capability = self.capability, "cloud session destroyed");
        }
    }
}

pub(crate) fn build_request_body(
    config: &CloudConfig,
    instructions: &Instructions,
    input: &str,
) -> serde_json::Value {
    let mut messages = Vec::with_capacity(2);
    let system_prompt = instructions.system_prompt.trim();
    if !system_prompt.is_empty() {
        messages.push(serde_json::json!({"role": "system", "content": system_prompt}));
    }
    messages.push(serde_json::json!({"role": "user", "content": input}));

    let mut body = serde_json::json!({
        "model": config.model,
        "messages": messages,
        "stream": true,
    });
    if let Some(temperature) = instructions.sampling.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if config.send_top_k
        && let Some(top_k) = instructions.sampling.top_k
    {
        body["top_k"] = serde_json::json!(top_k);
    }
    body
}

fn chat_chunk_stream(
    bytes: ByteStream,
) -> impl futures::Stream<Item = Result<String, CapabilityError>> + Send {
    struct State {
        bytes: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        done: bool,
    }

    fn absorb(state: &mut State, event: ChatEvent) {
        match event {
            ChatEvent::Delta(text) if !state.done => state.pending.push_back(text),
            ChatEvent::Done => state.done = true,
            _ => {}
        }
    }

    stream::try_unfold(
        State {
            bytes,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(text) = state.pending.pop_front() {
                    return Ok(Some((text, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            let event = map_chat_frame(&frame)?;
                            absorb(&mut state, event);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(CapabilityError::transport(format!(
                            "chat completions stream read failed: {e}"
                        )));
                    }
                    None => {
                        if let Some(frame) = state.decoder.finish() {
                            let event = map_chat_frame(&frame)?;
                            absorb(&mut state, event);
                        }
                        state.done = true;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Sampling;

    fn instructions(system_prompt: &str, temperature: Option<f32>) -> Instructions {
        Instructions {
            system_prompt: system_prompt.into(),
            sampling: Sampling {
                temperature,
                top_k: Some(3),
            },
        }
    }

    fn byte_stream(parts: Vec<&'static str>) -> ByteStream {
        Box::pin(futures::stream::iter(
            parts
                .into_iter()
                .map(|part| Ok(bytes::Bytes::from_static(part.as_bytes()))),
        ))
    }

    #[test]
    fn request_body_carries_system_prompt_and_stream_flag() {
        let config = CloudConfig::default().model("gpt-4o-mini");
        let body = build_request_body(&config, &instructions("Translate.", Some(0.5)), "Hi");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(
            body["messages"],
            serde_json::json!([
                {"role": "system", "content": "Translate."},
                {"role": "user", "content": "Hi"},
            ])
        );
        assert!(body.get("top_k").is_none());
    }

    #[test]
    fn top_k_is_sent_when_enabled() {
        let config = CloudConfig::default().send_top_k(true);
        let body = build_request_body(&config, &instructions("Explain.", Some(0.7)), "食べる");
        assert_eq!(body["top_k"], 3);

        let no_sampling = Instructions {
            system_prompt: "Translate.".into(),
            sampling: Sampling::default(),
        };
        let body = build_request_body(&config, &no_sampling, "Hi");
        assert!(body.get("top_k").is_none());
    }

    #[test]
    fn blank_system_prompt_and_temperature_are_omitted() {
        let body = build_request_body(&CloudConfig::default(), &instructions("  ", None), "Hi");
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert!(body.get("temperature").is_none());
    }

    #[tokio::test]
    async fn chunk_stream_yields_deltas_until_done() {
        let stream = chat_chunk_stream(byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hola\"}}]}\n\ndata: {\"choi",
            "ces\":[{\"delta\":{\"content\":\", mundo\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ]));
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks, vec![Ok("Hola".to_string()), Ok(", mundo".to_string())]);
    }

    #[tokio::test]
    async fn chunk_stream_flushes_unterminated_final_frame() {
        let stream = chat_chunk_stream(byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}",
        ]));
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks, vec![Ok("tail".to_string())]);
    }

    #[tokio::test]
    async fn chunk_stream_surfaces_error_frames() {
        let stream = chat_chunk_stream(byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"overloaded\"}}\n\n",
        ]));
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(
            chunks,
            vec![
                Ok("par".to_string()),
                Err(CapabilityError::backend("overloaded", None)),
            ]
        );
    }

    #[tokio::test]
    async fn destroyed_session_refuses_operations() {
        let capability = CloudCapability::<crate::translator::Translate>::new(
            CloudConfig::default().base_url("http://127.0.0.1:9"),
            Arc::new(PromptTemplates::new().expect("templates")),
        )
        .expect("capability");
        let config = crate::translator::TranslatorConfig::new("en", "es");
        let session = capability
            .create(&config, CreateMonitor::new(CancellationToken::new()))
            .await
            .expect("session");

        session.destroy();
        session.destroy();
        assert!(session.is_destroyed());
        let err = session
            .operate("Hi".into(), CancellationToken::new())
            .await
            .err()
            .expect("refused");
        assert!(matches!(err, CapabilityError::Unavailable(_)));
    }

    #[tokio::test]
    async fn availability_reflects_task_validation() {
        let capability = CloudCapability::<crate::translator::Translate>::new(
            CloudConfig::default(),
            Arc::new(PromptTemplates::new().expect("templates")),
        )
        .expect("capability");
        let same = crate::translator::TranslatorConfig::new("en", "en");
        assert!(matches!(
            capability.availability(&same).await,
            Ok(Availability::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_monitor_aborts_creation() {
        let capability = CloudCapability::<crate::summarizer::Summarize>::new(
            CloudConfig::default(),
            Arc::new(PromptTemplates::new().expect("templates")),
        )
        .expect("capability");
        let token = CancellationToken::new();
        token.cancel();
        let result = capability
            .create(&Default::default(), CreateMonitor::new(token))
            .await;
        assert!(matches!(result, Err(CapabilityError::Aborted)));
    }
}
