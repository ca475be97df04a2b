use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use futures::StreamExt as _;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use glossa_capabilities::prelude::*;
use glossa_capabilities::vendors::cloud::CloudTranslator;

#[derive(Clone)]
enum Scenario {
    Frames(Vec<&'static str>),
    FramesThenHang(Vec<&'static str>),
    Status(StatusCode, &'static str),
    Stall,
}

struct Recorded {
    authorization: Option<String>,
    body: serde_json::Value,
}

struct FakeServer {
    scenario: Scenario,
    requests: Mutex<Vec<Recorded>>,
}

fn event_stream<S>(frames: S) -> Response
where
    S: futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
{
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(frames),
    )
        .into_response()
}

fn frame_bytes(frames: Vec<&'static str>) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> {
    futures::stream::iter(
        frames
            .into_iter()
            .map(|frame| Ok(Bytes::from(format!("data: {frame}\n\n")))),
    )
}

async fn chat_completions(
    State(server): State<Arc<FakeServer>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> Response {
    server.requests.lock().push(Recorded {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        body,
    });
    match server.scenario.clone() {
        Scenario::Frames(frames) => event_stream(frame_bytes(frames)),
        Scenario::FramesThenHang(frames) => {
            event_stream(frame_bytes(frames).chain(futures::stream::pending()))
        }
        Scenario::Status(status, body) => (status, body).into_response(),
        Scenario::Stall => std::future::pending::<Response>().await,
    }
}

async fn start_server(scenario: Scenario) -> (SocketAddr, Arc<FakeServer>) {
    let server = Arc::new(FakeServer {
        scenario,
        requests: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(Arc::clone(&server));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr, server)
}

fn translator(addr: SocketAddr) -> SessionManager<CloudTranslator> {
    let config = CloudConfig::default()
        .base_url(format!("http://{addr}"))
        .api_key("test-key")
        .model("test-model")
        .timeout(Duration::from_secs(10));
    let templates = Arc::new(PromptTemplates::new().expect("templates"));
    SessionManager::new(CloudTranslator::new(config, templates).expect("capability"))
}

fn record(manager: &SessionManager<CloudTranslator>) -> Arc<Mutex<Vec<SessionStatus>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = manager.subscribe_to_status(move |status| sink.lock().push(status.clone()));
    seen
}

const HOLA: &str = r#"{"choices":[{"index":0,"delta":{"content":"Hola"}}]}"#;
const MUNDO: &str = r#"{"choices":[{"index":0,"delta":{"content":", mundo"}}]}"#;
const HEL: &str = r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;

#[tokio::test]
async fn streams_translation_and_sends_expected_request() {
    let (addr, server) = start_server(Scenario::Frames(vec![
        r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
        HOLA,
        MUNDO,
        "[DONE]",
    ]))
    .await;
    let manager = translator(addr);
    let statuses = record(&manager);
    let config = TranslatorConfig::new("en", "es");

    let text = manager
        .stream_operation("Hello,<br>world", &config)
        .await
        .expect("stream")
        .collect_text()
        .await
        .expect("text");

    assert_eq!(text, "Hola, mundo");
    assert_eq!(*statuses.lock(), vec![SessionStatus::Checking, SessionStatus::Ready]);

    let requests = server.requests.lock();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.authorization.as_deref(), Some("Bearer test-key"));
    assert_eq!(request.body["model"], "test-model");
    assert_eq!(request.body["stream"], true);
    assert_eq!(request.body["messages"][0]["role"], "system");
    assert!(
        request.body["messages"][0]["content"]
            .as_str()
            .is_some_and(|prompt| prompt.contains("from English to Spanish"))
    );
    assert_eq!(request.body["messages"][1]["content"], "Hello,\nworld");
}

#[tokio::test]
async fn second_operation_reuses_session_quietly() {
    let (addr, server) = start_server(Scenario::Frames(vec![HOLA, "[DONE]"])).await;
    let manager = translator(addr);
    let config = TranslatorConfig::new("en", "es");

    manager
        .stream_operation("Hi", &config)
        .await
        .expect("first")
        .collect_text()
        .await
        .expect("first text");
    let statuses = record(&manager);
    let text = manager
        .stream_operation("Hi again", &config)
        .await
        .expect("second")
        .collect_text()
        .await
        .expect("second text");

    assert_eq!(text, "Hola");
    assert!(statuses.lock().is_empty());
    assert_eq!(server.requests.lock().len(), 2);
}

#[tokio::test]
async fn http_error_status_is_a_stream_failure() {
    let (addr, _server) = start_server(Scenario::Status(
        StatusCode::TOO_MANY_REQUESTS,
        r#"{"error":{"message":"slow down"}}"#,
    ))
    .await;
    let manager = translator(addr);
    let statuses = record(&manager);

    let err = manager
        .stream_operation("Hi", &TranslatorConfig::new("en", "es"))
        .await
        .expect_err("rate limited");

    assert!(matches!(err, SessionError::StreamFailure { ref message, .. } if message.contains("429")));
    assert!(err.is_retryable());
    let statuses = statuses.lock();
    assert_eq!(statuses.len(), 3);
    assert!(matches!(statuses[2], SessionStatus::Error { ref error } if error.contains("slow down")));
    assert!(manager.has_session());
}

#[tokio::test]
async fn error_frame_mid_stream_ends_with_failure() {
    let (addr, _server) = start_server(Scenario::Frames(vec![
        HEL,
        r#"{"error":{"message":"model overloaded"}}"#,
    ]))
    .await;
    let manager = translator(addr);

    let mut stream = manager
        .stream_operation("Hello", &TranslatorConfig::new("en", "es"))
        .await
        .expect("stream");

    assert_eq!(stream.next().await, Some(Ok("Hel".to_string())));
    assert!(matches!(
        stream.next().await,
        Some(Err(SessionError::StreamFailure { ref message, .. })) if message == "model overloaded"
    ));
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn abort_stops_a_hanging_stream_without_error() {
    let (addr, _server) = start_server(Scenario::FramesThenHang(vec![HEL])).await;
    let manager = translator(addr);
    let statuses = record(&manager);

    let mut stream = manager
        .stream_operation("Hello", &TranslatorConfig::new("en", "es"))
        .await
        .expect("stream");
    assert_eq!(stream.next().await, Some(Ok("Hel".to_string())));

    manager.abort_stream();
    let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("abort ends the stream promptly");
    assert_eq!(next, None);
    assert_eq!(*statuses.lock(), vec![SessionStatus::Checking, SessionStatus::Ready]);
    assert!(manager.has_session());
}

#[tokio::test]
async fn abort_while_waiting_for_headers_returns_empty_stream() {
    let (addr, server) = start_server(Scenario::Stall).await;
    let manager = translator(addr);
    manager
        .ensure_session(&TranslatorConfig::new("en", "es"))
        .await
        .expect("session");

    let aborter = manager.clone();
    let requests = Arc::clone(&server);
    tokio::spawn(async move {
        while requests.requests.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        aborter.abort_stream();
    });

    let stream = tokio::time::timeout(
        Duration::from_secs(5),
        manager.stream_operation("Hello", &TranslatorConfig::new("en", "es")),
    )
    .await
    .expect("abort unblocks the request")
    .expect("aborted operations are not errors");
    assert_eq!(stream.collect_text().await.expect("empty"), "");
}
