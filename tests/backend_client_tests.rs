use axum::body::Body;
use axum::extract::State;
use axum::http::{ HeaderMap, StatusCode };
use axum::response::IntoResponse;
use axum::routing::{ get, post };
use axum::{ Json, Router };
use clap::Parser;
use futures::{ stream, StreamExt };
use medimate::cli::Args;
use medimate::llm::chat::{ CompletionRouter, OllamaClient, OpenAIChatClient };
use medimate::llm::selector::select_backend;
use medimate::llm::BackendKind;
use medimate::models::chat::{ ChatMessage, GenerationParams };
use medimate::models::stream::Fragment;
use medimate::transcription::initialize_transcriber;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

#[derive(Clone, Default)]
struct Captured {
    body: Arc<Mutex<Option<Value>>>,
    authorization: Arc<Mutex<Option<String>>>,
}

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn chunked(chunks: &[&'static str]) -> Body {
    let chunks: Vec<Result<&'static str, Infallible>> = chunks.iter().copied().map(Ok).collect();
    Body::from_stream(stream::iter(chunks))
}

fn replay(chunks: &'static [&'static str]) -> Router {
    let captured = Captured::default();
    replay_capturing(chunks, captured)
}

fn replay_capturing(chunks: &'static [&'static str], captured: Captured) -> Router {
    let handler = move |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
        *captured.body.lock().unwrap() = Some(body);
        *captured.authorization.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        chunked(chunks)
    };
    Router::new()
        .route("/api/chat", post(handler.clone()))
        .route("/chat/completions", post(handler))
        .route("/api/version", get(|| async { Json(serde_json::json!({ "version": "0.5.7" })) }))
        .route("/health", get(|| async { "OK" }))
        .with_state(captured)
}

fn conversation() -> Vec<ChatMessage> {
    vec![ChatMessage::system("You are Dr. MediMate."), ChatMessage::user("I have a headache")]
}

async fn collect(router: CompletionRouter) -> Vec<Fragment> {
    router.stream_completion(conversation(), GenerationParams::default()).collect().await
}

#[tokio::test]
async fn ollama_ndjson_is_reassembled_across_chunks() {
    static CHUNKS: &[&str] = &[
        "{\"message\":{\"role\":\"assistant\",\"content\":\"Stay \"},\"done\":false}\n{\"message\":{\"role\":\"ass",
        "istant\",\"content\":\"hydrated.\"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"after done\"},\"done\":false}\n",
    ];
    let captured = Captured::default();
    let url = spawn_server(replay_capturing(CHUNKS, captured.clone())).await;

    let client = OllamaClient::new(url, "gemma:7b");
    let fragments = collect(CompletionRouter::new(BackendKind::Ollama, Arc::new(client))).await;
    assert_eq!(fragments, vec![Fragment::Text("Stay ".into()), Fragment::Text("hydrated.".into())]);

    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "gemma:7b");
    assert_eq!(body["stream"], true);
    assert_eq!(body["options"]["temperature"], 0.5);
    assert_eq!(body["options"]["num_predict"], 2000);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "I have a headache");
}

#[tokio::test]
async fn ollama_error_line_ends_stream_with_error() {
    static CHUNKS: &[&str] = &[
        "{\"message\":{\"role\":\"assistant\",\"content\":\"Rest\"},\"done\":false}\n",
        "{\"error\":\"model runner has unexpectedly stopped\"}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"ignored\"},\"done\":false}\n",
    ];
    let url = spawn_server(replay(CHUNKS)).await;

    let client = OllamaClient::new(url, "gemma:7b");
    let fragments = collect(CompletionRouter::new(BackendKind::Ollama, Arc::new(client))).await;
    assert_eq!(fragments, vec![
        Fragment::Text("Rest".into()),
        Fragment::Error("❌ Ollama error: model runner has unexpectedly stopped".into()),
    ]);
}

#[tokio::test]
async fn http_failure_status_is_a_single_error() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async { (StatusCode::NOT_FOUND, "model not found").into_response() })
    );
    let url = spawn_server(app).await;

    let client = OllamaClient::new(url, "missing");
    let fragments = collect(CompletionRouter::new(BackendKind::Ollama, Arc::new(client))).await;
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].as_str().starts_with("❌ Ollama error: "));
    assert!(fragments[0].is_error());
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn abandoned_reply_closes_the_upstream_body() {
    let released = Arc::new(AtomicBool::new(false));
    let flag = released.clone();
    let app = Router::new().route(
        "/api/chat",
        post(move || {
            let guard = SetOnDrop(flag.clone());
            async move {
                let lines = stream::unfold(guard, |guard| async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    let line = "{\"message\":{\"role\":\"assistant\",\"content\":\"tick \"},\"done\":false}\n";
                    Some((Ok::<_, Infallible>(line), guard))
                });
                Body::from_stream(lines)
            }
        })
    );
    let url = spawn_server(app).await;

    let client = OllamaClient::new(url, "gemma:7b");
    let router = CompletionRouter::new(BackendKind::Ollama, Arc::new(client));
    let mut fragments = router.stream_completion(conversation(), GenerationParams::default());
    assert_eq!(fragments.next().await, Some(Fragment::Text("tick ".into())));
    drop(fragments);

    for _ in 0..200 {
        if released.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(released.load(Ordering::SeqCst), "server body still being polled after the reader left");
}

#[tokio::test]
async fn openrouter_sse_stream_yields_deltas() {
    static CHUNKS: &[&str] = &[
        ": OPENROUTER PROCESSING\n\n",
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"See \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"a doc",
        "tor.\"}}]}\n\ndata: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    ];
    let captured = Captured::default();
    let url = spawn_server(replay_capturing(CHUNKS, captured.clone())).await;

    let client = OpenAIChatClient::new("sk-or-test", "meta-llama/llama-3.2-9b-instruct:free", url).unwrap();
    let fragments = collect(CompletionRouter::new(BackendKind::OpenRouter, Arc::new(client))).await;
    assert_eq!(fragments, vec![Fragment::Text("See ".into()), Fragment::Text("a doctor.".into())]);

    assert_eq!(captured.authorization.lock().unwrap().as_deref(), Some("Bearer sk-or-test"));
    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "meta-llama/llama-3.2-9b-instruct:free");
    assert_eq!(body["max_tokens"], 2000);
    assert_eq!(body["stream"], true);
}

#[tokio::test]
async fn unreachable_backend_is_a_single_error() {
    let client = OllamaClient::new(unreachable_url().await, "gemma:7b");
    let fragments = collect(CompletionRouter::new(BackendKind::Ollama, Arc::new(client))).await;
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].is_error());
}

#[tokio::test]
async fn probe_accepts_any_http_answer() {
    let app = Router::new().route("/api/version", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let url = spawn_server(app).await;
    assert!(OllamaClient::new(url, "m").probe(Duration::from_secs(2)).await);
    assert!(!OllamaClient::new(unreachable_url().await, "m").probe(Duration::from_secs(2)).await);
}

fn args(extra: &[&str]) -> Args {
    let mut argv = vec!["medimate", "--ollama-probe-timeout-secs", "2"];
    argv.extend_from_slice(extra);
    Args::parse_from(argv)
}

#[tokio::test]
async fn auto_selection_prefers_reachable_ollama() {
    let url = spawn_server(replay(&[])).await;
    let router = select_backend(&args(&["--ai-method", "auto", "--ollama-host", &url, "--openrouter-api-key", "sk-or-test"])).await
        .unwrap();
    assert_eq!(router.active_backend(), Some(BackendKind::Ollama));
}

#[tokio::test]
async fn auto_selection_falls_back_to_openrouter() {
    let url = unreachable_url().await;
    let router = select_backend(&args(&["--ai-method", "auto", "--ollama-host", &url, "--openrouter-api-key", "sk-or-test"])).await
        .unwrap();
    assert_eq!(router.active_backend(), Some(BackendKind::OpenRouter));
}

#[tokio::test]
async fn pinned_backend_does_not_fall_back() {
    let url = unreachable_url().await;
    let router = select_backend(&args(&["--ai-method", "ollama", "--ollama-host", &url, "--openrouter-api-key", "sk-or-test"])).await
        .unwrap();
    assert_eq!(router.active_backend(), None);

    let reachable = spawn_server(replay(&[])).await;
    let router = select_backend(&args(&["--ai-method", "openrouter", "--ollama-host", &reachable, "--openrouter-api-key", " "])).await
        .unwrap();
    assert_eq!(router.active_backend(), None);
}

#[tokio::test]
async fn unknown_selection_mode_is_rejected() {
    assert!(select_backend(&args(&["--ai-method", "gemini"])).await.is_err());
}

#[tokio::test]
async fn transcriber_requires_reachable_server() {
    let url = spawn_server(replay(&[])).await;
    let ready = initialize_transcriber(&args(&["--whisper-url", &url, "--whisper-model", "small"])).await;
    assert_eq!(ready.map(|t| t.model_name().to_string()).as_deref(), Some("small"));

    let down = unreachable_url().await;
    assert!(initialize_transcriber(&args(&["--whisper-url", &down])).await.is_none());
}
