//! Access-log middleware on an axum router.

use std::net::SocketAddr;
use std::sync::Arc;

use access_trace::config::HttpTraceConfig;
use access_trace::http::AccessLogLayer;
use access_trace::logging::{LogLevel, LogType, Logger, MemorySink};
use access_trace::propagation::SpanContext;
use access_trace::trace::{MemoryReporter, SpanKind, Tracer};
use axum::body::Body;
use axum::extract::{ConnectInfo, Extension};
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

mod common;

fn app(logger: Arc<Logger>, tracer: Option<Tracer>, config: HttpTraceConfig) -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/health", get(|| async { "ok" }))
        .route("/echo", post(|body: String| async move { body }))
        .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "nope") }))
        .route(
            "/whoami",
            get(|ctx: Option<Extension<SpanContext>>| async move {
                ctx.map(|Extension(ctx)| ctx.trace_id.to_string())
                    .unwrap_or_default()
            }),
        )
        .route("/boom", get(boom))
        .layer(AccessLogLayer::new(logger, tracer, config))
}

async fn boom() -> &'static str {
    panic!("handler exploded")
}

fn traced_app(config: HttpTraceConfig) -> (Router, MemorySink, Arc<MemoryReporter>) {
    let (logger, sink) = common::memory_logger(LogType::Access);
    let (tracer, reporter) = common::memory_tracer();
    (app(logger, Some(tracer), config), sink, reporter)
}

fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "10.0.0.5")
        .header("user-agent", "curl/8.0")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn untraced_request_logs_one_line() {
    let (app, sink, reporter) = traced_app(HttpTraceConfig::default());

    let response = app
        .oneshot(request("GET", "/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "pong");

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert!(line.contains(r#"10.0.0.5 GET /ping $-$ HTTP/1.1 200 "#));
    assert!(line.contains(r#""curl/8.0" svc $"pong"$ http -"#));
    assert_eq!(common::trace_columns(line), ("-".to_string(), "-".to_string()));
    assert!(reporter.spans().is_empty());
}

#[tokio::test]
async fn traced_request_continues_upstream_trace() {
    let (app, sink, reporter) = traced_app(HttpTraceConfig::default());
    let (headers, upstream) = common::traced_headers();

    let mut req = request("GET", "/whoami").body(Body::empty()).unwrap();
    req.headers_mut().extend(headers);
    let response = app.oneshot(req).await.unwrap();

    // Handler sees the entry span context.
    assert_eq!(body_text(response).await, upstream.trace_id.to_string());

    let spans = reporter.spans();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.kind, SpanKind::Entry);
    assert_eq!(span.operation, "GET /whoami");
    assert_eq!(span.component, Some(5004));
    assert_eq!(span.context.trace_id, upstream.trace_id);
    assert_eq!(span.context.parent_span_id, Some(upstream.span_id));
    assert!(span.tags.iter().any(|(k, v)| k == "http.method" && v == "GET"));
    assert!(span.tags.iter().any(|(k, v)| k == "status_code" && v == "200"));
    assert!(!span.is_error);

    let (trace, span_id) = common::trace_columns(&sink.lines()[0]);
    assert_eq!(trace, upstream.trace_id.to_string());
    assert_eq!(span_id, span.context.span_id.to_string());
}

#[tokio::test]
async fn bodies_are_captured_and_forwarded() {
    let (app, sink, _) = traced_app(HttpTraceConfig::default());

    let response = app
        .oneshot(request("POST", "/echo").body(Body::from(r#"{"k":"v"}"#)).unwrap())
        .await
        .unwrap();
    assert_eq!(body_text(response).await, r#"{"k":"v"}"#);

    let line = &sink.lines()[0];
    assert_eq!(line.matches(r#"$"{\"k\":\"v\"}"$"#).count(), 2);
}

#[tokio::test]
async fn error_status_marks_span() {
    let (app, sink, reporter) = traced_app(HttpTraceConfig::default());
    let (headers, _) = common::traced_headers();

    let mut req = request("GET", "/missing").body(Body::empty()).unwrap();
    req.headers_mut().extend(headers);
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(sink.lines()[0].contains(" 404 "));
    assert!(reporter.spans()[0].is_error);
}

#[tokio::test]
async fn loopback_client_is_not_logged() {
    let (app, sink, _) = traced_app(HttpTraceConfig::default());

    let mut req = Request::builder().uri("/ping").body(Body::empty()).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo("127.0.0.1:51000".parse::<SocketAddr>().unwrap()));
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(sink.lines().is_empty());
}

#[tokio::test]
async fn forwarded_loopback_from_remote_socket_is_logged() {
    let (app, sink, _) = traced_app(HttpTraceConfig::default());

    let mut req = Request::builder()
        .uri("/ping")
        .header("x-forwarded-for", "127.0.0.1")
        .body(Body::empty())
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo("203.0.113.77:4444".parse::<SocketAddr>().unwrap()));
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" 127.0.0.1 GET /ping "));
}

#[tokio::test]
async fn filtered_path_bypasses_tracing_and_logging() {
    let (app, sink, reporter) = traced_app(HttpTraceConfig {
        filter_paths: vec!["/health".into()],
        ..HttpTraceConfig::default()
    });
    let (headers, _) = common::traced_headers();

    let mut req = request("GET", "/health").body(Body::empty()).unwrap();
    req.headers_mut().extend(headers);
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(body_text(response).await, "ok");
    assert!(sink.lines().is_empty());
    assert!(reporter.spans().is_empty());
}

#[tokio::test]
async fn panic_is_logged_once_at_error_and_resumed() {
    let all = MemorySink::new();
    let errors = MemorySink::new();
    let logger = Logger::builder(common::quiet_config(LogType::Access))
        .memory_sink(all.clone())
        .level_memory_sink(LogLevel::Error, errors.clone())
        .build()
        .unwrap();
    let (tracer, reporter) = common::memory_tracer();
    let app = app(Arc::new(logger), Some(tracer), HttpTraceConfig::default());
    let (headers, _) = common::traced_headers();

    let mut req = request("GET", "/boom").body(Body::empty()).unwrap();
    req.headers_mut().extend(headers);
    let joined = tokio::spawn(app.oneshot(req)).await;

    assert!(joined.unwrap_err().is_panic());

    let lines = errors.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" 500 "));
    assert!(lines[0].contains("handler exploded"));
    assert_eq!(all.lines().len(), 1);

    let spans = reporter.spans();
    assert_eq!(spans.len(), 1);
    assert!(spans[0].is_error);
}

#[tokio::test]
async fn union_records_carry_extra_fields() {
    let (logger, sink) = common::memory_logger(LogType::Union);
    let (tracer, _) = common::memory_tracer();
    let app = app(logger, Some(tracer), HttpTraceConfig::default());
    let (headers, upstream) = common::traced_headers();

    let mut req = request("GET", "/ping").body(Body::empty()).unwrap();
    req.headers_mut().extend(headers);
    app.oneshot(req).await.unwrap();

    let line = &sink.lines()[0];
    assert!(line.contains(&format!("trace_id={}", upstream.trace_id)));
    assert!(line.contains(" span_id="));
}

#[tokio::test]
async fn custom_operation_names_the_span() {
    let (logger, _) = common::memory_logger(LogType::Access);
    let (tracer, reporter) = common::memory_tracer();
    let app = Router::new()
        .route("/ping", get(|| async { "pong" }))
        .layer(
            AccessLogLayer::new(logger, Some(tracer), HttpTraceConfig::default())
                .with_operation(|_, uri| format!("http:{}", uri.path())),
        );
    let (headers, _) = common::traced_headers();

    let mut req = request("GET", "/ping").body(Body::empty()).unwrap();
    req.headers_mut().extend(headers);
    app.oneshot(req).await.unwrap();

    assert_eq!(reporter.spans()[0].operation, "http:/ping");
}
