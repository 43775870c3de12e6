//! Concurrent requests against a live server.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use access_trace::config::HttpTraceConfig;
use access_trace::http::AccessLogLayer;
use access_trace::logging::LogType;
use axum::routing::post;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

mod common;

async fn start_server() -> (SocketAddr, access_trace::logging::MemorySink) {
    let (logger, sink) = common::memory_logger(LogType::Access);
    let (tracer, _) = common::memory_tracer();
    let app = Router::new()
        .route("/echo", post(|body: String| async move { body }))
        .layer(AccessLogLayer::new(logger, Some(tracer), HttpTraceConfig::default()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    (addr, sink)
}

/// Source address that is local but not 127.0.0.1.
const REMOTE_SOURCE: &str = "127.0.0.2:0";

async fn connect(addr: SocketAddr, from_localhost: bool) -> TcpStream {
    if from_localhost {
        return TcpStream::connect(addr).await.unwrap();
    }
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind(REMOTE_SOURCE.parse().unwrap()).unwrap();
    socket.connect(addr).await.unwrap()
}

/// One HTTP/1.1 request over a fresh connection; returns the raw response.
async fn send(addr: SocketAddr, from_localhost: bool, forwarded_for: Option<&str>, body: &str) -> String {
    let mut socket = connect(addr, from_localhost).await;
    let forwarded = forwarded_for
        .map(|ip| format!("X-Forwarded-For: {ip}\r\n"))
        .unwrap_or_default();
    let request = format!(
        "POST /echo HTTP/1.1\r\nHost: {addr}\r\n{forwarded}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    socket.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn concurrent_requests_yield_one_line_each() {
    let (addr, sink) = start_server().await;

    // 1. Fire 100 requests at once
    let mut tasks = Vec::new();
    for i in 0..100 {
        tasks.push(tokio::spawn(async move {
            send(addr, false, Some("10.0.0.5"), &format!("request-{i}")).await
        }));
    }
    for task in tasks {
        let response = task.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
    }

    // 2. Records are written before the response completes
    let lines = sink.lines();
    assert_eq!(lines.len(), 100);

    // 3. Every line is whole and every request appears once
    let mut seen = HashSet::new();
    for line in &lines {
        assert!(line.contains("10.0.0.5 POST /echo "));
        assert!(line.ends_with(" - -"));
        let payload = line
            .split("$\"")
            .nth(1)
            .and_then(|rest| rest.split("\"$").next())
            .unwrap();
        assert!(seen.insert(payload.to_string()));
    }
    assert_eq!(seen.len(), 100);
}

#[tokio::test]
async fn loopback_connection_is_not_logged() {
    let (addr, sink) = start_server().await;

    let response = send(addr, true, None, "local").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("local"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(sink.lines().is_empty());
}

#[tokio::test]
async fn local_health_check_is_decided_by_socket() {
    let (addr, sink) = start_server().await;

    // 1. Forwarded remote client through a 127.0.0.1 socket
    send(addr, true, Some("203.0.113.9"), "via-localhost").await;
    // 2. Other socket claiming to be 127.0.0.1
    send(addr, false, Some("127.0.0.1"), "spoofed").await;

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("127.0.0.1 POST /echo $\"spoofed\"$ HTTP/1.1 200 "));
}
