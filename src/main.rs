//! Demo server for the access-trace pipeline.
//!
//! ```text
//!   client ──HTTP──▶ AccessLogLayer ──▶ /ping, /echo, /hello
//!                                            │
//!                                            ▼ (in-process RPC)
//!                            ClientInterceptor ──sw8──▶ ServerInterceptor ──▶ greeter
//! ```
//!
//! Every request produces one access record; `/hello` additionally produces
//! a request record for the outbound call and an access record for the
//! RPC it serves.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Extension, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use access_trace::config::{load_config, ObservabilityConfig, ReporterKind};
use access_trace::http::AccessLogLayer;
use access_trace::logging::Logger;
use access_trace::propagation::SpanContext;
use access_trace::rpc::{ClientInterceptor, Metadata, RequestContext, ServerInterceptor, Status};
use access_trace::trace::{LogReporter, Tracer};

#[derive(Debug, Parser)]
#[command(name = "access-trace", version, about = "Access logging demo server")]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Clone)]
struct AppState {
    client: ClientInterceptor,
    greeter: ServerInterceptor,
}

#[derive(Debug, Serialize, Deserialize)]
struct HelloRequest {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct HelloReply {
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "access_trace=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ObservabilityConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        service = %config.logger.service_name,
        log_type = %config.logger.log_type,
        leveled = config.logger.leveled_routing,
        "Configuration loaded"
    );

    let logger = Arc::new(Logger::builder(config.logger.clone()).build()?);
    let tracer = config.tracer.enabled.then(|| match config.tracer.reporter {
        ReporterKind::Log => Tracer::new(
            config.logger.service_name.as_str(),
            Arc::new(LogReporter),
        ),
        ReporterKind::Noop => Tracer::noop(config.logger.service_name.as_str()),
    });

    let state = AppState {
        client: ClientInterceptor::new(
            tracer
                .clone()
                .unwrap_or_else(|| Tracer::noop(config.logger.service_name.as_str())),
            Some(logger.clone()),
        ),
        greeter: ServerInterceptor::new(logger.clone(), tracer.clone(), config.rpc.clone()),
    };

    let app = Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/echo", post(echo))
        .route("/hello", post(hello))
        .with_state(state)
        .layer(AccessLogLayer::new(logger, tracer, config.http.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.listener.request_timeout_secs,
        )));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn ping() -> &'static str {
    "pong"
}

async fn health() -> &'static str {
    "ok"
}

async fn echo(body: String) -> String {
    body
}

/// Calls the in-process greeter through both RPC interceptors.
async fn hello(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    span: Option<Extension<SpanContext>>,
    Json(req): Json<HelloRequest>,
) -> Result<Json<HelloReply>, String> {
    let parent = span.map(|Extension(ctx)| ctx);
    let greeter = state.greeter.clone();
    let name = req.name.clone();

    let reply = state
        .client
        .intercept(
            parent.as_ref(),
            "/demo.Greeter/SayHello",
            "in-process",
            Metadata::new(),
            &req,
            |metadata| async move {
                let ctx = RequestContext::new(Some(peer), metadata);
                greeter
                    .intercept(ctx, "/demo.Greeter/SayHello", HelloRequest { name }, |_, req: HelloRequest| async move {
                        Ok::<_, Status>(HelloReply {
                            message: format!("hello, {}", req.name),
                        })
                    })
                    .await
            },
        )
        .await
        .map_err(|status| status.to_string())?;

    Ok(Json(reply))
}
