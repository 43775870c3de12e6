//! HTTP access-log middleware.
//!
//! # Responsibilities
//! - Continue the caller's trace in an entry span for every request
//! - Buffer request and response bodies, forwarding equivalent bodies
//! - Catch handler panics, record them, then resume unwinding
//! - Emit one access record per request
//!
//! # Design Decisions
//! - Plain tower `Layer`/`Service`, usable with any axum `Router`
//! - The entry span context is inserted into request extensions for handlers
//!   and the client interceptor
//! - Bodies are buffered in full; streaming endpoints belong in `filter_paths`

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use http_body_util::BodyExt;
use tower::{Layer, Service};

use crate::config::HttpTraceConfig;
use crate::logging::{LogLevel, Logger};
use crate::net::{client_ip, is_local_health_check, socket_addr};
use crate::observability::{metrics, Completion, Outcome};
use crate::record::{panic_message, panic_payload, AccessLog, Transport};
use crate::trace::{
    Span, SpanLayer, Tracer, COMPONENT_HTTP_SERVER, REQUEST_TAG, RESPONSE_TAG, TAG_HTTP_METHOD,
    TAG_URL,
};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Names the entry span of a request.
pub type OperationFn = Arc<dyn Fn(&Method, &Uri) -> String + Send + Sync>;

/// Status recorded for requests dropped before a response.
pub const STATUS_CLIENT_CLOSED: u16 = 499;

struct Shared {
    logger: Arc<Logger>,
    tracer: Option<Tracer>,
    config: HttpTraceConfig,
    operation: OperationFn,
}

/// Layer wrapping services with [`AccessLogService`].
#[derive(Clone)]
pub struct AccessLogLayer {
    shared: Arc<Shared>,
}

impl AccessLogLayer {
    /// Spans are created only when `tracer` is set and the request carries a
    /// valid trace header.
    pub fn new(logger: Arc<Logger>, tracer: Option<Tracer>, config: HttpTraceConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                logger,
                tracer,
                config,
                operation: Arc::new(default_operation),
            }),
        }
    }

    /// Override the entry span name, `"{METHOD} {path}"` by default.
    pub fn with_operation<F>(self, operation: F) -> Self
    where
        F: Fn(&Method, &Uri) -> String + Send + Sync + 'static,
    {
        let shared = &self.shared;
        Self {
            shared: Arc::new(Shared {
                logger: shared.logger.clone(),
                tracer: shared.tracer.clone(),
                config: shared.config.clone(),
                operation: Arc::new(operation),
            }),
        }
    }
}

fn default_operation(method: &Method, uri: &Uri) -> String {
    format!("{} {}", method, uri.path())
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService {
            inner,
            shared: self.shared.clone(),
        }
    }
}

/// Service recording an access record for every request.
#[derive(Clone)]
pub struct AccessLogService<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S> Service<Request<Body>> for AccessLogService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // The readied service handles this request; the clone serves the next.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let shared = self.shared.clone();
        Box::pin(async move { shared.handle(inner, req).await })
    }
}

impl Shared {
    async fn handle<S>(&self, mut inner: S, req: Request<Body>) -> Result<Response, S::Error>
    where
        S: Service<Request<Body>, Response = Response> + Send + 'static,
        S::Future: Send + 'static,
    {
        if self
            .config
            .filter_paths
            .iter()
            .any(|path| path == req.uri().path())
        {
            return inner.call(req).await;
        }

        let emit_record = !is_local_health_check(socket_addr(&req));
        let record = AccessLog {
            client_ip: client_ip(&req),
            method: req.method().to_string(),
            request: req.uri().path().to_string(),
            protocol: format!("{:?}", req.version()),
            agent: req
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            transport: Transport::Http,
            ..AccessLog::default()
        };
        let span = self.entry_span(&req);
        let mut completion = Completion::start(
            self.logger.clone(),
            record,
            span,
            emit_record,
            Outcome::Http(STATUS_CLIENT_CLOSED),
        );

        let (mut parts, body) = req.into_parts();
        let payload = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                if let Some(span) = completion.span_mut() {
                    span.error(REQUEST_TAG, e.to_string());
                }
                completion.finish(
                    Outcome::Http(StatusCode::BAD_REQUEST.as_u16()),
                    Vec::new(),
                    LogLevel::Info,
                );
                return Ok((StatusCode::BAD_REQUEST, "failed to read request body").into_response());
            }
        };

        completion.record_mut().payload = payload.to_vec();
        if let Some(span) = completion.span_mut() {
            span.log(REQUEST_TAG, String::from_utf8_lossy(&payload));
        }
        if let Some(ctx) = completion.context() {
            parts.extensions.insert(ctx.clone());
        }
        let req = Request::from_parts(parts, Body::from(payload));

        let outcome = AssertUnwindSafe(async move { inner.call(req).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => {
                let (parts, body) = response.into_parts();
                let bytes = match body.collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read response body");
                        Bytes::new()
                    }
                };
                let status = parts.status.as_u16();
                if let Some(span) = completion.span_mut() {
                    let body = String::from_utf8_lossy(&bytes).into_owned();
                    if status >= 400 {
                        span.error(RESPONSE_TAG, body);
                    } else {
                        span.log(RESPONSE_TAG, body);
                    }
                }
                completion.finish(Outcome::Http(status), bytes.to_vec(), LogLevel::Info);
                Ok(Response::from_parts(parts, Body::from(bytes)))
            }
            Ok(Err(e)) => {
                if let Some(span) = completion.span_mut() {
                    span.error(RESPONSE_TAG, "inner service failed");
                }
                completion.finish(
                    Outcome::Http(StatusCode::INTERNAL_SERVER_ERROR.as_u16()),
                    Vec::new(),
                    LogLevel::Error,
                );
                Err(e)
            }
            Err(panic_value) => {
                let message = panic_message(panic_value.as_ref());
                tracing::error!(panic = %message, "HTTP handler panicked");
                metrics::record_panic(Transport::Http);
                if let Some(span) = completion.span_mut() {
                    span.error(RESPONSE_TAG, message);
                }
                completion.finish(
                    Outcome::Http(StatusCode::INTERNAL_SERVER_ERROR.as_u16()),
                    panic_payload(panic_value.as_ref()),
                    LogLevel::Error,
                );
                panic::resume_unwind(panic_value)
            }
        }
    }

    fn entry_span(&self, req: &Request<Body>) -> Option<Span> {
        let tracer = self.tracer.as_ref()?;
        let operation = (self.operation)(req.method(), req.uri());
        let mut span = tracer.create_entry_span(&operation, req.headers())?;

        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| req.uri().host())
            .unwrap_or_default();
        span.set_component(COMPONENT_HTTP_SERVER);
        span.set_layer(SpanLayer::Http);
        span.tag(TAG_HTTP_METHOD, req.method().as_str());
        span.tag(TAG_URL, format!("{host}{}", req.uri().path()));
        for (key, value) in &self.config.extra_tags {
            span.tag(key.clone(), value.clone());
        }
        Some(span)
    }
}
