//! Unary RPC server interceptor.
//!
//! # Responsibilities
//! - Continue the caller's trace in an entry span
//! - Capture request and response payloads
//! - Catch handler panics, record them, then resume unwinding
//! - Emit one access record per call
//!
//! # State Machine
//! ```text
//! Start → Extracted → Spanned → Handling → Completed ─┐
//!                                        └→ Panicked ─┴→ Logged → End
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;

use crate::config::RpcTraceConfig;
use crate::logging::{LogLevel, Logger};
use crate::net::{is_local_health_check, peer_ip};
use crate::observability::{metrics, Completion, Outcome};
use crate::propagation::SpanContext;
use crate::record::{
    marshal_or_empty, panic_message, panic_payload, AccessLog, MarshalPayload, Transport,
};
use crate::rpc::{code_of, Code, Metadata, Status};
use crate::trace::{SpanLayer, Tracer, COMPONENT_RPC_SERVER, REQUEST_TAG, RESPONSE_TAG};

/// Protocol printed in RPC access records.
pub const HTTP2_PROTOCOL: &str = "HTTP/2";

const USER_AGENT: &str = "user-agent";

/// What a handler sees of the call.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Remote address of the caller.
    pub peer: Option<SocketAddr>,
    /// Inbound metadata.
    pub metadata: Metadata,
    /// Entry span context; `None` for unspanned calls.
    pub span: Option<SpanContext>,
}

impl RequestContext {
    pub fn new(peer: Option<SocketAddr>, metadata: Metadata) -> Self {
        Self {
            peer,
            metadata,
            span: None,
        }
    }
}

/// Wraps unary handlers with tracing and access logging.
#[derive(Debug, Clone)]
pub struct ServerInterceptor {
    logger: Arc<Logger>,
    tracer: Option<Tracer>,
    config: RpcTraceConfig,
}

impl ServerInterceptor {
    pub fn new(logger: Arc<Logger>, tracer: Option<Tracer>, config: RpcTraceConfig) -> Self {
        Self {
            logger,
            tracer,
            config,
        }
    }

    /// Run `handler` for the call to `method`.
    ///
    /// The handler's result is returned unchanged. A panicking handler is
    /// recorded as `Internal` and the panic resumes once the record is out.
    pub async fn intercept<Req, Resp, H, Fut>(
        &self,
        mut ctx: RequestContext,
        method: &str,
        req: Req,
        handler: H,
    ) -> Result<Resp, Status>
    where
        Req: MarshalPayload,
        Resp: MarshalPayload,
        H: FnOnce(RequestContext, Req) -> Fut,
        Fut: Future<Output = Result<Resp, Status>>,
    {
        if self.config.filter_methods.iter().any(|m| m == method) {
            return handler(ctx, req).await;
        }

        // Marshaled up front: the handler takes ownership of the request.
        let payload = marshal_or_empty(&req);
        let client_ip = peer_ip(&ctx.metadata, ctx.peer);

        let span = self.tracer.as_ref().and_then(|tracer| {
            let mut span = tracer.create_entry_span(method, &ctx.metadata)?;
            span.set_component(COMPONENT_RPC_SERVER);
            span.set_layer(SpanLayer::RpcFramework);
            if let Some(peer) = ctx.peer {
                span.set_peer(peer.to_string());
            }
            for key in &self.config.report_tags {
                if let Some(value) = ctx.metadata.get(key) {
                    span.tag(key.clone(), value);
                }
            }
            span.log(REQUEST_TAG, String::from_utf8_lossy(&payload));
            Some(span)
        });
        ctx.span = span.as_ref().map(|s| s.context().clone());

        let emit_record = !is_local_health_check(ctx.peer);
        let record = AccessLog {
            agent: ctx.metadata.get(USER_AGENT).unwrap_or_default().to_string(),
            client_ip,
            request: method.to_string(),
            payload,
            protocol: HTTP2_PROTOCOL.to_string(),
            transport: Transport::Grpc,
            ..AccessLog::default()
        };
        let mut completion = Completion::start(
            self.logger.clone(),
            record,
            span,
            emit_record,
            Outcome::Grpc(Code::Canceled),
        );

        let outcome = AssertUnwindSafe(async move { handler(ctx, req).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(result) => {
                let response = match &result {
                    Ok(resp) => marshal_or_empty(resp),
                    Err(_) => Vec::new(),
                };
                if let Some(span) = completion.span_mut() {
                    match &result {
                        Ok(_) => span.log(RESPONSE_TAG, String::from_utf8_lossy(&response)),
                        Err(status) => span.error(RESPONSE_TAG, status.to_string()),
                    }
                }
                completion.finish(Outcome::Grpc(code_of(&result)), response, LogLevel::Info);
                result
            }
            Err(panic_value) => {
                let message = panic_message(panic_value.as_ref());
                tracing::error!(method, panic = %message, "RPC handler panicked");
                metrics::record_panic(Transport::Grpc);
                if let Some(span) = completion.span_mut() {
                    span.error(RESPONSE_TAG, message);
                }
                completion.finish(
                    Outcome::Grpc(Code::Internal),
                    panic_payload(panic_value.as_ref()),
                    LogLevel::Error,
                );
                panic::resume_unwind(panic_value)
            }
        }
    }
}
