//! Unary RPC client interceptor.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::logging::Logger;
use crate::propagation::{self, SpanContext};
use crate::record::{marshal_or_empty, MarshalPayload, RequestLog};
use crate::rpc::{Code, Metadata, Status};
use crate::trace::{SpanLayer, Tracer, COMPONENT_RPC_CLIENT, REQUEST_TAG, RESPONSE_TAG};

/// Traces outbound calls and propagates the trace to the callee.
#[derive(Debug, Clone)]
pub struct ClientInterceptor {
    tracer: Tracer,
    logger: Option<Arc<Logger>>,
}

impl ClientInterceptor {
    pub fn new(tracer: Tracer, logger: Option<Arc<Logger>>) -> Self {
        Self { tracer, logger }
    }

    /// Call `invoker` with `metadata` extended by the exit span's context.
    ///
    /// The exit span is a child of `parent` when given, else a new trace.
    /// The call's result is returned unmodified.
    pub async fn intercept<Req, Resp, I, Fut>(
        &self,
        parent: Option<&SpanContext>,
        method: &str,
        peer: &str,
        mut metadata: Metadata,
        req: &Req,
        invoker: I,
    ) -> Result<Resp, Status>
    where
        Req: MarshalPayload + ?Sized,
        Resp: MarshalPayload,
        I: FnOnce(Metadata) -> Fut,
        Fut: Future<Output = Result<Resp, Status>>,
    {
        let mut span = self.tracer.create_exit_span(method, parent, peer);
        span.set_component(COMPONENT_RPC_CLIENT);
        span.set_layer(SpanLayer::RpcFramework);
        propagation::inject(span.context(), &mut metadata);

        let payload = marshal_or_empty(req);
        span.log(REQUEST_TAG, String::from_utf8_lossy(&payload));

        let started = Instant::now();
        let result = invoker(metadata).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (response, description) = match &result {
            Ok(resp) => {
                let response = marshal_or_empty(resp);
                span.log(RESPONSE_TAG, String::from_utf8_lossy(&response));
                (response, Code::Ok.to_string())
            }
            Err(status) => {
                span.error(RESPONSE_TAG, status.to_string());
                (Vec::new(), status.to_string())
            }
        };

        if let Some(logger) = &self.logger {
            RequestLog {
                method: method.to_string(),
                request: peer.to_string(),
                status_description: description,
                duration_ms,
                payload,
                response,
            }
            .log_with_context(logger, Some(span.context()));
        }
        span.end();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use crate::logging::MemorySink;
    use crate::propagation::{Extractor, HEADER};
    use crate::trace::{MemoryReporter, SpanKind};

    fn client() -> (ClientInterceptor, MemorySink, Arc<MemoryReporter>) {
        let sink = MemorySink::new();
        let logger = Logger::builder(LoggerConfig {
            enable_stdout: false,
            ..LoggerConfig::default()
        })
        .memory_sink(sink.clone())
        .build()
        .unwrap();
        let reporter = Arc::new(MemoryReporter::default());
        (
            ClientInterceptor::new(Tracer::new("svc", reporter.clone()), Some(Arc::new(logger))),
            sink,
            reporter,
        )
    }

    #[tokio::test]
    async fn injects_child_context() {
        let (client, sink, reporter) = client();
        let parent = SpanContext::new_root("/api");

        let seen = client
            .intercept(Some(&parent), "/svc.Echo/Ping", "10.0.0.7:9000", Metadata::new(), "hi", |md| async move {
                Ok::<_, Status>(propagation::extract(&md).unwrap())
            })
            .await
            .unwrap();

        assert_eq!(seen.trace_id, parent.trace_id);
        assert_eq!(seen.parent_span_id, Some(parent.span_id));

        let spans = reporter.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, SpanKind::Exit);
        assert_eq!(spans[0].peer.as_deref(), Some("10.0.0.7:9000"));

        let line = &sink.lines()[0];
        assert!(line.contains("/svc.Echo/Ping "));
        assert!(line.contains(&parent.trace_id.to_string()));
    }

    #[tokio::test]
    async fn error_is_returned_unmodified_and_marks_span() {
        let (client, sink, reporter) = client();
        let result: Result<(), Status> = client
            .intercept(None, "/svc.Echo/Ping", "peer", Metadata::new(), &(), |md| async move {
                assert!(Extractor::get(&md, HEADER).is_some());
                Err(Status::new(Code::Unavailable, "down"))
            })
            .await;

        assert_eq!(result.unwrap_err(), Status::new(Code::Unavailable, "down"));
        assert!(reporter.spans()[0].is_error);
        assert!(sink.lines()[0].contains("code = Unavailable"));
    }

    #[tokio::test]
    async fn cancelled_call_still_reports_span() {
        let (client, sink, reporter) = client();
        let call = client.intercept(None, "/svc.Echo/Slow", "peer", Metadata::new(), &(), |_| {
            futures_util::future::pending::<Result<(), Status>>()
        });
        let _ = tokio::time::timeout(std::time::Duration::from_millis(5), call).await;

        assert_eq!(reporter.spans().len(), 1);
        assert!(sink.lines().is_empty());
    }
}
