//! Span factory bound to one service and one reporter.

use std::sync::Arc;

use crate::propagation::{self, Extractor, SpanContext};
use crate::trace::{NoopReporter, Span, SpanKind, SpanReporter};

/// Creates entry and exit spans.
///
/// Cheap to clone; every clone reports to the same reporter.
#[derive(Clone)]
pub struct Tracer {
    service: Arc<str>,
    reporter: Arc<dyn SpanReporter>,
}

impl Tracer {
    pub fn new(service: impl Into<Arc<str>>, reporter: Arc<dyn SpanReporter>) -> Self {
        Self {
            service: service.into(),
            reporter,
        }
    }

    /// Tracer whose spans go nowhere.
    pub fn noop(service: impl Into<Arc<str>>) -> Self {
        Self::new(service, Arc::new(NoopReporter))
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Entry span continuing the context found in `carrier`.
    ///
    /// Returns `None` when the carrier holds no valid trace header; the
    /// request is then served unspanned. The caller's endpoint is kept as the
    /// span's `parent_endpoint`; the context announces `operation` downstream.
    pub fn create_entry_span<E>(&self, operation: &str, carrier: &E) -> Option<Span>
    where
        E: Extractor + ?Sized,
    {
        let remote = propagation::extract(carrier)?;
        let mut span = Span::start(
            operation,
            SpanKind::Entry,
            remote.continue_remote(operation),
            self.reporter.clone(),
        );
        span.set_parent_endpoint(remote.parent_endpoint);
        Some(span)
    }

    /// Exit span for an outbound call to `peer`.
    ///
    /// A child of `parent` when given, otherwise the root of a new trace.
    pub fn create_exit_span(
        &self,
        operation: &str,
        parent: Option<&SpanContext>,
        peer: impl Into<String>,
    ) -> Span {
        let context = match parent {
            Some(parent) => parent.child(parent.parent_endpoint.clone()),
            None => SpanContext::new_root(operation),
        };
        let mut span = Span::start(operation, SpanKind::Exit, context, self.reporter.clone());
        span.set_peer(peer);
        span
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer").field("service", &self.service).finish()
    }
}
