//! Access logging and trace propagation for HTTP and RPC services.

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod net;
pub mod observability;
pub mod propagation;
pub mod record;
pub mod rpc;
pub mod trace;

pub use config::schema::ObservabilityConfig;
pub use error::TracedError;
pub use http::AccessLogLayer;
pub use logging::{Logger, LoggerBuilder};
pub use propagation::SpanContext;
pub use rpc::{ClientInterceptor, ServerInterceptor};
pub use trace::Tracer;
