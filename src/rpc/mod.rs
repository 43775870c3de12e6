//! RPC interceptors.
//!
//! # Data Flow
//! ```text
//! Inbound call:
//!     RequestContext (peer, Metadata)
//!     → server.rs (extract sw8 → entry span → handler → access record)
//!
//! Outbound call:
//!     parent SpanContext
//!     → client.rs (exit span → inject into Metadata → invoker → request record)
//! ```
//!
//! # Design Decisions
//! - Transport-agnostic: handlers and invokers are plain async closures, so
//!   any RPC stack can adapt its unary hooks to them
//! - Results always pass through unchanged

pub mod client;
pub mod metadata;
pub mod server;
pub mod status;

pub use client::ClientInterceptor;
pub use metadata::Metadata;
pub use server::{RequestContext, ServerInterceptor, HTTP2_PROTOCOL};
pub use status::{code_of, Code, Status};
