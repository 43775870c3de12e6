//! Observability subsystem shared by the interceptors.
//!
//! # Data Flow
//! ```text
//! Interceptor (HTTP layer / RPC server)
//!     → completion.rs (end span, one record per request)
//!     → metrics.rs (counters, histograms)
//!     → record + logging (access line)
//! ```
//!
//! # Design Decisions
//! - Completion is a drop guard so cancelled requests still produce a record
//! - Metrics are cheap facade calls; no exporter is installed here

pub mod completion;
pub mod metrics;

pub use completion::{Completion, Outcome};
