//! Trace identity carried across process boundaries.
//!
//! # Responsibilities
//! - Define trace, segment and span identifiers
//! - Derive root, child and remote-continuation contexts
//! - Expose trace/span ids of an optional context for log correlation
//!
//! # Design Decisions
//! - Ids are fixed-width integers rendered as lowercase hex
//! - A context without parent span and parent segment is a root
//! - Correlation entries are opaque and copied verbatim to children

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::propagation::PropagationError;

/// 128-bit identifier shared by every span of one logical request chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TraceId(u128);

/// 64-bit identifier of one span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SpanId(u64);

/// 64-bit identifier of the group of spans one process records for a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SegmentId(u64);

impl TraceId {
    /// Generate a new random trace id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().as_u128())
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }
}

/// Draw a non-zero 64-bit id.
fn random_nonzero() -> u64 {
    let mut rng = rand::thread_rng();
    loop {
        let value: u64 = rng.gen();
        if value != 0 {
            return value;
        }
    }
}

impl SpanId {
    /// Generate a new random span id.
    pub fn generate() -> Self {
        Self(random_nonzero())
    }

    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl SegmentId {
    /// Generate a new random segment id.
    pub fn generate() -> Self {
        Self(random_nonzero())
    }

    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Parse exactly `width` hex digits.
fn parse_hex(value: &str, width: usize, field: &'static str) -> Result<u128, PropagationError> {
    if value.len() != width || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PropagationError::InvalidId {
            field,
            value: value.to_string(),
        });
    }
    u128::from_str_radix(value, 16).map_err(|_| PropagationError::InvalidId {
        field,
        value: value.to_string(),
    })
}

impl FromStr for TraceId {
    type Err = PropagationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, 32, "trace_id").map(Self)
    }
}

impl FromStr for SpanId {
    type Err = PropagationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, 16, "span_id").map(|v| Self(v as u64))
    }
}

impl FromStr for SegmentId {
    type Err = PropagationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, 16, "segment_id").map(|v| Self(v as u64))
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for String {
                fn from(id: $ty) -> String {
                    id.to_string()
                }
            }

            impl TryFrom<String> for $ty {
                type Error = PropagationError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }
        )*
    };
}

string_conversions!(TraceId, SpanId, SegmentId);

/// Identity of one trace hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub segment_id: SegmentId,
    pub span_id: SpanId,
    pub parent_segment_id: Option<SegmentId>,
    pub parent_span_id: Option<SpanId>,
    pub sampled: bool,
    /// Operation that issued the call. In contexts created by this process,
    /// the entry operation of the segment, which downstream hops receive.
    pub parent_endpoint: String,
    pub correlation: BTreeMap<String, String>,
}

impl SpanContext {
    /// Start a new trace.
    pub fn new_root(endpoint: impl Into<String>) -> Self {
        Self {
            trace_id: TraceId::generate(),
            segment_id: SegmentId::generate(),
            span_id: SpanId::generate(),
            parent_segment_id: None,
            parent_span_id: None,
            sampled: true,
            parent_endpoint: endpoint.into(),
            correlation: BTreeMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none() && self.parent_segment_id.is_none()
    }

    /// Child span recorded by the same process (same segment).
    pub fn child(&self, parent_endpoint: impl Into<String>) -> Self {
        Self {
            trace_id: self.trace_id,
            segment_id: self.segment_id,
            span_id: SpanId::generate(),
            parent_segment_id: Some(self.segment_id),
            parent_span_id: Some(self.span_id),
            sampled: self.sampled,
            parent_endpoint: parent_endpoint.into(),
            correlation: self.correlation.clone(),
        }
    }

    /// Entry span of this process continuing a context received from a peer.
    ///
    /// `entry_operation` becomes the endpoint announced to the next hop.
    pub fn continue_remote(&self, entry_operation: impl Into<String>) -> Self {
        Self {
            segment_id: SegmentId::generate(),
            ..self.child(entry_operation)
        }
    }
}

/// Trace id of an optional context, empty when there is none.
pub fn trace_id_of(ctx: Option<&SpanContext>) -> String {
    ctx.map(|c| c.trace_id.to_string()).unwrap_or_default()
}

/// Span id of an optional context, empty when there is none.
pub fn span_id_of(ctx: Option<&SpanContext>) -> String {
    ctx.map(|c| c.span_id.to_string()).unwrap_or_default()
}
