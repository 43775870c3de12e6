//! Wire encoding of [`SpanContext`].
//!
//! Primary header value, seven `-` separated fields:
//!
//! ```text
//! <sampled 0|1>-<trace hex32>-<segment hex16>-<span hex16>-<parent segment hex16 | "">-<parent span hex16 | "">-<base64(parent endpoint)>
//! ```
//!
//! Correlation header value: `base64(key):base64(value)` pairs joined by `,`.
//! Standard base64 never produces `-`, `:` or `,`, so user strings cannot
//! collide with the delimiters.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::propagation::{PropagationError, SegmentId, SpanContext, SpanId};

const FIELD_SEPARATOR: char = '-';
const FIELD_COUNT: usize = 7;

/// Encode the primary header value.
pub fn encode(ctx: &SpanContext) -> String {
    let parent_segment = ctx
        .parent_segment_id
        .map(|id| id.to_string())
        .unwrap_or_default();
    let parent_span = ctx
        .parent_span_id
        .map(|id| id.to_string())
        .unwrap_or_default();

    format!(
        "{}-{}-{}-{}-{}-{}-{}",
        if ctx.sampled { 1 } else { 0 },
        ctx.trace_id,
        ctx.segment_id,
        ctx.span_id,
        parent_segment,
        parent_span,
        STANDARD.encode(ctx.parent_endpoint.as_bytes()),
    )
}

/// Decode a primary header value. The correlation map is left empty.
pub fn decode(value: &str) -> Result<SpanContext, PropagationError> {
    let fields: Vec<&str> = value.trim().split(FIELD_SEPARATOR).collect();
    if fields.len() != FIELD_COUNT {
        return Err(PropagationError::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let sampled = match fields[0] {
        "1" => true,
        "0" => false,
        other => return Err(PropagationError::InvalidSampleFlag(other.to_string())),
    };

    let parent_segment_id = optional_id::<SegmentId>(fields[4])?;
    let parent_span_id = optional_id::<SpanId>(fields[5])?;
    if parent_segment_id.is_some() != parent_span_id.is_some() {
        return Err(PropagationError::HalfParent);
    }

    Ok(SpanContext {
        sampled,
        trace_id: fields[1].parse()?,
        segment_id: fields[2].parse()?,
        span_id: fields[3].parse()?,
        parent_segment_id,
        parent_span_id,
        parent_endpoint: decode_text(fields[6])?,
        correlation: BTreeMap::new(),
    })
}

fn optional_id<T>(value: &str) -> Result<Option<T>, PropagationError>
where
    T: std::str::FromStr<Err = PropagationError>,
{
    if value.is_empty() {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

fn decode_text(value: &str) -> Result<String, PropagationError> {
    let bytes = STANDARD.decode(value)?;
    Ok(String::from_utf8(bytes)?)
}

/// Encode the correlation header value.
pub fn encode_correlation(correlation: &BTreeMap<String, String>) -> String {
    correlation
        .iter()
        .map(|(k, v)| format!("{}:{}", STANDARD.encode(k), STANDARD.encode(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a correlation header value.
pub fn decode_correlation(value: &str) -> Result<BTreeMap<String, String>, PropagationError> {
    let mut correlation = BTreeMap::new();
    for pair in value.split(',').filter(|p| !p.is_empty()) {
        let (key, val) = pair
            .split_once(':')
            .ok_or_else(|| PropagationError::MalformedCorrelation(pair.to_string()))?;
        correlation.insert(decode_text(key)?, decode_text(val)?);
    }
    Ok(correlation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::TraceId;

    fn sample() -> SpanContext {
        SpanContext {
            trace_id: "744ba40615ac6737263c10f1255eac36".parse().unwrap(),
            segment_id: SegmentId::from_u64(0x1111),
            span_id: "a221978841e89dac".parse().unwrap(),
            parent_segment_id: Some(SegmentId::from_u64(0x2222)),
            parent_span_id: Some(SpanId::from_u64(0x3333)),
            sampled: true,
            parent_endpoint: "/grpc.testing.TestService/Ping".to_string(),
            correlation: BTreeMap::new(),
        }
    }

    #[test]
    fn encode_layout() {
        let encoded = encode(&sample());
        assert!(encoded.starts_with(
            "1-744ba40615ac6737263c10f1255eac36-0000000000001111-a221978841e89dac-0000000000002222-0000000000003333-"
        ));
    }

    #[test]
    fn decode_inverts_encode() {
        let ctx = sample();
        assert_eq!(decode(&encode(&ctx)).unwrap(), ctx);
    }

    #[test]
    fn root_context_roundtrips_with_empty_parents() {
        let mut ctx = SpanContext::new_root("GET /ping");
        ctx.sampled = false;
        let encoded = encode(&ctx);
        assert!(encoded.contains("--"));
        assert_eq!(decode(&encoded).unwrap(), ctx);
    }

    #[test]
    fn endpoint_with_delimiters_is_escaped() {
        let mut ctx = sample();
        ctx.parent_endpoint = "a-b:c,d é".to_string();
        assert_eq!(decode(&encode(&ctx)).unwrap(), ctx);
    }

    #[test]
    fn decode_rejects_malformed_values() {
        assert!(matches!(decode(""), Err(PropagationError::FieldCount { .. })));
        assert!(matches!(
            decode("2-744ba40615ac6737263c10f1255eac36-0000000000001111-a221978841e89dac---"),
            Err(PropagationError::InvalidSampleFlag(_))
        ));
        assert!(decode("1-xyz-0000000000001111-a221978841e89dac---").is_err());
        assert!(matches!(
            decode("1-744ba40615ac6737263c10f1255eac36-0000000000001111-a221978841e89dac-0000000000002222--"),
            Err(PropagationError::HalfParent)
        ));
        assert!(decode("1-744ba40615ac6737263c10f1255eac36-0000000000001111-a221978841e89dac---%%%").is_err());
    }

    #[test]
    fn correlation_roundtrip() {
        let mut correlation = BTreeMap::new();
        correlation.insert("tenant".to_string(), "a,b:c".to_string());
        correlation.insert("user".to_string(), String::new());

        let encoded = encode_correlation(&correlation);
        assert_eq!(decode_correlation(&encoded).unwrap(), correlation);
        assert!(decode_correlation("").unwrap().is_empty());
        assert!(decode_correlation("no-colon").is_err());
    }

    #[test]
    fn trace_id_survives_wire() {
        let ctx = SpanContext {
            trace_id: TraceId::from_u128(1),
            ..sample()
        };
        let decoded = decode(&encode(&ctx)).unwrap();
        assert_eq!(decoded.trace_id.to_string(), "00000000000000000000000000000001");
    }
}
