//! Payload capture: turning request and response values into bytes.

use std::any::Any;

use serde::Serialize;

/// Errors raised while marshaling a payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Values that can be captured into a record.
pub trait MarshalPayload {
    fn marshal_payload(&self) -> Result<Vec<u8>, PayloadError>;
}

impl<T: Serialize + ?Sized> MarshalPayload for T {
    fn marshal_payload(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Marshal `value`, degrading to an empty payload on failure.
pub fn marshal_or_empty<T: MarshalPayload + ?Sized>(value: &T) -> Vec<u8> {
    match value.marshal_payload() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Payload could not be captured");
            Vec::new()
        }
    }
}

/// Message carried by a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Panic payload serialized as a JSON string.
pub fn panic_payload(payload: &(dyn Any + Send)) -> Vec<u8> {
    marshal_or_empty(&panic_message(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;

    #[derive(Serialize)]
    struct Ping {
        message: String,
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refused"))
        }
    }

    #[test]
    fn serializable_values_marshal_to_json() {
        let ping = Ping {
            message: "<hi>".into(),
        };
        assert_eq!(marshal_or_empty(&ping), br#"{"message":"<hi>"}"#);
    }

    #[test]
    fn failures_degrade_to_empty() {
        assert!(Unserializable.marshal_payload().is_err());
        assert!(marshal_or_empty(&Unserializable).is_empty());
    }

    #[test]
    fn panic_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_payload(boxed.as_ref()), br#""owned""#);

        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
