//! Chat-completion request payload handling
//!
//! The body is relayed as opaque JSON. Only `messages` is inspected, and
//! `model`, `stream` and `stream_options` are filled in when the caller
//! leaves them out.

use serde_json::{json, Map, Value};

use crate::error::ProxyError;

/// Outbound payload ready to be sent upstream
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPayload {
    pub payload: Value,
    /// Number of entries in `messages`, when it is an array
    pub message_count: Option<usize>,
}

/// Parse an inbound body and build the outbound payload
///
/// Malformed JSON is an internal failure; a well-formed body that is not an
/// object, or lacks a `messages` array while `validate` is set, is a 400.
pub fn prepare_payload(
    raw: &[u8],
    default_model: &str,
    validate: bool,
) -> Result<PreparedPayload, ProxyError> {
    let body: Value = serde_json::from_slice(raw)?;

    let Value::Object(mut fields) = body else {
        return Err(if validate {
            ProxyError::missing_messages()
        } else {
            ProxyError::InvalidRequestBody("Request body must be a JSON object".to_string())
        });
    };

    let message_count = fields
        .get("messages")
        .and_then(Value::as_array)
        .map(Vec::len);

    if validate && message_count.is_none() {
        return Err(ProxyError::missing_messages());
    }

    apply_defaults(&mut fields, default_model);

    Ok(PreparedPayload {
        payload: Value::Object(fields),
        message_count,
    })
}

/// Insert defaults for absent keys; caller-supplied values always win
pub fn apply_defaults(fields: &mut Map<String, Value>, default_model: &str) {
    fields
        .entry("model")
        .or_insert_with(|| Value::String(default_model.to_string()));
    fields.entry("stream").or_insert(Value::Bool(true));
    fields
        .entry("stream_options")
        .or_insert_with(|| json!({ "include_usage": true }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const MODEL: &str = "bot-test";

    #[test]
    fn test_defaults_are_filled() {
        let prepared = prepare_payload(
            br#"{"messages":[{"role":"user","content":"hi"}]}"#,
            MODEL,
            true,
        )
        .unwrap();

        assert_eq!(prepared.message_count, Some(1));
        assert_eq!(
            prepared.payload,
            json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model": MODEL,
                "stream": true,
                "stream_options": {"include_usage": true}
            })
        );
    }

    #[test]
    fn test_caller_values_win() {
        let prepared = prepare_payload(
            br#"{"messages":[],"model":"custom","stream":false,"stream_options":{"include_usage":false},"temperature":0.2}"#,
            MODEL,
            true,
        )
        .unwrap();

        assert_eq!(prepared.payload["model"], "custom");
        assert_eq!(prepared.payload["stream"], false);
        assert_eq!(prepared.payload["stream_options"], json!({"include_usage": false}));
        assert_eq!(prepared.payload["temperature"], 0.2);
        assert_eq!(prepared.message_count, Some(0));
    }

    #[test]
    fn test_explicit_null_is_kept() {
        let prepared = prepare_payload(br#"{"messages":[],"stream_options":null}"#, MODEL, true).unwrap();
        assert_eq!(prepared.payload["stream_options"], Value::Null);
    }

    #[test]
    fn test_missing_messages_rejected() {
        let err = prepare_payload(br#"{"model":"x"}"#, MODEL, true).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_body(true).error, "Missing or invalid messages parameter");
    }

    #[test]
    fn test_non_array_messages_rejected() {
        let err = prepare_payload(br#"{"messages":"hello"}"#, MODEL, true).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let prepared = prepare_payload(br#"{"prompt":"hi"}"#, MODEL, false).unwrap();
        assert_eq!(prepared.message_count, None);
        assert_eq!(prepared.payload["stream"], true);
    }

    #[test]
    fn test_non_object_body_rejected() {
        let err = prepare_payload(b"[1,2,3]", MODEL, false).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_malformed_json_is_internal_error() {
        let err = prepare_payload(b"{not json", MODEL, true).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err, ProxyError::Internal(_)));
    }
}
