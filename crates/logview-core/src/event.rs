//! Classification of raw inbound channel payloads.

use serde_json::Value;

/// One classified inbound payload.
///
/// Exactly one event is produced per raw payload. Payloads that are not
/// valid JSON become `RawText` (carried verbatim); decoded objects of no
/// known shape become `Unrecognized` (carried restringified). The two are
/// displayed differently, so they stay distinct variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A line captured from the remote process stdout.
    StdoutLine(String),
    /// A line captured from the remote process stderr.
    StderrLine(String),
    /// A plain informational line from the remote endpoint.
    NormalLine(String),
    /// The remote process exited.
    Exit {
        code: i64,
        error_message: Option<String>,
    },
    /// The remote endpoint reported a failure.
    Failure { message: String },
    /// Payload was not JSON; carried verbatim.
    RawText(String),
    /// Payload was JSON but of no known shape; carried restringified.
    Unrecognized(String),
}

/// Classify one raw payload into an [`InboundEvent`].
///
/// Total and pure: decode failures are downgraded to `RawText`, never
/// propagated. Side effects (appending history, closing the channel)
/// belong to the session interpreting the returned event.
#[must_use]
pub fn classify(raw: &str) -> InboundEvent {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return InboundEvent::RawText(raw.to_string());
    };

    match value.get("type").and_then(Value::as_str) {
        Some("standard_output") => match data_line(&value) {
            Some(line) => InboundEvent::StdoutLine(line),
            None => unrecognized(&value),
        },
        Some("standard_error") => match data_line(&value) {
            Some(line) => InboundEvent::StderrLine(line),
            None => unrecognized(&value),
        },
        Some("normal_line") => match data_line(&value) {
            Some(line) => InboundEvent::NormalLine(line),
            None => unrecognized(&value),
        },
        Some("exit") => match value.get("code").and_then(Value::as_i64) {
            Some(code) => InboundEvent::Exit {
                code,
                error_message: value
                    .get("error_message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            None => unrecognized(&value),
        },
        _ => {
            if value.get("status").and_then(Value::as_str) == Some("fail") {
                InboundEvent::Failure {
                    message: value
                        .get("message")
                        .and_then(Value::as_str)
                        .map_or_else(|| "Unknown error".to_string(), str::to_string),
                }
            } else {
                unrecognized(&value)
            }
        }
    }
}

fn data_line(value: &Value) -> Option<String> {
    value.get("data").and_then(Value::as_str).map(str::to_string)
}

fn unrecognized(value: &Value) -> InboundEvent {
    InboundEvent::Unrecognized(value.to_string())
}
