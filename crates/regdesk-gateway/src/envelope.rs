// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Deserialize;
use serde_json::Value;

use crate::GatewayError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    success: Option<bool>,
    status_code: Option<i64>,
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Unwraps `{success, statusCode, message, data}`. Returns `data` (JSON null
/// when absent) for a 2xx reply with `success: true`.
pub fn unwrap_envelope(url: &str, status: u16, body: &str) -> Result<Value, GatewayError> {
    if !(200..300).contains(&status) {
        return Err(clean_error_response(status, body));
    }

    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|error| GatewayError::malformed(url, format!("body is not an envelope: {error}")))?;

    match envelope.success {
        Some(true) => Ok(envelope.data),
        Some(false) => {
            let status = envelope
                .status_code
                .and_then(|code| u16::try_from(code).ok())
                .or(Some(status));
            Err(GatewayError::backend(status, envelope.message.as_deref()))
        }
        None => Err(GatewayError::malformed(url, "envelope has no success flag")),
    }
}

/// Best message available for a non-2xx reply: the envelope message, a
/// short plain-text body, or the bare status.
pub fn clean_error_response(status: u16, body: &str) -> GatewayError {
    if let Ok(parsed) = serde_json::from_str::<Envelope>(body)
        && let Some(message) = parsed.message
        && !message.trim().is_empty()
    {
        return GatewayError::backend(Some(status), Some(&message));
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') && !trimmed.contains('<')
    {
        return GatewayError::backend(Some(status), Some(trimmed));
    }

    GatewayError::backend(Some(status), Some(&format!("server returned {status}")))
}
