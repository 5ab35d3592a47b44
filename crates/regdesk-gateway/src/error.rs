// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

/// Message used when the backend reports a failure without saying why.
pub const GENERIC_FAILURE: &str = "request failed";

/// Failures surfaced by a [`crate::Backend`]. Controllers turn every variant
/// into a user-visible message; none of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The request never reached the server or the response never arrived.
    #[error("cannot reach {url} -- check [backend].base_url and network access ({detail})")]
    Network { url: String, detail: String },

    /// The server answered and reported a failure.
    #[error("{message}")]
    Backend { status: Option<u16>, message: String },

    /// The body was not the `{success, message, data}` envelope, or `data`
    /// did not have the shape the endpoint promises.
    #[error("unexpected response from {url}: {detail}")]
    MalformedResponse { url: String, detail: String },

    /// The path could not be resolved against the configured base URL.
    #[error("invalid backend url {url}: {detail}")]
    InvalidUrl { url: String, detail: String },
}

impl GatewayError {
    pub fn backend(status: Option<u16>, message: Option<&str>) -> Self {
        let message = message
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or(GENERIC_FAILURE)
            .to_owned();
        Self::Backend { status, message }
    }

    pub fn malformed(url: &str, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.to_owned(),
            detail: detail.into(),
        }
    }

    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{GENERIC_FAILURE, GatewayError};

    #[test]
    fn blank_backend_message_falls_back_to_generic() {
        assert_eq!(
            GatewayError::backend(Some(400), Some("   ")),
            GatewayError::Backend {
                status: Some(400),
                message: GENERIC_FAILURE.to_owned(),
            }
        );
        assert_eq!(
            GatewayError::backend(None, Some("State already exists")).to_string(),
            "State already exists"
        );
    }
}
