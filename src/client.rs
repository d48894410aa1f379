//! Error types shared by the request builder, the stream decoder and the client.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur during client operations.
///
/// The variants keep the three failure families apart: caller mistakes
/// ([`ClientError::InvalidArgument`]) never reach the network, while
/// [`ClientError::Transport`] and [`ClientError::Decode`] tell a broken
/// connection from a malformed payload.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid argument `{param}`: {reason}")]
    InvalidArgument { param: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ClientError {
    pub(crate) fn invalid_argument(param: &'static str, reason: impl Into<String>) -> Self {
        ClientError::InvalidArgument {
            param,
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any request was sent.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ClientError::InvalidArgument { .. })
    }
}

/// Network and HTTP-layer failures reported by a [`Transport`](crate::http::Transport).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gemini error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("connection closed: {0}")]
    Disconnected(String),
}

impl TransportError {
    /// Map a non-success response body to an error, preferring the API's
    /// own error envelope when the body carries one.
    pub fn from_error_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => TransportError::Api {
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => TransportError::Status {
                status,
                body: body.to_string(),
            },
        }
    }
}

/// Failures turning response bytes into JSON values.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON value: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
        payload: String,
    },

    #[error("unexpected `{found}` at byte {offset} of the stream")]
    UnexpectedToken { found: char, offset: usize },

    #[error("stream ended inside a value ({pending} bytes undecoded)")]
    Truncated { pending: usize },

    #[error("stream is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: u16,
    message: String,
}
