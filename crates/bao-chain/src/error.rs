use std::time::Duration;

use alloy::transports::TransportError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("RPC transport failed: {0}")]
    Transport(String),

    #[error("RPC returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    #[error("cannot decode `{method}` return data: {reason}")]
    Decode { method: &'static str, reason: String },

    #[error("expected a {expected} result, got {found}")]
    UnexpectedResult {
        expected: &'static str,
        found: &'static str,
    },

    #[error("no result for request `{0}`")]
    Missing(String),
}

impl ReadError {
    pub fn decode(method: &'static str, reason: impl Into<String>) -> Self {
        Self::Decode {
            method,
            reason: reason.into(),
        }
    }

    /// Network level failures that are worth retrying on the next refresh.
    /// Decode failures are not: the same bytes will come back.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::Rpc { .. })
    }
}

impl From<TransportError> for ReadError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}
