//! Error types shared by the transport, the connection manager and the decoder.
//!
//! None of these errors is fatal. The connection manager turns every one of
//! them into a status transition and/or a single log entry instead of handing
//! it back to a caller.

use thiserror::Error;

/// Failures of a single inbound payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload bytes are not valid UTF-8
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Payload is not syntactically valid JSON
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    /// Payload is valid JSON but the top level is not an object
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Error taxonomy of the monitor core.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Transport-level connect or subscribe error
    #[error("connect failed: {0}")]
    ConnectFailure(String),

    /// Link dropped after it had been established
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Malformed payload
    #[error("parse failure: {0}")]
    ParseFailure(#[from] DecodeError),

    /// Best-effort teardown failed
    #[error("disconnect failed: {0}")]
    DisconnectFailure(String),

    /// The manager task is gone
    #[error("channel error: {0}")]
    ChannelError(String),
}
