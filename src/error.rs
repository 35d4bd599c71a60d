//! Error taxonomy for the pull client (see `error handling design` in
//! the crate-level documentation).
//!
//! Mirrors the shape of a typical `thiserror` enum: one variant family per
//! failure category, each carrying enough context to log and to decide
//! whether a fresh session on another URL is worth attempting.

use std::fmt;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("request timed out waiting for response (cseq={cseq})")]
    Timeout { cseq: u32 },

    #[error("operation invalid in session state {state}")]
    InvalidState { state: String },

    #[error("malformed input: {kind}")]
    Parse { kind: ParseErrorKind },
}

impl ClientError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        ClientError::Configuration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        ClientError::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ClientError::Protocol(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        ClientError::Media(msg.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    EmptyMessage,
    InvalidStatusLine,
    InvalidHeader,
    TruncatedInterleavedFrame,
    MissingContentLength,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::EmptyMessage => write!(f, "empty message"),
            ParseErrorKind::InvalidStatusLine => write!(f, "invalid status line"),
            ParseErrorKind::InvalidHeader => write!(f, "invalid header line"),
            ParseErrorKind::TruncatedInterleavedFrame => write!(f, "truncated interleaved frame"),
            ParseErrorKind::MissingContentLength => write!(f, "missing content-length"),
        }
    }
}
