// Copyright (c) 2023 The Tapsign Authors

use tapsign_apdu::{DecodeError, EncodingError, ProtocolError, StatusCode};
use tapsign_core::Curve;
use tokio::time::error::Elapsed;

/// Reader / transport errors, retryable by presenting the card again
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Timeout waiting for the card response
    #[error("timeout waiting for card response")]
    Timeout,

    /// Tag left the field
    #[error("tag lost")]
    Lost,

    /// No tag attached to the reader
    #[error("no tag attached")]
    NotConnected,

    /// Reader disabled
    #[error("reader disabled")]
    Disabled,

    /// Reader I/O fault
    #[error("reader I/O error: {0}")]
    Io(String),
}

impl From<Elapsed> for TransportError {
    fn from(_: Elapsed) -> Self {
        TransportError::Timeout
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

/// Card session errors
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed response frame, never retried
    #[error("unexpected card response: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("request encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// Response payload missing or malformed records
    #[error("response decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Terminal status word
    #[error("card returned status {0:?}")]
    Status(StatusCode),

    /// Security delay still active after the configured number of retries
    #[error("security delay retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: usize },
}

impl SessionError {
    /// Check whether presenting the card again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RetriesExhausted { .. } | Self::Status(StatusCode::Busy)
        )
    }
}

/// Errors returned by the signing gateway, a failed sign call never
/// returns partial signatures
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Card returned a different number of signatures than requested
    #[error("signature count mismatch (expected: {expected}, actual: {actual})")]
    CountMismatch { expected: usize, actual: usize },

    /// Signature failed verification against the wallet key
    #[error("invalid signature for hash {0}")]
    InvalidSignature(usize),

    /// Key curve differs from the card wallet curve
    #[error("curve mismatch (card: {card}, requested: {requested})")]
    CurveMismatch { card: Curve, requested: Curve },

    /// Requested key is not the card wallet key
    #[error("requested key does not match the card wallet")]
    KeyMismatch,

    /// Card response belongs to a different card
    #[error("card id mismatch")]
    CardMismatch,

    /// Card holds no wallet
    #[error("card has no wallet")]
    NoWallet,
}

impl From<TransportError> for SigningError {
    fn from(e: TransportError) -> Self {
        SigningError::Session(e.into())
    }
}
