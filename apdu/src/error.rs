// Copyright (c) 2023 The Tapsign Authors

//! Codec error types

use crate::tlv::Tag;

/// Errors raised when encoding TLVs or APDUs
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum EncodingError {
    /// TLV value exceeds the maximum encodable length (65535 bytes)
    #[cfg_attr(feature = "thiserror", error("value for tag {tag:?} too large ({len} bytes)"))]
    ValueTooLarge { tag: Tag, len: usize },

    /// Output buffer too small for encoded object
    #[cfg_attr(
        feature = "thiserror",
        error("buffer too small (required: {required}, available: {available})")
    )]
    BufferTooSmall { required: usize, available: usize },

    /// Hashes in a batch request differ in length
    #[cfg_attr(feature = "thiserror", error("hashes in a batch must share one length"))]
    InconsistentHashSize,

    /// Encoded frame exceeds transport MTU
    #[cfg_attr(feature = "thiserror", error("frame length {len} exceeds maximum {max}"))]
    FrameTooLarge { len: usize, max: usize },

    /// Command payload exceeds the extended length field (65535 bytes)
    #[cfg_attr(feature = "thiserror", error("payload too large for command length ({0} bytes)"))]
    PayloadTooLarge(usize),

    /// Underlying codec error
    #[cfg_attr(feature = "thiserror", error("codec error: {0:?}"))]
    Codec(encdec::Error),
}

impl From<encdec::Error> for EncodingError {
    fn from(e: encdec::Error) -> Self {
        Self::Codec(e)
    }
}

/// Errors raised when decoding TLV payloads
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum DecodeError {
    /// Fewer bytes available than declared
    #[cfg_attr(
        feature = "thiserror",
        error("truncated record at offset {offset} (needed: {needed}, available: {available})")
    )]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Required tag absent from payload
    #[cfg_attr(feature = "thiserror", error("missing tag {0:?}"))]
    MissingTag(Tag),

    /// Tag value does not match the expected value semantics
    #[cfg_attr(feature = "thiserror", error("invalid value for tag {0:?}"))]
    InvalidValue(Tag),

    /// Underlying codec error
    #[cfg_attr(feature = "thiserror", error("codec error: {0:?}"))]
    Codec(encdec::Error),
}

impl From<encdec::Error> for DecodeError {
    fn from(e: encdec::Error) -> Self {
        Self::Codec(e)
    }
}

/// Errors raised when parsing APDU frames
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum ProtocolError {
    /// Frame shorter than the minimum for its kind
    #[cfg_attr(feature = "thiserror", error("frame too short ({0} bytes)"))]
    FrameTooShort(usize),

    /// Command class byte not supported
    #[cfg_attr(feature = "thiserror", error("unsupported class {0:#04x}"))]
    InvalidClass(u8),

    /// Command instruction byte not recognised
    #[cfg_attr(feature = "thiserror", error("unknown instruction {0:#04x}"))]
    UnknownInstruction(u8),

    /// Declared command length does not match frame length
    #[cfg_attr(
        feature = "thiserror",
        error("length mismatch (declared: {declared}, actual: {actual})")
    )]
    LengthMismatch { declared: usize, actual: usize },

    /// Payload decoding failed
    #[cfg_attr(feature = "thiserror", error("payload decode failed: {0}"))]
    Payload(DecodeError),
}

impl From<DecodeError> for ProtocolError {
    fn from(e: DecodeError) -> Self {
        Self::Payload(e)
    }
}

impl From<encdec::Error> for ProtocolError {
    fn from(e: encdec::Error) -> Self {
        Self::Payload(DecodeError::Codec(e))
    }
}
