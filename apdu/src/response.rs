// Copyright (c) 2023 The Tapsign Authors

//! Response APDU framing
//!
//! ## Encoding:
//! ```text
//! +-------------------+-----+-----+
//! |    TLV PAYLOAD    | SW1 | SW2 |
//! +-------------------+-----+-----+
//! ```

use alloc::{vec, vec::Vec};

use byteorder::{BigEndian, ByteOrder};
use encdec::{DecodeOwned, Encode};

use crate::{
    error::{EncodingError, ProtocolError},
    status::StatusCode,
    tlv::{Tag, TlvList},
};

/// Delay assumed when a security delay response carries no [Tag::Pause]
pub const DEFAULT_SECURITY_DELAY_MS: u32 = 60_000;

/// Response APDU
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ResponseApdu {
    pub status: u16,
    pub payload: TlvList,
}

impl ResponseApdu {
    /// Create a new response
    pub fn new(status: impl Into<u16>, payload: TlvList) -> Self {
        Self {
            status: status.into(),
            payload,
        }
    }

    /// Create a status-only response
    pub fn status_only(status: impl Into<u16>) -> Self {
        Self::new(status, TlvList::new())
    }

    /// Fetch the mapped status code
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from(self.status)
    }

    /// Fetch a payload record by tag
    pub fn get(&self, tag: Tag) -> Option<&crate::tlv::Tlv> {
        self.payload.get(tag)
    }

    /// Remaining security delay in milliseconds for [StatusCode::NeedPause]
    /// responses, `None` for any other status
    ///
    /// The card reports the delay in 10ms units, a missing [Tag::Pause]
    /// means the full default delay.
    pub fn security_delay_ms(&self) -> Option<u32> {
        if self.status_code() != StatusCode::NeedPause {
            return None;
        }

        match self.payload.get_uint_opt(Tag::Pause) {
            Ok(Some(v)) => Some(v.saturating_mul(10)),
            _ => Some(DEFAULT_SECURITY_DELAY_MS),
        }
    }

    /// Parse a response frame
    ///
    /// Frames under two bytes fail with [ProtocolError::FrameTooShort],
    /// a two byte frame is a status-only response.
    pub fn parse(buff: &[u8]) -> Result<Self, ProtocolError> {
        Self::decode_owned(buff).map(|(r, _)| r)
    }

    /// Encode the response frame to a new vector
    pub fn to_vec(&self) -> Result<Vec<u8>, EncodingError> {
        let mut buff = vec![0u8; self.encode_len()?];
        let n = self.encode(&mut buff)?;
        buff.truncate(n);
        Ok(buff)
    }
}

impl Encode for ResponseApdu {
    type Error = EncodingError;

    fn encode_len(&self) -> Result<usize, EncodingError> {
        Ok(self.payload.encode_len()? + 2)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, EncodingError> {
        let n = self.encode_len()?;
        if buff.len() < n {
            return Err(EncodingError::BufferTooSmall {
                required: n,
                available: buff.len(),
            });
        }

        let index = self.payload.encode(buff)?;
        BigEndian::write_u16(&mut buff[index..], self.status);

        Ok(index + 2)
    }
}

impl DecodeOwned for ResponseApdu {
    type Output = ResponseApdu;
    type Error = ProtocolError;

    /// Decode a response frame, the status word is taken from the end of the buffer
    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < 2 {
            return Err(ProtocolError::FrameTooShort(buff.len()));
        }

        let (data, sw) = buff.split_at(buff.len() - 2);
        let status = BigEndian::read_u16(sw);

        let payload = match data.len() {
            0 => TlvList::new(),
            _ => TlvList::parse(data)?,
        };

        Ok((Self { status, payload }, buff.len()))
    }
}
