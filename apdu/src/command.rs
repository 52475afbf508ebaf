// Copyright (c) 2023 The Tapsign Authors

//! Command APDU framing
//!
//! ## Encoding:
//! ```text
//! +------+-----+----+----+--------+-------------------+
//! | CLA  | INS | P1 | P2 |   LC   |   TLV PAYLOAD     |
//! +------+-----+----+----+--------+-------------------+
//!  0x00    1B    1B   1B   1B|3B      LC bytes
//! ```
//!
//! `LC` and the payload are omitted for commands without TLVs.
//! Payloads of 256 bytes or more use the extended `0x00 HI LO` length.
//! No `LE` byte is sent.

use alloc::{vec, vec::Vec};

use byteorder::{BigEndian, ByteOrder};
use encdec::{DecodeOwned, Encode};

use crate::{
    error::{EncodingError, ProtocolError},
    tlv::{Tlv, TlvList},
    Instruction, CARD_APDU_CLA,
};

/// Header length (CLA, INS, P1, P2)
const HEADER_LEN: usize = 4;

/// Maximum payload length representable by the extended `LC` field
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;

/// Command APDU
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CommandApdu {
    pub instruction: Instruction,
    pub p1: u8,
    pub p2: u8,
    pub payload: TlvList,
}

impl CommandApdu {
    /// Create a new command APDU
    pub fn new(instruction: Instruction, p1: u8, p2: u8, payload: TlvList) -> Self {
        Self {
            instruction,
            p1,
            p2,
            payload,
        }
    }

    /// Append a TLV to the command payload
    pub fn with(mut self, tlv: Tlv) -> Self {
        self.payload.push(tlv);
        self
    }

    /// Encode the command frame, enforcing a maximum frame length
    pub fn to_vec(&self, max_len: usize) -> Result<Vec<u8>, EncodingError> {
        let len = self.encode_len()?;
        if len > max_len {
            return Err(EncodingError::FrameTooLarge { len, max: max_len });
        }

        let mut buff = vec![0u8; len];
        let n = self.encode(&mut buff)?;
        buff.truncate(n);

        Ok(buff)
    }

    /// Parse a complete command frame
    pub fn parse(buff: &[u8]) -> Result<Self, ProtocolError> {
        Self::decode_owned(buff).map(|(c, _)| c)
    }
}

impl Encode for CommandApdu {
    type Error = EncodingError;

    /// Fetch the encoded frame length
    fn encode_len(&self) -> Result<usize, EncodingError> {
        let n = self.payload.encode_len()?;

        let lc = match n {
            0 => 0,
            n if n < 256 => 1,
            n if n <= MAX_PAYLOAD_LEN => 3,
            n => return Err(EncodingError::PayloadTooLarge(n)),
        };

        Ok(HEADER_LEN + lc + n)
    }

    /// Encode the command frame into the provided buffer
    fn encode(&self, buff: &mut [u8]) -> Result<usize, EncodingError> {
        let total = self.encode_len()?;
        if buff.len() < total {
            return Err(EncodingError::BufferTooSmall {
                required: total,
                available: buff.len(),
            });
        }

        buff[0] = CARD_APDU_CLA;
        buff[1] = self.instruction.into();
        buff[2] = self.p1;
        buff[3] = self.p2;

        let n = self.payload.encode_len()?;
        let mut index = HEADER_LEN;

        match n {
            0 => return Ok(index),
            n if n < 256 => {
                buff[index] = n as u8;
                index += 1;
            }
            n => {
                // Bounded by encode_len
                buff[index] = 0x00;
                BigEndian::write_u16(&mut buff[index + 1..], n as u16);
                index += 3;
            }
        }

        index += self.payload.encode(&mut buff[index..])?;

        Ok(index)
    }
}

impl DecodeOwned for CommandApdu {
    type Output = CommandApdu;
    type Error = ProtocolError;

    /// Decode a command frame, the frame must span the whole buffer
    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < HEADER_LEN {
            return Err(ProtocolError::FrameTooShort(buff.len()));
        }

        if buff[0] != CARD_APDU_CLA {
            return Err(ProtocolError::InvalidClass(buff[0]));
        }

        let instruction =
            Instruction::try_from(buff[1]).map_err(|_| ProtocolError::UnknownInstruction(buff[1]))?;
        let (p1, p2) = (buff[2], buff[3]);

        let body = &buff[HEADER_LEN..];
        let payload = match body.len() {
            0 => TlvList::new(),
            _ => {
                let (declared, data) = match body[0] {
                    0x00 if body.len() >= 3 => (BigEndian::read_u16(&body[1..3]) as usize, &body[3..]),
                    0x00 => return Err(ProtocolError::FrameTooShort(buff.len())),
                    n => (n as usize, &body[1..]),
                };

                if declared != data.len() {
                    return Err(ProtocolError::LengthMismatch {
                        declared,
                        actual: data.len(),
                    });
                }

                TlvList::parse(data)?
            }
        };

        let c = Self {
            instruction,
            p1,
            p2,
            payload,
        };

        Ok((c, buff.len()))
    }
}
