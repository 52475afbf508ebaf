// Copyright (c) 2023 The Tapsign Authors

//! Protocol / APDU definitions for tapsign card communication
//!
//! Cards speak a fixed-format short APDU dialect: a 4-byte header
//! (`CLA INS P1 P2`), an optional length and a payload made of
//! tag-length-value records. Responses carry a TLV payload followed by
//! a two byte status word.
//!
//! This crate provides the [tlv] and APDU ([command], [response]) codecs,
//! the [status] word table and typed request / response objects for the
//! card operations used by the host ([read], [sign], [check_wallet]).
//!
//! Multi-byte integers inside TLV values are big-endian, as the card
//! firmware writes them.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumString, IntoStaticStr};

pub mod check_wallet;
pub mod command;
pub mod error;
pub mod prelude;
pub mod read;
pub mod response;
pub mod sign;
pub mod status;
pub mod tlv;

pub use command::CommandApdu;
pub use error::{DecodeError, EncodingError, ProtocolError};
pub use response::ResponseApdu;
pub use status::StatusCode;
pub use tlv::{Tag, Tlv, TlvList, ValueKind};

/// Card APDU class (ISO)
pub const CARD_APDU_CLA: u8 = 0x00;

/// Default maximum frame length for short APDUs with an extended length field
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024;

/// Card APDU instruction codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive, Display)]
#[repr(u8)]
pub enum Instruction {
    /// Open an encrypted session
    OpenSession = 0xFF,

    /// Read card and wallet information
    Read = 0xF2,

    /// Prove card authenticity with the card key
    VerifyCard = 0xF3,

    /// Validate card counters
    ValidateCard = 0xF4,

    /// Verify a PIN code without executing a command
    VerifyCode = 0xF5,

    /// Write issuer data
    WriteIssuerData = 0xF6,

    /// Read issuer data
    GetIssuerData = 0xF7,

    /// Generate a new wallet key
    CreateWallet = 0xF8,

    /// Prove ownership of the wallet key with a challenge
    CheckWallet = 0xF9,

    /// Change PIN codes
    SwapPin = 0xFA,

    /// Sign one or more hashes with the wallet key
    Sign = 0xFB,

    /// Erase the wallet key
    PurgeWallet = 0xFC,
}

/// Elliptic curve used by a card wallet key
///
/// Encoded on the wire as the ASCII curve name in [Tag::CurveId]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum Curve {
    #[strum(serialize = "secp256k1")]
    Secp256k1,
    #[strum(serialize = "ed25519")]
    Ed25519,
}

/// Static APDU header information for a request object
pub trait ApduStatic {
    /// Instruction for this request
    const INS: Instruction;

    /// First parameter byte
    const P1: u8 = 0x00;

    /// Second parameter byte
    const P2: u8 = 0x00;
}

/// Request objects that serialise to a TLV payload
pub trait ApduReq: ApduStatic {
    /// Build the TLV payload for this request, in wire order
    fn tlvs(&self) -> TlvList;

    /// Build the complete command APDU for this request
    fn command(&self) -> CommandApdu {
        CommandApdu::new(Self::INS, Self::P1, Self::P2, self.tlvs())
    }
}

/// Helper macro implementing [encdec::Encode] and [encdec::DecodeOwned]
/// for objects carried as a TLV payload
///
/// The type must provide `tlvs(&self) -> TlvList` and `TryFrom<&TlvList>`.
#[macro_export]
macro_rules! encdec_tlvs {
    ($t:ty) => {
        impl encdec::Encode for $t {
            type Error = $crate::EncodingError;

            fn encode_len(&self) -> Result<usize, Self::Error> {
                encdec::Encode::encode_len(&self.tlvs())
            }

            fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
                encdec::Encode::encode(&self.tlvs(), buff)
            }
        }

        impl encdec::DecodeOwned for $t {
            type Output = $t;
            type Error = $crate::DecodeError;

            fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
                let (tlvs, n) = <$crate::TlvList as encdec::DecodeOwned>::decode_owned(buff)?;
                Ok((<$t>::try_from(&tlvs)?, n))
            }
        }
    };
}
