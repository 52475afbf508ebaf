// Copyright (c) 2023 The Tapsign Authors

//! Tag-Length-Value record codec
//!
//! ## Encoding:
//! ```text
//! +-----+--------+-------------+
//! | TAG | LENGTH |    VALUE    |
//! +-----+--------+-------------+
//!   1B    1B|3B     LENGTH B
//! ```
//!
//! Lengths below `0xFF` use a single byte, lengths in `0xFF..=0xFFFF`
//! use the extended form `0xFF HI LO`. An empty value is still written
//! with a zero length byte, so a present-but-empty record decodes to a
//! [Tlv] with an empty value and is distinct from an absent tag.

use alloc::{string::String, vec::Vec};
use core::ops::Deref;

use byteorder::{BigEndian, ByteOrder};
use encdec::{DecodeOwned, Encode};

use crate::error::{DecodeError, EncodingError};

/// Extended length marker
const EXTENDED_LEN: u8 = 0xFF;

/// Maximum encodable value length
pub const MAX_VALUE_LEN: usize = 0xFFFF;

/// Value semantics for a tag
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ValueKind {
    /// Opaque byte string
    Bytes,
    /// ASCII / UTF-8 string
    Utf8,
    /// Big-endian unsigned integer (1, 2 or 4 bytes)
    Uint,
    /// Fixed length byte string
    Fixed(usize),
}

macro_rules! tags {
    ($( $(#[$m:meta])* $name:ident = $id:literal => $kind:expr, )*) => {
        /// Closed table of card protocol tags
        ///
        /// Tag bytes with no table entry surface as [Tag::Unknown]
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
        pub enum Tag {
            $( $(#[$m])* $name, )*
            /// Tag byte not present in the table
            Unknown(u8),
        }

        impl Tag {
            /// Wire identifier for this tag
            pub const fn id(&self) -> u8 {
                match self {
                    $( Tag::$name => $id, )*
                    Tag::Unknown(v) => *v,
                }
            }

            /// Expected value semantics for this tag
            pub const fn kind(&self) -> ValueKind {
                match self {
                    $( Tag::$name => $kind, )*
                    Tag::Unknown(_) => ValueKind::Bytes,
                }
            }
        }

        impl From<u8> for Tag {
            fn from(v: u8) -> Self {
                match v {
                    $( $id => Tag::$name, )*
                    _ => Tag::Unknown(v),
                }
            }
        }
    };
}

tags! {
    /// Unique card identifier
    CardId = 0x01 => ValueKind::Fixed(8),
    /// Card status (see [crate::read::CardStatus])
    Status = 0x02 => ValueKind::Uint,
    /// Card attestation public key
    CardPublicKey = 0x03 => ValueKind::Bytes,
    /// Signature by the card key
    CardSignature = 0x04 => ValueKind::Bytes,
    /// Wallet key curve name
    CurveId = 0x05 => ValueKind::Utf8,
    /// Hash algorithm name
    HashAlgId = 0x06 => ValueKind::Utf8,
    /// Permitted signing methods
    SigningMethod = 0x07 => ValueKind::Uint,
    /// Maximum number of signatures
    MaxSignatures = 0x08 => ValueKind::Uint,
    /// Delay before PIN2 is accepted, in 10ms units
    PauseBeforePin2 = 0x09 => ValueKind::Uint,
    /// Card settings (see [crate::read::SettingsMask])
    SettingsMask = 0x0A => ValueKind::Uint,
    /// Nested personalisation data
    CardData = 0x0C => ValueKind::Bytes,
    /// SHA-256 of PIN1
    Pin = 0x10 => ValueKind::Fixed(32),
    /// SHA-256 of PIN2
    Pin2 = 0x11 => ValueKind::Fixed(32),
    /// SHA-256 of the new PIN1
    NewPin = 0x12 => ValueKind::Fixed(32),
    /// SHA-256 of the new PIN2
    NewPin2 = 0x13 => ValueKind::Fixed(32),
    /// Host challenge
    Challenge = 0x16 => ValueKind::Bytes,
    /// Card salt
    Salt = 0x17 => ValueKind::Bytes,
    /// Card validation counter
    ValidationCounter = 0x18 => ValueKind::Uint,
    /// Session key exchange, host half
    SessionKeyA = 0x1A => ValueKind::Bytes,
    /// Session key exchange, card half
    SessionKeyB = 0x1B => ValueKind::Bytes,
    /// Remaining security delay, in 10ms units
    Pause = 0x1C => ValueKind::Uint,
    /// Manufacturer name
    ManufacturerName = 0x20 => ValueKind::Utf8,
    /// Concatenated hashes to sign
    TransactionOutHash = 0x50 => ValueKind::Bytes,
    /// Size of each hash in [Tag::TransactionOutHash]
    TransactionOutHashSize = 0x51 => ValueKind::Uint,
    /// Raw transaction to hash and sign
    TransactionOutRaw = 0x52 => ValueKind::Bytes,
    /// Linked terminal public key
    TerminalPublicKey = 0x5C => ValueKind::Bytes,
    /// Wallet public key
    WalletPublicKey = 0x60 => ValueKind::Bytes,
    /// Concatenated raw signatures
    Signature = 0x61 => ValueKind::Bytes,
    /// Remaining signature budget
    RemainingSignatures = 0x62 => ValueKind::Uint,
    /// Number of hashes signed by this wallet
    SignedHashes = 0x63 => ValueKind::Uint,
    /// Firmware version string
    Firmware = 0x80 => ValueKind::Utf8,
    /// Production batch identifier
    Batch = 0x81 => ValueKind::Bytes,
    /// Manufacturing date
    ManufactureDateTime = 0x82 => ValueKind::Bytes,
    /// Issuer name
    IssuerName = 0x83 => ValueKind::Utf8,
    /// Blockchain name
    BlockchainName = 0x84 => ValueKind::Utf8,
    /// Manufacturer signature over card data
    ManufacturerSignature = 0x86 => ValueKind::Bytes,
}

/// A single tag-length-value record
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Tlv {
    pub tag: Tag,
    pub value: Vec<u8>,
}

impl Tlv {
    /// Create a new record with an arbitrary value
    pub fn new(tag: Tag, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Create a record holding a single byte integer
    pub fn u8(tag: Tag, v: u8) -> Self {
        Self::new(tag, [v])
    }

    /// Create a record holding a big-endian u16
    pub fn u16(tag: Tag, v: u16) -> Self {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, v);
        Self::new(tag, b)
    }

    /// Create a record holding a big-endian u32
    pub fn u32(tag: Tag, v: u32) -> Self {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        Self::new(tag, b)
    }

    /// Create a record holding a string
    pub fn utf8(tag: Tag, v: &str) -> Self {
        Self::new(tag, v.as_bytes())
    }

    /// Read the value as a big-endian unsigned integer
    pub fn as_uint(&self) -> Result<u32, DecodeError> {
        match self.value.len() {
            1 => Ok(self.value[0] as u32),
            2 => Ok(BigEndian::read_u16(&self.value) as u32),
            4 => Ok(BigEndian::read_u32(&self.value)),
            _ => Err(DecodeError::InvalidValue(self.tag)),
        }
    }

    /// Read the value as a string
    pub fn as_utf8(&self) -> Result<&str, DecodeError> {
        core::str::from_utf8(&self.value).map_err(|_| DecodeError::InvalidValue(self.tag))
    }

    /// Check the value length against the tag's expected semantics
    pub fn check_kind(&self) -> Result<(), DecodeError> {
        match self.tag.kind() {
            ValueKind::Fixed(n) if self.value.len() != n => Err(DecodeError::InvalidValue(self.tag)),
            ValueKind::Uint => self.as_uint().map(|_| ()),
            ValueKind::Utf8 => self.as_utf8().map(|_| ()),
            _ => Ok(()),
        }
    }
}

impl Encode for Tlv {
    type Error = EncodingError;

    /// Fetch the encoded length of this record
    fn encode_len(&self) -> Result<usize, EncodingError> {
        Ok(1 + len_field_len(self.tag, self.value.len())? + self.value.len())
    }

    /// Encode this record into the provided buffer, returning the encoded length
    fn encode(&self, buff: &mut [u8]) -> Result<usize, EncodingError> {
        let n = self.encode_len()?;
        if buff.len() < n {
            return Err(EncodingError::BufferTooSmall {
                required: n,
                available: buff.len(),
            });
        }

        let l = self.value.len();
        buff[0] = self.tag.id();

        let mut index = 1;
        if l < EXTENDED_LEN as usize {
            buff[index] = l as u8;
            index += 1;
        } else {
            buff[index] = EXTENDED_LEN;
            BigEndian::write_u16(&mut buff[index + 1..], l as u16);
            index += 3;
        }

        buff[index..][..l].copy_from_slice(&self.value);

        Ok(index + l)
    }
}

impl DecodeOwned for Tlv {
    type Output = Tlv;
    type Error = DecodeError;

    /// Decode a single record from the start of the buffer,
    /// returning the record and the number of bytes consumed
    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let truncated = |offset, needed| DecodeError::Truncated {
            offset,
            needed,
            available: buff.len().saturating_sub(offset),
        };

        if buff.len() < 2 {
            return Err(truncated(0, 2));
        }

        let tag = Tag::from(buff[0]);

        let (len, index) = match buff[1] {
            EXTENDED_LEN if buff.len() < 4 => return Err(truncated(2, 2)),
            EXTENDED_LEN => (BigEndian::read_u16(&buff[2..4]) as usize, 4),
            l => (l as usize, 2),
        };

        if buff.len() < index + len {
            return Err(truncated(index, len));
        }

        let value = buff[index..][..len].to_vec();

        Ok((Self { tag, value }, index + len))
    }
}

/// Compute length field size for a value, checking limits
fn len_field_len(tag: Tag, len: usize) -> Result<usize, EncodingError> {
    match len {
        l if l < EXTENDED_LEN as usize => Ok(1),
        l if l <= MAX_VALUE_LEN => Ok(3),
        len => Err(EncodingError::ValueTooLarge { tag, len }),
    }
}

/// Ordered sequence of [Tlv] records
///
/// Order is preserved on encode / decode, lookups return the first match.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct TlvList(Vec<Tlv>);

impl TlvList {
    /// Create an empty list
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a record
    pub fn push(&mut self, tlv: Tlv) {
        self.0.push(tlv);
    }

    /// Append a record, builder style
    pub fn with(mut self, tlv: Tlv) -> Self {
        self.0.push(tlv);
        self
    }

    /// Fetch the first record for a tag
    pub fn get(&self, tag: Tag) -> Option<&Tlv> {
        self.0.iter().find(|t| t.tag == tag)
    }

    /// Fetch the first record for a tag, failing if absent
    pub fn require(&self, tag: Tag) -> Result<&Tlv, DecodeError> {
        self.get(tag).ok_or(DecodeError::MissingTag(tag))
    }

    /// Fetch a required unsigned integer value
    pub fn get_uint(&self, tag: Tag) -> Result<u32, DecodeError> {
        self.require(tag)?.as_uint()
    }

    /// Fetch an optional unsigned integer value
    pub fn get_uint_opt(&self, tag: Tag) -> Result<Option<u32>, DecodeError> {
        self.get(tag).map(|t| t.as_uint()).transpose()
    }

    /// Fetch a required string value
    pub fn get_utf8(&self, tag: Tag) -> Result<String, DecodeError> {
        self.require(tag)?.as_utf8().map(String::from)
    }

    /// Fetch a required fixed-length value
    pub fn get_array<const N: usize>(&self, tag: Tag) -> Result<[u8; N], DecodeError> {
        let t = self.require(tag)?;
        t.value
            .as_slice()
            .try_into()
            .map_err(|_| DecodeError::InvalidValue(tag))
    }

    /// Consume the list, returning the records
    pub fn into_inner(self) -> Vec<Tlv> {
        self.0
    }

    /// Encode all records to a new vector
    pub fn to_vec(&self) -> Result<Vec<u8>, EncodingError> {
        let mut buff = alloc::vec![0u8; self.encode_len()?];
        let n = self.encode(&mut buff)?;
        buff.truncate(n);
        Ok(buff)
    }

    /// Parse a complete TLV payload
    pub fn parse(buff: &[u8]) -> Result<Self, DecodeError> {
        Self::decode_owned(buff).map(|(l, _)| l)
    }
}

impl Encode for TlvList {
    type Error = EncodingError;

    /// Fetch the encoded length of all records
    fn encode_len(&self) -> Result<usize, EncodingError> {
        self.0.iter().map(|t| t.encode_len()).sum()
    }

    /// Encode all records in order into the provided buffer
    fn encode(&self, buff: &mut [u8]) -> Result<usize, EncodingError> {
        let n = self.encode_len()?;
        if buff.len() < n {
            return Err(EncodingError::BufferTooSmall {
                required: n,
                available: buff.len(),
            });
        }

        let mut index = 0;
        for t in &self.0 {
            index += t.encode(&mut buff[index..])?;
        }

        Ok(index)
    }
}

impl DecodeOwned for TlvList {
    type Output = TlvList;
    type Error = DecodeError;

    /// Decode records until the buffer is exhausted
    ///
    /// A truncated trailing record fails the whole decode.
    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let mut tlvs = Vec::new();
        let mut index = 0;

        while index < buff.len() {
            let (t, n) = Tlv::decode_owned(&buff[index..]).map_err(|e| match e {
                DecodeError::Truncated {
                    offset,
                    needed,
                    available,
                } => DecodeError::Truncated {
                    offset: index + offset,
                    needed,
                    available,
                },
                e => e,
            })?;

            tlvs.push(t);
            index += n;
        }

        Ok((Self(tlvs), index))
    }
}

impl Deref for TlvList {
    type Target = [Tlv];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Tlv>> for TlvList {
    fn from(v: Vec<Tlv>) -> Self {
        Self(v)
    }
}

impl FromIterator<Tlv> for TlvList {
    fn from_iter<I: IntoIterator<Item = Tlv>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Encode a sequence of records
pub fn encode(tlvs: &[Tlv]) -> Result<Vec<u8>, EncodingError> {
    TlvList::from(tlvs.to_vec()).to_vec()
}

/// Decode a sequence of records
pub fn decode(buff: &[u8]) -> Result<Vec<Tlv>, DecodeError> {
    TlvList::parse(buff).map(TlvList::into_inner)
}
