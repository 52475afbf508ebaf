// Copyright (c) 2023 The Tapsign Authors

//! Read APDUs, used to fetch card and wallet information
//!
//! Read must be the first command of a session, it returns the card id
//! required by every other command.

use alloc::{string::String, vec::Vec};
use core::str::FromStr;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;

use crate::{
    error::DecodeError,
    tlv::{Tag, Tlv, TlvList},
    ApduReq, ApduStatic, Curve, Instruction,
};

/// Card wallet status
#[derive(Copy, Clone, PartialEq, Eq, Debug, TryFromPrimitive, IntoPrimitive, Display)]
#[repr(u8)]
pub enum CardStatus {
    NotPersonalized = 0,
    Empty = 1,
    Loaded = 2,
    Purged = 3,
}

bitflags! {
    /// Card personalisation settings
    pub struct SettingsMask: u32 {
        const IS_REUSABLE = 0x0001;
        const USE_ACTIVATION = 0x0002;
        const PROHIBIT_PURGE_WALLET = 0x0004;
        const USE_BLOCK = 0x0008;
        const ALLOW_SWAP_PIN = 0x0010;
        const ALLOW_SWAP_PIN2 = 0x0020;
        const USE_CVC = 0x0040;
        const FORBID_DEFAULT_PIN = 0x0080;
        const USE_ONE_COMMAND_AT_TIME = 0x0100;
        const USE_NDEF = 0x0200;
        const USE_DYNAMIC_NDEF = 0x0400;
        const SMART_SECURITY_DELAY = 0x0800;
        const PROTECT_ISSUER_DATA_AGAINST_REPLAY = 0x4000;
    }
}

/// Read card request
///
/// ## Payload:
/// ```text
/// PIN                  (32-byte SHA-256 of PIN1)
/// TERMINAL_PUBLIC_KEY  (optional, linked terminal key)
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct ReadReq {
    pub pin_hash: [u8; 32],
    pub terminal_public_key: Option<Vec<u8>>,
}

impl ReadReq {
    /// Create a new read request
    pub fn new(pin_hash: [u8; 32]) -> Self {
        Self {
            pin_hash,
            terminal_public_key: None,
        }
    }
}

impl ApduStatic for ReadReq {
    const INS: Instruction = Instruction::Read;
}

impl ApduReq for ReadReq {
    fn tlvs(&self) -> TlvList {
        let mut t = TlvList::new().with(Tlv::new(Tag::Pin, self.pin_hash));

        if let Some(k) = &self.terminal_public_key {
            t.push(Tlv::new(Tag::TerminalPublicKey, k.clone()));
        }

        t
    }
}

impl TryFrom<&TlvList> for ReadReq {
    type Error = DecodeError;

    fn try_from(t: &TlvList) -> Result<Self, Self::Error> {
        Ok(Self {
            pin_hash: t.get_array(Tag::Pin)?,
            terminal_public_key: t.get(Tag::TerminalPublicKey).map(|t| t.value.clone()),
        })
    }
}

crate::encdec_tlvs!(ReadReq);

/// Read card response
#[derive(Clone, PartialEq, Debug)]
pub struct ReadResp {
    pub card_id: [u8; 8],
    pub manufacturer: String,
    pub status: CardStatus,
    pub firmware: String,
    pub curve: Curve,
    pub settings_mask: SettingsMask,
    /// Present only for [CardStatus::Loaded] cards
    pub wallet_public_key: Option<Vec<u8>>,
    pub max_signatures: Option<u32>,
    pub remaining_signatures: Option<u32>,
    pub signed_hashes: Option<u32>,
    /// Delay before PIN2 is accepted
    pub pause_before_pin2_ms: u32,
    pub blockchain_name: Option<String>,
}

impl ReadResp {
    /// Build the response payload
    pub fn tlvs(&self) -> TlvList {
        let mut t = TlvList::new()
            .with(Tlv::new(Tag::CardId, self.card_id))
            .with(Tlv::utf8(Tag::ManufacturerName, &self.manufacturer))
            .with(Tlv::u8(Tag::Status, self.status.into()))
            .with(Tlv::utf8(Tag::Firmware, &self.firmware))
            .with(Tlv::utf8(Tag::CurveId, self.curve.into()))
            .with(Tlv::u32(Tag::SettingsMask, self.settings_mask.bits()))
            .with(Tlv::u16(
                Tag::PauseBeforePin2,
                (self.pause_before_pin2_ms / 10).min(u16::MAX as u32) as u16,
            ));

        if let Some(n) = &self.blockchain_name {
            t.push(Tlv::utf8(Tag::BlockchainName, n));
        }
        if let Some(v) = self.max_signatures {
            t.push(Tlv::u32(Tag::MaxSignatures, v));
        }
        if let Some(k) = &self.wallet_public_key {
            t.push(Tlv::new(Tag::WalletPublicKey, k.clone()));
        }
        if let Some(v) = self.remaining_signatures {
            t.push(Tlv::u32(Tag::RemainingSignatures, v));
        }
        if let Some(v) = self.signed_hashes {
            t.push(Tlv::u32(Tag::SignedHashes, v));
        }

        t
    }
}

impl TryFrom<&TlvList> for ReadResp {
    type Error = DecodeError;

    fn try_from(t: &TlvList) -> Result<Self, Self::Error> {
        let status = t.get_uint(Tag::Status)?;
        let status = u8::try_from(status)
            .ok()
            .and_then(|s| CardStatus::try_from(s).ok())
            .ok_or(DecodeError::InvalidValue(Tag::Status))?;

        let curve = Curve::from_str(&t.get_utf8(Tag::CurveId)?)
            .map_err(|_| DecodeError::InvalidValue(Tag::CurveId))?;

        let settings_mask =
            SettingsMask::from_bits_truncate(t.get_uint_opt(Tag::SettingsMask)?.unwrap_or(0));

        let wallet_public_key = match status {
            CardStatus::Loaded => Some(t.require(Tag::WalletPublicKey)?.value.clone()),
            _ => None,
        };

        Ok(Self {
            card_id: t.get_array(Tag::CardId)?,
            manufacturer: t.get_utf8(Tag::ManufacturerName)?,
            status,
            firmware: t.get_utf8(Tag::Firmware)?,
            curve,
            settings_mask,
            wallet_public_key,
            max_signatures: t.get_uint_opt(Tag::MaxSignatures)?,
            remaining_signatures: t.get_uint_opt(Tag::RemainingSignatures)?,
            signed_hashes: t.get_uint_opt(Tag::SignedHashes)?,
            pause_before_pin2_ms: t.get_uint_opt(Tag::PauseBeforePin2)?.unwrap_or(0) * 10,
            blockchain_name: t
                .get(Tag::BlockchainName)
                .map(|v| v.as_utf8().map(String::from))
                .transpose()?,
        })
    }
}

crate::encdec_tlvs!(ReadResp);

#[cfg(test)]
mod test {
    use alloc::{string::ToString, vec};

    use rand::random;

    use super::*;
    use crate::test::{encode_decode_apdu, encode_decode_req};

    fn resp(status: CardStatus) -> ReadResp {
        ReadResp {
            card_id: random(),
            manufacturer: "TANGEM".to_string(),
            status,
            firmware: "2.30r".to_string(),
            curve: Curve::Secp256k1,
            settings_mask: SettingsMask::IS_REUSABLE | SettingsMask::SMART_SECURITY_DELAY,
            wallet_public_key: match status {
                CardStatus::Loaded => Some(vec![0x04; 65]),
                _ => None,
            },
            max_signatures: Some(1_000_000),
            remaining_signatures: Some(999_990),
            signed_hashes: Some(10),
            pause_before_pin2_ms: 1500,
            blockchain_name: Some("BTC".to_string()),
        }
    }

    #[test]
    fn read_req_apdu() {
        let mut req = ReadReq::new(random());
        let t = encode_decode_req(&req);
        assert_eq!(ReadReq::try_from(&t).unwrap(), req);

        req.terminal_public_key = Some(vec![0x02; 33]);
        let t = encode_decode_req(&req);
        assert_eq!(ReadReq::try_from(&t).unwrap(), req);
    }

    #[test]
    fn read_resp_loaded() {
        let r = resp(CardStatus::Loaded);
        assert_eq!(ReadResp::try_from(&r.tlvs()).unwrap(), r);

        let mut buff = [0u8; 256];
        let n = encode_decode_apdu(&mut buff, &r);
        assert_eq!(&buff[..n], r.tlvs().to_vec().unwrap().as_slice());
    }

    #[test]
    fn read_resp_empty_has_no_wallet() {
        let r = resp(CardStatus::Empty);
        let t = r.tlvs();
        assert!(t.get(Tag::WalletPublicKey).is_none());
        assert_eq!(ReadResp::try_from(&t).unwrap(), r);
    }

    #[test]
    fn read_resp_loaded_requires_wallet_key() {
        let mut r = resp(CardStatus::Loaded);
        r.wallet_public_key = None;

        assert_eq!(
            ReadResp::try_from(&r.tlvs()),
            Err(DecodeError::MissingTag(Tag::WalletPublicKey))
        );
    }

    #[test]
    fn read_resp_invalid_curve() {
        let t: TlvList = resp(CardStatus::Empty)
            .tlvs()
            .iter()
            .map(|t| match t.tag {
                Tag::CurveId => Tlv::utf8(Tag::CurveId, "p384"),
                _ => t.clone(),
            })
            .collect();

        assert_eq!(
            ReadResp::try_from(&t),
            Err(DecodeError::InvalidValue(Tag::CurveId))
        );
    }
}
