// Copyright (c) 2023 The Tapsign Authors

//! Check wallet APDUs, proving the card holds the wallet private key
//!
//! The card signs `SHA-256(challenge || salt)` with the wallet key.

use alloc::vec::Vec;

use crate::{
    error::DecodeError,
    sign::SIGNATURE_LEN,
    tlv::{Tag, Tlv, TlvList},
    ApduReq, ApduStatic, Instruction,
};

/// Challenge length in bytes
pub const CHALLENGE_LEN: usize = 16;

/// Check wallet request
///
/// ## Payload:
/// ```text
/// PIN        (32-byte SHA-256 of PIN1)
/// CARD_ID    (8 bytes)
/// CHALLENGE  (16 random bytes)
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct CheckWalletReq {
    pub card_id: [u8; 8],
    pub pin_hash: [u8; 32],
    pub challenge: [u8; CHALLENGE_LEN],
}

impl ApduStatic for CheckWalletReq {
    const INS: Instruction = Instruction::CheckWallet;
}

impl ApduReq for CheckWalletReq {
    fn tlvs(&self) -> TlvList {
        TlvList::new()
            .with(Tlv::new(Tag::Pin, self.pin_hash))
            .with(Tlv::new(Tag::CardId, self.card_id))
            .with(Tlv::new(Tag::Challenge, self.challenge))
    }
}

impl TryFrom<&TlvList> for CheckWalletReq {
    type Error = DecodeError;

    fn try_from(t: &TlvList) -> Result<Self, Self::Error> {
        Ok(Self {
            card_id: t.get_array(Tag::CardId)?,
            pin_hash: t.get_array(Tag::Pin)?,
            challenge: t.get_array(Tag::Challenge)?,
        })
    }
}

crate::encdec_tlvs!(CheckWalletReq);

/// Check wallet response
#[derive(Clone, PartialEq, Debug)]
pub struct CheckWalletResp {
    pub card_id: [u8; 8],
    pub salt: Vec<u8>,
    pub signature: [u8; SIGNATURE_LEN],
}

impl CheckWalletResp {
    /// Build the response payload
    pub fn tlvs(&self) -> TlvList {
        TlvList::new()
            .with(Tlv::new(Tag::CardId, self.card_id))
            .with(Tlv::new(Tag::Salt, self.salt.clone()))
            .with(Tlv::new(Tag::Signature, self.signature))
    }
}

impl TryFrom<&TlvList> for CheckWalletResp {
    type Error = DecodeError;

    fn try_from(t: &TlvList) -> Result<Self, Self::Error> {
        Ok(Self {
            card_id: t.get_array(Tag::CardId)?,
            salt: t.require(Tag::Salt)?.value.clone(),
            signature: t.get_array(Tag::Signature)?,
        })
    }
}

crate::encdec_tlvs!(CheckWalletResp);
