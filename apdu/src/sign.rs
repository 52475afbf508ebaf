// Copyright (c) 2023 The Tapsign Authors

//! Sign APDUs, used to sign a batch of hashes with the wallet key

use alloc::vec::Vec;

use crate::{
    error::{DecodeError, EncodingError},
    tlv::{Tag, Tlv, TlvList},
    ApduReq, ApduStatic, Instruction,
};

/// Raw signature length (`r || s` or ed25519 `R || S`)
pub const SIGNATURE_LEN: usize = 64;

/// Maximum number of hashes the card accepts in one request
pub const MAX_HASHES_PER_REQUEST: usize = 10;

/// Sign hashes request
///
/// ## Payload:
/// ```text
/// PIN                       (32-byte SHA-256 of PIN1)
/// CARD_ID                   (8 bytes)
/// PIN2                      (32-byte SHA-256 of PIN2)
/// WALLET_PUBLIC_KEY         (optional, selects the wallet key)
/// TRANSACTION_OUT_HASH_SIZE (u8, length of each hash)
/// TRANSACTION_OUT_HASH      (hashes concatenated in request order)
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct SignReq {
    pub card_id: [u8; 8],
    pub pin_hash: [u8; 32],
    pub pin2_hash: [u8; 32],
    pub wallet_public_key: Option<Vec<u8>>,
    hashes: Vec<Vec<u8>>,
}

impl SignReq {
    /// Create a new sign request, hashes must share a single non-zero length
    pub fn new(
        card_id: [u8; 8],
        pin_hash: [u8; 32],
        pin2_hash: [u8; 32],
        hashes: Vec<Vec<u8>>,
    ) -> Result<Self, EncodingError> {
        let size = hashes.first().map(|h| h.len()).unwrap_or(0);
        if size == 0 || size > u8::MAX as usize || hashes.iter().any(|h| h.len() != size) {
            return Err(EncodingError::InconsistentHashSize);
        }

        Ok(Self {
            card_id,
            pin_hash,
            pin2_hash,
            wallet_public_key: None,
            hashes,
        })
    }

    /// Select the wallet key to sign with
    pub fn with_wallet(mut self, public_key: Vec<u8>) -> Self {
        self.wallet_public_key = Some(public_key);
        self
    }

    /// Hashes to sign, in request order
    pub fn hashes(&self) -> &[Vec<u8>] {
        &self.hashes
    }
}

impl ApduStatic for SignReq {
    const INS: Instruction = Instruction::Sign;
}

impl ApduReq for SignReq {
    fn tlvs(&self) -> TlvList {
        let mut t = TlvList::new()
            .with(Tlv::new(Tag::Pin, self.pin_hash))
            .with(Tlv::new(Tag::CardId, self.card_id))
            .with(Tlv::new(Tag::Pin2, self.pin2_hash));

        if let Some(k) = &self.wallet_public_key {
            t.push(Tlv::new(Tag::WalletPublicKey, k.clone()));
        }

        // Hash size is checked to fit a byte on construction
        let size = self.hashes[0].len() as u8;

        t.with(Tlv::u8(Tag::TransactionOutHashSize, size))
            .with(Tlv::new(Tag::TransactionOutHash, self.hashes.concat()))
    }
}

impl TryFrom<&TlvList> for SignReq {
    type Error = DecodeError;

    fn try_from(t: &TlvList) -> Result<Self, Self::Error> {
        let size = t.get_uint(Tag::TransactionOutHashSize)? as usize;
        let data = &t.require(Tag::TransactionOutHash)?.value;

        if size == 0 || data.is_empty() || data.len() % size != 0 {
            return Err(DecodeError::InvalidValue(Tag::TransactionOutHash));
        }

        Ok(Self {
            card_id: t.get_array(Tag::CardId)?,
            pin_hash: t.get_array(Tag::Pin)?,
            pin2_hash: t.get_array(Tag::Pin2)?,
            wallet_public_key: t.get(Tag::WalletPublicKey).map(|v| v.value.clone()),
            hashes: data.chunks(size).map(|c| c.to_vec()).collect(),
        })
    }
}

crate::encdec_tlvs!(SignReq);

/// Sign hashes response
///
/// ## Payload:
/// ```text
/// CARD_ID              (8 bytes)
/// SIGNATURE            (64-byte signatures concatenated in request order)
/// REMAINING_SIGNATURES (optional u32)
/// SIGNED_HASHES        (optional u32)
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct SignResp {
    pub card_id: [u8; 8],
    pub signatures: Vec<[u8; SIGNATURE_LEN]>,
    pub remaining_signatures: Option<u32>,
    pub signed_hashes: Option<u32>,
}

impl SignResp {
    /// Build the response payload
    pub fn tlvs(&self) -> TlvList {
        let mut t = TlvList::new()
            .with(Tlv::new(Tag::CardId, self.card_id))
            .with(Tlv::new(Tag::Signature, self.signatures.concat()));

        if let Some(v) = self.remaining_signatures {
            t.push(Tlv::u32(Tag::RemainingSignatures, v));
        }
        if let Some(v) = self.signed_hashes {
            t.push(Tlv::u32(Tag::SignedHashes, v));
        }

        t
    }
}

impl TryFrom<&TlvList> for SignResp {
    type Error = DecodeError;

    fn try_from(t: &TlvList) -> Result<Self, Self::Error> {
        let data = &t.require(Tag::Signature)?.value;
        if data.len() % SIGNATURE_LEN != 0 {
            return Err(DecodeError::InvalidValue(Tag::Signature));
        }

        let signatures = data
            .chunks_exact(SIGNATURE_LEN)
            .map(|c| {
                let mut s = [0u8; SIGNATURE_LEN];
                s.copy_from_slice(c);
                s
            })
            .collect();

        Ok(Self {
            card_id: t.get_array(Tag::CardId)?,
            signatures,
            remaining_signatures: t.get_uint_opt(Tag::RemainingSignatures)?,
            signed_hashes: t.get_uint_opt(Tag::SignedHashes)?,
        })
    }
}

crate::encdec_tlvs!(SignResp);

#[cfg(test)]
mod test {
    use alloc::vec;

    use rand::random;

    use super::*;
    use crate::test::{encode_decode_apdu, encode_decode_req};

    fn hashes(n: usize, size: usize) -> Vec<Vec<u8>> {
        (0..n).map(|_| (0..size).map(|_| random()).collect()).collect()
    }

    #[test]
    fn sign_req_apdu() {
        for n in 1..=MAX_HASHES_PER_REQUEST {
            let req = SignReq::new(random(), random(), random(), hashes(n, 32)).unwrap();
            let t = encode_decode_req(&req);

            assert_eq!(t.get_uint(Tag::TransactionOutHashSize), Ok(32));
            assert_eq!(t.require(Tag::TransactionOutHash).unwrap().value.len(), n * 32);
            assert_eq!(SignReq::try_from(&t).unwrap(), req);
        }
    }

    #[test]
    fn sign_req_with_wallet() {
        let req = SignReq::new(random(), random(), random(), hashes(2, 32))
            .unwrap()
            .with_wallet(vec![0x02; 33]);

        let t = encode_decode_req(&req);
        assert_eq!(SignReq::try_from(&t).unwrap(), req);
    }

    #[test]
    fn sign_req_rejects_mixed_sizes() {
        let mut h = hashes(3, 32);
        h[1].pop();

        assert_eq!(
            SignReq::new(random(), random(), random(), h),
            Err(EncodingError::InconsistentHashSize)
        );
        assert_eq!(
            SignReq::new(random(), random(), random(), vec![]),
            Err(EncodingError::InconsistentHashSize)
        );
    }

    #[test]
    fn sign_resp_order() {
        let signatures: Vec<[u8; SIGNATURE_LEN]> = (0..4u8).map(|i| [i; SIGNATURE_LEN]).collect();

        let r = SignResp {
            card_id: random(),
            signatures: signatures.clone(),
            remaining_signatures: Some(12),
            signed_hashes: None,
        };

        let d = SignResp::try_from(&r.tlvs()).unwrap();
        assert_eq!(d.signatures, signatures);
        assert_eq!(d, r);

        let mut buff = [0u8; 512];
        encode_decode_apdu(&mut buff, &r);
    }

    #[test]
    fn sign_resp_partial_signature() {
        let t = TlvList::new()
            .with(Tlv::new(Tag::CardId, [0u8; 8]))
            .with(Tlv::new(Tag::Signature, [0u8; 65]));

        assert_eq!(
            SignResp::try_from(&t),
            Err(DecodeError::InvalidValue(Tag::Signature))
        );
    }
}
