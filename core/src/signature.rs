// Copyright (c) 2023 The Tapsign Authors

//! Signature canonicalisation and per-chain encodings
//!
//! Cards return raw 64-byte signatures (`r || s` for secp256k1, `R || S`
//! for ed25519). Each chain family wraps these differently before they
//! are placed in a transaction, see [SignatureEncoding].
//!
//! Errors report signature index `0`, builders re-index them per input.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::error::BuildError;

/// Raw card signature length
pub const RAW_SIGNATURE_LEN: usize = 64;

/// Per-chain signature encoding policy
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SignatureEncoding {
    /// Low-s DER followed by a sighash type byte
    Der { sighash: u8 },
    /// Low-s `r || s || recid`, recovery id found by trial recovery
    Recoverable,
    /// Raw signature as returned by the card
    Raw,
}

impl SignatureEncoding {
    /// Encode a raw card signature over `prehash` made by `public_key`
    pub fn encode(
        &self,
        raw: &[u8],
        prehash: &[u8],
        public_key: &[u8],
    ) -> Result<Vec<u8>, BuildError> {
        match self {
            SignatureEncoding::Der { sighash } => {
                let sig = normalize_s(raw)?;
                let mut out = to_der(&sig)?;
                out.push(*sighash);
                Ok(out)
            }
            SignatureEncoding::Recoverable => {
                let sig = normalize_s(raw)?;
                let recid = recovery_id(prehash, &sig, public_key)?;

                let mut out = sig.to_vec();
                out.push(recid);
                Ok(out)
            }
            SignatureEncoding::Raw => {
                if raw.len() != RAW_SIGNATURE_LEN {
                    return Err(BuildError::InvalidSignature(0));
                }
                Ok(raw.to_vec())
            }
        }
    }
}

/// Canonicalise a secp256k1 signature to low-s form
///
/// Signatures already in low-s form are returned unchanged.
pub fn normalize_s(raw: &[u8]) -> Result<[u8; RAW_SIGNATURE_LEN], BuildError> {
    let sig = Signature::from_slice(raw).map_err(|_| BuildError::InvalidSignature(0))?;
    let sig = sig.normalize_s().unwrap_or(sig);

    let mut out = [0u8; RAW_SIGNATURE_LEN];
    out.copy_from_slice(&sig.to_bytes());
    Ok(out)
}

/// DER encode a `r || s` signature
pub fn to_der(sig: &[u8; RAW_SIGNATURE_LEN]) -> Result<Vec<u8>, BuildError> {
    let sig = Signature::from_slice(sig).map_err(|_| BuildError::InvalidSignature(0))?;
    Ok(sig.to_der().as_bytes().to_vec())
}

/// Find the recovery id that yields `public_key` for this signature
pub fn recovery_id(
    prehash: &[u8],
    sig: &[u8; RAW_SIGNATURE_LEN],
    public_key: &[u8],
) -> Result<u8, BuildError> {
    let expected =
        VerifyingKey::from_sec1_bytes(public_key).map_err(|_| BuildError::InvalidPublicKey)?;
    let signature =
        Signature::from_slice(sig).map_err(|_| BuildError::InvalidSignature(0))?;

    for id in 0u8..2 {
        let recid = match RecoveryId::from_byte(id) {
            Some(v) => v,
            None => continue,
        };

        match VerifyingKey::recover_from_prehash(prehash, &signature, recid) {
            Ok(k) if k == expected => return Ok(id),
            _ => (),
        }
    }

    Err(BuildError::InvalidSignature(0))
}
