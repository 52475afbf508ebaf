// Copyright (c) 2023 The Tapsign Authors

//! Address derivation and validation per chain family

use bitcoin::{hashes::Hash, PubkeyHash, ScriptBuf};

use crate::error::AddressError;

mod base58;
pub use base58::Base58AddressService;

mod cashaddr;
pub use cashaddr::CashAddrService;

mod ethereum;
pub use ethereum::EthereumAddressService;

mod stellar;
pub use stellar::StellarAddressService;

/// Address service, derives and validates addresses for a chain
pub trait AddressService: Send + Sync {
    /// Derive the receive address for a wallet public key
    fn make_address(&self, public_key: &[u8]) -> Result<String, AddressError>;

    /// Check whether an address is valid on this chain
    fn validate(&self, address: &str) -> bool;
}

/// Standard P2PKH locking script for a public key hash
pub(crate) fn p2pkh_script(hash: &[u8; 20]) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(*hash))
}

/// Parse a secp256k1 public key and re-encode it in the requested form
pub(crate) fn secp256k1_key(public_key: &[u8], compressed: bool) -> Result<Vec<u8>, AddressError> {
    let pk = k256::PublicKey::from_sec1_bytes(public_key)
        .map_err(|_| AddressError::InvalidPublicKey(public_key.len()))?;

    use k256::elliptic_curve::sec1::ToEncodedPoint;
    Ok(pk.to_encoded_point(compressed).as_bytes().to_vec())
}

#[cfg(test)]
pub(crate) mod test {
    use k256::{elliptic_curve::sec1::ToEncodedPoint, SecretKey};

    /// Public key for the secret scalar `1` (the generator point)
    pub fn generator(compressed: bool) -> Vec<u8> {
        let mut b = [0u8; 32];
        b[31] = 1;

        let sk = SecretKey::from_slice(&b).unwrap();
        sk.public_key()
            .to_encoded_point(compressed)
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn p2pkh_layout() {
        let s = super::p2pkh_script(&[0xAB; 20]).into_bytes();
        assert_eq!(s.len(), 25);
        assert_eq!(&s[..3], &[0x76, 0xa9, 0x14]);
        assert_eq!(&s[23..], &[0x88, 0xac]);
    }
}
