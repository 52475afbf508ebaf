// Copyright (c) 2023 The Tapsign Authors

use crc::{Crc, CRC_16_XMODEM};

use crate::{error::AddressError, helpers::convert_bits};

use super::AddressService;

const BASE32: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// StrKey version byte for ed25519 account ids (`G...`)
const ACCOUNT_ID_VERSION: u8 = 6 << 3;

/// Encoded length of an account id
const ACCOUNT_ID_LEN: usize = 56;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Stellar StrKey account ids
#[derive(Clone, Debug, Default)]
pub struct StellarAddressService;

impl StellarAddressService {
    /// Encode a raw ed25519 public key as an account id
    pub fn encode(public_key: &[u8; 32]) -> String {
        let mut payload = Vec::with_capacity(35);
        payload.push(ACCOUNT_ID_VERSION);
        payload.extend_from_slice(public_key);

        let crc = CRC16.checksum(&payload);
        payload.extend_from_slice(&crc.to_le_bytes());

        convert_bits(&payload, 8, 5, true)
            .unwrap_or_default()
            .iter()
            .map(|v| BASE32[*v as usize] as char)
            .collect()
    }

    /// Decode an account id to the raw ed25519 public key
    pub fn decode(address: &str) -> Result<[u8; 32], AddressError> {
        let invalid = || AddressError::InvalidAddress(address.to_string());

        if address.len() != ACCOUNT_ID_LEN {
            return Err(invalid());
        }

        let mut data = Vec::with_capacity(ACCOUNT_ID_LEN);
        for c in address.bytes() {
            match BASE32.iter().position(|v| *v == c) {
                Some(i) => data.push(i as u8),
                None => return Err(invalid()),
            }
        }

        let payload = convert_bits(&data, 5, 8, false).ok_or_else(invalid)?;
        if payload.len() != 35 || payload[0] != ACCOUNT_ID_VERSION {
            return Err(invalid());
        }

        let crc = u16::from_le_bytes([payload[33], payload[34]]);
        if crc != CRC16.checksum(&payload[..33]) {
            return Err(invalid());
        }

        let mut pk = [0u8; 32];
        pk.copy_from_slice(&payload[1..33]);
        Ok(pk)
    }
}

impl AddressService for StellarAddressService {
    fn make_address(&self, public_key: &[u8]) -> Result<String, AddressError> {
        let pk: [u8; 32] = public_key
            .try_into()
            .map_err(|_| AddressError::InvalidPublicKey(public_key.len()))?;

        ed25519_dalek::VerifyingKey::from_bytes(&pk)
            .map_err(|_| AddressError::InvalidPublicKey(public_key.len()))?;

        Ok(Self::encode(&pk))
    }

    fn validate(&self, address: &str) -> bool {
        Self::decode(address).is_ok()
    }
}

#[cfg(test)]
mod test {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn zero_key() {
        let a = StellarAddressService::encode(&[0u8; 32]);
        assert_eq!(a, "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF");
        assert_eq!(StellarAddressService::decode(&a).unwrap(), [0u8; 32]);
    }

    #[test]
    fn round_trip() {
        let s = StellarAddressService;

        for _ in 0..8 {
            let k = SigningKey::generate(&mut OsRng);
            let pk = k.verifying_key().to_bytes();

            let a = s.make_address(&pk).unwrap();
            assert_eq!(a.len(), 56);
            assert!(a.starts_with('G'));
            assert!(s.validate(&a));
            assert_eq!(StellarAddressService::decode(&a).unwrap(), pk);
        }
    }

    #[test]
    fn rejects_bad_input() {
        let s = StellarAddressService;

        assert!(!s.validate("GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHG"));
        assert!(!s.validate("gaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaawhf"));
        assert!(!s.validate("GAAAA"));
        assert_eq!(
            s.make_address(&[0u8; 33]),
            Err(AddressError::InvalidPublicKey(33))
        );
    }
}
