// Copyright (c) 2023 The Tapsign Authors

use crate::{blockchain::BitcoinNetwork, error::AddressError, helpers::hash160};

use super::{secp256k1_key, AddressService};

/// Base58check P2PKH addresses (bitcoin and derived chains)
#[derive(Clone, Debug)]
pub struct Base58AddressService {
    network: BitcoinNetwork,
}

impl Base58AddressService {
    pub fn new(network: BitcoinNetwork) -> Self {
        Self { network }
    }

    /// Public key hash for a wallet key, in the form the network uses
    pub fn key_hash(&self, public_key: &[u8]) -> Result<[u8; 20], AddressError> {
        let pk = secp256k1_key(public_key, self.network.compressed_keys)?;
        Ok(hash160(&pk))
    }

    /// Decode an address to its public key hash
    pub fn decode(&self, address: &str) -> Result<[u8; 20], AddressError> {
        let invalid = || AddressError::InvalidAddress(address.to_string());

        let v = bs58::decode(address)
            .with_check(Some(self.network.p2pkh_version))
            .into_vec()
            .map_err(|_| invalid())?;

        // Version byte is retained in the decoded payload
        if v.len() != 21 {
            return Err(invalid());
        }

        let mut h = [0u8; 20];
        h.copy_from_slice(&v[1..]);
        Ok(h)
    }

    /// Encode a public key hash
    pub fn encode(&self, hash: &[u8; 20]) -> String {
        bs58::encode(hash)
            .with_check_version(self.network.p2pkh_version)
            .into_string()
    }
}

impl AddressService for Base58AddressService {
    fn make_address(&self, public_key: &[u8]) -> Result<String, AddressError> {
        let h = self.key_hash(public_key)?;
        Ok(self.encode(&h))
    }

    fn validate(&self, address: &str) -> bool {
        self.decode(address).is_ok()
    }
}
