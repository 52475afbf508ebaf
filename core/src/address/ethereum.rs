// Copyright (c) 2023 The Tapsign Authors

use crate::{error::AddressError, helpers::keccak256};

use super::{secp256k1_key, AddressService};

/// Hex addresses with EIP-55 mixed case checksums
///
/// Chains listed with a checksum chain id (Rootstock) mix it into the
/// checksum hash as described by EIP-1191.
#[derive(Clone, Debug)]
pub struct EthereumAddressService {
    checksum_chain_id: Option<u64>,
}

impl EthereumAddressService {
    pub fn new(checksum_chain_id: Option<u64>) -> Self {
        Self { checksum_chain_id }
    }

    /// Raw 20-byte address for a wallet key
    pub fn key_address(public_key: &[u8]) -> Result<[u8; 20], AddressError> {
        let pk = secp256k1_key(public_key, false)?;
        let h = keccak256(&pk[1..]);

        let mut a = [0u8; 20];
        a.copy_from_slice(&h[12..]);
        Ok(a)
    }

    /// Format a raw address with checksum casing
    pub fn encode(&self, address: &[u8; 20]) -> String {
        let lower = hex::encode(address);

        let h = match self.checksum_chain_id {
            Some(id) => keccak256(format!("{id}0x{lower}").as_bytes()),
            None => keccak256(lower.as_bytes()),
        };

        let mut s = String::with_capacity(42);
        s.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (h[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                s.push(c.to_ascii_uppercase());
            } else {
                s.push(c);
            }
        }

        s
    }

    /// Decode an address, checking the checksum when mixed case is used
    pub fn decode(&self, address: &str) -> Result<[u8; 20], AddressError> {
        let invalid = || AddressError::InvalidAddress(address.to_string());

        let body = address.strip_prefix("0x").ok_or_else(invalid)?;
        if body.len() != 40 {
            return Err(invalid());
        }

        let mut a = [0u8; 20];
        hex::decode_to_slice(body, &mut a).map_err(|_| invalid())?;

        let all_lower = !body.chars().any(|c| c.is_ascii_uppercase());
        let all_upper = !body.chars().any(|c| c.is_ascii_lowercase());
        if !all_lower && !all_upper && self.encode(&a) != address {
            return Err(invalid());
        }

        Ok(a)
    }
}

impl AddressService for EthereumAddressService {
    fn make_address(&self, public_key: &[u8]) -> Result<String, AddressError> {
        let a = Self::key_address(public_key)?;
        Ok(self.encode(&a))
    }

    fn validate(&self, address: &str) -> bool {
        self.decode(address).is_ok()
    }
}
