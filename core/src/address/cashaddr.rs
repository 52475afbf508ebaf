// Copyright (c) 2023 The Tapsign Authors

use crate::{error::AddressError, helpers::{convert_bits, hash160}};

use super::{secp256k1_key, AddressService};

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Version byte for a P2PKH address with a 160-bit hash
const P2PKH_VERSION: u8 = 0x00;

/// Checksum length in 5-bit groups
const CHECKSUM_LEN: usize = 8;

/// CashAddr addresses (`bitcoincash:q...`)
#[derive(Clone, Debug)]
pub struct CashAddrService {
    prefix: &'static str,
}

impl CashAddrService {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    /// Compressed public key hash for a wallet key
    pub fn key_hash(&self, public_key: &[u8]) -> Result<[u8; 20], AddressError> {
        let pk = secp256k1_key(public_key, true)?;
        Ok(hash160(&pk))
    }

    /// Encode a public key hash with the network prefix
    pub fn encode(&self, hash: &[u8; 20]) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(P2PKH_VERSION);
        payload.extend_from_slice(hash);

        // Padding is always valid when encoding whole bytes
        let data = convert_bits(&payload, 8, 5, true).unwrap_or_default();
        let checksum = checksum(self.prefix, &data);

        let mut s = String::with_capacity(self.prefix.len() + 1 + data.len() + CHECKSUM_LEN);
        s.push_str(self.prefix);
        s.push(':');
        for d in data.iter().chain(checksum.iter()) {
            s.push(CHARSET[*d as usize] as char);
        }

        s
    }

    /// Decode an address to its public key hash
    ///
    /// The prefix may be omitted, mixed case is rejected.
    pub fn decode(&self, address: &str) -> Result<[u8; 20], AddressError> {
        let invalid = || AddressError::InvalidAddress(address.to_string());

        let has_lower = address.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = address.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(invalid());
        }
        let address_lc = address.to_ascii_lowercase();

        let body = match address_lc.split_once(':') {
            Some((p, b)) if p == self.prefix => b,
            Some(_) => return Err(invalid()),
            None => address_lc.as_str(),
        };

        let mut data = Vec::with_capacity(body.len());
        for c in body.bytes() {
            match CHARSET.iter().position(|v| *v == c) {
                Some(i) => data.push(i as u8),
                None => return Err(invalid()),
            }
        }

        if data.len() <= CHECKSUM_LEN || polymod(self.prefix, &data) != 0 {
            return Err(invalid());
        }

        let payload = convert_bits(&data[..data.len() - CHECKSUM_LEN], 5, 8, false)
            .ok_or_else(invalid)?;
        if payload.len() != 21 || payload[0] != P2PKH_VERSION {
            return Err(invalid());
        }

        let mut h = [0u8; 20];
        h.copy_from_slice(&payload[1..]);
        Ok(h)
    }
}

impl AddressService for CashAddrService {
    fn make_address(&self, public_key: &[u8]) -> Result<String, AddressError> {
        let h = self.key_hash(public_key)?;
        Ok(self.encode(&h))
    }

    fn validate(&self, address: &str) -> bool {
        self.decode(address).is_ok()
    }
}

fn checksum(prefix: &str, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut padded = Vec::with_capacity(data.len() + CHECKSUM_LEN);
    padded.extend_from_slice(data);
    padded.extend_from_slice(&[0u8; CHECKSUM_LEN]);

    let c = polymod(prefix, &padded);

    let mut out = [0u8; CHECKSUM_LEN];
    for (i, v) in out.iter_mut().enumerate() {
        *v = ((c >> (5 * (7 - i))) & 0x1f) as u8;
    }
    out
}

/// BCH code over the prefix (low 5 bits), a zero separator and the data
fn polymod(prefix: &str, data: &[u8]) -> u64 {
    let values = prefix
        .bytes()
        .map(|b| b & 0x1f)
        .chain(core::iter::once(0))
        .chain(data.iter().copied());

    let mut c = 1u64;
    for d in values {
        c = polymod_step(c, d);
    }

    c ^ 1
}

#[inline]
fn polymod_step(c: u64, value: u8) -> u64 {
    const GEN: [u64; 5] = [
        0x98f2bc8e61,
        0x79b76d99e2,
        0xf33e5fb3c4,
        0xae2eabe2a8,
        0x1e4f43e470,
    ];

    let c0 = c >> 35;
    let mut c = ((c & 0x07_ffff_ffff) << 5) ^ (value as u64);

    for (i, g) in GEN.iter().enumerate() {
        if (c0 >> i) & 1 == 1 {
            c ^= g;
        }
    }

    c
}
