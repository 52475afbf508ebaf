// Copyright (c) 2023 The Tapsign Authors

//! Hashing and bit regrouping helpers shared by builders and address services

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// SHA-256
pub fn sha256(d: &[u8]) -> [u8; 32] {
    Sha256::digest(d).into()
}

/// RIPEMD-160 of SHA-256
pub fn hash160(d: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(d)).into()
}

/// Keccak-256
pub fn keccak256(d: &[u8]) -> [u8; 32] {
    Keccak256::digest(d).into()
}

/// Regroup a bit stream from `from`-bit to `to`-bit words
///
/// Used by base32 address formats. Returns `None` when input words exceed
/// `from` bits or, without padding, when leftover bits are non-zero.
pub fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc = 0u32;
    let mut bits = 0u32;
    let max_value = (1u32 << to) - 1;
    let mut output = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        if (value as u32) >> from != 0 {
            return None;
        }

        acc = (acc << from) | (value as u32);
        bits += from;

        while bits >= to {
            bits -= to;
            output.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            output.push(((acc << (to - bits)) & max_value) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_value) != 0 {
        return None;
    }

    Some(output)
}
