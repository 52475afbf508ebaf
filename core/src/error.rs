// Copyright (c) 2023 The Tapsign Authors

use crate::Blockchain;

/// Address derivation and validation errors
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum AddressError {
    /// Public key could not be parsed for this chain
    #[error("invalid public key ({0} bytes)")]
    InvalidPublicKey(usize),

    /// Address string failed to decode
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Transaction build errors
///
/// These never involve the card and are surfaced immediately.
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum BuildError {
    /// Inputs cannot cover amount and fee
    #[error("insufficient funds (available: {available}, required: {required})")]
    InsufficientFunds { available: u128, required: u128 },

    /// No unspent outputs available
    #[error("no unspent outputs")]
    NoUtxo,

    /// Chain state does not match the builder
    #[error("unsupported chain state for {0}")]
    UnsupportedState(&'static str),

    /// Address error
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Unspent output from the provider could not be used
    #[error("invalid unspent output: {0}")]
    InvalidUnspent(String),

    /// Amount out of range for the chain encoding
    #[error("amount {0} out of range")]
    AmountOverflow(u128),

    /// Signature could not be parsed or does not verify
    #[error("invalid signature at index {0}")]
    InvalidSignature(usize),

    /// Signature count does not match the number of hashes
    #[error("signature count mismatch (expected: {expected}, actual: {actual})")]
    SignatureCount { expected: usize, actual: usize },

    /// Wallet public key unusable for this chain
    #[error("invalid wallet public key")]
    InvalidPublicKey,

    /// Sighash could not be computed
    #[error("sighash failed: {0}")]
    Sighash(String),

    /// Token transfers are not available on this chain
    #[error("token transfers unsupported by {0}")]
    TokenUnsupported(&'static str),

    /// Fee does not divide into a whole gas price
    #[error("fee {fee} is not a non-zero multiple of gas limit {gas_limit}")]
    GasPrice { fee: u128, gas_limit: u64 },
}

/// Wallet manager errors
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Transaction build failed
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    /// Signing failed
    #[error("signing failed: {0}")]
    Signing(#[source] anyhow::Error),

    /// Network provider failed
    #[error("network error: {0}")]
    Network(#[source] anyhow::Error),

    /// Signing key curve does not match the chain
    #[error("key curve {curve} unsupported by {blockchain}")]
    CurveMismatch {
        curve: tapsign_apdu::Curve,
        blockchain: Blockchain,
    },

    /// Address derivation failed
    #[error(transparent)]
    Address(#[from] AddressError),
}
