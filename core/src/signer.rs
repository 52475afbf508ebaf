// Copyright (c) 2023 The Tapsign Authors

//! Signer interface, implemented by the card signing gateway

use serde::{Deserialize, Serialize};

use tapsign_apdu::Curve;

/// Reference to a card wallet key
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct KeyRef {
    #[serde(with = "curve_name")]
    pub curve: Curve,
    /// Public key as stored on the card (SEC1 for secp256k1, raw for ed25519)
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
}

impl KeyRef {
    pub fn new(curve: Curve, public_key: &[u8]) -> Self {
        Self {
            curve,
            public_key: public_key.to_vec(),
        }
    }
}

/// Signs batches of hashes with a wallet key
///
/// Implementations return exactly one raw signature per hash, in order,
/// or fail the whole batch.
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn sign(&self, hashes: &[Vec<u8>], key: &KeyRef) -> Result<Vec<Vec<u8>>, Self::Error>;
}

mod curve_name {
    use core::str::FromStr;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tapsign_apdu::Curve;

    pub fn serialize<S: Serializer>(c: &Curve, s: S) -> Result<S::Ok, S::Error> {
        let n: &'static str = c.into();
        s.serialize_str(n)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Curve, D::Error> {
        let n = String::deserialize(d)?;
        Curve::from_str(&n).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_ref_json() {
        let k = KeyRef::new(Curve::Ed25519, &[0xAA, 0x01]);

        let s = serde_json::to_string(&k).unwrap();
        assert_eq!(s, r#"{"curve":"ed25519","public_key":"aa01"}"#);

        let d: KeyRef = serde_json::from_str(&s).unwrap();
        assert_eq!(d, k);
    }
}
