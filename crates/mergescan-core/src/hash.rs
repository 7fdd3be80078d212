//! Bind fingerprints.
//!
//! A fingerprint is the BLAKE3 digest of a value's JSON encoding. Manifests
//! store it as a 64-character lowercase hex string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    pub fn from_hex(s: &str) -> Result<Self, Error> {
        blake3::Hash::from_hex(s)
            .map(|h| Hash256(*h.as_bytes()))
            .map_err(|e| Error::Hash(format!("'{}': {}", s, e)))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    Hash256(*blake3::hash(bytes).as_bytes())
}

/// Fingerprint any serializable value through its JSON encoding.
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256, Error> {
    let bytes = serde_json::to_vec(v).map_err(|e| Error::Hash(e.to_string()))?;
    Ok(hash_bytes(&bytes))
}
