//! Template fingerprints
//!
//! A [`Fingerprint`] is a 32-byte Blake3 hash of a definition's
//! `(inputs, nodes, outputs)` serialized in declaration order. Owners record
//! the fingerprint their instance was built from; a mismatch with the current
//! definition means the instance is stale.

use crate::definition::{NodeDef, OutputDef, SocketDef, TemplateDefinition};
use crate::error::DefinitionError;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Prefix mixed into every fingerprint; bump when the serialized layout changes
const SCHEME: &[u8] = b"graft-fingerprint/v1\0";

/// Content hash of a template definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fingerprint([u8; 32]);

#[derive(Serialize)]
struct HashedParts<'a> {
    inputs: &'a IndexMap<String, SocketDef>,
    nodes: &'a IndexMap<String, NodeDef>,
    outputs: &'a IndexMap<String, OutputDef>,
}

impl Fingerprint {
    /// Fingerprint a definition
    ///
    /// Entry order is significant: reordering nodes changes build order and
    /// therefore the fingerprint.
    ///
    /// # Errors
    /// [`DefinitionError::Serialization`] if the definition cannot be encoded
    pub fn of(definition: &TemplateDefinition) -> Result<Self, DefinitionError> {
        let parts = HashedParts {
            inputs: &definition.inputs,
            nodes: &definition.nodes,
            outputs: &definition.outputs,
        };
        let encoded =
            serde_json::to_vec(&parts).map_err(|e| DefinitionError::Serialization(e.to_string()))?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(SCHEME);
        hasher.update(&encoded);
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// First 16 hex characters
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// All-zero placeholder meaning "built from an unknown definition"
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Parse failure for [`Fingerprint::from_str`]
#[derive(Debug, thiserror::Error)]
pub enum FingerprintParseError {
    /// Not hex
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Wrong number of bytes
    #[error("invalid fingerprint length: expected 32, got {0}")]
    InvalidLength(usize),
}

impl FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| FingerprintParseError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl serde::Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
