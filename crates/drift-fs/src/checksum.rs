//! SHA-256 content fingerprints
//!
//! A [`Fingerprint`] is the only equality test applied to file bodies: two
//! files are identical exactly when their fingerprints are. Modification times
//! and paths never participate. The canonical text form is `sha256:<hex>`.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Prefix for the canonical text form
const PREFIX: &str = "sha256:";

/// Length in bytes of a fingerprint digest
pub const FINGERPRINT_LEN: usize = 32;

/// Read buffer used when hashing streams
const CHUNK_SIZE: usize = 64 * 1024;

/// Fixed-length content digest identifying a file body.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint an in-memory byte slice.
    pub fn of(content: &[u8]) -> Self {
        Self::from_digest(Sha256::digest(content).as_slice())
    }

    /// Fingerprint a stream without buffering it whole.
    ///
    /// Returns the digest together with the number of bytes consumed.
    pub fn of_reader(mut reader: impl Read) -> std::io::Result<(Self, u64)> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            total += read as u64;
        }
        Ok((Self::from_digest(hasher.finalize().as_slice()), total))
    }

    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex digest without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First twelve hex digits, for compact human output.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }

    fn from_digest(digest: &[u8]) -> Self {
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(digest);
        Self(bytes)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", PREFIX, self.to_hex())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    /// Accepts both the canonical `sha256:<hex>` form and bare hex.
    fn from_str(s: &str) -> Result<Self> {
        let hex_part = s.strip_prefix(PREFIX).unwrap_or(s);
        let decoded = hex::decode(hex_part).map_err(|e| Error::InvalidFingerprint {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        if decoded.len() != FINGERPRINT_LEN {
            return Err(Error::InvalidFingerprint {
                value: s.to_string(),
                reason: format!("expected {} bytes, got {}", FINGERPRINT_LEN, decoded.len()),
            });
        }
        Ok(Self::from_digest(&decoded))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the fingerprint of in-memory content.
pub fn fingerprint(content: &[u8]) -> Fingerprint {
    Fingerprint::of(content)
}

/// Compute the fingerprint and length of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn fingerprint_file(path: &Path) -> Result<(Fingerprint, u64)> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    Fingerprint::of_reader(std::io::BufReader::new(file)).map_err(|e| Error::io(path, e))
}
