#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Content hashes for the CAS client
//!
//! Descriptor hashes arrive as `sha256:<hex>`, `blake3:<hex>` or bare hex.
//! This crate parses them, computes them incrementally over reassembled
//! files and verifies files on the blocking thread pool.

use hubcas_errors::{Error, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Size of chunks for streaming hash computation
const READ_BUFFER_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    #[must_use]
    pub fn hasher(self) -> ContentHasher {
        ContentHasher::new(self)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(StorageError::CorruptedData {
                message: format!("unsupported hash algorithm: {other}"),
            }
            .into()),
        }
    }
}

/// A 32-byte digest together with the algorithm that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash {
    algorithm: HashAlgorithm,
    bytes: [u8; 32],
}

impl ContentHash {
    #[must_use]
    pub fn from_bytes(algorithm: HashAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Parse a descriptor hash. Unprefixed hex is taken to be `default`.
    ///
    /// # Errors
    /// Returns an error for an unknown prefix, invalid hex, or a digest that is not 32 bytes.
    pub fn parse(s: &str, default: HashAlgorithm) -> Result<Self, Error> {
        let (algorithm, hex_part) = match s.split_once(':') {
            Some((prefix, rest)) => (prefix.parse::<HashAlgorithm>()?, rest),
            None => (default, s),
        };

        let bytes = hex::decode(hex_part.trim()).map_err(|e| StorageError::CorruptedData {
            message: format!("invalid hex in hash `{s}`: {e}"),
        })?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| StorageError::CorruptedData {
                message: format!("hash must be 32 bytes, got {}", b.len()),
            })?;

        Ok(Self::from_bytes(algorithm, bytes))
    }

    /// Compute the hash of a byte slice
    #[must_use]
    pub fn from_data(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let mut hasher = algorithm.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Lowercase hex digest without the algorithm prefix
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Compute the hash of a file on the blocking pool, returning it with the file length
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub async fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<(Self, u64), Error> {
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || hash_file_blocking(&owned, algorithm))
            .await
            .map_err(|e| Error::internal(format!("hashing task failed: {e}")))?
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s, HashAlgorithm::default()).map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher over either supported algorithm
#[derive(Clone)]
pub enum ContentHasher {
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl ContentHasher {
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => {
                use sha2::Digest;
                Self::Sha256(sha2::Sha256::new())
            }
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => {
                use sha2::Digest;
                h.update(data);
            }
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    #[must_use]
    pub fn finalize(self) -> ContentHash {
        match self {
            Self::Sha256(h) => {
                use sha2::Digest;
                let mut out = [0u8; 32];
                out.copy_from_slice(&h.finalize());
                ContentHash::from_bytes(HashAlgorithm::Sha256, out)
            }
            Self::Blake3(h) => {
                ContentHash::from_bytes(HashAlgorithm::Blake3, *h.finalize().as_bytes())
            }
        }
    }
}

fn hash_file_blocking(path: &Path, algorithm: HashAlgorithm) -> Result<(ContentHash, u64), Error> {
    let mut file =
        std::fs::File::open(path).map_err(|e| StorageError::from_io_with_path(&e, path))?;
    let mut hasher = algorithm.hasher();
    let mut buffer = vec![0; READ_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = file
            .read(&mut buffer)
            .map_err(|e| Error::io_with_path(&e, path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    Ok((hasher.finalize(), total))
}
