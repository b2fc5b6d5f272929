//! Content addressing: blobrefs derived from a digest of the exact bytes.

use crate::error::{CamliError, Result};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::borrow::Borrow;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Hash algorithm used to derive a blobref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-1, the server's historic default.
    #[default]
    Sha1,
    /// SHA-224.
    Sha224,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
    /// BLAKE3 (256-bit output).
    Blake3,
}

impl HashAlgorithm {
    /// All supported algorithms.
    pub const ALL: [Self; 6] = [
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Blake3,
    ];

    /// Name as it appears in a blobref prefix.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }

    /// Digest length in bytes.
    #[must_use]
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 | Self::Blake3 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Compute the raw digest of `data`.
    #[must_use]
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = Hasher::new(*self);
        hasher.update(data);
        hasher.finalize()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CamliError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == s)
            .ok_or_else(|| CamliError::UnsupportedAlgorithm(s.to_string()))
    }
}

/// Incremental digest state for any supported algorithm.
enum Hasher {
    Sha1(sha1::Sha1),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => Self::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha224 => Self::Sha224(sha2::Sha224::new()),
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha384 => Self::Sha384(sha2::Sha384::new()),
            HashAlgorithm::Sha512 => Self::Sha512(sha2::Sha512::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha224(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha224(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha384(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
            Self::Blake3(h) => h.finalize().as_bytes().to_vec(),
        }
    }
}

/// Content-derived blob identifier of the form `<algorithm>-<hex digest>`.
///
/// Equality is string equality. Construction through [`BlobRef::new`] or
/// `From` is unchecked because servers and callers may hand out refs this
/// client does not know how to hash; use [`BlobRef::parse`] for validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    /// Wrap a ref string without validating it.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parse and validate a blobref.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlobRef` for a malformed ref and
    /// `UnsupportedAlgorithm` for an unknown algorithm prefix.
    pub fn parse(s: &str) -> Result<Self> {
        let (alg, digest) = s
            .split_once('-')
            .ok_or_else(|| CamliError::InvalidBlobRef(s.to_string()))?;
        let algorithm: HashAlgorithm = alg.parse()?;

        let well_formed = digest.len() == algorithm.digest_len() * 2
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(CamliError::InvalidBlobRef(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }

    /// Build a ref from a raw digest.
    #[must_use]
    pub fn from_digest(algorithm: HashAlgorithm, digest: &[u8]) -> Self {
        Self(format!("{}-{}", algorithm.name(), hex::encode(digest)))
    }

    /// Algorithm name portion, if the ref has a `-` separator.
    #[must_use]
    pub fn algorithm_name(&self) -> Option<&str> {
        self.0.split_once('-').map(|(alg, _)| alg)
    }

    /// Hex digest portion, if the ref has a `-` separator.
    #[must_use]
    pub fn digest_hex(&self) -> Option<&str> {
        self.0.split_once('-').map(|(_, digest)| digest)
    }

    /// Parsed hash algorithm.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlobRef` if there is no algorithm prefix and
    /// `UnsupportedAlgorithm` if the prefix is unknown.
    pub fn algorithm(&self) -> Result<HashAlgorithm> {
        self.algorithm_name()
            .ok_or_else(|| CamliError::InvalidBlobRef(self.0.clone()))?
            .parse()
    }

    /// The ref as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlobRef {
    type Err = CamliError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&str> for BlobRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BlobRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for BlobRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BlobRef {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Compute the blobref of `data` under `algorithm`.
#[must_use]
pub fn address_of(data: &[u8], algorithm: HashAlgorithm) -> BlobRef {
    BlobRef::from_digest(algorithm, &algorithm.digest(data))
}

/// Compute the blobref of everything readable from `reader`.
///
/// # Errors
///
/// Returns an error if reading fails.
pub fn address_of_reader<R: Read>(mut reader: R, algorithm: HashAlgorithm) -> Result<BlobRef> {
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(BlobRef::from_digest(algorithm, &hasher.finalize()))
}

/// Check that `data` hashes to `blob_ref` under the algorithm named by the ref.
///
/// # Errors
///
/// Returns `HashMismatch` carrying both refs when they differ, or the
/// algorithm errors of [`BlobRef::algorithm`].
pub fn verify(blob_ref: &BlobRef, data: &[u8]) -> Result<()> {
    let actual = address_of(data, blob_ref.algorithm()?);
    if actual == *blob_ref {
        Ok(())
    } else {
        Err(CamliError::HashMismatch {
            expected: blob_ref.clone(),
            actual,
        })
    }
}
