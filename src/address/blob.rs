//! Blob: a byte payload plus its derived, memoized blobref.

use super::content_address::{address_of, verify, BlobRef, HashAlgorithm};
use crate::error::Result;
use std::cell::OnceCell;

/// A byte payload whose blobref is derived from its content.
///
/// The ref is computed on first access and cached until the data or the
/// algorithm changes.
#[derive(Debug, Clone)]
pub struct Blob {
    data: Vec<u8>,
    algorithm: HashAlgorithm,
    blob_ref: OnceCell<BlobRef>,
}

impl Blob {
    /// Create a blob hashed with the default algorithm (SHA-1).
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self::with_algorithm(data, HashAlgorithm::default())
    }

    /// Create a blob hashed with `algorithm`.
    #[must_use]
    pub fn with_algorithm(data: impl Into<Vec<u8>>, algorithm: HashAlgorithm) -> Self {
        Self {
            data: data.into(),
            algorithm,
            blob_ref: OnceCell::new(),
        }
    }

    /// Create a blob that must hash to `expected`.
    ///
    /// The algorithm is taken from the ref's prefix.
    ///
    /// # Errors
    ///
    /// Returns `HashMismatch` if the data does not hash to `expected`, or an
    /// algorithm error if the ref's prefix is unusable.
    pub fn with_blobref(data: impl Into<Vec<u8>>, expected: BlobRef) -> Result<Self> {
        let data = data.into();
        let algorithm = expected.algorithm()?;
        verify(&expected, &data)?;

        Ok(Self {
            data,
            algorithm,
            blob_ref: OnceCell::from(expected),
        })
    }

    /// The blob's content address.
    pub fn blob_ref(&self) -> &BlobRef {
        self.blob_ref
            .get_or_init(|| address_of(&self.data, self.algorithm))
    }

    /// The payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The hash algorithm.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Replace the payload, invalidating the cached ref.
    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        self.data = data.into();
        self.blob_ref.take();
    }

    /// Change the hash algorithm, invalidating the cached ref.
    pub fn set_algorithm(&mut self, algorithm: HashAlgorithm) {
        if algorithm != self.algorithm {
            self.algorithm = algorithm;
            self.blob_ref.take();
        }
    }

    /// Consume the blob and return the payload.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.data == other.data
    }
}

impl Eq for Blob {}

impl From<Vec<u8>> for Blob {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Blob {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}
