//! Content addressing for blobs.
//!
//! A blobref is `<algorithm>-<lowercase hex digest>` of a blob's exact bytes,
//! so any holder of the bytes can check the ref without trusting the server.

mod blob;
mod content_address;

pub use blob::Blob;
pub use content_address::{address_of, address_of_reader, verify, BlobRef, HashAlgorithm};
