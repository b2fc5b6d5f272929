//! Convenient re-exports for common usage.
//!
//! ```
//! use camli::prelude::*;
//! ```

// Core types
pub use crate::error::{CamliError, Capability, Result};

// Addressing
pub use crate::address::{address_of, verify, Blob, BlobRef, HashAlgorithm};

// Clients
pub use crate::blobs::{BlobClient, BlobMeta, EnumerateBlobs};
pub use crate::connection::{connect_with, Connection};
pub use crate::search::{BlobDescription, Claim, PermanodeState, SearchClient, SearchResult};

// Transport
pub use crate::transport::{HttpRequest, HttpResponse, Transport};

// Configuration
pub use crate::config::ClientConfig;
