// Clippy configuration for camli crate
// Allow size arithmetic between u64 and usize
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
// Allow similar names (blob_ref / blob_refs)
#![allow(clippy::similar_names)]
// Allow map().unwrap_or() pattern
#![allow(clippy::map_unwrap_or)]
// Allow redundant closures for clarity
#![allow(clippy::redundant_closure_for_method_calls)]
// Doc backticks optional
#![allow(clippy::doc_markdown)]
// Allow missing docs for internal items
#![allow(clippy::missing_panics_doc)]
// Allow identical match arms for clarity
#![allow(clippy::match_same_arms)]
// Allow map_or patterns
#![allow(clippy::option_if_let_else)]
// Allow pass-by-value for Arc handles
#![allow(clippy::needless_pass_by_value)]

//! Camli: client for content-addressed blob servers
//!
//! Camli talks to a Camlistore-style server over HTTP: it discovers the
//! server's capability roots, stores and fetches blobs by content hash,
//! and queries the search index for descriptions and permanode claims.
//!
//! # Quick Start
//!
//! ```no_run
//! use camli::prelude::*;
//!
//! // Discover the server's blob, search and signing roots
//! let conn = camli::connect("http://localhost:3179/")?;
//!
//! // Store a blob; nothing is uploaded if the server already has it
//! let blob = Blob::new("hello");
//! let blob_ref = conn.blobs().put(&blob)?;
//! assert_eq!(blob_ref.as_str(), "sha1-aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
//!
//! // Read it back, checking the content against its address
//! let data = conn.blobs().get_verified(&blob_ref)?;
//!
//! // Fold a permanode's claims into its current attributes
//! let permanode = BlobRef::new("sha1-0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33");
//! let state = conn.search().permanode_state(&permanode)?;
//! println!("title: {:?}", state.attr("title"));
//! # Ok::<(), camli::CamliError>(())
//! ```
//!
//! # Architecture
//!
//! - **address** - `BlobRef` content addresses and the `Blob` value type
//! - **blobs** - blob store client: get, stat, batched put, lazy enumeration
//! - **search** - search client: queries, descriptions, claims
//! - **connection** - discovery via `?camli.mode=config`
//! - **transport** - the HTTP seam every client sends through
//!
//! All calls are blocking and issue one request at a time. Nothing is
//! retried; retry policy belongs to the caller.

pub mod address;
pub mod blobs;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod prelude;
pub mod search;
pub mod transport;

pub use address::{address_of, verify, Blob, BlobRef, HashAlgorithm};
#[cfg(feature = "remote")]
pub use connection::{connect, connect_with_config};
pub use connection::{connect_with, Connection};
pub use error::{CamliError, Capability, Result};
