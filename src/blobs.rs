//! Blob store client.
//!
//! Wraps the blob server endpoints under a `blobRoot`:
//!
//! | Endpoint | Method |
//! |---|---|
//! | `camli/<blobref>` | GET, HEAD |
//! | `camli/enumerate-blobs[?after=X]` | GET |
//! | `camli/stat` | POST form |
//! | `camli/upload` | POST multipart |
//!
//! # Example
//!
//! ```no_run
//! use camli::prelude::*;
//!
//! let conn = camli::connect("http://localhost:3179/")?;
//! let blob_ref = conn.blobs().put(&Blob::new("hello"))?;
//! assert_eq!(conn.blobs().get(&blob_ref)?, b"hello");
//!
//! for meta in conn.blobs().enumerate()? {
//!     let meta = meta?;
//!     println!("{} {:?}", meta.blob_ref(), meta.size());
//! }
//! # Ok::<(), camli::CamliError>(())
//! ```

use crate::address::{verify, Blob, BlobRef};
use crate::error::{Capability, CamliError, Result};
use crate::transport::{FilePart, HttpRequest, Transport};
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// Largest upload batch the server accepts.
pub const MAX_UPLOAD_BYTES: u64 = 32 * 1024 * 1024;

/// Protocol version sent with stat requests.
const STAT_PROTOCOL_VERSION: &str = "1";

const OCTET_STREAM: &str = "application/octet-stream";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct StatResponse {
    #[serde(default)]
    stat: Option<Vec<SizedRef>>,
}

#[derive(Debug, Deserialize)]
struct SizedRef {
    #[serde(rename = "blobRef")]
    blob_ref: BlobRef,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EnumeratePage {
    #[serde(default)]
    blobs: Option<Vec<SizedRef>>,
    #[serde(rename = "continueAfter", default)]
    continue_after: Option<String>,
}

// ============================================================================
// Blob client
// ============================================================================

/// Client for a server's blob store.
///
/// Constructed without a base URL when the server does not advertise one;
/// every operation then fails with `FeatureUnavailable` before any request.
#[derive(Clone)]
pub struct BlobClient {
    transport: Arc<dyn Transport>,
    base_url: Option<Url>,
    upload_limit: u64,
}

impl fmt::Debug for BlobClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobClient")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("upload_limit", &self.upload_limit)
            .finish_non_exhaustive()
    }
}

impl BlobClient {
    /// Create a client bound to `base_url` (the server's `blobRoot`).
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, base_url: Option<Url>) -> Self {
        Self {
            transport,
            base_url,
            upload_limit: MAX_UPLOAD_BYTES,
        }
    }

    /// Override the upload batch limit.
    #[must_use]
    pub fn with_upload_limit(mut self, limit: u64) -> Self {
        self.upload_limit = limit;
        self
    }

    /// The blob root, if the server has one.
    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Whether the blob interface is available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.base_url.is_some()
    }

    fn make_url(&self, path: &str) -> Result<Url> {
        let base = self
            .base_url
            .as_ref()
            .ok_or(CamliError::FeatureUnavailable(Capability::Blob))?;
        Ok(base.join(path)?)
    }

    /// URL of a single blob.
    ///
    /// The ref always becomes exactly one percent-encoded path segment under
    /// `camli/`, whatever characters a server-supplied ref contains.
    ///
    /// # Errors
    ///
    /// Returns `FeatureUnavailable` without a blob root and `InvalidBlobRef`
    /// for an empty or dot-segment ref.
    pub fn blob_url(&self, blob_ref: &BlobRef) -> Result<Url> {
        if matches!(blob_ref.as_str(), "" | "." | "..") {
            return Err(CamliError::InvalidBlobRef(blob_ref.to_string()));
        }

        let mut url = self.make_url("camli/")?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(blob_ref.as_str());
        Ok(url)
    }

    // -------------------------------------------------------------------------
    // Single-blob operations
    // -------------------------------------------------------------------------

    /// Fetch a blob's bytes.
    ///
    /// # Errors
    ///
    /// `NotFound` on 404, `ServerError` on any other non-200 status.
    pub fn get(&self, blob_ref: &BlobRef) -> Result<Vec<u8>> {
        let url = self.blob_url(blob_ref)?;
        debug!(%blob_ref, "fetching blob");
        let response = self.transport.send(HttpRequest::get(url))?;

        match response.status {
            200 => Ok(response.body),
            404 => Err(CamliError::NotFound(format!("blob {blob_ref}"))),
            _ => Err(response.server_error(format!("get blob {blob_ref}"))),
        }
    }

    /// Fetch a blob and check its bytes against the ref.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get), plus `HashMismatch` if the server returned
    /// different content.
    pub fn get_verified(&self, blob_ref: &BlobRef) -> Result<Vec<u8>> {
        let data = self.get(blob_ref)?;
        verify(blob_ref, &data)?;
        Ok(data)
    }

    /// Fetch a blob's size without its body.
    ///
    /// # Errors
    ///
    /// `NotFound` on 404, `ServerError` on any other non-200 status,
    /// `InvalidResponse` if `content-length` is missing or unparseable.
    pub fn get_size(&self, blob_ref: &BlobRef) -> Result<u64> {
        let url = self.blob_url(blob_ref)?;
        let response = self.transport.send(HttpRequest::head(url))?;

        match response.status {
            200 => {
                let raw = response.header("content-length").ok_or_else(|| {
                    CamliError::InvalidResponse(format!("no content-length for {blob_ref}"))
                })?;
                raw.trim().parse().map_err(|_| {
                    CamliError::InvalidResponse(format!(
                        "bad content-length {raw:?} for {blob_ref}"
                    ))
                })
            }
            404 => Err(CamliError::NotFound(format!("blob {blob_ref}"))),
            _ => Err(response.server_error(format!("get metadata for blob {blob_ref}"))),
        }
    }

    /// Whether the server has a blob.
    ///
    /// # Errors
    ///
    /// Server and transport errors other than `NotFound` propagate.
    pub fn exists(&self, blob_ref: &BlobRef) -> Result<bool> {
        match self.get_size(blob_ref) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // -------------------------------------------------------------------------
    // Batch operations
    // -------------------------------------------------------------------------

    /// Ask which of `blob_refs` the server has, in one request.
    ///
    /// Every input ref appears in the result; refs the server did not report
    /// map to `None`.
    ///
    /// # Errors
    ///
    /// `ServerError` on a non-200 status, `Json` on an undecodable body.
    pub fn stat_multi(&self, blob_refs: &[BlobRef]) -> Result<HashMap<BlobRef, Option<u64>>> {
        let url = self.make_url("camli/stat")?;
        let mut result: HashMap<BlobRef, Option<u64>> =
            blob_refs.iter().map(|r| (r.clone(), None)).collect();
        if blob_refs.is_empty() {
            return Ok(result);
        }

        let mut fields = Vec::with_capacity(blob_refs.len() + 1);
        fields.push((
            "camliversion".to_string(),
            STAT_PROTOCOL_VERSION.to_string(),
        ));
        for (i, blob_ref) in blob_refs.iter().enumerate() {
            fields.push((format!("blob{}", i + 1), blob_ref.to_string()));
        }

        debug!(count = blob_refs.len(), "stat blobs");
        let response = self.transport.send(HttpRequest::post_form(url, fields))?;
        if response.status != 200 {
            return Err(response.server_error(format!("stat {} blobs", blob_refs.len())));
        }

        let stat: StatResponse = response.json()?;
        for entry in stat.stat.unwrap_or_default() {
            let Some(slot) = result.get_mut(&entry.blob_ref) else {
                trace!(blob_ref = %entry.blob_ref, "ignoring unrequested stat entry");
                continue;
            };
            let size = entry.size.ok_or_else(|| {
                CamliError::InvalidResponse(format!(
                    "stat entry for {} has no size",
                    entry.blob_ref
                ))
            })?;
            *slot = Some(size);
        }

        Ok(result)
    }

    /// Store one blob, returning its ref.
    ///
    /// # Errors
    ///
    /// See [`put_multi`](Self::put_multi).
    pub fn put(&self, blob: &Blob) -> Result<BlobRef> {
        let mut refs = self.put_multi(std::slice::from_ref(blob))?;
        refs.pop()
            .ok_or_else(|| CamliError::InvalidResponse("empty put result".to_string()))
    }

    /// Store several blobs, uploading only those the server lacks.
    ///
    /// Returns one ref per input, in input order. No upload request is made
    /// when the server already has every blob.
    ///
    /// # Errors
    ///
    /// `BatchTooLarge` when the blobs to upload exceed the upload limit,
    /// `ServerError` when stat or upload answer with a non-200 status.
    pub fn put_multi(&self, blobs: &[Blob]) -> Result<Vec<BlobRef>> {
        let upload_url = self.make_url("camli/upload")?;
        let refs: Vec<BlobRef> = blobs.iter().map(|b| b.blob_ref().clone()).collect();
        if blobs.is_empty() {
            return Ok(refs);
        }

        let mut seen = HashSet::new();
        let unique: Vec<BlobRef> = refs
            .iter()
            .filter(|r| seen.insert(r.as_str()))
            .cloned()
            .collect();
        let present = self.stat_multi(&unique)?;

        let mut queued = HashSet::new();
        let missing: Vec<&Blob> = blobs
            .iter()
            .filter(|b| matches!(present.get(b.blob_ref()), Some(None) | None))
            .filter(|b| queued.insert(b.blob_ref().as_str()))
            .collect();

        if missing.is_empty() {
            debug!(count = blobs.len(), "server has every blob; skipping upload");
            return Ok(refs);
        }

        let size: u64 = missing.iter().map(|b| b.len() as u64).sum();
        if size > self.upload_limit {
            return Err(CamliError::BatchTooLarge {
                size,
                limit: self.upload_limit,
            });
        }

        let parts = missing
            .iter()
            .map(|blob| FilePart {
                name: blob.blob_ref().to_string(),
                file_name: blob.blob_ref().to_string(),
                content_type: OCTET_STREAM.to_string(),
                data: blob.data().to_vec(),
            })
            .collect();

        debug!(count = missing.len(), bytes = size, "uploading blobs");
        let response = self
            .transport
            .send(HttpRequest::post_multipart(upload_url, parts))?;
        if response.status != 200 {
            return Err(response.server_error(format!("upload {} blobs", missing.len())));
        }

        Ok(refs)
    }

    // -------------------------------------------------------------------------
    // Enumeration
    // -------------------------------------------------------------------------

    /// Lazily enumerate every blob on the server, ordered by ref.
    ///
    /// One page is requested at a time, only once the previous page has been
    /// consumed. Calling this again starts over from the beginning.
    ///
    /// # Errors
    ///
    /// `FeatureUnavailable` without a blob root; request failures are yielded
    /// by the iterator.
    pub fn enumerate(&self) -> Result<EnumerateBlobs<'_>> {
        let url = self.make_url("camli/enumerate-blobs")?;
        Ok(EnumerateBlobs {
            client: self,
            base_url: url,
            pending: VecDeque::new(),
            cursor: Cursor::Start,
        })
    }

    fn fetch_page(&self, url: Url) -> Result<EnumeratePage> {
        trace!(%url, "fetching enumerate page");
        let response = self.transport.send(HttpRequest::get(url))?;
        if response.status != 200 {
            return Err(response.server_error("enumerate blobs"));
        }
        response.json()
    }
}

// ============================================================================
// Blob metadata
// ============================================================================

/// A reference to a remote blob, with its size when known.
///
/// Borrows the client that produced it so the data can be fetched on demand.
#[derive(Debug, Clone)]
pub struct BlobMeta<'a> {
    blob_ref: BlobRef,
    size: Option<u64>,
    client: &'a BlobClient,
}

impl<'a> BlobMeta<'a> {
    /// Create metadata for `blob_ref` served by `client`.
    #[must_use]
    pub fn new(client: &'a BlobClient, blob_ref: BlobRef, size: Option<u64>) -> Self {
        Self {
            blob_ref,
            size,
            client,
        }
    }

    /// The blob's ref.
    #[must_use]
    pub fn blob_ref(&self) -> &BlobRef {
        &self.blob_ref
    }

    /// The blob's size, when the server reported it.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Fetch the blob's bytes through the originating client.
    ///
    /// # Errors
    ///
    /// See [`BlobClient::get`].
    pub fn get_data(&self) -> Result<Vec<u8>> {
        self.client.get(&self.blob_ref)
    }
}

impl PartialEq for BlobMeta<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.blob_ref == other.blob_ref && self.size == other.size
    }
}

// ============================================================================
// Enumeration iterator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    After(String),
    Done,
}

/// Pull-driven iterator over every blob on the server.
///
/// A failed page request is yielded once as `Err` and ends the iteration.
#[derive(Debug)]
pub struct EnumerateBlobs<'a> {
    client: &'a BlobClient,
    base_url: Url,
    pending: VecDeque<BlobMeta<'a>>,
    cursor: Cursor,
}

impl<'a> EnumerateBlobs<'a> {
    fn page_url(&self) -> Option<Url> {
        match &self.cursor {
            Cursor::Start => Some(self.base_url.clone()),
            Cursor::After(after) => {
                let mut url = self.base_url.clone();
                url.query_pairs_mut().append_pair("after", after);
                Some(url)
            }
            Cursor::Done => None,
        }
    }
}

impl<'a> Iterator for EnumerateBlobs<'a> {
    type Item = Result<BlobMeta<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(meta) = self.pending.pop_front() {
                return Some(Ok(meta));
            }

            let url = self.page_url()?;
            let page = match self.client.fetch_page(url) {
                Ok(page) => page,
                Err(e) => {
                    self.cursor = Cursor::Done;
                    return Some(Err(e));
                }
            };

            let next = match page.continue_after.filter(|c| !c.is_empty()) {
                Some(after) => Cursor::After(after),
                None => Cursor::Done,
            };
            let entries = page.blobs.unwrap_or_default();
            if entries.is_empty() && next == self.cursor {
                self.cursor = Cursor::Done;
                return Some(Err(CamliError::InvalidResponse(
                    "enumerate cursor did not advance".to_string(),
                )));
            }

            trace!(count = entries.len(), "enumerate page received");
            let client = self.client;
            self.pending.extend(
                entries
                    .into_iter()
                    .map(|entry| BlobMeta::new(client, entry.blob_ref, entry.size)),
            );
            self.cursor = next;
        }
    }
}

impl FusedIterator for EnumerateBlobs<'_> {}
