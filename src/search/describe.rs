//! Blob descriptions from the index.

use super::SearchClient;
use crate::address::BlobRef;
use crate::error::Result;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// The index's summary of one blob, as found in a describe response's `meta`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DescribedBlob {
    /// Schema type (`permanode`, `file`, `claim`, ...).
    #[serde(rename = "camliType", default)]
    pub camli_type: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// MIME type of file content.
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    permanode: Option<PermanodeSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
struct PermanodeSummary {
    #[serde(default)]
    attr: BTreeMap<String, Vec<String>>,
}

/// Description of one blob plus every related description that arrived
/// in the same response.
///
/// [`describe_another`](Self::describe_another) answers from the shared
/// response when it can, so it may return data as old as the original call.
#[derive(Debug, Clone)]
pub struct BlobDescription<'a> {
    blob_ref: BlobRef,
    described: DescribedBlob,
    meta: Arc<HashMap<BlobRef, DescribedBlob>>,
    client: &'a SearchClient,
}

impl<'a> BlobDescription<'a> {
    pub(crate) fn new(
        client: &'a SearchClient,
        blob_ref: BlobRef,
        described: DescribedBlob,
        meta: Arc<HashMap<BlobRef, DescribedBlob>>,
    ) -> Self {
        Self {
            blob_ref,
            described,
            meta,
            client,
        }
    }

    /// The described blob.
    #[must_use]
    pub fn blob_ref(&self) -> &BlobRef {
        &self.blob_ref
    }

    /// Schema type, if the blob is a schema blob.
    #[must_use]
    pub fn camli_type(&self) -> Option<&str> {
        self.described.camli_type.as_deref()
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.described.size
    }

    /// MIME type, for file blobs.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.described.mime_type.as_deref()
    }

    /// Permanode attributes, empty for other blob types.
    #[must_use]
    pub fn permanode_attrs(&self) -> &BTreeMap<String, Vec<String>> {
        static EMPTY: BTreeMap<String, Vec<String>> = BTreeMap::new();
        self.described
            .permanode
            .as_ref()
            .map_or(&EMPTY, |p| &p.attr)
    }

    /// First value of a permanode attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.permanode_attrs()
            .get(name)?
            .first()
            .map(String::as_str)
    }

    /// The raw description.
    #[must_use]
    pub fn described(&self) -> &DescribedBlob {
        &self.described
    }

    /// Refs of the other blobs described in the same response, sorted.
    #[must_use]
    pub fn related_refs(&self) -> Vec<&BlobRef> {
        let mut refs: Vec<&BlobRef> = self
            .meta
            .keys()
            .filter(|r| **r != self.blob_ref)
            .collect();
        refs.sort();
        refs
    }

    /// Describe `other`, reusing this response when it already covers it.
    ///
    /// # Errors
    ///
    /// Errors of [`SearchClient::describe_blob`] on a cache miss.
    pub fn describe_another(&self, other: &BlobRef) -> Result<BlobDescription<'a>> {
        match self.meta.get(other) {
            Some(described) => Ok(Self::new(
                self.client,
                other.clone(),
                described.clone(),
                Arc::clone(&self.meta),
            )),
            None => self.client.describe_blob(other),
        }
    }
}
