//! Search client for a server's index.
//!
//! Wraps the endpoints under a `searchRoot`: `camli/search/query`,
//! `camli/search/describe` and `camli/search/claims`.

mod claim;
mod describe;

pub use claim::{
    sort_claims_by_date, Claim, PermanodeState, ADD_ATTRIBUTE, DEL_ATTRIBUTE, SET_ATTRIBUTE,
};
pub use describe::{BlobDescription, DescribedBlob};

use crate::address::BlobRef;
use crate::error::{Capability, CamliError, Result};
use crate::transport::{HttpRequest, Transport};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// One hit of a search query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchResult {
    /// Matching blob.
    #[serde(rename = "blob")]
    pub blob_ref: BlobRef,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    blobs: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    #[serde(default)]
    meta: Option<HashMap<BlobRef, DescribedBlob>>,
}

#[derive(Debug, Deserialize)]
struct ClaimsResponse {
    #[serde(default)]
    claims: Option<Vec<Claim>>,
}

/// Client for a server's search index.
///
/// Without a base URL every operation fails with `FeatureUnavailable`
/// before any request.
#[derive(Clone)]
pub struct SearchClient {
    transport: Arc<dyn Transport>,
    base_url: Option<Url>,
}

impl fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchClient")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl SearchClient {
    /// Create a client bound to `base_url` (the server's `searchRoot`).
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, base_url: Option<Url>) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    /// The search root, if the server has one.
    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Whether the search interface is available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.base_url.is_some()
    }

    fn make_url(&self, path: &str) -> Result<Url> {
        let base = self
            .base_url
            .as_ref()
            .ok_or(CamliError::FeatureUnavailable(Capability::Search))?;
        Ok(base.join(path)?)
    }

    fn make_url_with_query(&self, path: &str, key: &str, value: &str) -> Result<Url> {
        let mut url = self.make_url(path)?;
        url.query_pairs_mut().append_pair(key, value);
        Ok(url)
    }

    /// Run a search expression, returning hits in server order.
    ///
    /// # Errors
    ///
    /// `ServerError` on a non-200 status, `Json` on an undecodable body.
    pub fn query(&self, expression: &str) -> Result<Vec<SearchResult>> {
        let url = self.make_url("camli/search/query")?;
        debug!(expression, "search query");
        let body = serde_json::json!({ "expression": expression });
        let response = self.transport.send(HttpRequest::post_json(url, body))?;

        if response.status != 200 {
            return Err(response.server_error(format!("query {expression:?}")));
        }

        let parsed: QueryResponse = response.json()?;
        Ok(parsed.blobs.unwrap_or_default())
    }

    /// Describe a blob, keeping related descriptions from the same response.
    ///
    /// # Errors
    ///
    /// `ServerError` on a non-200 status, `InvalidResponse` when the response
    /// does not describe `blob_ref`.
    pub fn describe_blob(&self, blob_ref: &BlobRef) -> Result<BlobDescription<'_>> {
        let url = self.make_url_with_query("camli/search/describe", "blobref", blob_ref.as_str())?;
        debug!(%blob_ref, "describe blob");
        let response = self.transport.send(HttpRequest::get(url))?;

        if response.status != 200 {
            return Err(response.server_error(format!("describe {blob_ref}")));
        }

        let meta = response.json::<DescribeResponse>()?.meta.unwrap_or_default();
        let described = meta.get(blob_ref).cloned().ok_or_else(|| {
            CamliError::InvalidResponse(format!("describe response lacks {blob_ref}"))
        })?;

        Ok(BlobDescription::new(
            self,
            blob_ref.clone(),
            described,
            Arc::new(meta),
        ))
    }

    /// Claims made against a permanode, in server order.
    ///
    /// The order usually approximates date order but is not guaranteed; use
    /// [`sort_claims_by_date`] when it matters.
    ///
    /// # Errors
    ///
    /// `ServerError` on a non-200 status, `Json` on an undecodable body or a
    /// malformed claim date.
    pub fn get_claims_for_permanode(&self, permanode: &BlobRef) -> Result<Vec<Claim>> {
        let url =
            self.make_url_with_query("camli/search/claims", "permanode", permanode.as_str())?;
        debug!(%permanode, "fetching claims");
        let response = self.transport.send(HttpRequest::get(url))?;

        if response.status != 200 {
            return Err(response.server_error(format!("get claims for {permanode}")));
        }

        let parsed: ClaimsResponse = response.json()?;
        Ok(parsed.claims.unwrap_or_default())
    }

    /// Fold a permanode's claims into its current attribute state.
    ///
    /// # Errors
    ///
    /// See [`get_claims_for_permanode`](Self::get_claims_for_permanode).
    pub fn permanode_state(&self, permanode: &BlobRef) -> Result<PermanodeState> {
        let claims = self.get_claims_for_permanode(permanode)?;
        Ok(PermanodeState::from_claims(&claims))
    }
}
