//! Server discovery and the per-server connection.
//!
//! A server advertises its capability roots from `?camli.mode=config`:
//!
//! ```json
//! {"blobRoot": "/bs/", "searchRoot": "/my-search/", "jsonSignRoot": "/sighelper/"}
//! ```
//!
//! Each root is optional and relative to the final URL of that response.

use crate::blobs::BlobClient;
use crate::error::{Capability, CamliError, Result};
use crate::search::SearchClient;
use crate::transport::{HttpRequest, Transport};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

#[cfg(feature = "remote")]
use crate::config::ClientConfig;
#[cfg(feature = "remote")]
use crate::transport::HttpTransport;

/// Query appended to the base URL to fetch the discovery document.
pub const CONFIG_QUERY: &str = "?camli.mode=config";

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(rename = "blobRoot", default)]
    blob_root: Option<String>,
    #[serde(rename = "searchRoot", default)]
    search_root: Option<String>,
    #[serde(rename = "jsonSignRoot", default)]
    sign_root: Option<String>,
}

/// A transport bound to one server's capability roots.
///
/// A missing root means the capability is unavailable; the matching client
/// fails every call with `FeatureUnavailable`.
pub struct Connection {
    transport: Arc<dyn Transport>,
    blob_root: Option<Url>,
    search_root: Option<Url>,
    sign_root: Option<Url>,
    blobs: BlobClient,
    search: SearchClient,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("blob_root", &self.blob_root.as_ref().map(Url::as_str))
            .field("search_root", &self.search_root.as_ref().map(Url::as_str))
            .field("sign_root", &self.sign_root.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Bind `transport` to already-known roots.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        blob_root: Option<Url>,
        search_root: Option<Url>,
        sign_root: Option<Url>,
    ) -> Self {
        let blobs = BlobClient::new(Arc::clone(&transport), blob_root.clone());
        let search = SearchClient::new(Arc::clone(&transport), search_root.clone());
        Self {
            transport,
            blob_root,
            search_root,
            sign_root,
            blobs,
            search,
        }
    }

    /// Blob store root.
    #[must_use]
    pub fn blob_root(&self) -> Option<&Url> {
        self.blob_root.as_ref()
    }

    /// Search root.
    #[must_use]
    pub fn search_root(&self) -> Option<&Url> {
        self.search_root.as_ref()
    }

    /// JSON signing root.
    #[must_use]
    pub fn sign_root(&self) -> Option<&Url> {
        self.sign_root.as_ref()
    }

    /// The signing root, or `FeatureUnavailable` if the server has none.
    ///
    /// # Errors
    ///
    /// Returns `FeatureUnavailable(Sign)` when no signing root was advertised.
    pub fn require_sign_root(&self) -> Result<&Url> {
        self.sign_root
            .as_ref()
            .ok_or(CamliError::FeatureUnavailable(Capability::Sign))
    }

    /// Blob store client.
    #[must_use]
    pub fn blobs(&self) -> &BlobClient {
        &self.blobs
    }

    /// Search client.
    #[must_use]
    pub fn search(&self) -> &SearchClient {
        &self.search
    }

    /// The shared transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

/// Discover the server at `base_url` over the default HTTP transport.
///
/// # Errors
///
/// See [`connect_with`].
#[cfg(feature = "remote")]
pub fn connect(base_url: &str) -> Result<Connection> {
    connect_with_config(base_url, &ClientConfig::default())
}

/// Discover the server at `base_url` over an HTTP transport built from `config`.
///
/// # Errors
///
/// See [`connect_with`]; also fails if the HTTP client cannot be built.
#[cfg(feature = "remote")]
pub fn connect_with_config(base_url: &str, config: &ClientConfig) -> Result<Connection> {
    let transport = HttpTransport::from_config(config)?;
    connect_with(base_url, Arc::new(transport))
}

/// Discover the server at `base_url` using `transport`.
///
/// # Errors
///
/// - `Url` if `base_url` does not parse
/// - `NotACompatibleServer` if the config request is not a 200 carrying a
///   discovery document, or a root does not resolve
/// - transport errors unchanged
pub fn connect_with(base_url: &str, transport: Arc<dyn Transport>) -> Result<Connection> {
    let base = Url::parse(base_url)?;
    let config_url = base.join(CONFIG_QUERY)?;
    debug!(url = %config_url, "fetching server configuration");

    let response = transport.send(HttpRequest::get(config_url.clone()))?;

    if response.status != 200 {
        warn!(url = %config_url, status = response.status, "configuration request failed");
        return Err(CamliError::NotACompatibleServer(format!(
            "configuration request returned {} {}",
            response.status, response.reason
        )));
    }

    let document: DiscoveryDocument = serde_json::from_slice(&response.body).map_err(|e| {
        warn!(url = %config_url, error = %e, "configuration is not a discovery document");
        CamliError::NotACompatibleServer(format!(
            "server did not return a valid configuration at {config_url}: {e}"
        ))
    })?;

    // Roots are relative to wherever the config request ended up.
    let final_url = &response.url;
    let resolve = |root: Option<String>| -> Result<Option<Url>> {
        root.map(|r| {
            final_url.join(&r).map_err(|e| {
                CamliError::NotACompatibleServer(format!("unusable root {r:?}: {e}"))
            })
        })
        .transpose()
    };

    let blob_root = resolve(document.blob_root)?;
    let search_root = resolve(document.search_root)?;
    let sign_root = resolve(document.sign_root)?;

    info!(
        server = %final_url,
        blobs = blob_root.is_some(),
        search = search_root.is_some(),
        sign = sign_root.is_some(),
        "connected"
    );

    Ok(Connection::new(transport, blob_root, search_root, sign_root))
}
