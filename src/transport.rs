//! HTTP transport seam.
//!
//! The clients only ever build a request, hand it to a [`Transport`] and
//! branch on the returned status. Connection reuse, TLS, timeouts and proxy
//! policy are the transport's concern. [`HttpTransport`] (feature `remote`)
//! is the reqwest-backed implementation; tests supply scripted ones.

use crate::error::{CamliError, Result};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

#[cfg(feature = "remote")]
use crate::config::ClientConfig;
#[cfg(feature = "remote")]
use tracing::{debug, trace};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Head => write!(f, "HEAD"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// One file part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub name: String,
    /// File name reported for the part.
    pub file_name: String,
    /// MIME type of the part.
    pub content_type: String,
    /// Part payload.
    pub data: Vec<u8>,
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// `application/x-www-form-urlencoded` fields, in order.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` parts, in order.
    Multipart(Vec<FilePart>),
    /// JSON document.
    Json(serde_json::Value),
}

/// An HTTP request. Query parameters are already encoded into `url`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: Url,
    /// Body.
    pub body: RequestBody,
}

impl HttpRequest {
    /// GET without a body.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            body: RequestBody::Empty,
        }
    }

    /// HEAD without a body.
    #[must_use]
    pub fn head(url: Url) -> Self {
        Self {
            method: Method::Head,
            url,
            body: RequestBody::Empty,
        }
    }

    /// POST with url-encoded form fields.
    #[must_use]
    pub fn post_form(url: Url, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url,
            body: RequestBody::Form(fields),
        }
    }

    /// POST with multipart parts.
    #[must_use]
    pub fn post_multipart(url: Url, parts: Vec<FilePart>) -> Self {
        Self {
            method: Method::Post,
            url,
            body: RequestBody::Multipart(parts),
        }
    }

    /// POST with a JSON body.
    #[must_use]
    pub fn post_json(url: Url, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url,
            body: RequestBody::Json(body),
        }
    }
}

/// An HTTP response as seen by the clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase.
    pub reason: String,
    /// Headers keyed by lower-cased name.
    pub headers: BTreeMap<String, String>,
    /// Body bytes (empty for HEAD).
    pub body: Vec<u8>,
    /// Final URL after any redirects.
    pub url: Url,
}

impl HttpResponse {
    /// Response with the given status, the canonical reason and no body.
    #[must_use]
    pub fn new(url: Url, status: u16) -> Self {
        Self {
            status,
            reason: reason_phrase(status).to_string(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            url,
        }
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header; the name is lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Json` if the body does not decode into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Error describing this response as a failure of `operation`.
    #[must_use]
    pub fn server_error(&self, operation: impl Into<String>) -> CamliError {
        CamliError::ServerError {
            operation: operation.into(),
            status: self.status,
            reason: self.reason.clone(),
        }
    }
}

/// Something that can carry one HTTP request to the server and back.
pub trait Transport: Send + Sync {
    /// Send `request` and return the response, whatever its status.
    ///
    /// Only transport-level failures are errors; non-2xx statuses are not.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Canonical reason phrase for the statuses this client meets.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

// ============================================================================
// reqwest transport
// ============================================================================

/// Blocking reqwest transport sharing one connection pool across calls.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpTransport {
    /// Transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new() -> Result<Self> {
        Self::from_config(&ClientConfig::default())
    }

    /// Transport configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout);

        if !config.trust_env_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[cfg(feature = "remote")]
impl Transport for HttpTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
        };
        let builder = self.client.request(method, request.url);

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(parts) => {
                let mut form = reqwest::blocking::multipart::Form::new();
                for part in parts {
                    let file = reqwest::blocking::multipart::Part::bytes(part.data)
                        .file_name(part.file_name)
                        .mime_str(&part.content_type)?;
                    form = form.part(part.name, file);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send()?;
        let status = response.status();
        let url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes()?.to_vec();

        trace!(status = status.as_u16(), %url, bytes = body.len(), "received response");

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            url,
        })
    }
}

// ============================================================================
// Scripted transport for unit tests
// ============================================================================
