//! Integration tests against an in-memory blob server.

use camli::prelude::*;
use camli::transport::{Method, RequestBody};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use url::Url;

const PAGE_SIZE: usize = 2;

/// Speaks enough of the server protocol to exercise every client call.
#[derive(Default)]
struct MemoryServer {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    requests: Mutex<Vec<(Method, String)>>,
}

impl MemoryServer {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn count(&self, method: Method, path_suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, p)| *m == method && p.ends_with(path_suffix))
            .count()
    }

    fn json(url: Url, value: serde_json::Value) -> HttpResponse {
        HttpResponse::new(url, 200).with_body(value.to_string())
    }

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    fn enumerate(&self, url: Url) -> HttpResponse {
        let after = Self::query(&url, "after");
        let blobs = self.blobs.lock().unwrap();
        let page: Vec<_> = blobs
            .iter()
            .filter(|(r, _)| after.as_deref().map_or(true, |a| r.as_str() > a))
            .take(PAGE_SIZE + 1)
            .map(|(r, d)| (r.clone(), d.len()))
            .collect();

        let more = page.len() > PAGE_SIZE;
        let page = &page[..page.len().min(PAGE_SIZE)];
        let entries: Vec<_> = page
            .iter()
            .map(|(r, size)| json!({"blobRef": r, "size": size}))
            .collect();
        let mut body = json!({ "blobs": entries });
        if more {
            body["continueAfter"] = json!(page[PAGE_SIZE - 1].0);
        }
        Self::json(url, body)
    }
}

impl Transport for MemoryServer {
    fn send(&self, request: HttpRequest) -> camli::Result<HttpResponse> {
        let url = request.url.clone();
        let path = url.path().to_string();
        self.requests
            .lock()
            .unwrap()
            .push((request.method, path.clone()));

        if url.query() == Some("camli.mode=config") {
            return Ok(Self::json(
                url,
                json!({"blobRoot": "/bs/", "searchRoot": "/s/"}),
            ));
        }

        let response = match (request.method, path.as_str(), request.body) {
            (Method::Post, "/bs/camli/stat", RequestBody::Form(fields)) => {
                let blobs = self.blobs.lock().unwrap();
                let stat: Vec<_> = fields
                    .iter()
                    .filter(|(k, _)| k.starts_with("blob"))
                    .filter_map(|(_, r)| blobs.get(r).map(|d| json!({"blobRef": r, "size": d.len()})))
                    .collect();
                Self::json(url, json!({ "stat": stat }))
            }
            (Method::Post, "/bs/camli/upload", RequestBody::Multipart(parts)) => {
                let mut blobs = self.blobs.lock().unwrap();
                for part in parts {
                    blobs.insert(part.name, part.data);
                }
                HttpResponse::new(url, 200)
            }
            (Method::Get, "/bs/camli/enumerate-blobs", _) => self.enumerate(url),
            (method, p, _) if p.starts_with("/bs/camli/") => {
                let blob_ref = &p["/bs/camli/".len()..];
                match self.blobs.lock().unwrap().get(blob_ref) {
                    Some(data) if method == Method::Head => HttpResponse::new(url, 200)
                        .with_header("Content-Length", data.len().to_string()),
                    Some(data) => HttpResponse::new(url, 200).with_body(data.clone()),
                    None => HttpResponse::new(url, 404),
                }
            }
            (Method::Post, "/s/camli/search/query", RequestBody::Json(_)) => {
                let blobs = self.blobs.lock().unwrap();
                let hits: Vec<_> = blobs.keys().map(|r| json!({ "blob": r })).collect();
                Self::json(url, json!({ "blobs": hits }))
            }
            (Method::Get, "/s/camli/search/claims", _) => {
                let permanode = Self::query(&url, "permanode").unwrap_or_default();
                Self::json(
                    url,
                    json!({"claims": [
                        {"permanode": permanode, "type": "set-attribute", "attr": "title",
                         "value": "Second", "date": "2013-02-13T12:10:00Z"},
                        {"permanode": permanode, "type": "set-attribute", "attr": "title",
                         "value": "First", "date": "2013-02-13T12:00:00Z"},
                        {"permanode": permanode, "type": "add-attribute", "attr": "tag",
                         "value": "camping", "date": "2013-02-13T12:05:00Z"}
                    ]}),
                )
            }
            _ => HttpResponse::new(url, 500),
        };
        Ok(response)
    }
}

fn connect(server: &Arc<MemoryServer>) -> Connection {
    camli::connect_with("http://camli.test/", server.clone()).expect("connect")
}

#[test]
fn test_discovery_binds_clients() {
    let server = MemoryServer::new();
    let conn = connect(&server);

    assert_eq!(
        conn.blob_root().map(Url::as_str),
        Some("http://camli.test/bs/")
    );
    assert_eq!(
        conn.search_root().map(Url::as_str),
        Some("http://camli.test/s/")
    );
    assert!(conn.sign_root().is_none());
    assert!(matches!(
        conn.require_sign_root(),
        Err(CamliError::FeatureUnavailable(Capability::Sign))
    ));
}

#[test]
fn test_put_then_get_workflow() {
    let server = MemoryServer::new();
    let conn = connect(&server);
    let blobs = conn.blobs();

    let hello = Blob::new("hello");
    let blob_ref = blobs.put(&hello).expect("put");
    assert_eq!(blob_ref, *hello.blob_ref());

    assert_eq!(blobs.get(&blob_ref).expect("get"), b"hello");
    assert_eq!(blobs.get_verified(&blob_ref).expect("verified"), b"hello");
    assert_eq!(blobs.get_size(&blob_ref).expect("size"), 5);
    assert!(blobs.exists(&blob_ref).expect("exists"));

    let missing = address_of(b"never stored", HashAlgorithm::Sha1);
    assert!(!blobs.exists(&missing).expect("exists"));
    assert!(blobs.get(&missing).unwrap_err().is_not_found());
}

#[test]
fn test_put_multi_uploads_only_missing() {
    let server = MemoryServer::new();
    let conn = connect(&server);
    let blobs = conn.blobs();

    blobs.put(&Blob::new("one")).expect("put");
    assert_eq!(server.count(Method::Post, "/camli/upload"), 1);

    let batch = vec![
        Blob::new("one"),
        Blob::with_algorithm("two", HashAlgorithm::Sha256),
        Blob::new("three"),
    ];
    let refs = blobs.put_multi(&batch).expect("put_multi");
    let expected: Vec<BlobRef> = batch.iter().map(|b| b.blob_ref().clone()).collect();
    assert_eq!(refs, expected);
    assert_eq!(server.count(Method::Post, "/camli/upload"), 2);

    // Everything is present now, so no upload happens.
    blobs.put_multi(&batch).expect("put_multi");
    assert_eq!(server.count(Method::Post, "/camli/upload"), 2);

    let stat = blobs.stat_multi(&expected).expect("stat");
    assert_eq!(stat[&expected[1]], Some(3));
}

#[test]
fn test_enumerate_pages_lazily() {
    let server = MemoryServer::new();
    let conn = connect(&server);
    let batch: Vec<Blob> = ["a", "b", "c", "d", "e"].into_iter().map(Blob::new).collect();
    conn.blobs().put_multi(&batch).expect("put_multi");

    let mut iter = conn.blobs().enumerate().expect("enumerate");
    assert_eq!(server.count(Method::Get, "/enumerate-blobs"), 0);

    let first = iter.next().expect("item").expect("ok");
    assert_eq!(first.size(), Some(1));
    assert_eq!(server.count(Method::Get, "/enumerate-blobs"), 1);

    let rest: Vec<BlobRef> = iter
        .map(|m| m.expect("ok").blob_ref().clone())
        .collect();
    assert_eq!(rest.len(), 4);
    assert_eq!(server.count(Method::Get, "/enumerate-blobs"), 3);

    let mut all: Vec<BlobRef> = std::iter::once(first.blob_ref().clone())
        .chain(rest)
        .collect();
    let sorted = {
        let mut s = all.clone();
        s.sort();
        s
    };
    assert_eq!(all, sorted);
    all.dedup();
    assert_eq!(all.len(), 5);

    assert_eq!(first.get_data().expect("data").len(), 1);
}

#[test]
fn test_search_and_claims() {
    let server = MemoryServer::new();
    let conn = connect(&server);
    conn.blobs().put(&Blob::new("x")).expect("put");

    let hits = conn.search().query("is:anything").expect("query");
    assert_eq!(hits.len(), 1);

    let permanode = BlobRef::new("sha1-0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33");
    let claims = conn
        .search()
        .get_claims_for_permanode(&permanode)
        .expect("claims");
    assert_eq!(claims.len(), 3);
    assert_eq!(claims[0].permanode.as_ref(), Some(&permanode));

    let state = PermanodeState::from_claims(&claims);
    assert_eq!(state.attr("title"), Some("Second"));
    assert_eq!(state.attr("tag"), Some("camping"));
}

#[test]
fn test_unavailable_search_root() {
    struct NoSearch;

    impl Transport for NoSearch {
        fn send(&self, request: HttpRequest) -> camli::Result<HttpResponse> {
            Ok(HttpResponse::new(request.url, 200).with_body(r#"{"blobRoot": "/bs/"}"#))
        }
    }

    let conn = camli::connect_with("http://camli.test/", Arc::new(NoSearch)).expect("connect");
    assert!(conn.blobs().is_available());
    assert!(matches!(
        conn.search().query("x"),
        Err(CamliError::FeatureUnavailable(Capability::Search))
    ));
}
