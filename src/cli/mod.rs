//! CLI command handlers.
//!
//! This module contains the business logic for CLI commands,
//! separated from argument parsing for testability.

use crate::address::address_of_reader;
use crate::prelude::*;
use crate::search::sort_claims_by_date;
use std::collections::HashMap;
use std::fmt::Write;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Parse a blobref argument, rejecting malformed refs.
pub fn parse_blob_ref(arg: &str) -> Result<BlobRef> {
    BlobRef::parse(arg)
}

/// Hash a local file without contacting a server.
pub fn handle_hash(path: &Path, algorithm: HashAlgorithm) -> Result<BlobRef> {
    let file = File::open(path)?;
    address_of_reader(BufReader::new(file), algorithm)
}

/// Fetch a blob, optionally checking it against its address.
pub fn handle_get(blobs: &BlobClient, blob_ref: &BlobRef, verify: bool) -> Result<Vec<u8>> {
    if verify {
        blobs.get_verified(blob_ref)
    } else {
        blobs.get(blob_ref)
    }
}

/// Upload files as blobs in one batch, returning each file's ref.
pub fn handle_put(blobs: &BlobClient, paths: &[PathBuf]) -> Result<Vec<(PathBuf, BlobRef)>> {
    let loaded = paths
        .iter()
        .map(|p| std::fs::read(p).map(Blob::new))
        .collect::<std::io::Result<Vec<_>>>()?;
    let refs = blobs.put_multi(&loaded)?;
    Ok(paths.iter().cloned().zip(refs).collect())
}

/// Enumerate at most `limit` blobs; only the pages needed are fetched.
pub fn handle_enumerate(
    blobs: &BlobClient,
    limit: Option<usize>,
) -> Result<Vec<(BlobRef, Option<u64>)>> {
    blobs
        .enumerate()?
        .take(limit.unwrap_or(usize::MAX))
        .map(|meta| meta.map(|m| (m.blob_ref().clone(), m.size())))
        .collect()
}

/// Fetch a permanode's claims in date order.
pub fn handle_claims(search: &SearchClient, permanode: &BlobRef) -> Result<Vec<Claim>> {
    let mut claims = search.get_claims_for_permanode(permanode)?;
    sort_claims_by_date(&mut claims);
    Ok(claims)
}

fn size_text(size: Option<u64>) -> String {
    size.map_or_else(|| "-".to_string(), |s| s.to_string())
}

/// Format put results, one `ref path` line per file.
pub fn format_put(results: &[(PathBuf, BlobRef)]) -> String {
    let mut out = String::new();
    for (path, blob_ref) in results {
        let _ = writeln!(out, "{blob_ref} {}", path.display());
    }
    out
}

/// Format stat results in the order the refs were requested.
pub fn format_stat(requested: &[BlobRef], stat: &HashMap<BlobRef, Option<u64>>) -> String {
    let mut out = String::new();
    for blob_ref in requested {
        match stat.get(blob_ref).copied().flatten() {
            Some(size) => {
                let _ = writeln!(out, "{blob_ref} {size}");
            }
            None => {
                let _ = writeln!(out, "{blob_ref} missing");
            }
        }
    }
    out
}

/// Format enumerated blobs, one `ref size` line each.
pub fn format_enumerate(entries: &[(BlobRef, Option<u64>)]) -> String {
    let mut out = String::new();
    for (blob_ref, size) in entries {
        let _ = writeln!(out, "{blob_ref} {}", size_text(*size));
    }
    out
}

/// Format search hits.
pub fn format_search_results(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for result in results {
        let _ = writeln!(out, "{}", result.blob_ref);
    }
    out
}

/// Format a blob description.
pub fn format_description(desc: &BlobDescription<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Blob: {}", desc.blob_ref());
    let _ = writeln!(out, "  Type: {}", desc.camli_type().unwrap_or("-"));
    let _ = writeln!(out, "  Size: {}", size_text(desc.size()));
    if let Some(mime) = desc.mime_type() {
        let _ = writeln!(out, "  MIME: {mime}");
    }
    let attrs = desc.permanode_attrs();
    if !attrs.is_empty() {
        out.push_str("  Attributes:\n");
        for (name, values) in attrs {
            let _ = writeln!(out, "    {name}: {}", values.join(", "));
        }
    }
    let related = desc.related_refs();
    if !related.is_empty() {
        out.push_str("  Related:\n");
        for r in related {
            let _ = writeln!(out, "    {r}");
        }
    }
    out
}

/// Format claims, one per line, prefixed with their date.
pub fn format_claims(claims: &[Claim]) -> String {
    let mut out = String::new();
    for claim in claims {
        let date = claim
            .date
            .map_or_else(|| "-".to_string(), |d| d.to_rfc3339());
        let _ = writeln!(out, "{date} {claim}");
    }
    out
}

/// Format the roots a connection discovered.
pub fn format_connection(conn: &Connection) -> String {
    let root = |root: Option<&url::Url>| root.map_or("unavailable", url::Url::as_str).to_string();
    let mut out = String::new();
    let _ = writeln!(out, "Blob root:   {}", root(conn.blob_root()));
    let _ = writeln!(out, "Search root: {}", root(conn.search_root()));
    let _ = writeln!(out, "Sign root:   {}", root(conn.sign_root()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{Reply, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;
    use url::Url;

    const HELLO_SHA1: &str = "sha1-aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    fn blob_client(transport: &Arc<ScriptedTransport>) -> BlobClient {
        BlobClient::new(
            transport.clone(),
            Some(Url::parse("http://example.com/bs/").unwrap()),
        )
    }

    #[test]
    fn test_parse_blob_ref() {
        assert!(parse_blob_ref(HELLO_SHA1).is_ok());
        assert!(matches!(
            parse_blob_ref("sha1-nothex"),
            Err(CamliError::InvalidBlobRef(_))
        ));
        assert!(matches!(
            parse_blob_ref("md5-abc"),
            Err(CamliError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_handle_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let r = handle_hash(&path, HashAlgorithm::Sha1).unwrap();
        assert_eq!(r.as_str(), HELLO_SHA1);
    }

    #[test]
    fn test_handle_hash_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            handle_hash(&dir.path().join("nope"), HashAlgorithm::Sha1),
            Err(CamliError::Io(_))
        ));
    }

    #[test]
    fn test_handle_get_verified_rejects_wrong_content() {
        let transport = ScriptedTransport::new(vec![Reply::ok("world")]);
        let err = handle_get(&blob_client(&transport), &BlobRef::from(HELLO_SHA1), true)
            .unwrap_err();
        assert!(matches!(err, CamliError::HashMismatch { .. }));
    }

    #[test]
    fn test_handle_get_unverified() {
        let transport = ScriptedTransport::new(vec![Reply::ok("world")]);
        let data =
            handle_get(&blob_client(&transport), &BlobRef::from(HELLO_SHA1), false).unwrap();
        assert_eq!(data, b"world");
    }

    #[test]
    fn test_handle_put() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let transport = ScriptedTransport::new(vec![
            Reply::json(json!({"stat": [{"blobRef": HELLO_SHA1, "size": 5}]})),
        ]);
        let results = handle_put(&blob_client(&transport), &[path.clone()]).unwrap();

        assert_eq!(results, vec![(path, BlobRef::from(HELLO_SHA1))]);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_handle_enumerate_limit_stops_paging() {
        let transport = ScriptedTransport::new(vec![Reply::json(json!({
            "blobs": [{"blobRef": "dummy1", "size": 5}, {"blobRef": "dummy2", "size": 9}],
            "continueAfter": "dummy2"
        }))]);
        let entries = handle_enumerate(&blob_client(&transport), Some(2)).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(format_enumerate(&entries), "dummy1 5\ndummy2 9\n");
    }

    #[test]
    fn test_handle_claims_sorted() {
        let transport = ScriptedTransport::new(vec![Reply::json(json!({
            "claims": [
                {"type": "set-attribute", "attr": "title", "value": "B", "date": "2013-02-13T12:05:00Z"},
                {"type": "set-attribute", "attr": "title", "value": "A", "date": "2013-02-13T12:00:00Z"}
            ]
        }))]);
        let search = SearchClient::new(
            transport.clone(),
            Some(Url::parse("http://example.com/s/").unwrap()),
        );
        let claims = handle_claims(&search, &BlobRef::from("perma")).unwrap();
        assert_eq!(claims[0].value_text().as_deref(), Some("A"));

        let out = format_claims(&claims);
        assert!(out.starts_with("2013-02-13T12:00:00+00:00 <claim set-attribute title: \"A\">"));
    }

    #[test]
    fn test_format_stat_in_request_order() {
        let requested = vec![BlobRef::from("dummy2"), BlobRef::from("dummy1")];
        let stat: HashMap<BlobRef, Option<u64>> = [
            (BlobRef::from("dummy1"), Some(5)),
            (BlobRef::from("dummy2"), None),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            format_stat(&requested, &stat),
            "dummy2 missing\ndummy1 5\n"
        );
    }

    #[test]
    fn test_format_search_results() {
        let results = vec![SearchResult {
            blob_ref: BlobRef::from("sha1-x"),
        }];
        assert_eq!(format_search_results(&results), "sha1-x\n");
    }

    #[test]
    fn test_format_description() {
        let transport = ScriptedTransport::new(vec![Reply::json(json!({
            "meta": {
                "sha1-p": {"camliType": "permanode", "permanode": {"attr": {"tag": ["a", "b"]}}},
                "sha1-f": {"camliType": "file", "size": 3}
            }
        }))]);
        let search = SearchClient::new(
            transport.clone(),
            Some(Url::parse("http://example.com/s/").unwrap()),
        );
        let desc = search.describe_blob(&BlobRef::from("sha1-p")).unwrap();
        let out = format_description(&desc);

        assert!(out.contains("Type: permanode"));
        assert!(out.contains("Size: -"));
        assert!(out.contains("tag: a, b"));
        assert!(out.contains("    sha1-f"));
    }

    #[test]
    fn test_format_connection() {
        let transport = ScriptedTransport::new(vec![]);
        let conn = Connection::new(
            transport,
            Some(Url::parse("http://example.com/bs/").unwrap()),
            None,
            None,
        );
        let out = format_connection(&conn);
        assert!(out.contains("Blob root:   http://example.com/bs/"));
        assert!(out.contains("Search root: unavailable"));
    }

    #[test]
    fn test_format_put() {
        let out = format_put(&[(PathBuf::from("a.txt"), BlobRef::from(HELLO_SHA1))]);
        assert_eq!(out, format!("{HELLO_SHA1} a.txt\n"));
    }
}
