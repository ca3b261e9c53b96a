//! Drives the planner's end-to-end request scenarios against an in-memory
//! fake `ObjectStore` (one file per suite, asserting on call counts)
//! without a live/localstack dependency: the core must not require
//! network access to test.

use bytes::Bytes;
use meg::cache::{Caches, InMemoryCacheProvider};
use meg::error::MegError;
use meg::format::FormatRegistry;
use meg::handler;
use meg::http::AppState;
use meg::invalidator::{BucketNotification, ChangeKind, Invalidator};
use meg::mime::ExtensionMimeResolver;
use meg::planner::Planner;
use meg::store::{ByteRange, GetResponse, HeadResponse, ListedObject, ObjectStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Head(String),
    List(String),
    Get(String, Option<(u64, u64)>),
}

struct FakeObject {
    bytes: Bytes,
    content_type: String,
    etag: String,
}

struct FakeObjectStore {
    objects: Mutex<HashMap<String, FakeObject>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeObjectStore {
    fn new() -> Self {
        FakeObjectStore { objects: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()) }
    }

    fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str, etag: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            FakeObject { bytes: Bytes::from(bytes), content_type: content_type.to_string(), etag: etag.to_string() },
        );
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn get_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| matches!(c, Call::Get(..))).collect()
    }
}

#[async_trait::async_trait]
impl ObjectStore for FakeObjectStore {
    async fn head(&self, key: &str) -> meg::error::Result<HeadResponse> {
        self.calls.lock().unwrap().push(Call::Head(key.to_string()));
        let objects = self.objects.lock().unwrap();
        let obj = objects.get(key).ok_or_else(|| MegError::NotFoundArchive { key: key.to_string() })?;
        Ok(HeadResponse {
            content_type: Some(obj.content_type.clone()),
            content_length: obj.bytes.len() as u64,
            accept_ranges: true,
            etag: Some(obj.etag.clone()),
        })
    }

    async fn list(&self, prefix: &str) -> meg::error::Result<Vec<ListedObject>> {
        self.calls.lock().unwrap().push(Call::List(prefix.to_string()));
        let objects = self.objects.lock().unwrap();
        let matches: Vec<ListedObject> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .map(|k| ListedObject { key: k.clone() })
            .collect();
        if matches.is_empty() {
            return Err(MegError::NotFoundArchive { key: prefix.to_string() });
        }
        Ok(matches)
    }

    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
        if_none_match: Option<&str>,
    ) -> meg::error::Result<GetResponse> {
        self.calls.lock().unwrap().push(Call::Get(key.to_string(), range.map(|r| (r.start, r.end))));
        let objects = self.objects.lock().unwrap();
        let obj = objects.get(key).ok_or_else(|| MegError::NotFoundArchive { key: key.to_string() })?;

        if let Some(etag) = if_none_match {
            if etag == obj.etag {
                return Ok(GetResponse {
                    body: Bytes::new(),
                    content_type: None,
                    content_length: None,
                    content_encoding: None,
                    etag: Some(obj.etag.clone()),
                    not_modified: true,
                });
            }
        }

        let body = match range {
            Some(r) => obj.bytes.slice(r.start as usize..=(r.end as usize).min(obj.bytes.len() - 1)),
            None => obj.bytes.clone(),
        };

        Ok(GetResponse {
            body,
            content_type: Some(obj.content_type.clone()),
            content_length: Some(obj.bytes.len() as u64),
            content_encoding: None,
            etag: Some(obj.etag.clone()),
            not_modified: false,
        })
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFFFFFFu32;
    for &byte in data {
        for _ in 0..8 {
            let bit = (crc ^ byte as u32) & 1;
            crc >>= 1;
            if bit != 0 {
                crc ^= 0xEDB88320;
            }
        }
    }
    !crc
}

/// A minimal single-entry ZIP, local header + central directory + EOCD,
/// `stored` (no compression) so the test doesn't need a deflate encoder.
fn build_zip(name: &str, content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    let crc = crc32(content);

    buf.extend_from_slice(&[0x50, 0x4b, 0x03, 0x04]);
    buf.extend_from_slice(&20u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(content);

    let cd_offset = buf.len() as u32;
    buf.extend_from_slice(&[0x50, 0x4b, 0x01, 0x02]);
    buf.extend_from_slice(&20u16.to_le_bytes());
    buf.extend_from_slice(&20u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
    let cd_size = buf.len() as u32 - cd_offset;

    buf.extend_from_slice(&[0x50, 0x4b, 0x05, 0x06]);
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&cd_size.to_le_bytes());
    buf.extend_from_slice(&cd_offset.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());

    buf
}

fn build_targz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;

    let mut tar_bytes = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut tar_bytes);
        for (path, content) in entries.iter().copied() {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, content).unwrap();
        }
        builder.finish().unwrap();
    }

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

fn test_planner(store: Arc<FakeObjectStore>) -> (Planner, Arc<Caches>) {
    let caches = Arc::new(Caches::new(Arc::new(InMemoryCacheProvider::new())));
    let formats = Arc::new(FormatRegistry::with_defaults());
    let mime = Arc::new(ExtensionMimeResolver::new());
    (Planner::new(store, Arc::clone(&caches), formats, mime), caches)
}

#[tokio::test]
async fn zip_entry_is_served_via_ranged_gets_only() {
    let store = Arc::new(FakeObjectStore::new());
    store.put("docs.zip", build_zip("a/b.txt", b"hello\n"), "application/zip", "etag-1");
    let (planner, _caches) = test_planner(Arc::clone(&store));

    let resolved = planner.resolve("docs.zip/a/b.txt").await.unwrap();
    assert_eq!(&resolved.body[..], b"hello\n");
    assert_eq!(resolved.content_type, "text/plain; charset=utf-8");

    let gets = store.get_calls();
    // An index-range GET, a local-header probe GET (the true data offset
    // isn't trustworthy from the central directory alone), then the
    // entry-range GET; never a full GET.
    assert_eq!(gets.len(), 3);
    assert!(gets.iter().all(|c| matches!(c, Call::Get(_, Some(_)))));
}

#[tokio::test]
async fn targz_entry_is_served_via_single_whole_archive_get() {
    let store = Arc::new(FakeObjectStore::new());
    store.put("src.tar.gz", build_targz(&[("README", b"MEG")]), "application/gzip", "etag-1");
    let (planner, _caches) = test_planner(Arc::clone(&store));

    let resolved = planner.resolve("src.tar.gz/README").await.unwrap();
    assert_eq!(&resolved.body[..], b"MEG");

    let gets = store.get_calls();
    assert_eq!(gets.len(), 1);
    assert!(matches!(&gets[0], Call::Get(_, None)));
}

#[tokio::test]
async fn archive_name_without_extension_is_disambiguated_via_list() {
    let store = Arc::new(FakeObjectStore::new());
    store.put("docs.zip", build_zip("a/b.txt", b"hello\n"), "application/zip", "etag-1");
    let (planner, _caches) = test_planner(Arc::clone(&store));

    let resolved = planner.resolve("docs/a/b.txt").await.unwrap();
    assert_eq!(&resolved.body[..], b"hello\n");

    let calls = store.calls();
    assert!(calls.iter().any(|c| matches!(c, Call::List(p) if p == "docs")));
    assert!(calls.iter().any(|c| matches!(c, Call::Head(k) if k == "docs.zip")));
}

#[tokio::test]
async fn push_notification_purges_stale_cached_archive() {
    let store = Arc::new(FakeObjectStore::new());
    store.put("docs.zip", build_zip("a/b.txt", b"hello\n"), "application/zip", "etag-1");
    let (planner, caches) = test_planner(Arc::clone(&store));

    planner.resolve("docs.zip/a/b.txt").await.unwrap();

    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let invalidator = Arc::new(Invalidator::new(Arc::clone(&store) as Arc<dyn ObjectStore>, Arc::clone(&caches)));
    let listener = tokio::spawn({
        let invalidator = Arc::clone(&invalidator);
        async move { invalidator.run_push_listener(rx).await }
    });

    tx.send(BucketNotification { change: ChangeKind::Modify, path: "docs.zip".to_string(), etag: None })
        .await
        .unwrap();
    drop(tx);
    listener.await.unwrap();

    // The zip's central directory describes the entry at a fixed byte
    // range; replace with a same-shape archive whose content differs so a
    // stale cached index/body would still produce the wrong answer.
    store.put("docs.zip", build_zip("a/b.txt", b"world!"), "application/zip", "etag-2");
    let resolved = planner.resolve("docs.zip/a/b.txt").await.unwrap();
    assert_eq!(&resolved.body[..], b"world!");
}

#[tokio::test]
async fn force_download_sets_content_disposition_header() {
    let store = Arc::new(FakeObjectStore::new());
    store.put("docs.zip", build_zip("a/b.txt", b"hello\n"), "application/zip", "etag-1");
    let (planner, _caches) = test_planner(Arc::clone(&store));

    let state = AppState { planner, force_download: true };
    let resp = handler::serve(&state.planner, "docs.zip/a/b.txt", state.force_download).await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_disposition.as_deref(), Some("attachment; filename=\"b.txt\""));
}

#[tokio::test]
async fn missing_entry_returns_404_with_empty_body() {
    let store = Arc::new(FakeObjectStore::new());
    store.put("docs.zip", build_zip("a/b.txt", b"hello\n"), "application/zip", "etag-1");
    let (planner, _caches) = test_planner(Arc::clone(&store));

    let resp = handler::serve(&planner, "docs.zip/does/not/exist", false).await;
    assert_eq!(resp.status, 404);
    assert!(resp.body.is_empty());
}
