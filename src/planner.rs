//! Request Planner: the six-step resolution algorithm deciding, per
//! request, the sequence of store/cache calls dictated by cache state and
//! format seekability.

use crate::cache::Caches;
use crate::error::{MegError, Result};
use crate::format::{Format, FormatRegistry};
use crate::mime::MimeResolver;
use crate::model::Archive;
use crate::store::{ByteRange, ObjectStore};
use bytes::Bytes;
use std::sync::Arc;
use tracing::warn;

/// Result of resolving one request: the bytes to send, the content-type
/// header already fully derived (including `; charset=utf-8` when
/// applicable), and the basename to use if the caller adds a download
/// `Content-Disposition`.
#[derive(Debug, Clone)]
pub struct ResolvedContent {
    pub body: Bytes,
    pub content_type: String,
    pub filename: String,
}

pub struct Planner {
    store: Arc<dyn ObjectStore>,
    caches: Arc<Caches>,
    formats: Arc<FormatRegistry>,
    mime: Arc<dyn MimeResolver>,
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Split a request path (no leading slash assumed stripped yet) into the
/// archive name and the remaining inner-path segments.
fn split_request_path(path: &str) -> (String, Vec<String>) {
    let trimmed = path.trim_start_matches('/');
    let mut segments = trimmed.split('/').filter(|s| !s.is_empty());
    let archive = segments.next().unwrap_or("").to_string();
    let rest: Vec<String> = segments.map(str::to_string).collect();
    (archive, rest)
}

/// Disambiguate a user-supplied archive name against the actual stored
/// key (e.g. `docs` → `docs.zip`), then HEAD it. Shared between the
/// planner's HEAD-cache fill and the invalidator's bootstrap/poll, so
/// both agree on how a name maps to a stored key.
pub(crate) async fn list_then_head(
    store: &dyn ObjectStore,
    archive_name: &str,
) -> Result<(String, crate::store::HeadResponse)> {
    let candidates = store.list(archive_name).await?;
    let stored_key = candidates
        .into_iter()
        .map(|o| o.key)
        .find(|k| !k.is_empty())
        .ok_or_else(|| MegError::NotFoundArchive { key: archive_name.to_string() })?;

    let head = store.head(&stored_key).await?;
    Ok((stored_key, head))
}

impl Planner {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        caches: Arc<Caches>,
        formats: Arc<FormatRegistry>,
        mime: Arc<dyn MimeResolver>,
    ) -> Self {
        Planner { store, caches, formats, mime }
    }

    /// Resolve the stored key and HEAD metadata for archive name `A`,
    /// single-flight-coalesced and cached for `HEAD_TTL`. A miss performs
    /// `list(prefix=A)` to pick the first candidate key, then
    /// `head(that_key)`, and records the observed ETag — every full
    /// archive fetch keeps the ETag map current.
    async fn resolve_head(&self, archive_name: &str) -> Result<crate::cache::CachedHead> {
        let store = Arc::clone(&self.store);
        let etags = &self.caches.etags;
        let name = archive_name.to_string();

        self.caches
            .heads
            .get_or_fill(archive_name, || async move {
                let (stored_key, head) = list_then_head(store.as_ref(), &name).await?;
                if let Some(etag) = &head.etag {
                    etags.set(&name, &stored_key, etag).await;
                }

                Ok(crate::cache::CachedHead {
                    stored_key,
                    content_type: head.content_type,
                    content_length: head.content_length,
                    accept_ranges: head.accept_ranges,
                    etag: head.etag,
                })
            })
            .await
    }

    /// Step 3: match HEAD's content-type, falling back to the stored
    /// key's extension, against the format registry.
    fn resolve_format<'a>(&'a self, head: &crate::cache::CachedHead) -> Result<&'a dyn Format> {
        if let Some(ct) = &head.content_type {
            if let Some(format) = self.formats.resolve_by_content_type(ct) {
                return Ok(format);
            }
        }
        self.formats
            .resolve_by_extension(&head.stored_key)
            .ok_or_else(|| MegError::UnknownFormat { key: head.stored_key.clone() })
    }

    async fn decode_whole(&self, stored_key: &str, bytes: &Bytes) -> Result<Archive> {
        let registry = Arc::clone(&self.formats);
        let bytes = bytes.clone();
        let key = stored_key.to_string();
        let archive = tokio::task::spawn_blocking(move || {
            let head = &bytes[..bytes.len().min(512)];
            let format = registry.resolve(head, Some(&key))?;
            format.decode(&bytes)
        })
        .await
        .map_err(|e| MegError::DecodeError(format!("decode task panicked: {e}")))??;

        if archive.entries.is_empty() {
            warn!(archive = %stored_key, "decoded archive has no entries");
        }
        Ok(archive)
    }

    /// MIME-resolve `inner_path`; on failure, sniff the first chunk as
    /// UTF-8 and fall back to `text/plain` or `application/octet-stream`.
    /// Either way, a textual result gets `; charset=utf-8` appended, even
    /// when the MIME table resolved it rather than the sniff path.
    fn content_type_for(&self, inner_path: &str, body: &[u8]) -> String {
        let content_type = match self.mime.resolve(inner_path) {
            Some(ct) => ct.to_string(),
            None => {
                if std::str::from_utf8(&body[..body.len().min(4096)]).is_ok() {
                    "text/plain".to_string()
                } else {
                    "application/octet-stream".to_string()
                }
            }
        };

        if content_type.starts_with("text/") && !content_type.contains("charset") {
            format!("{content_type}; charset=utf-8")
        } else {
            content_type
        }
    }

    /// Serve the archive object itself verbatim: a request with exactly
    /// one path segment.
    async fn serve_archive_verbatim(&self, archive_name: &str) -> Result<ResolvedContent> {
        if let Some(body) = self.caches.archives.get(archive_name).await {
            let content_type = self
                .caches
                .heads
                .get(archive_name)
                .await
                .and_then(|h| h.content_type)
                .unwrap_or_else(|| "application/octet-stream".to_string());
            return Ok(ResolvedContent {
                body,
                content_type,
                filename: basename(archive_name).to_string(),
            });
        }

        let head = self.resolve_head(archive_name).await?;
        let store = Arc::clone(&self.store);
        let stored_key = head.stored_key.clone();
        let body = self
            .caches
            .archives
            .get_or_fill(archive_name, None, move || {
                let store = Arc::clone(&store);
                let stored_key = stored_key.clone();
                async move { Ok(store.get(&stored_key, None, None).await?.body) }
            })
            .await?;

        Ok(ResolvedContent {
            body,
            content_type: head.content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
            filename: basename(archive_name).to_string(),
        })
    }

    /// Resolve `GET /<archive>/<inner_path...>`.
    pub async fn resolve(&self, archive_and_path: &str) -> Result<ResolvedContent> {
        let (archive_name, segments) = split_request_path(archive_and_path);
        if archive_name.is_empty() {
            return Err(MegError::NotFoundArchive { key: String::new() });
        }
        if segments.is_empty() {
            return self.serve_archive_verbatim(&archive_name).await;
        }
        let inner_path = segments.join("/");

        // Step 1: archive body already cached locally.
        if let Some(body) = self.caches.archives.get(&archive_name).await {
            let archive = self.decode_whole(&archive_name, &body).await?;
            return self.deliver_from_archive(&archive, &inner_path);
        }

        // Step 2 + 3: HEAD/ETag resolution, then format selection.
        let head = self.resolve_head(&archive_name).await?;
        let format = self.resolve_format(&head)?;

        // Step 4: seekable fast path.
        if let Some(seekable) = format.as_seekable() {
            if head.accept_ranges {
                return self
                    .seekable_fast_path(&archive_name, &head, seekable, &inner_path)
                    .await;
            }
        }

        // Step 5: whole-archive path.
        let store = Arc::clone(&self.store);
        let stored_key = head.stored_key.clone();
        let body = self
            .caches
            .archives
            .get_or_fill(&archive_name, None, move || {
                let store = Arc::clone(&store);
                let stored_key = stored_key.clone();
                async move { Ok(store.get(&stored_key, None, None).await?.body) }
            })
            .await?;

        let archive = self.decode_whole(&head.stored_key, &body).await?;
        self.deliver_from_archive(&archive, &inner_path)
    }

    async fn seekable_fast_path(
        &self,
        archive_name: &str,
        head: &crate::cache::CachedHead,
        seekable: &dyn crate::format::SeekableFormat,
        inner_path: &str,
    ) -> Result<ResolvedContent> {
        let total_len = head.content_length;
        let hint_ranges = seekable.index_hint_ranges(total_len);
        let (hint_start, hint_end) = *hint_ranges
            .first()
            .ok_or_else(|| MegError::DecodeError("format produced no index hint range".to_string()))?;

        let store = Arc::clone(&self.store);
        let stored_key = head.stored_key.clone();
        let index_bytes = self
            .caches
            .indexes
            .get_or_fill(archive_name, || {
                let store = Arc::clone(&store);
                let stored_key = stored_key.clone();
                async move {
                    let range = ByteRange::new(hint_start, hint_end);
                    Ok(store.get(&stored_key, Some(range), None).await?.body)
                }
            })
            .await?;

        let index = seekable.decode_index(&index_bytes, total_len)?;
        let meta = index
            .get(inner_path)
            .ok_or_else(|| MegError::NotFoundEntry { path: inner_path.to_string() })?;

        let probe = match seekable.local_header_probe(meta) {
            Some((s, e)) => Some(
                self.store
                    .get(&head.stored_key, Some(ByteRange::new(s, e)), None)
                    .await?
                    .body,
            ),
            None => None,
        };
        let (start, end) = seekable.resolve_entry_range(meta, probe.as_ref())?;
        let compressed = self
            .store
            .get(&head.stored_key, Some(ByteRange::new(start, end)), None)
            .await?
            .body;

        let entry = seekable.decode_entry(inner_path, &compressed, meta)?;
        if entry.data.is_empty() && meta.base.uncompressed_size.unwrap_or(0) != 0 {
            warn!(archive = %archive_name, path = %inner_path, "decoded entry is empty despite non-zero uncompressed_size");
        }

        let content_type = self.content_type_for(inner_path, &entry.data);
        Ok(ResolvedContent {
            body: entry.data,
            content_type,
            filename: basename(inner_path).to_string(),
        })
    }

    fn deliver_from_archive(&self, archive: &Archive, inner_path: &str) -> Result<ResolvedContent> {
        let entry = archive
            .find(inner_path)
            .ok_or_else(|| MegError::NotFoundEntry { path: inner_path.to_string() })?;

        if entry.data.is_empty() && entry.metadata.uncompressed_size.unwrap_or(0) != 0 {
            warn!(archive = %archive.name, path = %inner_path, "decoded entry is empty despite non-zero uncompressed_size");
        }

        let content_type = self.content_type_for(inner_path, &entry.data);
        Ok(ResolvedContent {
            body: entry.data.clone(),
            content_type,
            filename: basename(inner_path).to_string(),
        })
    }
}
