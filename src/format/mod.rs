//! Format Registry: a pluggable, ordered set of archive/compression
//! formats with a two-stage (compression, container) model.

pub mod gzip;
pub mod tar_format;
pub mod zip_format;

use crate::error::{MegError, Result};
use crate::model::{Archive, ArchiveEntry, CompressionKind, SeekableArchiveMetadata};
use bytes::Bytes;

/// Capability probe shared by every format, whether a plain compression
/// stream, a plain container, or a `DualPartArchiveFormat` combining both.
pub trait Format: Send + Sync {
    /// Fixed byte prefix identifying this format, if any.
    fn magic_bytes(&self) -> Option<&'static [u8]>;

    /// File extensions this format claims (without the leading dot),
    /// tried in order against a filename's suffix.
    fn extensions(&self) -> &'static [&'static str];

    /// Content-type(s) this format maps to in a MIME resolver. A
    /// `DualPartArchiveFormat` returns both layers' content-types so a
    /// HEAD response can disambiguate e.g. `tar.gz` from raw `gzip`.
    fn content_types(&self) -> &'static [&'static str];

    /// Attempt to decode `bytes` as a full archive. Used by the
    /// whole-archive path and by trial-decode resolution.
    fn decode(&self, bytes: &Bytes) -> Result<Archive>;

    /// `Some(self)` if this format supports the seekable fast path.
    fn as_seekable(&self) -> Option<&dyn SeekableFormat> {
        None
    }
}

/// Extension of `Format` for container formats that expose a central
/// index, permitting per-entry byte-range access without a full decode.
pub trait SeekableFormat: Format {
    /// Ordered list of byte ranges (closed intervals) likely to contain
    /// the central index, given the archive's total length. Implementations
    /// return the most likely range first.
    fn index_hint_ranges(&self, total_len: u64) -> Vec<(u64, u64)>;

    /// Decode the central index from the bytes obtained via one of the
    /// hint ranges (or, if none panned out, from progressively larger
    /// reads chosen by the caller).
    fn decode_index(&self, bytes: &Bytes, total_len: u64) -> Result<crate::model::ArchiveIndex>;

    /// Decode a single entry's body, given the compressed bytes at the
    /// range named by its `SeekableArchiveMetadata`, the compression kind
    /// declared by the index, and the path (for building the `ArchiveEntry`).
    fn decode_entry(
        &self,
        path: &str,
        compressed: &Bytes,
        meta: &SeekableArchiveMetadata,
    ) -> Result<ArchiveEntry>;

    /// Byte range of a small header the planner must fetch and pass to
    /// `resolve_entry_range` before `meta`'s own range can be trusted for
    /// the entry fetch. `None` (the default) means `meta.range()` is
    /// already exact and no probe is needed.
    fn local_header_probe(&self, meta: &SeekableArchiveMetadata) -> Option<(u64, u64)> {
        let _ = meta;
        None
    }

    /// Resolve the entry's true `[start, end]` byte range, given the bytes
    /// read at the range `local_header_probe` returned (if any was
    /// requested). Default: `meta`'s own range, unchanged.
    fn resolve_entry_range(
        &self,
        meta: &SeekableArchiveMetadata,
        probe: Option<&Bytes>,
    ) -> Result<(u64, u64)> {
        let _ = probe;
        Ok(meta.range())
    }
}

/// Process-wide, ordered list of registered formats.
pub struct FormatRegistry {
    formats: Vec<Box<dyn Format>>,
}

impl FormatRegistry {
    /// Default registry: `[tar+gzip, zip]`.
    pub fn with_defaults() -> Self {
        FormatRegistry {
            formats: vec![
                Box::new(tar_format::TarGzFormat::new()),
                Box::new(zip_format::ZipFormat::new()),
            ],
        }
    }

    pub fn register_front(&mut self, format: Box<dyn Format>) {
        self.formats.insert(0, format);
    }

    pub fn register_back(&mut self, format: Box<dyn Format>) {
        self.formats.push(format);
    }

    /// Resolve a format via, in order: magic-byte prefix match, filename
    /// extension/suffix match, exhaustive trial-decode.
    pub fn resolve(&self, head: &[u8], filename: Option<&str>) -> Result<&dyn Format> {
        for format in &self.formats {
            if let Some(magic) = format.magic_bytes() {
                if head.starts_with(magic) {
                    return Ok(format.as_ref());
                }
            }
        }

        if let Some(name) = filename {
            let lower = name.to_lowercase();
            for format in &self.formats {
                if format.extensions().iter().any(|ext| lower.ends_with(ext)) {
                    return Ok(format.as_ref());
                }
            }
        }

        for format in &self.formats {
            if format.decode(&Bytes::copy_from_slice(head)).is_ok() {
                return Ok(format.as_ref());
            }
        }

        Err(MegError::UnknownFormat {
            key: filename.unwrap_or("<unknown>").to_string(),
        })
    }

    /// Resolve purely by content-type, matching either layer of a
    /// `DualPartArchiveFormat` (planner step 3).
    pub fn resolve_by_content_type(&self, content_type: &str) -> Option<&dyn Format> {
        self.formats
            .iter()
            .find(|f| f.content_types().contains(&content_type))
            .map(|f| f.as_ref())
    }

    /// Resolve purely by filename extension/suffix, the fallback the
    /// planner uses when HEAD carries no usable content-type.
    pub fn resolve_by_extension(&self, filename: &str) -> Option<&dyn Format> {
        let lower = filename.to_lowercase();
        self.formats
            .iter()
            .find(|f| f.extensions().iter().any(|ext| lower.ends_with(ext)))
            .map(|f| f.as_ref())
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Decode a stream of bytes through a named compression kind. Used by
/// `decode_entry` implementations that receive `compression_kind` from
/// an index rather than sniffing it themselves.
pub fn decompress(kind: &CompressionKind, data: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read;

    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Deflate => {
            let mut decoder = flate2::read::DeflateDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| MegError::DecodeError(e.to_string()))?;
            Ok(out)
        }
        CompressionKind::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| MegError::DecodeError(e.to_string()))?;
            Ok(out)
        }
        CompressionKind::Bzip2 => {
            let mut decoder = bzip2::read::BzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| MegError::DecodeError(e.to_string()))?;
            Ok(out)
        }
        other => Err(MegError::DecodeError(format!(
            "unsupported compression kind: {other:?}"
        ))),
    }
}
