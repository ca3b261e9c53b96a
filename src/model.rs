//! The in-memory archive model: entries, metadata, and the optional
//! central index that makes an archive seekable.

use bytes::Bytes;
use std::collections::HashMap;
use std::time::SystemTime;

/// One of the eight entry kinds a POSIX-flavored archive format can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    SymbolicLink,
    HardLink,
    Fifo,
    CharacterDevice,
    BlockDevice,
    Socket,
}

/// Text encoding of a link entry's `data` field (the stored target path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkEncoding {
    #[default]
    Utf8,
}

/// Compression applied to an entry's stored bytes, independent of the
/// container format. `Other` covers formats the registry doesn't know by
/// name but that a custom `CompressionFormat` still declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionKind {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    Lzma,
    Lz4,
    Snappy,
    Lzip,
    Lzop,
    Compress,
    Deflate,
    Brotli,
    Other(String),
}

/// Metadata common to every archive entry, independent of seekability.
#[derive(Debug, Clone, Default)]
pub struct ArchiveMetadata {
    pub compression_kind: Option<CompressionKind>,
    pub uncompressed_size: Option<u64>,
    /// Lowercase, zero-padded-to-8-chars hex when derived from a CRC-32.
    pub crc: Option<String>,
}

/// `ArchiveMetadata` plus the byte range of the (still compressed) entry
/// body within the archive object, as required for the seekable fast path.
#[derive(Debug, Clone)]
pub struct SeekableArchiveMetadata {
    pub base: ArchiveMetadata,
    pub offset: u64,
    pub length: u64,
    /// Set when a format's central index cannot, on its own, guarantee
    /// `offset` is the true start of the compressed body (ZIP's central
    /// directory does not promise the local header's extra-field length
    /// matches the central record's). When present, the byte at
    /// `local_header_offset` must be read and parsed before `offset` is
    /// trusted for a ranged fetch; `None` means `offset` is already exact.
    pub local_header_offset: Option<u64>,
}

impl SeekableArchiveMetadata {
    /// The closed byte range `[offset, offset+length-1]` this entry
    /// occupies in the archive object, suitable for a ranged GET.
    pub fn range(&self) -> (u64, u64) {
        (self.offset, self.offset + self.length.saturating_sub(1))
    }
}

/// A single entry decoded from (or addressed within) an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// POSIX-style, relative, no leading slash.
    pub path: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    pub kind: EntryKind,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub created: Option<SystemTime>,
    pub mode: Option<u32>,
    /// Empty for non-file kinds, except links, whose data may hold the
    /// target path encoded per `link_encoding`.
    pub data: Bytes,
    pub metadata: ArchiveMetadata,
    /// Target path for `SymbolicLink`/`HardLink` entries.
    pub link: Option<String>,
    pub link_encoding: LinkEncoding,
}

impl ArchiveEntry {
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// A mapping from path to seekable metadata, preserving decode order.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    order: Vec<String>,
    by_path: HashMap<String, SeekableArchiveMetadata>,
    pub comment: Option<String>,
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, preserving insertion order for iteration. A
    /// duplicate path overwrites the metadata but keeps its original
    /// position (matches invariant 1: paths are unique per archive, so
    /// in practice this path is only hit for malformed input).
    pub fn insert(&mut self, path: String, meta: SeekableArchiveMetadata) {
        if !self.by_path.contains_key(&path) {
            self.order.push(path.clone());
        }
        self.by_path.insert(path, meta);
    }

    pub fn get(&self, path: &str) -> Option<&SeekableArchiveMetadata> {
        self.by_path.get(path)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SeekableArchiveMetadata)> {
        self.order
            .iter()
            .map(move |p| (p.as_str(), self.by_path.get(p).expect("order/by_path desync")))
    }
}

/// A named, ordered collection of entries plus the format that produced it.
#[derive(Debug, Clone)]
pub struct Archive {
    pub name: String,
    pub entries: Vec<ArchiveEntry>,
    pub comment: Option<String>,
}

impl Archive {
    pub fn find(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

/// An `Archive` whose container format additionally exposed a central
/// index, so individual entries can be fetched by byte range.
#[derive(Debug, Clone)]
pub struct SeekableArchive {
    pub archive: Archive,
    pub index: ArchiveIndex,
}
