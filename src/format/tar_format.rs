//! `tar+gzip`, the registry's default `DualPartArchiveFormat`: the gzip
//! compression layer applied first, then a tar container decode, driving
//! `tar::Archive` over a `flate2::GzDecoder` as a synchronous `Format`
//! implementation. The `spawn_blocking` boundary lives in the planner,
//! once, rather than per-format.

use crate::error::{MegError, Result};
use crate::format::{gzip, Format};
use crate::model::{Archive, ArchiveEntry, ArchiveMetadata, CompressionKind, EntryKind, LinkEncoding};
use bytes::Bytes;
use std::io::Read;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const EXTENSIONS: &[&str] = &[".tar.gz", ".tgz"];
const CONTENT_TYPES: &[&str] = &["application/gzip", "application/x-gzip", "application/x-tar"];

pub struct TarGzFormat;

impl TarGzFormat {
    pub fn new() -> Self {
        TarGzFormat
    }

    fn entry_kind(header: &tar::Header) -> EntryKind {
        use tar::EntryType as T;
        match header.entry_type() {
            T::Directory => EntryKind::Directory,
            T::Symlink => EntryKind::SymbolicLink,
            T::Link => EntryKind::HardLink,
            T::Fifo => EntryKind::Fifo,
            T::Char => EntryKind::CharacterDevice,
            T::Block => EntryKind::BlockDevice,
            _ => EntryKind::File,
        }
    }

    fn decode_tar_bytes(raw: &[u8]) -> Result<Archive> {
        let mut archive = tar::Archive::new(raw);
        let mut entries = Vec::new();

        for entry_result in archive
            .entries()
            .map_err(|e| MegError::DecodeError(format!("tar: {e}")))?
        {
            let mut entry = entry_result.map_err(|e| MegError::DecodeError(format!("tar entry: {e}")))?;
            let path = entry
                .path()
                .map_err(|e| MegError::DecodeError(format!("tar path: {e}")))?
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string();

            let header = entry.header().clone();
            let kind = Self::entry_kind(&header);
            let size = entry.size();
            let mode = header.mode().ok();
            let modified = header
                .mtime()
                .ok()
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));

            let link = entry
                .link_name()
                .ok()
                .flatten()
                .map(|p| p.to_string_lossy().to_string());

            let mut data = Vec::new();
            if kind == EntryKind::File {
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| MegError::DecodeError(format!("tar data: {e}")))?;
            }

            entries.push(ArchiveEntry {
                path,
                size,
                kind,
                modified,
                accessed: None,
                created: None,
                mode,
                data: Bytes::from(data),
                metadata: ArchiveMetadata {
                    compression_kind: Some(CompressionKind::None),
                    uncompressed_size: Some(size),
                    crc: None,
                },
                link,
                link_encoding: LinkEncoding::Utf8,
            });
        }

        Ok(Archive {
            name: String::new(),
            entries,
            comment: None,
        })
    }
}

impl Default for TarGzFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl Format for TarGzFormat {
    fn magic_bytes(&self) -> Option<&'static [u8]> {
        Some(gzip::GZIP_MAGIC)
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn content_types(&self) -> &'static [&'static str] {
        CONTENT_TYPES
    }

    fn decode(&self, bytes: &Bytes) -> Result<Archive> {
        let raw = gzip::decompress(bytes)?;
        Self::decode_tar_bytes(&raw)
    }
}
