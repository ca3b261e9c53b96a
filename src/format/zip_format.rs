//! ZIP as a `SeekableArchiveFormat`: hand-rolled EOCD search,
//! central-directory parse, local header offset arithmetic, and CRC-32
//! verification, behind the `Format`/`SeekableFormat` traits.
//!
//! The central directory's `filename_len`/`extra_len` are not trusted for
//! locating an entry's compressed bytes: a local file header's extra
//! field commonly differs in length from the central record's (extended
//! timestamps, alignment padding), so the true offset is only known by
//! reading the local header itself. The whole-archive `decode()` path
//! does this in memory, since it already holds every byte; the seekable
//! fast path defers it to the planner via `local_header_probe`/
//! `resolve_entry_range`, which fetch and parse the local header as a
//! small extra ranged read before the entry's data range is trusted.

use crate::error::{MegError, Result};
use crate::format::{Format, SeekableFormat};
use crate::model::{
    Archive, ArchiveEntry, ArchiveIndex, ArchiveMetadata, CompressionKind, EntryKind,
    LinkEncoding, SeekableArchiveMetadata,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Read;

const EOCD_SEARCH_SIZE: u64 = 65536;
const MIN_EOCD_SIZE: usize = 22;
const CDFH_MIN_SIZE: usize = 46;
const LOCAL_HEADER_MIN_SIZE: u64 = 30;

const COMPRESSION_STORED: u16 = 0;
const COMPRESSION_DEFLATE: u16 = 8;

const MAX_DECOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;
const MAX_COMPRESSION_RATIO: u64 = 1000;

const EXTENSIONS: &[&str] = &[".zip"];
const CONTENT_TYPES: &[&str] = &["application/zip"];
pub const ZIP_MAGIC: &[u8] = &[0x50, 0x4b, 0x03, 0x04];

pub struct ZipFormat;

impl ZipFormat {
    pub fn new() -> Self {
        ZipFormat
    }
}

impl Default for ZipFormat {
    fn default() -> Self {
        Self::new()
    }
}

struct EocdInfo {
    central_dir_offset: u64,
    central_dir_size: u64,
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFFFFFFu32;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = CRC32_TABLE[index] ^ (crc >> 8);
    }
    !crc
}

fn find_eocd(data: &[u8]) -> Result<EocdInfo> {
    const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

    for i in (0..=data.len().saturating_sub(MIN_EOCD_SIZE)).rev() {
        if !data[i..].starts_with(&EOCD_SIGNATURE) {
            continue;
        }
        let eocd = &data[i..];
        if eocd.len() < MIN_EOCD_SIZE {
            continue;
        }

        let disk_number = u16::from_le_bytes([eocd[4], eocd[5]]);
        let disk_with_cd = u16::from_le_bytes([eocd[6], eocd[7]]);
        if disk_number != 0 || disk_with_cd != 0 {
            return Err(MegError::DecodeError(format!(
                "multi-disk ZIP archives are not supported (disk {disk_number}, CD disk {disk_with_cd})"
            )));
        }

        let central_dir_size_raw = u32::from_le_bytes([eocd[12], eocd[13], eocd[14], eocd[15]]);
        let central_dir_offset_raw = u32::from_le_bytes([eocd[16], eocd[17], eocd[18], eocd[19]]);

        if central_dir_size_raw == u32::MAX || central_dir_offset_raw == u32::MAX {
            return Err(MegError::DecodeError(
                "ZIP64 archives are not supported".to_string(),
            ));
        }

        return Ok(EocdInfo {
            central_dir_offset: central_dir_offset_raw as u64,
            central_dir_size: central_dir_size_raw as u64,
        });
    }

    Err(MegError::DecodeError(
        "could not find End of Central Directory record".to_string(),
    ))
}

struct CdEntry {
    filename: String,
    is_dir: bool,
    compression_method: u16,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
    filename_len: u64,
    extra_len: u64,
}

fn parse_central_directory(data: &[u8], archive_size: u64) -> Result<Vec<CdEntry>> {
    const CDFH_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];

    let mut entries = Vec::new();
    let mut pos = 0usize;

    while pos + CDFH_MIN_SIZE <= data.len() {
        if !data[pos..].starts_with(&CDFH_SIGNATURE) {
            break;
        }

        let general_purpose_flag = u16::from_le_bytes([data[pos + 8], data[pos + 9]]);
        if general_purpose_flag & 0x0008 != 0 {
            return Err(MegError::DecodeError(
                "ZIP entries with data descriptors are not supported".to_string(),
            ));
        }

        let compression_method = u16::from_le_bytes([data[pos + 10], data[pos + 11]]);
        let crc = u32::from_le_bytes([data[pos + 16], data[pos + 17], data[pos + 18], data[pos + 19]]);
        let compressed_size_raw = u32::from_le_bytes([data[pos + 20], data[pos + 21], data[pos + 22], data[pos + 23]]);
        let uncompressed_size_raw = u32::from_le_bytes([data[pos + 24], data[pos + 25], data[pos + 26], data[pos + 27]]);
        let local_header_offset_raw = u32::from_le_bytes([data[pos + 42], data[pos + 43], data[pos + 44], data[pos + 45]]);

        if compressed_size_raw == u32::MAX || uncompressed_size_raw == u32::MAX || local_header_offset_raw == u32::MAX {
            return Err(MegError::DecodeError(
                "ZIP64 entries are not supported".to_string(),
            ));
        }

        let local_header_offset = local_header_offset_raw as u64;
        if local_header_offset >= archive_size {
            return Err(MegError::DecodeError(format!(
                "invalid local header offset {local_header_offset} for archive size {archive_size}"
            )));
        }

        let filename_len = u16::from_le_bytes([data[pos + 28], data[pos + 29]]) as usize;
        let extra_len = u16::from_le_bytes([data[pos + 30], data[pos + 31]]) as usize;
        let comment_len = u16::from_le_bytes([data[pos + 32], data[pos + 33]]) as usize;

        let total_entry_size = CDFH_MIN_SIZE
            .checked_add(filename_len)
            .and_then(|v| v.checked_add(extra_len))
            .and_then(|v| v.checked_add(comment_len))
            .ok_or_else(|| MegError::DecodeError("central directory entry size overflow".to_string()))?;

        let end = pos
            .checked_add(total_entry_size)
            .ok_or_else(|| MegError::DecodeError("central directory entry position overflow".to_string()))?;
        if end > data.len() {
            return Err(MegError::DecodeError(format!(
                "truncated central directory entry at position {pos}"
            )));
        }

        let filename_bytes = &data[pos + CDFH_MIN_SIZE..pos + CDFH_MIN_SIZE + filename_len];
        let is_utf8 = (general_purpose_flag & (1 << 11)) != 0;
        let filename = if is_utf8 {
            String::from_utf8_lossy(filename_bytes).to_string()
        } else {
            filename_bytes.iter().map(|&b| b as char).collect()
        };
        let is_dir = filename.ends_with('/');

        entries.push(CdEntry {
            filename: filename.trim_end_matches('/').to_string(),
            is_dir,
            compression_method,
            crc32: crc,
            compressed_size: compressed_size_raw as u64,
            uncompressed_size: uncompressed_size_raw as u64,
            local_header_offset,
            filename_len: filename_len as u64,
            extra_len: extra_len as u64,
        });

        pos += total_entry_size;
    }

    Ok(entries)
}

/// Read the local file header at `local_header_offset` out of `bytes`
/// (the whole archive, already in memory) and return the true start of
/// the compressed body. The central directory's own `filename_len`/
/// `extra_len` are not a safe substitute: a local header's extra field
/// (extended timestamps, alignment padding) commonly differs in length
/// from the central record's, so only the local header itself names the
/// real offset.
fn local_header_data_offset(bytes: &[u8], local_header_offset: u64) -> Result<u64> {
    let start = local_header_offset as usize;
    let end = start
        .checked_add(LOCAL_HEADER_MIN_SIZE as usize)
        .ok_or_else(|| MegError::DecodeError("local file header offset overflow".to_string()))?;
    if end > bytes.len() {
        return Err(MegError::DecodeError("truncated local file header".to_string()));
    }

    let header = &bytes[start..end];
    if !header.starts_with(&[0x50, 0x4b, 0x03, 0x04]) {
        return Err(MegError::DecodeError("invalid local file header signature".to_string()));
    }

    let filename_len = u16::from_le_bytes([header[26], header[27]]) as u64;
    let extra_len = u16::from_le_bytes([header[28], header[29]]) as u64;
    Ok(local_header_offset + LOCAL_HEADER_MIN_SIZE + filename_len + extra_len)
}

fn compression_kind_for(method: u16) -> CompressionKind {
    match method {
        COMPRESSION_STORED => CompressionKind::None,
        COMPRESSION_DEFLATE => CompressionKind::Deflate,
        other => CompressionKind::Other(format!("zip-method-{other}")),
    }
}

fn decompress_entry(method: u16, compressed: &[u8], uncompressed_size: u64) -> Result<Vec<u8>> {
    match method {
        COMPRESSION_STORED => Ok(compressed.to_vec()),
        COMPRESSION_DEFLATE => {
            let mut decoder = flate2::read::DeflateDecoder::new(compressed);
            let capacity = (uncompressed_size as usize).min(MAX_DECOMPRESSED_SIZE as usize);
            let mut out = Vec::with_capacity(capacity);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| MegError::DecodeError(format!("deflate: {e}")))?;
            Ok(out)
        }
        other => Err(MegError::DecodeError(format!(
            "unsupported ZIP compression method: {other}"
        ))),
    }
}

impl Format for ZipFormat {
    fn magic_bytes(&self) -> Option<&'static [u8]> {
        Some(ZIP_MAGIC)
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn content_types(&self) -> &'static [&'static str] {
        CONTENT_TYPES
    }

    fn decode(&self, bytes: &Bytes) -> Result<Archive> {
        let size = bytes.len() as u64;
        if size < MIN_EOCD_SIZE as u64 {
            return Err(MegError::DecodeError("file too small to be a ZIP archive".to_string()));
        }

        let tail_start = size.saturating_sub(EOCD_SEARCH_SIZE.min(size)) as usize;
        let eocd = find_eocd(&bytes[tail_start..])?;

        let cd_end = eocd
            .central_dir_offset
            .checked_add(eocd.central_dir_size)
            .ok_or_else(|| MegError::DecodeError("central directory bounds overflow".to_string()))?;
        if cd_end > size {
            return Err(MegError::DecodeError("central directory extends beyond file bounds".to_string()));
        }

        let cd_data = &bytes[eocd.central_dir_offset as usize..cd_end as usize];
        let cd_entries = parse_central_directory(cd_data, size)?;

        let mut entries = Vec::with_capacity(cd_entries.len());
        for cde in cd_entries {
            if cde.is_dir {
                entries.push(ArchiveEntry {
                    path: cde.filename,
                    size: 0,
                    kind: EntryKind::Directory,
                    modified: None,
                    accessed: None,
                    created: None,
                    mode: None,
                    data: Bytes::new(),
                    metadata: ArchiveMetadata::default(),
                    link: None,
                    link_encoding: LinkEncoding::Utf8,
                });
                continue;
            }

            let data_offset = local_header_data_offset(bytes, cde.local_header_offset)?;
            let data_end = data_offset + cde.compressed_size;
            if data_end > size {
                return Err(MegError::DecodeError(format!(
                    "entry {} data extends beyond file bounds",
                    cde.filename
                )));
            }
            let compressed = &bytes[data_offset as usize..data_end as usize];
            let data = decompress_entry(cde.compression_method, compressed, cde.uncompressed_size)?;

            entries.push(ArchiveEntry {
                path: cde.filename,
                size: cde.uncompressed_size,
                kind: EntryKind::File,
                modified: None,
                accessed: None,
                created: None,
                mode: None,
                data: Bytes::from(data),
                metadata: ArchiveMetadata {
                    compression_kind: Some(compression_kind_for(cde.compression_method)),
                    uncompressed_size: Some(cde.uncompressed_size),
                    crc: Some(format!("{:08x}", cde.crc32)),
                },
                link: None,
                link_encoding: LinkEncoding::Utf8,
            });
        }

        Ok(Archive {
            name: String::new(),
            entries,
            comment: None,
        })
    }

    fn as_seekable(&self) -> Option<&dyn SeekableFormat> {
        Some(self)
    }
}

impl SeekableFormat for ZipFormat {
    fn index_hint_ranges(&self, total_len: u64) -> Vec<(u64, u64)> {
        let tail = EOCD_SEARCH_SIZE.min(total_len);
        vec![(total_len.saturating_sub(tail), total_len.saturating_sub(1))]
    }

    fn decode_index(&self, bytes: &Bytes, total_len: u64) -> Result<ArchiveIndex> {
        let eocd = find_eocd(bytes)?;

        let cd_end = eocd
            .central_dir_offset
            .checked_add(eocd.central_dir_size)
            .ok_or_else(|| MegError::DecodeError("central directory bounds overflow".to_string()))?;
        if cd_end > total_len {
            return Err(MegError::DecodeError("central directory extends beyond file bounds".to_string()));
        }

        // The fetched window starts at `total_len - bytes.len()`; the
        // central directory must lie within it, or our hint range was
        // too small for this archive (see module-level doc comment).
        let window_start = total_len.saturating_sub(bytes.len() as u64);
        if eocd.central_dir_offset < window_start {
            return Err(MegError::DecodeError(
                "central directory is larger than the index hint window".to_string(),
            ));
        }

        let cd_start_in_window = (eocd.central_dir_offset - window_start) as usize;
        let cd_end_in_window = cd_start_in_window + eocd.central_dir_size as usize;
        if cd_end_in_window > bytes.len() {
            return Err(MegError::DecodeError(
                "central directory truncated in index hint window".to_string(),
            ));
        }

        let cd_data = &bytes[cd_start_in_window..cd_end_in_window];
        let cd_entries = parse_central_directory(cd_data, total_len)?;

        let mut index = ArchiveIndex::new();
        for cde in cd_entries {
            if cde.is_dir {
                continue;
            }
            // Provisional offset from the central record alone; the planner
            // corrects it via `local_header_probe`/`resolve_entry_range`
            // before trusting it for a ranged fetch.
            let data_offset = cde.local_header_offset + LOCAL_HEADER_MIN_SIZE + cde.filename_len + cde.extra_len;
            index.insert(
                cde.filename,
                SeekableArchiveMetadata {
                    base: ArchiveMetadata {
                        compression_kind: Some(compression_kind_for(cde.compression_method)),
                        uncompressed_size: Some(cde.uncompressed_size),
                        crc: Some(format!("{:08x}", cde.crc32)),
                    },
                    offset: data_offset,
                    length: cde.compressed_size,
                    local_header_offset: Some(cde.local_header_offset),
                },
            );
        }

        Ok(index)
    }

    fn decode_entry(
        &self,
        path: &str,
        compressed: &Bytes,
        meta: &SeekableArchiveMetadata,
    ) -> Result<ArchiveEntry> {
        let method = match &meta.base.compression_kind {
            Some(CompressionKind::None) => COMPRESSION_STORED,
            Some(CompressionKind::Deflate) => COMPRESSION_DEFLATE,
            _ => {
                return Err(MegError::DecodeError(
                    "unsupported compression kind for ZIP entry".to_string(),
                ))
            }
        };

        let uncompressed_size = meta.base.uncompressed_size.unwrap_or(0);

        if uncompressed_size > MAX_DECOMPRESSED_SIZE {
            return Err(MegError::DecodeError("entry too large to extract safely".to_string()));
        }
        if meta.length > 0 && uncompressed_size / meta.length > MAX_COMPRESSION_RATIO {
            return Err(MegError::DecodeError(
                "suspicious compression ratio; possible zip bomb".to_string(),
            ));
        }

        let data = decompress_entry(method, compressed, uncompressed_size)?;

        if data.len() as u64 != uncompressed_size {
            return Err(MegError::DecodeError(format!(
                "decompressed size mismatch: expected {uncompressed_size}, got {}",
                data.len()
            )));
        }

        if let Some(expected_hex) = &meta.base.crc {
            let actual = crc32(&data);
            if format!("{actual:08x}") != *expected_hex {
                return Err(MegError::DecodeError(
                    "CRC-32 mismatch; entry may be corrupted".to_string(),
                ));
            }
        }

        Ok(ArchiveEntry {
            path: path.to_string(),
            size: uncompressed_size,
            kind: EntryKind::File,
            modified: None,
            accessed: None,
            created: None,
            mode: None,
            data: Bytes::from(data),
            metadata: meta.base.clone(),
            link: None,
            link_encoding: LinkEncoding::Utf8,
        })
    }

    fn local_header_probe(&self, meta: &SeekableArchiveMetadata) -> Option<(u64, u64)> {
        let lho = meta.local_header_offset?;
        Some((lho, lho + LOCAL_HEADER_MIN_SIZE - 1))
    }

    fn resolve_entry_range(
        &self,
        meta: &SeekableArchiveMetadata,
        probe: Option<&Bytes>,
    ) -> Result<(u64, u64)> {
        let Some(lho) = meta.local_header_offset else {
            return Ok(meta.range());
        };
        let header = probe.ok_or_else(|| {
            MegError::DecodeError("missing local header probe bytes".to_string())
        })?;
        // `header` starts exactly at `lho`, so the helper's own
        // `local_header_offset` arg is 0 and its result is relative to it.
        let relative_data_offset = local_header_data_offset(header, 0)?;
        let data_offset = lho + relative_data_offset;
        Ok((data_offset, data_offset + meta.length.saturating_sub(1)))
    }
}

const CRC32_TABLE: [u32; 256] = [
    0x00000000, 0x77073096, 0xee0e612c, 0x990951ba, 0x076dc419, 0x706af48f,
    0xe963a535, 0x9e6495a3, 0x0edb8832, 0x79dcb8a4, 0xe0d5e91e, 0x97d2d988,
    0x09b64c2b, 0x7eb17cbd, 0xe7b82d07, 0x90bf1d91, 0x1db71064, 0x6ab020f2,
    0xf3b97148, 0x84be41de, 0x1adad47d, 0x6ddde4eb, 0xf4d4b551, 0x83d385c7,
    0x136c9856, 0x646ba8c0, 0xfd62f97a, 0x8a65c9ec, 0x14015c4f, 0x63066cd9,
    0xfa0f3d63, 0x8d080df5, 0x3b6e20c8, 0x4c69105e, 0xd56041e4, 0xa2677172,
    0x3c03e4d1, 0x4b04d447, 0xd20d85fd, 0xa50ab56b, 0x35b5a8fa, 0x42b2986c,
    0xdbbbc9d6, 0xacbcf940, 0x32d86ce3, 0x45df5c75, 0xdcd60dcf, 0xabd13d59,
    0x26d930ac, 0x51de003a, 0xc8d75180, 0xbfd06116, 0x21b4f4b5, 0x56b3c423,
    0xcfba9599, 0xb8bda50f, 0x2802b89e, 0x5f058808, 0xc60cd9b2, 0xb10be924,
    0x2f6f7c87, 0x58684c11, 0xc1611dab, 0xb6662d3d, 0x76dc4190, 0x01db7106,
    0x98d220bc, 0xefd5102a, 0x71b18589, 0x06b6b51f, 0x9fbfe4a5, 0xe8b8d433,
    0x7807c9a2, 0x0f00f934, 0x9609a88e, 0xe10e9818, 0x7f6a0dbb, 0x086d3d2d,
    0x91646c97, 0xe6635c01, 0x6b6b51f4, 0x1c6c6162, 0x856530d8, 0xf262004e,
    0x6c0695ed, 0x1b01a57b, 0x8208f4c1, 0xf50fc457, 0x65b0d9c6, 0x12b7e950,
    0x8bbeb8ea, 0xfcb9887c, 0x62dd1ddf, 0x15da2d49, 0x8cd37cf3, 0xfbd44c65,
    0x4db26158, 0x3ab551ce, 0xa3bc0074, 0xd4bb30e2, 0x4adfa541, 0x3dd895d7,
    0xa4d1c46d, 0xd3d6f4fb, 0x4369e96a, 0x346ed9fc, 0xad678846, 0xda60b8d0,
    0x44042d73, 0x33031de5, 0xaa0a4c5f, 0xdd0d7a9b, 0x5005713c, 0x270241aa,
    0xbe0b1010, 0xc90c2086, 0x5768b525, 0x206f85b3, 0xb966d409, 0xce61e49f,
    0x5edef90e, 0x29d9c998, 0xb0d09822, 0xc7d7a8b4, 0x59b33d17, 0x2eb40d81,
    0xb7bd5c3b, 0xc0ba6cad, 0xedb88320, 0x9abfb3b6, 0x03b6e20c, 0x74b1d29a,
    0xead54739, 0x9dd277af, 0x04db2615, 0x73dc1683, 0xe3630b12, 0x94643b84,
    0x0d6d6a3e, 0x7a6a5aa8, 0xe40ecf0b, 0x9309ff9d, 0x0a00ae27, 0x7d079eb1,
    0xf00f9344, 0x8708a3d2, 0x1e01f268, 0x6906c2fe, 0xf762575d, 0x806567cb,
    0x196c3671, 0x6e6b06e7, 0xfed41b76, 0x89d32be0, 0x10da7a5a, 0x67dd4acc,
    0xf9b9df6f, 0x8ebeeff9, 0x17b7be43, 0x60b08ed5, 0xd6d6a3e8, 0xa1d1937e,
    0x38d8c2c4, 0x4fdff252, 0xd1bb67f1, 0xa6bc5767, 0x3fb506dd, 0x48b2364b,
    0xd80d2bda, 0xaf0a1b4c, 0x36034af6, 0x41047a60, 0xdf60efc3, 0xa867df55,
    0x316e8eef, 0x4669be79, 0xcb61b38c, 0xbc66831a, 0x256fd2a0, 0x5268e236,
    0xcc0c7795, 0xbb0b4703, 0x220216b9, 0x5505262f, 0xc5ba3bbe, 0xb2bd0b28,
    0x2bb45a92, 0x5cb36a04, 0xc2d7ffa7, 0xb5d0cf31, 0x2cd99e8b, 0x5bdeae1d,
    0x9b64c2b0, 0xec63f226, 0x756aa39c, 0x026d930a, 0x9c0906a9, 0xeb0e363f,
    0x72076785, 0x05005713, 0x95bf4a82, 0xe2b87a14, 0x7bb12bae, 0x0cb61b38,
    0x92d28e9b, 0xe5d5be0d, 0x7cdcefb7, 0x0bdbdf21, 0x86d3d2d4, 0xf1d4e242,
    0x68ddb3f8, 0x1fda836e, 0x81be16cd, 0xf6b9265b, 0x6fb077e1, 0x18b74777,
    0x88085ae6, 0xff0f6a70, 0x66063bca, 0x11010b5c, 0x8f659eff, 0xf862ae69,
    0x616bffd3, 0x166ccf45, 0xa00ae278, 0xd70dd2ee, 0x4e048354, 0x3903b3c2,
    0xa7672661, 0xd06016f7, 0x4969474d, 0x3e6e77db, 0xaed16a4a, 0xd9d65adc,
    0x40df0b66, 0x37d83bf0, 0xa9bcae53, 0xdede86c5, 0x47d7977f, 0x30d069e9,
    0xbdd3b106, 0xcad2f090, 0x73db802a, 0x04dc19bc, 0x9a91a61f, 0xedcc9989,
    0x7aa70e33, 0x0da01fa5, 0x9d48d534, 0xea4fe4a2, 0x73c50918, 0x04c2398e,
    0x9abfd32d, 0xedb8c3bb, 0x7407df01, 0x03000097,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_known_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn find_eocd_rejects_multi_disk() {
        let mut data = vec![0u8; MIN_EOCD_SIZE];
        data[0..4].copy_from_slice(&[0x50, 0x4b, 0x05, 0x06]);
        data[4..6].copy_from_slice(&1u16.to_le_bytes());
        let result = find_eocd(&data);
        assert!(result.is_err());
    }

    #[test]
    fn find_eocd_rejects_zip64() {
        let mut data = vec![0u8; MIN_EOCD_SIZE];
        data[0..4].copy_from_slice(&[0x50, 0x4b, 0x05, 0x06]);
        data[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        let result = find_eocd(&data);
        assert!(result.is_err());
    }

    #[test]
    fn find_eocd_locates_valid_record() {
        let mut data = vec![0u8; 100];
        let pos = 50;
        data[pos..pos + 4].copy_from_slice(&[0x50, 0x4b, 0x05, 0x06]);
        data[pos + 12..pos + 16].copy_from_slice(&1000u32.to_le_bytes());
        data[pos + 16..pos + 20].copy_from_slice(&5000u32.to_le_bytes());
        let info = find_eocd(&data).unwrap();
        assert_eq!(info.central_dir_size, 1000);
        assert_eq!(info.central_dir_offset, 5000);
    }

    fn build_minimal_zip(name: &str, content: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        let local_offset = 0u32;

        // Local file header (stored, no compression)
        buf.extend_from_slice(&[0x50, 0x4b, 0x03, 0x04]);
        buf.extend_from_slice(&20u16.to_le_bytes()); // version
        buf.extend_from_slice(&0u16.to_le_bytes()); // flags
        buf.extend_from_slice(&0u16.to_le_bytes()); // method: stored
        buf.extend_from_slice(&0u16.to_le_bytes()); // time
        buf.extend_from_slice(&0u16.to_le_bytes()); // date
        let crc = crc32(content);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes()); // extra len
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
        buf.extend_from_slice(&local_offset.to_le_bytes());
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

    #[test]
    fn decode_round_trips_stored_entry() {
        let zip_bytes = build_minimal_zip("a/b.txt", b"hello\n");
        let format = ZipFormat::new();
        let archive = format.decode(&Bytes::from(zip_bytes)).unwrap();
        assert_eq!(archive.entries.len(), 1);
        assert_eq!(archive.entries[0].path, "a/b.txt");
        assert_eq!(&archive.entries[0].data[..], b"hello\n");
    }

    #[test]
    fn seekable_index_and_entry_round_trip() {
        let zip_bytes = Bytes::from(build_minimal_zip("a/b.txt", b"hello\n"));
        let format = ZipFormat::new();
        let seekable = format.as_seekable().unwrap();
        let total_len = zip_bytes.len() as u64;

        let index = seekable.decode_index(&zip_bytes, total_len).unwrap();
        let meta = index.get("a/b.txt").unwrap();

        let probe = seekable.local_header_probe(meta).map(|(s, e)| {
            zip_bytes.slice(s as usize..=e as usize)
        });
        let (start, end) = seekable.resolve_entry_range(meta, probe.as_ref()).unwrap();
        let compressed = zip_bytes.slice(start as usize..=end as usize);

        let entry = seekable.decode_entry("a/b.txt", &compressed, meta).unwrap();
        assert_eq!(&entry.data[..], b"hello\n");
    }

    /// Build a ZIP whose local file header carries a nonzero extra field
    /// while the matching central directory record declares `extra_len =
    /// 0` for the same entry, the exact real-world mismatch (extended
    /// timestamp / alignment padding in the local header only) that made
    /// trusting the central record's lengths produce a wrong fetch offset.
    fn build_zip_with_mismatched_extra_field(name: &str, content: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        let local_offset = 0u32;
        let local_extra: &[u8] = &[0x55, 0x54, 0x05, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];

        buf.extend_from_slice(&[0x50, 0x4b, 0x03, 0x04]);
        buf.extend_from_slice(&20u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        let crc = crc32(content);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(local_extra.len() as u16).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(local_extra);
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
        buf.extend_from_slice(&0u16.to_le_bytes()); // central extra_len: 0, disagrees with local
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&local_offset.to_le_bytes());
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

    #[test]
    fn decode_follows_local_header_when_extra_field_lengths_disagree() {
        let zip_bytes = build_zip_with_mismatched_extra_field("a.txt", b"hello\n");
        let format = ZipFormat::new();
        let archive = format.decode(&Bytes::from(zip_bytes)).unwrap();
        assert_eq!(&archive.entries[0].data[..], b"hello\n");
    }

    #[test]
    fn seekable_fast_path_follows_local_header_when_extra_field_lengths_disagree() {
        let zip_bytes = Bytes::from(build_zip_with_mismatched_extra_field("a.txt", b"hello\n"));
        let format = ZipFormat::new();
        let seekable = format.as_seekable().unwrap();
        let total_len = zip_bytes.len() as u64;

        let index = seekable.decode_index(&zip_bytes, total_len).unwrap();
        let meta = index.get("a.txt").unwrap();

        // Trusting the central directory's offset alone (extra_len = 0)
        // would point nine bytes short of the real compressed data.
        let (naive_start, _) = meta.range();

        let probe = seekable.local_header_probe(meta).map(|(s, e)| {
            zip_bytes.slice(s as usize..=e as usize)
        });
        let (start, end) = seekable.resolve_entry_range(meta, probe.as_ref()).unwrap();
        assert_ne!(start, naive_start);

        let compressed = zip_bytes.slice(start as usize..=end as usize);
        let entry = seekable.decode_entry("a.txt", &compressed, meta).unwrap();
        assert_eq!(&entry.data[..], b"hello\n");
    }
}
