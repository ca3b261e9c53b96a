//! Gzip as a standalone `CompressionFormat`: a total function bytes→bytes,
//! used both on its own (`GET /file.gz`) and as the compression layer of
//! `TarGzFormat`.

use crate::error::{MegError, Result};
use std::io::Read;

pub const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| MegError::DecodeError(format!("gzip: {e}")))?;
    Ok(out)
}
