//! Object Store Adapter: the abstract HEAD / LIST / GET / ranged-GET
//! contract the rest of the system calls, plus a concrete AWS-backed
//! implementation.

pub mod aws;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub content_type: Option<String>,
    pub content_length: u64,
    pub accept_ranges: bool,
    pub etag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct GetResponse {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_encoding: Option<String>,
    pub etag: Option<String>,
    pub not_modified: bool,
}

/// A closed byte interval, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    pub fn to_header_value(self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// The contract the rest of the system calls. Authentication/signing is
/// opaque to callers: a `head`/`list`/`get` either succeeds against
/// whatever credentials the implementation was built with, or fails with
/// `NotFoundArchive`/`TransportError`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn head(&self, key: &str) -> Result<HeadResponse>;

    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>>;

    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
        if_none_match: Option<&str>,
    ) -> Result<GetResponse>;
}
