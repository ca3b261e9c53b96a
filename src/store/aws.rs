//! Concrete `ObjectStore` over `aws-sdk-s3`: range GET, tail-read helper,
//! and conditional GET via `if_none_match`.

use super::{ByteRange, GetResponse, HeadResponse, ListedObject, ObjectStore};
use crate::error::{MegError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;

pub struct AwsObjectStore {
    client: Client,
    bucket: String,
}

impl AwsObjectStore {
    pub fn new(client: Client, bucket: String) -> Self {
        AwsObjectStore { client, bucket }
    }

    fn transport_err(context: &str, err: impl std::fmt::Display) -> MegError {
        MegError::TransportError(format!("{context}: {err}"))
    }
}

#[async_trait]
impl ObjectStore for AwsObjectStore {
    async fn head(&self, key: &str) -> Result<HeadResponse> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                if is_not_found(&e) {
                    return Err(MegError::NotFoundArchive { key: key.to_string() });
                }
                return Err(Self::transport_err("head_object", e));
            }
        };

        Ok(HeadResponse {
            content_type: resp.content_type().map(String::from),
            content_length: resp.content_length().unwrap_or(0).max(0) as u64,
            accept_ranges: resp.accept_ranges().is_some(),
            etag: resp.e_tag().map(String::from),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| Self::transport_err("list_objects_v2", e))?;

        let objects: Vec<ListedObject> = resp
            .contents()
            .iter()
            .filter_map(|o| o.key().map(|k| ListedObject { key: k.to_string() }))
            .collect();

        if objects.is_empty() {
            return Err(MegError::NotFoundArchive { key: prefix.to_string() });
        }

        Ok(objects)
    }

    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
        if_none_match: Option<&str>,
    ) -> Result<GetResponse> {
        let mut req = self.client.get_object().bucket(&self.bucket).key(key);

        if let Some(range) = range {
            req = req.range(range.to_header_value());
        }
        if let Some(etag) = if_none_match {
            req = req.if_none_match(etag);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                if is_not_modified(&e) {
                    return Ok(GetResponse {
                        body: bytes::Bytes::new(),
                        content_type: None,
                        content_length: None,
                        content_encoding: None,
                        etag: if_none_match.map(String::from),
                        not_modified: true,
                    });
                }
                if is_not_found(&e) {
                    return Err(MegError::NotFoundArchive { key: key.to_string() });
                }
                return Err(Self::transport_err("get_object", e));
            }
        };

        let content_type = resp.content_type().map(String::from);
        let content_encoding = resp.content_encoding().map(String::from);
        let etag = resp.e_tag().map(String::from);
        let content_length = resp.content_length().map(|l| l.max(0) as u64);

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| Self::transport_err("collect body", e))?
            .into_bytes();

        Ok(GetResponse {
            body,
            content_type,
            content_length,
            content_encoding,
            etag,
            not_modified: false,
        })
    }
}

fn is_not_found<E, R>(err: &aws_sdk_s3::error::SdkError<E, R>) -> bool
where
    E: std::error::Error + 'static,
{
    err.to_string().contains("NotFound") || err.to_string().contains("NoSuchKey")
}

fn is_not_modified<E, R>(err: &aws_sdk_s3::error::SdkError<E, R>) -> bool
where
    E: std::error::Error + 'static,
{
    err.to_string().contains("304") || err.to_string().to_lowercase().contains("not modified")
}

/// Extract a bucket name from the recognized URL forms: `s3://B/...`,
/// `https://B.s3.amazonaws.com/...`, and `https://s3.amazonaws.com/B/...`.
/// An explicit `bucket` parameter always wins over anything derived here.
pub fn parse_bucket_url(url: &str) -> Option<String> {
    if let Some(rest) = url.strip_prefix("s3://") {
        return rest.split('/').next().map(str::to_string).filter(|s| !s.is_empty());
    }

    if let Some(rest) = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://")) {
        if let Some(host) = rest.split('/').next() {
            if let Some(bucket) = host.strip_suffix(".s3.amazonaws.com") {
                return Some(bucket.to_string());
            }
            if host == "s3.amazonaws.com" {
                return rest.splitn(2, '/').nth(1).and_then(|p| p.split('/').next()).map(str::to_string);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_s3_scheme() {
        assert_eq!(parse_bucket_url("s3://my-bucket/key"), Some("my-bucket".to_string()));
    }

    #[test]
    fn parses_virtual_hosted_style() {
        assert_eq!(
            parse_bucket_url("https://my-bucket.s3.amazonaws.com/key"),
            Some("my-bucket".to_string())
        );
    }

    #[test]
    fn parses_path_style() {
        assert_eq!(
            parse_bucket_url("https://s3.amazonaws.com/my-bucket/key"),
            Some("my-bucket".to_string())
        );
    }

    #[test]
    fn rejects_unrelated_url() {
        assert_eq!(parse_bucket_url("https://example.com/foo"), None);
    }
}
