//! Handler Glue: maps a request URL to (archive, inner-path), drives
//! the planner, and composes a transport-agnostic response. Kept as a
//! pure function over `HandlerResponse` so the HTTP transport
//! stays a thin adapter, with the HTTP surface itself treated as an
//! external collaborator.

use crate::error::MegError;
use crate::planner::Planner;
use tracing::warn;

pub struct HandlerResponse {
    pub status: u16,
    pub content_type: String,
    pub content_disposition: Option<String>,
    pub body: bytes::Bytes,
}

impl HandlerResponse {
    /// Not-found dispositions (§8 Scenario 6) carry an empty body; the
    /// error text goes to the log instead, never into the response a
    /// client sees.
    fn from_error(err: MegError) -> Self {
        let status = err.status_code().as_u16();
        warn!(error = %err, status, "request failed");

        let body = if err.is_not_found() {
            bytes::Bytes::new()
        } else {
            bytes::Bytes::from(err.to_string())
        };

        HandlerResponse {
            status,
            content_type: "text/plain".to_string(),
            content_disposition: None,
            body,
        }
    }
}

/// Serve `GET /<archive>` and `GET /<archive>/<inner_path>` alike: the
/// planner already distinguishes the two by segment count, so the
/// handler only needs to shape the response.
pub async fn serve(planner: &Planner, archive_and_path: &str, force_download: bool) -> HandlerResponse {
    match planner.resolve(archive_and_path).await {
        Ok(resolved) => {
            let content_disposition = force_download
                .then(|| format!("attachment; filename=\"{}\"", resolved.filename));
            HandlerResponse {
                status: 200,
                content_type: resolved.content_type,
                content_disposition,
                body: resolved.body,
            }
        }
        Err(err) => HandlerResponse::from_error(err),
    }
}
