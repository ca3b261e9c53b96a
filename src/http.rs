//! HTTP transport: an `axum` router wiring the handler's pure
//! `serve` function to real requests over a single catch-all route.

use crate::handler;
use crate::planner::Planner;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

pub struct AppState {
    pub planner: Planner,
    pub force_download: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/*archive_and_path", get(handle_get))
        .with_state(state)
}

async fn handle_get(State(state): State<Arc<AppState>>, Path(archive_and_path): Path<String>) -> Response {
    let resolved = handler::serve(&state.planner, &archive_and_path, state.force_download).await;

    let status = StatusCode::from_u16(resolved.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, resolved.content_type);

    if let Some(disposition) = &resolved.content_disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition.as_str());
    }

    builder
        .body(Body::from(resolved.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
