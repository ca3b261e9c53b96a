//! Error taxonomy shared by every component.
//!
//! Each variant corresponds to one row of the error table in the design
//! doc: a distinct origin, a distinct local recovery policy, and a
//! distinct user-visible disposition. Components should construct these
//! directly rather than routing failures through `anyhow::Error`; `anyhow`
//! stays at the process boundary (bootstrap, CLI) where free-form context
//! is more useful than a fixed taxonomy.

use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum MegError {
    #[error("unknown archive format for {key}")]
    UnknownFormat { key: String },

    #[error("archive not found: {key}")]
    NotFoundArchive { key: String },

    #[error("entry not found: {path}")]
    NotFoundEntry { path: String },

    #[error("object store transport error: {0}")]
    TransportError(String),

    #[error("failed to decode archive: {0}")]
    DecodeError(String),

    #[error("magic bytes did not match the declared format for the inner archive")]
    MagicMismatch,

    #[error("symlink resolution exceeded the depth limit")]
    LoopDetected,

    #[error("attempted a mutating operation on a read-only file system: {0}")]
    ReadOnly(&'static str),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl MegError {
    /// HTTP status this error should be surfaced as, per the error table.
    ///
    /// `LoopDetected` is folded into `NotFoundEntry`'s disposition (404):
    /// callers at the FS boundary are expected to have already mapped it
    /// to "not found" before it reaches a handler, but the mapping holds
    /// either way so a stray `LoopDetected` never crashes a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            MegError::UnknownFormat { .. } => StatusCode::NOT_FOUND,
            MegError::NotFoundArchive { .. } => StatusCode::NOT_FOUND,
            MegError::NotFoundEntry { .. } => StatusCode::NOT_FOUND,
            MegError::LoopDetected => StatusCode::NOT_FOUND,
            MegError::TransportError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MegError::DecodeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MegError::MagicMismatch => StatusCode::INTERNAL_SERVER_ERROR,
            MegError::ReadOnly(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MegError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MegError::UnknownFormat { .. }
                | MegError::NotFoundArchive { .. }
                | MegError::NotFoundEntry { .. }
                | MegError::LoopDetected
        )
    }
}

pub type Result<T> = std::result::Result<T, MegError>;
