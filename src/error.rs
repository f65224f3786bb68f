//! Error types for the sync pipeline.
//!
//! Only [`TransportError::NotFound`] on a directory listing is recoverable (the tenant
//! simply has none of that asset type). Everything else aborts the whole sync.

/// Failure reported by a [`crate::contract::RepositoryTransport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }
}

/// A single file body could not be retrieved.
#[derive(Debug, thiserror::Error)]
#[error("failed to download '{path}': {source}")]
pub struct DownloadError {
    pub path: String,
    #[source]
    pub source: TransportError,
}

/// An asset file was downloaded but its contents could not be reshaped.
#[derive(Debug, thiserror::Error)]
pub enum UnifyError {
    #[error("'{path}' is not valid JSON metadata: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{path}' must contain a JSON object")]
    NotAnObject { path: String },
}

/// Top-level failure of [`crate::synchronise::synchronise`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid repository reference: '{reference}'")]
    InvalidRepositoryReference { reference: String },

    #[error("repository '{owner}/{slug}' not found")]
    RepositoryNotFound { owner: String, slug: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Unify(#[from] UnifyError),
}
