//! File downloads, single and in bounded batches.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, error};

use crate::contract::{RepositoryRef, RepositoryTransport, TreeEntry};
use crate::error::DownloadError;

/// Upper bound on simultaneous downloads inside one asset-type batch.
/// Protects the remote API from bursts proportional to the tenant's script count.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 2;

/// Body of one file at one revision. Contents are kept as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: String,
    pub contents: Vec<u8>,
}

impl DownloadedFile {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Contents as text; invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Downloads the raw body of `path` at `revision`.
pub async fn download<T>(
    transport: &T,
    repo: &RepositoryRef,
    revision: &str,
    path: &str,
) -> Result<DownloadedFile, DownloadError>
where
    T: RepositoryTransport + ?Sized,
{
    match transport.get_file(repo, revision, path).await {
        Ok(contents) => {
            debug!(path, bytes = contents.len(), "Downloaded file");
            Ok(DownloadedFile::new(path, contents))
        }
        Err(e) => {
            error!(error = %e, path, %repo, revision, "Error downloading file");
            Err(DownloadError {
                path: path.to_string(),
                source: e,
            })
        }
    }
}

/// Downloads every entry with at most [`MAX_CONCURRENT_DOWNLOADS`] requests in flight.
///
/// Results come back in the order of `entries`. The first failure aborts the batch.
pub async fn download_batch<T>(
    transport: &T,
    repo: &RepositoryRef,
    revision: &str,
    entries: &[TreeEntry],
) -> Result<Vec<DownloadedFile>, DownloadError>
where
    T: RepositoryTransport + ?Sized,
{
    stream::iter(entries)
        .map(|entry| download(transport, repo, revision, &entry.path))
        .buffered(MAX_CONCURRENT_DOWNLOADS)
        .try_collect()
        .await
}
