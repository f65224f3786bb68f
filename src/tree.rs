//! Tree fetching: lists every asset directory of a repository at one revision.
//!
//! Asset directories are optional per tenant, so a listing that reports
//! [`TransportError::NotFound`] resolves to an empty listing. Any other
//! transport failure aborts the fetch.

use futures::future::try_join_all;
use tracing::{debug, error, info};

use crate::classify::{AssetType, DATABASE_CONNECTIONS_DIRECTORY};
use crate::config::Layout;
use crate::contract::{RepositoryRef, RepositoryTransport, TreeEntry};
use crate::error::TransportError;

/// Lists `path` at `revision`; a missing directory yields an empty listing.
pub async fn list_directory<T>(
    transport: &T,
    repo: &RepositoryRef,
    revision: &str,
    path: &str,
) -> Result<Vec<TreeEntry>, TransportError>
where
    T: RepositoryTransport + ?Sized,
{
    match transport.list_tree(repo, revision, path).await {
        Ok(entries) => {
            debug!(path, entries = entries.len(), "Listed directory");
            Ok(entries)
        }
        Err(e) if e.is_not_found() => {
            debug!(path, "Directory not found, treating as empty");
            Ok(Vec::new())
        }
        Err(e) => {
            error!(error = %e, path, %repo, revision, "Failed to list directory");
            Err(e)
        }
    }
}

/// Lists the database-connections directory, then every connection subdirectory
/// concurrently, and concatenates the file entries of all connections.
pub async fn list_database_connections<T>(
    transport: &T,
    repo: &RepositoryRef,
    revision: &str,
    layout: &Layout,
) -> Result<Vec<TreeEntry>, TransportError>
where
    T: RepositoryTransport + ?Sized,
{
    let base = layout.directory(DATABASE_CONNECTIONS_DIRECTORY);
    let connections: Vec<TreeEntry> = list_directory(transport, repo, revision, &base)
        .await?
        .into_iter()
        .filter(|entry| !entry.is_file())
        .collect();

    debug!(
        connections = ?connections.iter().map(|c| c.file_name()).collect::<Vec<_>>(),
        "Discovered database connection directories"
    );

    let listings = try_join_all(
        connections
            .iter()
            .map(|connection| list_directory(transport, repo, revision, &connection.path)),
    )
    .await?;

    Ok(listings.into_iter().flatten().filter(TreeEntry::is_file).collect())
}

/// Lists every asset directory concurrently and merges the file entries into one set.
pub async fn fetch_tree<T>(
    transport: &T,
    repo: &RepositoryRef,
    revision: &str,
    layout: &Layout,
) -> Result<Vec<TreeEntry>, TransportError>
where
    T: RepositoryTransport + ?Sized,
{
    let listings = try_join_all(AssetType::directories().into_iter().map(|dir| async move {
        if dir == DATABASE_CONNECTIONS_DIRECTORY {
            list_database_connections(transport, repo, revision, layout).await
        } else {
            let path = layout.directory(dir);
            let entries = list_directory(transport, repo, revision, &path).await?;
            Ok::<_, TransportError>(entries.into_iter().filter(TreeEntry::is_file).collect())
        }
    }))
    .await?;

    let files: Vec<TreeEntry> = listings.into_iter().flatten().collect();
    info!(%repo, revision, files = files.len(), "Fetched repository tree");
    Ok(files)
}
