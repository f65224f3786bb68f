//! High-level pipeline: mirrors a tenant configuration tree into a [`DeploymentManifest`].
//!
//! The pipeline runs, in order:
//!   - parse the repository reference (no network access on failure)
//!   - verify the repository exists (fail fast, before any tree listing)
//!   - list every asset directory concurrently ([`crate::tree::fetch_tree`])
//!   - classify each listed path ([`crate::classify`])
//!   - per asset type, concurrently: assemble candidates with a bounded download
//!     batch ([`crate::assemble`]) and reshape them ([`crate::unify`])
//!
//! # Error Handling
//! The first fatal error of any branch rejects the whole sync. A missing asset
//! directory is not an error; it yields an empty sequence for that type. No
//! partial manifest is ever returned.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::assemble::assemble;
use crate::classify::{classify_in, AssetType, Classification};
use crate::config::Layout;
use crate::contract::{RepositoryRef, RepositoryTransport, TreeEntry};
use crate::error::SyncError;
use crate::manifest::{AssetRecord, DeploymentManifest};
use crate::tree::fetch_tree;
use crate::unify::unify_all;

/// Entrypoint: synchronise `repository` at `revision` into a deployment manifest.
///
/// `branch` is informational (logged with the run); the tree is always read at `revision`.
pub async fn synchronise<T>(
    transport: &T,
    layout: &Layout,
    repository: &str,
    branch: &str,
    revision: &str,
) -> Result<DeploymentManifest, SyncError>
where
    T: RepositoryTransport + ?Sized,
{
    let sync_id = Uuid::new_v4();
    let span = tracing::info_span!("sync", %sync_id, repository, branch, revision);
    run(transport, layout, repository, revision)
        .instrument(span)
        .await
}

async fn run<T>(
    transport: &T,
    layout: &Layout,
    repository: &str,
    revision: &str,
) -> Result<DeploymentManifest, SyncError>
where
    T: RepositoryTransport + ?Sized,
{
    info!("[SYNC] Starting tenant synchronisation");

    let repo = RepositoryRef::parse(repository).map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Invalid repository reference");
        e
    })?;

    if let Err(e) = transport.check_exists(&repo).await {
        error!(error = %e, %repo, "[SYNC][ERROR] Repository check failed");
        return Err(if e.is_not_found() {
            SyncError::RepositoryNotFound {
                owner: repo.owner.clone(),
                slug: repo.slug.clone(),
            }
        } else {
            SyncError::Transport(e)
        });
    }
    info!(%repo, "[SYNC] Repository found");

    let files = fetch_tree(transport, &repo, revision, layout).await?;
    debug!(
        files = ?files.iter().map(|f| (&f.path, &f.id)).collect::<Vec<_>>(),
        "[SYNC] Files in tree"
    );

    let by_type = classify_all(layout, files);

    let per_type = try_join_all(AssetType::ALL.into_iter().map(|asset_type| {
        let entries = by_type.get(&asset_type).map(Vec::as_slice).unwrap_or_default();
        sync_asset_type(transport, &repo, revision, asset_type, entries)
    }))
    .await?;

    let mut manifest = DeploymentManifest::new();
    for (asset_type, records) in AssetType::ALL.into_iter().zip(per_type) {
        manifest.insert(asset_type, records);
    }

    info!(
        records = manifest.len(),
        "[SYNC] Synchronisation complete"
    );
    Ok(manifest)
}

/// Classifies every file and buckets the accepted ones by asset type.
fn classify_all(
    layout: &Layout,
    files: Vec<TreeEntry>,
) -> BTreeMap<AssetType, Vec<(Classification, TreeEntry)>> {
    let mut by_type: BTreeMap<AssetType, Vec<(Classification, TreeEntry)>> = BTreeMap::new();
    for entry in files {
        match classify_in(layout, &entry.path) {
            Some(classification) => by_type
                .entry(classification.asset_type)
                .or_default()
                .push((classification, entry)),
            None => debug!(path = %entry.path, "[SYNC] Ignoring unrecognised file"),
        }
    }
    by_type
}

async fn sync_asset_type<T>(
    transport: &T,
    repo: &RepositoryRef,
    revision: &str,
    asset_type: AssetType,
    entries: &[(Classification, TreeEntry)],
) -> Result<Vec<AssetRecord>, SyncError>
where
    T: RepositoryTransport + ?Sized,
{
    let assembled = assemble(transport, repo, revision, asset_type, entries)
        .await
        .map_err(|e| {
            error!(error = %e, asset_type = %asset_type, "[SYNC][ERROR] Download failed");
            e
        })?;

    let records = unify_all(asset_type, &assembled).map_err(|e| {
        error!(error = %e, asset_type = %asset_type, "[SYNC][ERROR] Unify failed");
        e
    })?;

    info!(asset_type = %asset_type, records = records.len(), "[SYNC] Asset type synchronised");
    Ok(records)
}
