//! Asset assembly: groups classified files into candidates and downloads their parts.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::classify::{AssetType, Classification, FileRole, META_SUFFIX};
use crate::contract::{RepositoryRef, RepositoryTransport, TreeEntry};
use crate::download::{download_batch, DownloadedFile};
use crate::error::DownloadError;

/// Files believed to make up one logical asset, before download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCandidate {
    pub asset_type: AssetType,
    pub name: String,
    pub body: Option<TreeEntry>,
    pub metadata: Option<TreeEntry>,
    /// Database connection scripts keyed by stage name.
    pub scripts: BTreeMap<String, TreeEntry>,
    pub settings: Option<TreeEntry>,
}

impl AssetCandidate {
    fn new(asset_type: AssetType, name: &str) -> Self {
        Self {
            asset_type,
            name: name.to_string(),
            body: None,
            metadata: None,
            scripts: BTreeMap::new(),
            settings: None,
        }
    }

    /// Places `entry` in the slot its role selects. Returns the entry it displaced, if any.
    fn insert(&mut self, classification: &Classification, entry: TreeEntry) -> Option<TreeEntry> {
        match (self.asset_type, classification.role) {
            (AssetType::DatabaseConnection, FileRole::Body) => {
                self.scripts.insert(classification.name.clone(), entry)
            }
            (_, FileRole::Body) => self.body.replace(entry),
            (_, FileRole::Metadata) => self.metadata.replace(entry),
            (_, FileRole::Settings) => self.settings.replace(entry),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.metadata.is_none()
            && self.scripts.is_empty()
            && self.settings.is_none()
    }

    fn parts(&self) -> Vec<(Slot, &TreeEntry)> {
        let mut parts = Vec::new();
        if let Some(body) = &self.body {
            parts.push((Slot::Body, body));
        }
        if let Some(metadata) = &self.metadata {
            parts.push((Slot::Metadata, metadata));
        }
        for (stage, script) in &self.scripts {
            parts.push((Slot::Script(stage.clone()), script));
        }
        if let Some(settings) = &self.settings {
            parts.push((Slot::Settings, settings));
        }
        parts
    }
}

/// A candidate with every referenced entry replaced by its downloaded contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledRecord {
    pub name: String,
    pub body: Option<DownloadedFile>,
    pub metadata: Option<DownloadedFile>,
    pub scripts: BTreeMap<String, DownloadedFile>,
    pub settings: Option<DownloadedFile>,
}

impl AssembledRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.metadata.is_none()
            && self.scripts.is_empty()
            && self.settings.is_none()
    }

    fn fill(&mut self, slot: Slot, file: DownloadedFile) {
        match slot {
            Slot::Body => self.body = Some(file),
            Slot::Metadata => self.metadata = Some(file),
            Slot::Settings => self.settings = Some(file),
            Slot::Script(stage) => {
                self.scripts.insert(stage, file);
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Body,
    Metadata,
    Settings,
    Script(String),
}

/// Builds one candidate per group key of `asset_type`.
///
/// Entries of other asset types are ignored. Entries are processed in path order,
/// so when two files claim the same slot (e.g. `a.json` and `a.meta.json` for a
/// rule) the one sorting last wins, independent of listing order.
pub fn group_candidates(
    asset_type: AssetType,
    entries: &[(Classification, TreeEntry)],
) -> Vec<AssetCandidate> {
    let mut ordered: Vec<&(Classification, TreeEntry)> = entries
        .iter()
        .filter(|(classification, _)| classification.asset_type == asset_type)
        .collect();
    ordered.sort_by_cached_key(|item| precedence(&item.1));

    let mut candidates: BTreeMap<String, AssetCandidate> = BTreeMap::new();
    for (classification, entry) in ordered {
        let candidate = candidates
            .entry(classification.group_key.clone())
            .or_insert_with(|| AssetCandidate::new(asset_type, &classification.group_key));
        if let Some(displaced) = candidate.insert(classification, entry.clone()) {
            warn!(
                asset_type = %asset_type,
                name = %classification.group_key,
                kept = %entry.path,
                dropped = %displaced.path,
                "Two files claim the same part of an asset, keeping the later path"
            );
        }
    }

    candidates
        .into_values()
        .filter(|candidate| !candidate.is_empty())
        .collect()
}

/// Order in which entries claim slots; the entry applied last wins.
/// Explicit `.meta.json` files (in any case) come after everything else, then
/// case-insensitive path order, then raw path order.
fn precedence(entry: &TreeEntry) -> (bool, String, String) {
    let lowered = entry.path.to_ascii_lowercase();
    (lowered.ends_with(META_SUFFIX), lowered, entry.path.clone())
}

/// Groups `entries` of `asset_type`, downloads every present part in one bounded
/// batch, and returns one assembled record per candidate.
pub async fn assemble<T>(
    transport: &T,
    repo: &RepositoryRef,
    revision: &str,
    asset_type: AssetType,
    entries: &[(Classification, TreeEntry)],
) -> Result<Vec<AssembledRecord>, DownloadError>
where
    T: RepositoryTransport + ?Sized,
{
    let candidates = group_candidates(asset_type, entries);

    let mut jobs: Vec<(usize, Slot)> = Vec::new();
    let mut files: Vec<TreeEntry> = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        for (slot, entry) in candidate.parts() {
            jobs.push((index, slot));
            files.push(entry.clone());
        }
    }

    debug!(
        asset_type = %asset_type,
        candidates = candidates.len(),
        downloads = files.len(),
        "Downloading asset batch"
    );

    let downloaded = download_batch(transport, repo, revision, &files).await?;

    let mut records: Vec<AssembledRecord> = candidates
        .iter()
        .map(|candidate| AssembledRecord::named(candidate.name.clone()))
        .collect();
    for ((index, slot), file) in jobs.into_iter().zip(downloaded) {
        records[index].fill(slot, file);
    }

    info!(asset_type = %asset_type, records = records.len(), "Assembled assets");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;

    fn classified(paths: &[&str]) -> Vec<(Classification, TreeEntry)> {
        paths
            .iter()
            .filter_map(|path| classify(path).map(|c| (c, TreeEntry::file(*path, "sha"))))
            .collect()
    }

    #[test]
    fn script_and_metadata_with_same_stem_form_one_candidate() {
        let entries = classified(&["rules/a.js", "rules/a.json", "rules/b.js"]);
        let candidates = group_candidates(AssetType::Rule, &entries);

        assert_eq!(candidates.len(), 2);
        let a = &candidates[0];
        assert_eq!(a.name, "a");
        assert_eq!(a.body.as_ref().map(|e| e.path.as_str()), Some("rules/a.js"));
        assert_eq!(a.metadata.as_ref().map(|e| e.path.as_str()), Some("rules/a.json"));
        assert!(candidates[1].metadata.is_none());
    }

    #[test]
    fn database_files_group_under_connection() {
        let entries = classified(&[
            "database-connections/default/login.js",
            "database-connections/default/settings.json",
            "database-connections/default/get_user.js",
            "database-connections/legacy/login.js",
        ]);
        let candidates = group_candidates(AssetType::DatabaseConnection, &entries);

        assert_eq!(candidates.len(), 2);
        let default = candidates.iter().find(|c| c.name == "default").unwrap();
        assert_eq!(
            default.scripts.keys().collect::<Vec<_>>(),
            vec!["get_user", "login"]
        );
        assert!(default.settings.is_some());
        assert!(default.body.is_none());
    }

    #[test]
    fn explicit_meta_file_wins_over_bare_json_regardless_of_order() {
        let forward = classified(&["rules/a.json", "rules/a.meta.json"]);
        let reverse = classified(&["rules/a.meta.json", "rules/a.json"]);

        for entries in [forward, reverse] {
            let candidates = group_candidates(AssetType::Rule, &entries);
            assert_eq!(candidates.len(), 1);
            assert_eq!(
                candidates[0].metadata.as_ref().map(|e| e.path.as_str()),
                Some("rules/a.meta.json")
            );
        }
    }

    #[test]
    fn explicit_meta_file_wins_whatever_the_suffix_case() {
        for meta in ["rules/a.META.JSON", "rules/a.Meta.Json", "rules/a.meta.json"] {
            for bare in ["rules/a.json", "rules/a.JSON"] {
                let entries = classified(&[bare, meta]);
                let candidates = group_candidates(AssetType::Rule, &entries);
                assert_eq!(candidates.len(), 1);
                assert_eq!(
                    candidates[0].metadata.as_ref().map(|e| e.path.as_str()),
                    Some(meta),
                    "{meta} should win over {bare}"
                );
            }
        }
    }

    #[test]
    fn explicit_meta_file_wins_for_config_assets() {
        let entries = classified(&["clients/web.meta.json", "clients/web.JSON", "clients/web.META.json"]);
        let candidates = group_candidates(AssetType::Client, &entries);

        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].body.as_ref().map(|e| e.path.as_str()),
            Some("clients/web.JSON")
        );
        assert_eq!(
            candidates[0].metadata.as_ref().map(|e| e.path.as_str()),
            Some("clients/web.meta.json")
        );
    }

    #[test]
    fn other_asset_types_are_ignored() {
        let entries = classified(&["rules/a.js", "pages/login.html"]);
        assert_eq!(group_candidates(AssetType::Page, &entries).len(), 1);
        assert!(group_candidates(AssetType::Client, &entries).is_empty());
    }
}
