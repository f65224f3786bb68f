#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bitbucket_deploy_core::contract::{RepositoryRef, RepositoryTransport, TreeEntry};
use bitbucket_deploy_core::error::TransportError;

/// In-memory repository. Directories exist implicitly when a file lives below them.
/// Counts listings and downloads and records the peak number of concurrent downloads.
pub struct FakeRepository {
    files: BTreeMap<String, Vec<u8>>,
    pub exists: bool,
    pub failing_listing: Option<String>,
    pub failing_download: Option<String>,
    pub download_delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    downloads: AtomicUsize,
    listings: Mutex<Vec<String>>,
}

impl FakeRepository {
    pub fn new<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(p, c)| (p.into(), c.into()))
                .collect(),
            exists: true,
            failing_listing: None,
            failing_download: None,
            download_delay: Duration::from_millis(5),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            listings: Mutex::new(Vec::new()),
        }
    }

    pub fn peak_downloads(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn listed_paths(&self) -> Vec<String> {
        self.listings.lock().unwrap().clone()
    }

    fn not_found(path: &str) -> TransportError {
        TransportError::NotFound {
            url: format!("fake://{path}"),
        }
    }
}

#[async_trait]
impl RepositoryTransport for FakeRepository {
    async fn check_exists(&self, _repo: &RepositoryRef) -> Result<(), TransportError> {
        if self.exists {
            Ok(())
        } else {
            Err(Self::not_found("repository"))
        }
    }

    async fn list_tree(
        &self,
        _repo: &RepositoryRef,
        _revision: &str,
        path: &str,
    ) -> Result<Vec<TreeEntry>, TransportError> {
        self.listings.lock().unwrap().push(path.to_string());
        if self.failing_listing.as_deref() == Some(path) {
            return Err(TransportError::Status {
                url: format!("fake://{path}"),
                status: 500,
            });
        }

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut files = Vec::new();
        let mut directories = BTreeSet::new();
        for file in self.files.keys() {
            let Some(rest) = file.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                None => files.push(TreeEntry::file(file.clone(), "c0ffee")),
                Some((dir, _)) => {
                    directories.insert(format!("{prefix}{dir}"));
                }
            }
        }
        if files.is_empty() && directories.is_empty() {
            return Err(Self::not_found(path));
        }
        Ok(directories
            .into_iter()
            .map(|d| TreeEntry::directory(d, "c0ffee"))
            .chain(files)
            .collect())
    }

    async fn get_file(
        &self,
        _repo: &RepositoryRef,
        _revision: &str,
        path: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.download_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.downloads.fetch_add(1, Ordering::SeqCst);

        if self.failing_download.as_deref() == Some(path) {
            return Err(TransportError::Status {
                url: format!("fake://{path}"),
                status: 502,
            });
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }
}

pub fn repo() -> RepositoryRef {
    RepositoryRef {
        owner: "acme".into(),
        slug: "tenant-config".into(),
    }
}
