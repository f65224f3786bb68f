//! # contract: the seam between the sync engine and the source-control host
//!
//! The engine never talks HTTP directly. It consumes a [`RepositoryTransport`]
//! which can be the real [`crate::bitbucket::BitbucketClient`], a mockall mock
//! (`MockRepositoryTransport`, exported with the `test-export-mocks` feature) or a
//! hand-written stub in tests.
//!
//! Plain data types shared by every pipeline stage also live here.

use std::sync::OnceLock;

use async_trait::async_trait;
use mockall::automock;
use regex::Regex;
use serde::Serialize;

use crate::error::{SyncError, TransportError};

/// Owner and slug of a remote repository, parsed from a user supplied reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub slug: String,
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("static pattern compiles"))
}

impl RepositoryRef {
    /// Parses `owner/slug` or `https://host/owner/slug`. A trailing `.git` is ignored.
    pub fn parse(reference: &str) -> Result<Self, SyncError> {
        let invalid = || SyncError::InvalidRepositoryReference {
            reference: reference.to_string(),
        };

        let parts: Vec<&str> = reference.split('/').collect();
        let (owner, slug) = match parts.as_slice() {
            &[owner, slug] => (owner, slug),
            &[scheme, "", host, owner, slug]
                if scheme.ends_with(':') && scheme.len() > 1 && !host.is_empty() =>
            {
                (owner, slug)
            }
            _ => return Err(invalid()),
        };
        let slug = slug.strip_suffix(".git").unwrap_or(slug);

        let pattern = segment_pattern();
        if !pattern.is_match(owner) || !pattern.is_match(slug) {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            slug: slug.to_string(),
        })
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a directory listing. `path` is always relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub id: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn file(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Read-only access to a remote repository.
///
/// Implementations map a missing repository, revision or directory to
/// [`TransportError::NotFound`]; callers decide whether that is fatal.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryTransport: Send + Sync {
    /// Succeeds when the repository exists and is readable with the configured credentials.
    async fn check_exists(&self, repo: &RepositoryRef) -> Result<(), TransportError>;

    /// Non-recursive listing of `path` at `revision`.
    async fn list_tree(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> Result<Vec<TreeEntry>, TransportError>;

    /// Raw body of the file at `path`.
    async fn get_file(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> Result<Vec<u8>, TransportError>;
}
