//! # bitbucket: [`RepositoryTransport`] over the Bitbucket Cloud 2.0 REST API
//!
//! - Existence check: `GET /repositories/{owner}/{slug}`
//! - Directory listing: `GET /repositories/{owner}/{slug}/src/{revision}/{path}/`, paginated
//!   through the `next` link of each page
//! - Raw file: `GET /repositories/{owner}/{slug}/src/{revision}/{path}`
//! - Branch head: `GET /repositories/{owner}/{slug}/refs/branches?q=name="{branch}"`
//!
//! `revision` is sent as a single path segment, so it should be a commit hash.
//! [`BitbucketClient::resolve_branch`] turns a branch name (which may contain `/`)
//! into the hash of its head commit.
//!
//! Requests use HTTP basic auth (username + app password). A 404 becomes
//! [`TransportError::NotFound`]; any other non-success status becomes
//! [`TransportError::Status`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::BitbucketSettings;
use crate::contract::{RepositoryRef, RepositoryTransport, TreeEntry};
use crate::error::TransportError;

const PAGE_LENGTH: &str = "100";

/// Basic-auth credentials. Never logged.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct BitbucketClient {
    http: Client,
    api_base: Url,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct SrcPage {
    #[serde(default)]
    values: Vec<SrcEntry>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SrcEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    commit: Option<SrcCommit>,
}

#[derive(Debug, Deserialize)]
struct SrcCommit {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BranchPage {
    #[serde(default)]
    values: Vec<Branch>,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
    target: SrcCommit,
}

impl BranchPage {
    fn head_of(self, branch: &str) -> Option<String> {
        self.values
            .into_iter()
            .find(|b| b.name == branch)
            .map(|b| b.target.hash)
    }
}

impl SrcEntry {
    fn into_tree_entry(self) -> Option<TreeEntry> {
        let id = self.commit.map(|c| c.hash).unwrap_or_default();
        match self.kind.as_str() {
            "commit_file" => Some(TreeEntry::file(self.path, id)),
            "commit_directory" => Some(TreeEntry::directory(self.path, id)),
            _ => None,
        }
    }
}

impl BitbucketClient {
    pub fn new(
        settings: &BitbucketSettings,
        credentials: Credentials,
    ) -> Result<Self, TransportError> {
        let api_base = Url::parse(&settings.api_base)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", settings.api_base)))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|source| TransportError::Request {
                url: settings.api_base.clone(),
                source,
            })?;
        info!(
            api_base = %api_base,
            username = %credentials.username,
            "Initialised Bitbucket client"
        );
        Ok(Self {
            http,
            api_base,
            credentials,
        })
    }

    /// `{api_base}/repositories/{owner}/{slug}/{tail...}`. Segments are percent-encoded;
    /// an empty last segment produces a trailing slash.
    pub fn endpoint(&self, repo: &RepositoryRef, tail: &[&str]) -> Result<Url, TransportError> {
        build_endpoint(&self.api_base, repo, tail)
    }

    /// `refs/branches` filtered to exactly `branch`.
    pub fn branch_endpoint(&self, repo: &RepositoryRef, branch: &str) -> Result<Url, TransportError> {
        branch_endpoint(&self.api_base, repo, branch)
    }

    /// Resolves `branch` to the hash of its head commit.
    pub async fn resolve_branch(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<String, TransportError> {
        let url = self.branch_endpoint(repo, branch)?;
        let target = url.to_string();
        let page: BranchPage = self
            .get(url)
            .await?
            .json()
            .await
            .map_err(|source| TransportError::Request {
                url: target.clone(),
                source,
            })?;
        match page.head_of(branch) {
            Some(hash) => {
                info!(%repo, branch, %hash, "Resolved branch head");
                Ok(hash)
            }
            None => {
                error!(%repo, branch, "Branch not found");
                Err(TransportError::NotFound { url: target })
            }
        }
    }

    async fn get(&self, url: Url) -> Result<Response, TransportError> {
        let target = url.to_string();
        debug!(url = %target, "GET");
        let response = self
            .http
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: target.clone(),
                source,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound { url: target });
        }
        if !status.is_success() {
            error!(status = %status, url = %target, "Bitbucket API returned error");
            return Err(TransportError::Status {
                url: target,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

fn build_endpoint(api_base: &Url, repo: &RepositoryRef, tail: &[&str]) -> Result<Url, TransportError> {
    let mut url = api_base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(api_base.to_string()))?;
        segments
            .pop_if_empty()
            .extend(["repositories", repo.owner.as_str(), repo.slug.as_str()])
            .extend(tail.iter().copied());
    }
    Ok(url)
}

fn branch_endpoint(api_base: &Url, repo: &RepositoryRef, branch: &str) -> Result<Url, TransportError> {
    let mut url = build_endpoint(api_base, repo, &["refs", "branches"])?;
    let escaped = branch.replace('\\', "\\\\").replace('"', "\\\"");
    url.query_pairs_mut()
        .append_pair("q", &format!("name=\"{escaped}\""));
    Ok(url)
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[async_trait]
impl RepositoryTransport for BitbucketClient {
    async fn check_exists(&self, repo: &RepositoryRef) -> Result<(), TransportError> {
        let url = self.endpoint(repo, &[])?;
        self.get(url).await.map(|_| ())
    }

    async fn list_tree(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> Result<Vec<TreeEntry>, TransportError> {
        let mut tail: Vec<&str> = vec!["src", revision];
        tail.extend(path_segments(path));
        tail.push("");
        let mut url = self.endpoint(repo, &tail)?;
        url.query_pairs_mut().append_pair("pagelen", PAGE_LENGTH);

        let mut entries = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            let target = url.to_string();
            let page: SrcPage = self
                .get(url)
                .await?
                .json()
                .await
                .map_err(|source| TransportError::Request {
                    url: target.clone(),
                    source,
                })?;
            entries.extend(page.values.into_iter().filter_map(SrcEntry::into_tree_entry));
            next = match page.next {
                Some(link) => Some(
                    Url::parse(&link).map_err(|e| TransportError::InvalidUrl(format!("{link}: {e}")))?,
                ),
                None => None,
            };
        }
        debug!(%repo, revision, path, entries = entries.len(), "Listed Bitbucket directory");
        Ok(entries)
    }

    async fn get_file(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let mut tail: Vec<&str> = vec!["src", revision];
        tail.extend(path_segments(path));
        let url = self.endpoint(repo, &tail)?;
        let target = url.to_string();
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                url: target,
                source,
            })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepositoryRef {
        RepositoryRef {
            owner: "acme".into(),
            slug: "tenant".into(),
        }
    }

    #[test]
    fn endpoint_appends_repository_and_tail() {
        let base = Url::parse("https://api.bitbucket.org/2.0").unwrap();
        let url = build_endpoint(&base, &repo(), &["src", "abc123", "rules", ""]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.bitbucket.org/2.0/repositories/acme/tenant/src/abc123/rules/"
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slash_and_encodes_segments() {
        let base = Url::parse("https://bitbucket.example.com/api/2.0/").unwrap();
        let url = build_endpoint(&base, &repo(), &["src", "feature/x", "a b.js"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://bitbucket.example.com/api/2.0/repositories/acme/tenant/src/feature%2Fx/a%20b.js"
        );
    }

    #[test]
    fn src_entries_map_to_tree_entries() {
        let page: SrcPage = serde_json::from_str(
            r#"{
                "values": [
                    {"type": "commit_directory", "path": "database-connections/db", "commit": {"hash": "c1"}},
                    {"type": "commit_file", "path": "rules/a.js", "commit": {"hash": "c1"}},
                    {"type": "commit_link", "path": "rules/link"}
                ]
            }"#,
        )
        .unwrap();
        let entries: Vec<TreeEntry> = page
            .values
            .into_iter()
            .filter_map(SrcEntry::into_tree_entry)
            .collect();
        assert_eq!(
            entries,
            vec![
                TreeEntry::directory("database-connections/db", "c1"),
                TreeEntry::file("rules/a.js", "c1"),
            ]
        );
        assert!(page.next.is_none());
    }

    #[test]
    fn branch_endpoint_filters_by_exact_name() {
        let base = Url::parse("https://api.bitbucket.org/2.0").unwrap();
        let url = branch_endpoint(&base, &repo(), "feature/x").unwrap();
        assert_eq!(url.path(), "/2.0/repositories/acme/tenant/refs/branches");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(query, vec![("q".to_string(), "name=\"feature/x\"".to_string())]);
    }

    #[test]
    fn branch_page_yields_head_of_matching_branch_only() {
        let page: BranchPage = serde_json::from_str(
            r#"{
                "values": [
                    {"name": "feature/x-2", "target": {"hash": "bbb"}},
                    {"name": "feature/x", "target": {"hash": "aaa"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(page.head_of("feature/x"), Some("aaa".to_string()));

        let empty: BranchPage = serde_json::from_str(r#"{"values": []}"#).unwrap();
        assert_eq!(empty.head_of("main"), None);
    }

    #[test]
    fn invalid_api_base_is_rejected() {
        let settings = BitbucketSettings {
            api_base: "not a url".into(),
            ..Default::default()
        };
        let result = BitbucketClient::new(
            &settings,
            Credentials {
                username: "u".into(),
                password: "p".into(),
            },
        );
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "deployer".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("deployer"));
        assert!(!rendered.contains("hunter2"));
    }
}
