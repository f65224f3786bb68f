use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://api.bitbucket.org/2.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Static (non-secret) settings for one sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub bitbucket: BitbucketSettings,
    #[serde(default)]
    pub layout: Layout,
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            api_base = %self.bitbucket.api_base,
            timeout_secs = self.bitbucket.timeout_secs,
            base_dir = %self.layout.base_dir,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitbucketSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BitbucketSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Where the tenant tree lives inside the repository.
///
/// `base_dir` is a prefix under which the asset directories (`rules`,
/// `database-connections`, ...) are found. Empty means the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub base_dir: String,
}

impl Layout {
    pub fn new(base_dir: impl Into<String>) -> Self {
        let base_dir: String = base_dir.into();
        Self {
            base_dir: base_dir.trim_matches('/').to_string(),
        }
    }

    /// Repository-relative path of an asset directory.
    pub fn directory(&self, dir: &str) -> String {
        let base = self.base_dir.trim_matches('/');
        if base.is_empty() {
            dir.to_string()
        } else {
            format!("{base}/{dir}")
        }
    }

    /// Strips the base prefix from a repository-relative path.
    /// Returns `None` when the path lies outside the base directory.
    pub fn relative<'a>(&self, path: &'a str) -> Option<&'a str> {
        let path = path.trim_start_matches('/');
        let base = self.base_dir.trim_matches('/');
        if base.is_empty() {
            return Some(path);
        }
        path.strip_prefix(base)?.strip_prefix('/')
    }
}
