#![doc = "bitbucket-deploy-core: mirrors a tenant configuration tree from Bitbucket into a deployment manifest."]

//! The engine turns a flat set of remote file paths into typed, paired and fully
//! downloaded asset records:
//!
//! [`tree`] → [`classify`] → [`assemble`] (via [`download`]) → [`unify`] → [`manifest`],
//! orchestrated by [`synchronise::synchronise`].
//!
//! The source-control host is reached only through [`contract::RepositoryTransport`];
//! [`bitbucket::BitbucketClient`] is the production implementation.

pub mod assemble;
pub mod bitbucket;
pub mod classify;
pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod manifest;
pub mod synchronise;
pub mod tree;
pub mod unify;

pub use classify::AssetType;
pub use error::SyncError;
pub use manifest::{AssetRecord, DeploymentManifest};
pub use synchronise::synchronise;
