//! CLI glue for bitbucket-deploy: argument parsing, config loading and manifest output.
//!
//! All sync logic lives in `bitbucket-deploy-core`; this module only wires the
//! Bitbucket client to [`synchronise`] and writes the resulting manifest.
use crate::load_config::load_config;
use anyhow::{Context, Result};
use bitbucket_deploy_core::bitbucket::BitbucketClient;
use bitbucket_deploy_core::contract::RepositoryRef;
use bitbucket_deploy_core::synchronise;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for bitbucket-deploy: mirror a tenant configuration repository into a deployment manifest.
#[derive(Parser)]
#[clap(
    name = "bitbucket-deploy",
    version,
    about = "Mirror a tenant configuration tree on Bitbucket into a deployment manifest"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch every asset at one revision and write the manifest as JSON
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Repository as `owner/slug` or `https://bitbucket.org/owner/slug` (overrides config)
        #[clap(long)]
        repository: Option<String>,
        /// Branch name (overrides config)
        #[clap(long)]
        branch: Option<String>,
        /// Commit hash to read the tree at; defaults to the resolved head of the branch
        #[clap(long)]
        revision: Option<String>,
        /// Write the manifest here instead of stdout
        #[clap(long)]
        output: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            repository,
            branch,
            revision,
            output,
        } => {
            let config = load_config(config)?;
            let repository = repository.unwrap_or(config.repository);
            let branch = branch.unwrap_or(config.branch);
            let repo = RepositoryRef::parse(&repository)?;

            let client = BitbucketClient::new(&config.sync.bitbucket, config.credentials)
                .context("Failed to construct Bitbucket client")?;

            let revision = match revision.or(config.revision) {
                Some(revision) => revision,
                None => client
                    .resolve_branch(&repo, &branch)
                    .await
                    .with_context(|| format!("Failed to resolve head of branch '{branch}'"))?,
            };
            tracing::info!(command = "sync", %repository, %branch, %revision, "Starting synchronisation");

            let manifest = match synchronise(
                &client,
                &config.sync.layout,
                &repository,
                &branch,
                &revision,
            )
            .await
            {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    return Err(anyhow::Error::new(e).context("Synchronisation failed"));
                }
            };

            for (asset_type, records) in manifest.iter() {
                tracing::info!(%asset_type, count = records.len(), "Manifest entries");
            }

            let json = serde_json::to_string_pretty(&manifest)
                .context("Failed to serialise manifest")?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
                    tracing::info!(path = %path.display(), records = manifest.len(), "Manifest written");
                }
                None => println!("{json}"),
            }
            Ok(())
        }
    }
}
