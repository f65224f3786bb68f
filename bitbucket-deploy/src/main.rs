use anyhow::Result;
use bitbucket_deploy::cli::{run, Cli};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // BITBUCKET_USER / BITBUCKET_PASSWORD may come from a .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();
    tracing::info!("bitbucket-deploy starting");

    let cli = Cli::parse();
    tracing::info!("Arguments parsed");
    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("Manifest sync finished"),
        Err(e) => tracing::error!(error = %e, "Manifest sync failed"),
    }
    result
}
