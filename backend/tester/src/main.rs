use std::{env, process::ExitCode, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use gateway::{
    config::{DEFAULT_BUCKET, StorageConfig},
    init_logging,
    storage::{GarageStore, ObjectStore},
};
use tracing::{error, info};

const TEST_PAYLOAD: &str = "Hello from GoML! This is a connectivity check for the GoML project.";

/// Uploads a small object to Garage to verify credentials and bucket access.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "http://localhost:3900")]
    endpoint: String,

    #[arg(long, default_value = DEFAULT_BUCKET)]
    bucket: String,

    #[arg(long, default_value = "test-go-ml.txt")]
    key: String,
}

fn credential(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => bail!("{name} environment variable is not set"),
    }
}

async fn run(args: Args) -> Result<()> {
    let config = StorageConfig {
        access_key: credential("SA_ACCESS_KEY")?,
        secret_key: credential("SA_SECRET_KEY")?,
        bucket: args.bucket,
        endpoint: args.endpoint,
        upload_timeout: Duration::from_secs(30),
    };

    let store = GarageStore::initialize(&config)
        .await
        .context("Failed to load configuration")?;

    info!("Attempting to upload to Garage at {}...", config.endpoint);

    store
        .put(&args.key, TEST_PAYLOAD.as_bytes().to_vec())
        .await
        .context("Upload failed")?;

    println!(
        "Success! File '{}' is now stored in bucket '{}'.",
        args.key,
        store.bucket()
    );

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    if let Err(e) = run(Args::parse()).await {
        error!("{e:#}");

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
