//! One-shot export of every experiment id known to mlsolid into Garage.
//!
//! Unlike the gateway, a failed upload is fatal here: storing the export is
//! the whole job.
use std::{process::ExitCode, time::Duration};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use gateway::{
    config::StorageConfig,
    init_logging,
    pipeline::{Persistence, export_experiments},
    remote::RemoteClient,
    storage::GarageStore,
};
use tracing::error;

const DEFAULT_ADDR: &str = "mlsolid-service:50051";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// mlsolid gRPC address
    #[arg(long, env = "MLSOLID_SERVICE_ADDR", default_value = DEFAULT_ADDR)]
    addr: String,

    /// Overall budget for connecting and calling mlsolid
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

async fn run(args: Args) -> Result<()> {
    let budget = Duration::from_secs(args.timeout_secs.max(1));

    let storage_config = StorageConfig::load().context("Failed to load storage configuration")?;
    let store = GarageStore::initialize(&storage_config)
        .await
        .context("Failed to initialize Garage storage")?;

    let mut remote = RemoteClient::connect(&args.addr, budget)
        .await
        .context("Failed to connect to gRPC service")?;

    let exported = export_experiments(&mut remote, Some(&store), budget, Utc::now())
        .await
        .context("Error calling gRPC Experiments")?;

    let summary = outcome(exported.persistence, exported.data.count)?;
    println!("{summary}");

    Ok(())
}

fn outcome(persistence: Persistence, count: usize) -> Result<String> {
    match persistence {
        Persistence::Stored { key } => Ok(format!(
            "Pipeline successful: Saved {count} IDs to Garage at {key}"
        )),
        Persistence::Degraded { key, reason } => {
            bail!("Failed to upload {key} to Garage: {reason}")
        }
        Persistence::Disabled => bail!("Garage storage is not configured"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{e:#}");

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_succeeds() {
        let summary = outcome(
            Persistence::Stored {
                key: "exports/experiments_1741529107.json".to_string(),
            },
            3,
        )
        .unwrap();

        assert_eq!(
            summary,
            "Pipeline successful: Saved 3 IDs to Garage at exports/experiments_1741529107.json"
        );
    }

    #[test]
    fn test_degraded_fails() {
        let err = outcome(
            Persistence::Degraded {
                key: "exports/experiments_0.json".to_string(),
                reason: "InvalidAccessKeyId".to_string(),
            },
            3,
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("exports/experiments_0.json"));
        assert!(message.contains("InvalidAccessKeyId"));
    }

    #[test]
    fn test_disabled_fails() {
        assert!(outcome(Persistence::Disabled, 0).is_err());
    }
}
