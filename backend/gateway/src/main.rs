use std::process::ExitCode;

use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = gateway::start_server().await {
        error!("{e}");

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
