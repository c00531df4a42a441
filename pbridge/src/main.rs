use std::process::ExitCode;

use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pbridge::protocol::CommandOutcome;
use pchat::ChatSession;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = match pbridge::config_from_env() {
        Ok(config) => config,
        Err(err) => return startup_failure(err.to_string()).await,
    };
    info!(provider = %config.provider, model = %config.model, "starting bridge");

    let mut session = match ChatSession::new(config) {
        Ok(session) => session,
        Err(err) => return startup_failure(err.to_string()).await,
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    match pbridge::run(&mut session, stdin, stdout).await {
        Ok(()) => {
            info!("input closed, shutting down");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "bridge I/O failure");
            ExitCode::FAILURE
        }
    }
}

// Stdout carries the protocol, so even startup failures are reported
// there as a well-formed line before exiting.
async fn startup_failure(message: String) -> ExitCode {
    use tokio::io::AsyncWriteExt;

    error!(%message, "cannot start session");
    let outcome = CommandOutcome::failure(message);
    if let Ok(mut line) = serde_json::to_vec(&outcome) {
        line.push(b'\n');
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(&line).await;
        let _ = stdout.flush().await;
    }
    ExitCode::FAILURE
}

fn init_tracing() {
    // Stderr only: stdout is reserved for protocol lines.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pbridge=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}
