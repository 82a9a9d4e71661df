mod cli;

use std::io;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match cli::run() {
        cli::RunOutcome::Serve(config) => match larder::serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!("server error: {err}");
                ExitCode::FAILURE
            }
        },
        cli::RunOutcome::RunAlerts { notify, inventory } => {
            match larder::run_alerts_once(&notify, inventory.as_deref()).await {
                Ok(summary) => match serde_json::to_string_pretty(&summary) {
                    Ok(json) => {
                        println!("{json}");
                        ExitCode::SUCCESS
                    }
                    Err(err) => {
                        error!("failed to encode run summary: {err}");
                        ExitCode::FAILURE
                    }
                },
                Err(err) => {
                    error!("alert run failed: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        cli::RunOutcome::TestMail { notify, to } => {
            match larder::send_test_mail(&notify, &to).await {
                Ok(()) => {
                    info!(to = %to, "test mail sent");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!("test mail failed: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        cli::RunOutcome::Exit(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    }
}
