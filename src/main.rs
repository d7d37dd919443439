use clap::Parser;
use nuve_deprovision::cli::{self, Cli};
use nuve_deprovision::config::Settings;
use nuve_deprovision::redact::SecretRegistry;
use nuve_deprovision::telemetry::{self, LogFormat};
use std::process::ExitCode;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = Settings::load_env_file() {
        eprintln!("Failed to load .env file: {e}");
    }

    let format = cli.log_format.unwrap_or_else(LogFormat::detect);
    let secrets = SecretRegistry::new().with_workflow_masking(format == LogFormat::Workflow);
    if let Err(e) = telemetry::init_telemetry(format, secrets.clone()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli::execute(&cli, &secrets).await {
        Ok(outcome) => {
            debug!(
                instance.id = outcome.instance_id,
                polls = outcome.polls,
                waited_seconds = outcome.waited.as_secs(),
                "Deprovision finished"
            );
            println!("Instance shutdown success.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e.report_message());
            ExitCode::FAILURE
        }
    }
}
