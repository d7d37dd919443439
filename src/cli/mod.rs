use crate::config::{RawSettings, Settings};
use crate::nuve::{DeprovisionError, NuveClient};
use crate::redact::SecretRegistry;
use crate::telemetry::LogFormat;
use crate::workflow::{DeprovisionOutcome, Deprovisioner};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug, Default)]
#[command(name = "nuve-deprovision")]
#[command(about = "Delete a Nuve platform instance and wait until it has shut down")]
#[command(long_about = "Logs in to the Nuve platform, deletes the named instance and polls the \
                       organization's instance list until it is gone or the timeout elapses. \
                       Inputs are read from the GitHub Actions environment (INPUT_EMAIL, \
                       INPUT_PASSWORD, INPUT_INSTANCENAME, INPUT_TIMEOUT); flags override them.")]
pub struct Cli {
    /// Account email used to log in
    #[arg(long)]
    pub email: Option<String>,
    /// Account password
    #[arg(long)]
    pub password: Option<String>,
    /// Display name of the instance to delete
    #[arg(long)]
    pub instance_name: Option<String>,
    /// Seconds to wait for the instance to disappear (default: 600)
    #[arg(long)]
    pub timeout: Option<String>,
    /// Nuve API base URL (default: https://app.nuveplatform.com/api)
    #[arg(long)]
    pub base_url: Option<String>,
    /// Seconds between instance list polls (default: 60)
    #[arg(long)]
    pub poll_interval: Option<String>,
    /// Log output format; defaults to workflow commands under GitHub Actions
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    pub fn overrides(&self) -> RawSettings {
        RawSettings {
            email: self.email.clone(),
            password: self.password.clone(),
            instance_name: self.instance_name.clone(),
            timeout: self.timeout.clone(),
            base_url: self.base_url.clone(),
            poll_interval_seconds: self.poll_interval.clone(),
        }
    }
}

/// Resolve settings, then run the deprovision workflow against the live platform.
pub async fn execute(
    cli: &Cli,
    secrets: &SecretRegistry,
) -> Result<DeprovisionOutcome, DeprovisionError> {
    let settings = Settings::load(cli.overrides())?;
    secrets.register(&settings.credentials.password);

    let client = NuveClient::new(&settings.base_url, secrets.clone())?;
    info!(
        base_url = client.base_url(),
        instance.name = %settings.instance_name,
        timeout_seconds = settings.timeout.as_secs(),
        "Deprovisioning instance"
    );

    Deprovisioner::new(&client)
        .with_poll_interval(settings.poll_interval)
        .run(&settings.request())
        .await
}
