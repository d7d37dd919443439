use crate::nuve::{Credentials, DeprovisionError, DEFAULT_BASE_URL};
use crate::workflow::{DeprovisionRequest, DEFAULT_POLL_INTERVAL};
use config::{Config, Environment};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
/// Upper bound for timeout and poll interval inputs: one week.
pub const MAX_WAIT_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Values as they arrive from the environment or the command line, before validation.
///
/// GitHub Actions exposes step inputs as `INPUT_<NAME>` with the name upper-cased,
/// so `instanceName` arrives as `INPUT_INSTANCENAME` and is read back lower-cased.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawSettings {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "instancename")]
    pub instance_name: Option<String>,
    pub timeout: Option<String>,
    pub base_url: Option<String>,
    pub poll_interval_seconds: Option<String>,
}

/// Validated settings for one deprovision run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Credentials,
    pub instance_name: String,
    pub timeout: Duration,
    pub base_url: String,
    pub poll_interval: Duration,
}

impl Settings {
    /// Load settings with precedence:
    /// 1. Defaults
    /// 2. Action inputs (`INPUT_*`) and `NUVE_*` environment variables
    /// 3. Command line overrides
    pub fn load(overrides: RawSettings) -> Result<Self, DeprovisionError> {
        Self::load_from(None, overrides)
    }

    /// Same as [`Settings::load`] but reading from `env` instead of the process environment.
    pub fn load_from(
        env: Option<config::Map<String, String>>,
        overrides: RawSettings,
    ) -> Result<Self, DeprovisionError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("INPUT").source(env.clone()))
            .add_source(Environment::with_prefix("NUVE").source(env))
            .set_override_option("email", overrides.email)
            .and_then(|b| b.set_override_option("password", overrides.password))
            .and_then(|b| b.set_override_option("instancename", overrides.instance_name))
            .and_then(|b| b.set_override_option("timeout", overrides.timeout))
            .and_then(|b| b.set_override_option("base_url", overrides.base_url))
            .and_then(|b| {
                b.set_override_option("poll_interval_seconds", overrides.poll_interval_seconds)
            })
            .and_then(|b| b.build())
            .map_err(|e| DeprovisionError::Config(e.to_string()))?;

        let raw: RawSettings = config
            .try_deserialize()
            .map_err(|e| DeprovisionError::Config(e.to_string()))?;

        Self::validate(raw)
    }

    pub fn validate(raw: RawSettings) -> Result<Self, DeprovisionError> {
        let email = required(raw.email, "email")?;
        let password = required(raw.password, "password")?;
        let instance_name = required(raw.instance_name, "instanceName")?;

        let timeout = match non_empty(raw.timeout) {
            Some(value) => parse_seconds(&value, "timeout")?,
            None => DEFAULT_TIMEOUT,
        };

        let poll_interval = match non_empty(raw.poll_interval_seconds) {
            Some(value) => {
                let interval = parse_seconds(&value, "poll interval")?;
                if interval.is_zero() {
                    return Err(DeprovisionError::Config(
                        "Poll interval must be at least one second".to_string(),
                    ));
                }
                interval
            }
            None => DEFAULT_POLL_INTERVAL,
        };

        let base_url = non_empty(raw.base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            credentials: Credentials::new(email, password),
            instance_name,
            timeout,
            base_url,
            poll_interval,
        })
    }

    pub fn request(&self) -> DeprovisionRequest {
        DeprovisionRequest {
            credentials: self.credentials.clone(),
            instance_name: self.instance_name.clone(),
            timeout: self.timeout,
        }
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> anyhow::Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::debug!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &str) -> Result<String, DeprovisionError> {
    non_empty(value).ok_or_else(|| DeprovisionError::Config(format!("Input required and not supplied: {name}")))
}

fn parse_seconds(value: &str, name: &str) -> Result<Duration, DeprovisionError> {
    let seconds = value
        .parse::<u64>()
        .map_err(|_| DeprovisionError::Config(format!("Invalid {name} input value: '{value}'")))?;
    if seconds > MAX_WAIT_SECONDS {
        return Err(DeprovisionError::Config(format!(
            "Invalid {name} input value: '{value}' exceeds {MAX_WAIT_SECONDS} seconds"
        )));
    }
    Ok(Duration::from_secs(seconds))
}
