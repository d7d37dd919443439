use crate::redact::{RedactingMakeWriter, SecretRegistry};
use anyhow::Result;
use clap::ValueEnum;
use std::fmt::{self, Write as _};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How log events are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// GitHub Actions workflow commands (`::debug::`, `::error::`, ...)
    Workflow,
    /// Human readable lines
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    pub fn detect() -> Self {
        if running_in_github_actions() {
            LogFormat::Workflow
        } else {
            LogFormat::Text
        }
    }
}

pub fn running_in_github_actions() -> bool {
    std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true")
}

/// `RUST_LOG` wins; otherwise step debug logging (`RUNNER_DEBUG=1`) turns on
/// this crate's request tracing.
fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if std::env::var("RUNNER_DEBUG").is_ok_and(|v| v == "1") {
            EnvFilter::new("info,nuve_deprovision=debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

/// Install the global subscriber. All output passes through a writer that
/// scrubs every secret in `secrets`.
pub fn init_telemetry(format: LogFormat, secrets: SecretRegistry) -> Result<()> {
    let writer = RedactingMakeWriter::new(std::io::stdout, secrets);
    let registry = tracing_subscriber::registry().with(default_filter());

    match format {
        LogFormat::Workflow => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(WorkflowCommandFormat)
                    .with_writer(writer),
            )
            .try_init()?,
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(writer),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(writer),
            )
            .try_init()?,
    }

    tracing::debug!(?format, "Telemetry initialized");
    Ok(())
}

/// Renders events as GitHub Actions workflow commands. Info events are
/// plain lines; the runner shows debug lines only when step debugging is on.
pub struct WorkflowCommandFormat;

impl WorkflowCommandFormat {
    fn command(level: &Level) -> &'static str {
        match *level {
            Level::ERROR => "::error::",
            Level::WARN => "::warning::",
            Level::INFO => "",
            _ => "::debug::",
        }
    }
}

/// Percent-encode the characters the runner treats as command delimiters.
pub fn escape_command_data(data: &str) -> String {
    data.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

impl<S, N> FormatEvent<S, N> for WorkflowCommandFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = String::new();
        ctx.field_format()
            .format_fields(format::Writer::new(&mut message), event)?;

        let command = Self::command(event.metadata().level());
        if command.is_empty() {
            writeln!(writer, "{message}")
        } else {
            writeln!(writer, "{command}{}", escape_command_data(&message))
        }
    }
}
