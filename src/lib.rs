//! Deletes a Nuve platform instance from CI and waits for it to shut down.

pub mod cli;
pub mod config;
pub mod http;
pub mod nuve;
pub mod redact;
pub mod telemetry;
pub mod workflow;

pub use nuve::{DeprovisionError, NuveClient, NuvePlatform};
pub use workflow::{DeprovisionOutcome, DeprovisionRequest, Deprovisioner};
