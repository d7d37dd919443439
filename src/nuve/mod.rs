pub mod client;
pub mod errors;
pub mod types;

pub use client::{NuveClient, NuvePlatform, DEFAULT_BASE_URL};
pub use errors::DeprovisionError;
pub use types::{Account, Credentials, Instance, Session};
