pub mod client;

pub use client::{ApiClient, ApiRequest, ApiResponse};
