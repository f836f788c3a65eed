//! Candidate backend services over HTTP.

mod client;
mod config;
mod wire;

pub use client::HttpApiClient;
pub use config::ApiConfig;
