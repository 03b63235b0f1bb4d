//! Shared HTTP client for the provider adapters.

mod client;

pub use client::{HttpClient, HttpClientBuilder};
