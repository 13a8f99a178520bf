//! HTTP client module
//!
//! Provides the fetcher used to read the catalog source.
//!
//! # Features
//!
//! - **Request Spacing**: one request per configured delay, via governor
//! - **Identifying Headers**: User-Agent and default headers on every call
//! - **Error Classification**: status, transport and decoding failures all
//!   surface as fetch errors carrying the endpoint

mod client;
mod fetcher;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub(crate) use client::json_type_name;
pub use fetcher::Fetcher;
pub use rate_limit::RateLimiter;
