//! Stayra Library
//!
//! Hotel metasearch: partner offer aggregation, city search and click
//! attribution behind an axum HTTP API.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod offers;
pub mod storage;
pub mod types;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
