//! Fluxgate Common Library
//!
//! Shared configuration, error taxonomy, and the InfluxDB v2 client wrapper
//! for the Fluxgate read-only query gateway.

pub mod config;
pub mod error;
pub mod influx;
pub mod types;

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod error_test;

pub use config::Config;
pub use error::{Error, Result};
pub use types::{Bucket, ConnectionState, ConnectionStatus, FluxRow, ServerInfo};
