//! Shared utilities: error types and configuration

pub mod config;
pub mod error;

pub use config::BrowserConfig;
pub use error::{CelxError, Result};
