//! Shared plumbing for draftkeep crates: configuration, errors and tracing setup.

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{AutosaveConfig, Config, FileStore, Loader, Saver};
pub use error::{ConfigError, DraftkeepError, SerDeError};
