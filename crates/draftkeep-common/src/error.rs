//! Error types shared by draftkeep binaries and services.

use miette::Diagnostic;

/// Main error type for draftkeep configuration and tooling.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum DraftkeepError {
    /// Configuration could not be read, parsed or written
    #[error(transparent)]
    #[diagnostic_source]
    Config(#[from] ConfigError),

    /// IO error
    #[error(transparent)]
    #[diagnostic(code(draftkeep::io))]
    Io(#[from] n0_future::io::Error),

    /// Serialization/deserialization error
    #[error(transparent)]
    #[diagnostic_source]
    Serde(#[from] SerDeError),

    /// Error bubbled up from the draft engine
    #[error("draft engine error: {0}")]
    #[diagnostic(code(draftkeep::engine))]
    Engine(String),
}

/// Configuration errors
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("unsupported config file format: {0}")]
    #[diagnostic(
        code(draftkeep::config::format),
        help("use a .json or .toml file")
    )]
    UnsupportedFormat(String),

    #[error("invalid autosave configuration: {0}")]
    #[diagnostic(code(draftkeep::config::invalid))]
    Invalid(String),

    #[error("could not determine a config directory for this platform")]
    #[diagnostic(
        code(draftkeep::config::no_dir),
        help("pass an explicit --config path")
    )]
    NoConfigDir,

    #[error(transparent)]
    #[diagnostic(code(draftkeep::config::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic_source]
    Serde(#[from] SerDeError),
}

/// Serialization/deserialization errors
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum SerDeError {
    #[error(transparent)]
    #[diagnostic(code(draftkeep::serde::json))]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(draftkeep::serde::toml_de))]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    #[diagnostic(code(draftkeep::serde::toml_ser))]
    TomlSer(#[from] toml::ser::Error),
}

impl From<serde_json::Error> for DraftkeepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(SerDeError::Json(err))
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(SerDeError::Json(err))
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serde(SerDeError::TomlDe(err))
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serde(SerDeError::TomlSer(err))
    }
}
