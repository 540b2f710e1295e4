use std::path::PathBuf;

use thiserror::Error;

/// Recipient store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store not found at {0}")]
    NotFound(PathBuf),

    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("store is missing the required `email` column")]
    MissingEmailColumn,

    #[error("malformed row {row}: {reason}")]
    Malformed { row: usize, reason: String },

    #[error("duplicate email {email:?} on rows {first} and {second}")]
    DuplicateEmail {
        email: String,
        first: usize,
        second: usize,
    },

    #[error("{0}")]
    Other(String),
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Template source failures.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot read templates {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse templates: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no {0} templates configured")]
    Empty(&'static str),
}

/// Delivery client authentication failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials at {0}")]
    MissingCredentials(PathBuf),

    #[error("invalid credentials: {0}")]
    Invalid(String),

    #[error("provider rejected authentication: {0}")]
    Provider(String),
}
