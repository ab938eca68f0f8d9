use crate::attribute::ConfigAttribute;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where a configuration file path came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Passed explicitly by the caller (CLI option)
    Explicit,
    /// Declared through a `CLUSTERED__{ATTRIBUTE}_FILE` variable
    Environment(String),
    /// Default file found in the fallback directory
    Fallback,
    /// Persisted copy inside the workspace
    Workspace,
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::Explicit => write!(f, "Provided"),
            SourceOrigin::Environment(var) => write!(f, "Declared ({})", var),
            SourceOrigin::Fallback => write!(f, "Default"),
            SourceOrigin::Workspace => write!(f, "Workspace"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{origin} configuration file '{}' is not available", path.display())]
    FileNotFound { path: PathBuf, origin: SourceOrigin },

    #[error(
        "No configuration source available for {attribute}. Possible options to provide one are:\n\
        1. pass the configuration file option while executing the command,\n\
        2. declare {} in the environment,\n\
        3. provide '{}' relative to the execution directory.",
        attribute.env_file_var(),
        fallback.display()
    )]
    NoSourceAvailable {
        attribute: ConfigAttribute,
        fallback: PathBuf,
    },

    #[error(
        "Mandatory key `{path}` not available. Provide it in the configuration file or declare CLUSTERED__<KEY> in the environment."
    )]
    MandatoryKeyMissing { path: String },

    #[error("Configuration file '{}' could not be parsed: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Configuration file '{}' must contain a JSON object at the top level", .0.display())]
    NotAnObject(PathBuf),

    #[error("Database type '{0}' is not supported as the clustered metadata store")]
    UnsupportedDatabase(String),

    #[error("Configuration key 'DB_FILE' is not available for sqlite type database")]
    MissingDbFile,

    #[error("Unexpected system error: {0}")]
    UnexpectedSystem(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Programming-invariant violations, as opposed to operator input errors
    pub fn is_unexpected(&self) -> bool {
        matches!(self, ConfigError::UnexpectedSystem(_))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
