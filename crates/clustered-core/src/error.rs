//! Error types for workspace and entity operations

use crate::model::EntityKind;
use clustered_config::{ConfigAttribute, ConfigError};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by callers to decide how to report a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Operator-supplied configuration or workspace state is wrong
    Configuration,
    /// An entity is missing, inactive or duplicated
    Entity,
    /// The operation is not valid in the current entity or cluster state
    StateGuard,
    /// The metadata store rejected or failed the operation
    Storage,
    /// Internal invariant violation; never a user input problem
    UnexpectedSystem,
}

#[derive(Error, Debug)]
pub enum ClusteredError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Application is already initiated (workspace '{}' exists)", .0.display())]
    AlreadyInitiated(PathBuf),

    #[error("Application is not initiated yet (workspace '{}' missing); run `clustered init` first", .0.display())]
    NotInitiated(PathBuf),

    #[error("Workspace '{}' could not be built: {source}", path.display())]
    WorkspaceBuild {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{attribute} could not be persisted to '{}': {source}", path.display())]
    ConfigPersist {
        attribute: ConfigAttribute,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Persisted {attribute} is missing from the workspace")]
    PersistedConfigMissing { attribute: ConfigAttribute },

    #[error("Metadata store '{}' does not exist", .0.display())]
    StoreMissing(PathBuf),

    #[error("Destroy is not supported for database type '{0}'")]
    UnsupportedDestroy(String),

    #[error("Home directory could not be determined")]
    HomeDirNotFound,

    #[error("{kind}<'{name}'> is not present")]
    NotPresent { kind: EntityKind, name: String },

    #[error("{kind}<'{name}'> is not in ACTIVE state")]
    NotActive { kind: EntityKind, name: String },

    #[error("{kind}<'{name}'> already exists")]
    AlreadyExists { kind: EntityKind, name: String },

    #[error("{kind} name must not be empty")]
    InvalidName { kind: EntityKind },

    #[error("One master node already exists in Cluster<'{cluster}'>")]
    MasterNodeAlreadyExists { cluster: String },

    #[error("No active master node present in Cluster<'{cluster}'>")]
    MasterNodeNotPresent { cluster: String },

    #[error("{kind}<'{name}'> is already in ACTIVE_FLAG = '{flag}' state")]
    WrongActionInvocation {
        kind: EntityKind,
        name: String,
        flag: char,
    },

    #[error("Cluster<'{cluster}'> is in {state} state; nodes can only be added or recovered while AVAILABLE")]
    ClusterStateConflict { cluster: String, state: String },

    #[error("Master node can not be deleted while active slave nodes exist in Cluster<'{cluster}'>")]
    ActiveSlavesPresent { cluster: String },

    #[error("Credential encryption failed: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClusteredError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClusteredError::Config(e) if e.is_unexpected() => ErrorCategory::UnexpectedSystem,
            ClusteredError::Config(_)
            | ClusteredError::AlreadyInitiated(_)
            | ClusteredError::NotInitiated(_)
            | ClusteredError::WorkspaceBuild { .. }
            | ClusteredError::ConfigPersist { .. }
            | ClusteredError::PersistedConfigMissing { .. }
            | ClusteredError::UnsupportedDestroy(_)
            | ClusteredError::HomeDirNotFound => ErrorCategory::Configuration,
            ClusteredError::NotPresent { .. }
            | ClusteredError::NotActive { .. }
            | ClusteredError::AlreadyExists { .. }
            | ClusteredError::InvalidName { .. }
            | ClusteredError::MasterNodeAlreadyExists { .. }
            | ClusteredError::MasterNodeNotPresent { .. } => ErrorCategory::Entity,
            ClusteredError::WrongActionInvocation { .. }
            | ClusteredError::ClusterStateConflict { .. }
            | ClusteredError::ActiveSlavesPresent { .. } => ErrorCategory::StateGuard,
            ClusteredError::StoreMissing(_)
            | ClusteredError::Crypto(_)
            | ClusteredError::Storage(_)
            | ClusteredError::Io(_)
            | ClusteredError::Json(_) => ErrorCategory::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusteredError>;
