//! Clustered core
//!
//! Workspace lifecycle and the entity metadata store for encryptors,
//! repositories, clusters and nodes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  clustered CLI                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 clustered-core                  │
//! │  ┌──────────────────┐   ┌────────────────────┐  │
//! │  │   Application    │──▶│     Workspace      │  │
//! │  │ initiate/refresh │   │  ~/.clustered/*.json│  │
//! │  │     /destroy     │   └────────────────────┘  │
//! │  └────────┬─────────┘                           │
//! │           │ open_store                          │
//! │  ┌────────▼─────────────────────────────────┐   │
//! │  │ MetaStore (SQLite)                        │   │
//! │  │  Encryptors  Repositories  Clusters  Nodes│   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               clustered-config                  │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod application;
pub mod crypto;
pub mod error;
pub mod model;
pub mod store;
pub mod workspace;

// Re-exports
pub use application::{Application, ConfigSources};
pub use error::{ClusteredError, ErrorCategory, Result};
pub use model::{
    ActiveFlag, ClusterRecord, ClusterRef, ClusterSpec, Credentials, EncryptorRecord, EntityKind,
    Listing, NewRepository, NodeRecord, NodeSpec, NodeType, RepositoryRecord, ResourceState,
};
pub use store::{Clusters, Encryptors, MetaStore, Nodes, Repositories};
pub use workspace::Workspace;
