//! Configuration engine for Clustered
//!
//! Resolves the configuration documents the application captures into its
//! workspace and checks them against declarative key specifications.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │  ConfigCache │───▶│   resolver   │───▶│    schema    │
//! │ (per attr.)  │    │ locate/load  │    │   validate   │
//! └──────────────┘    └──────┬───────┘    └──────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐
//!                     │ ConfigDocument│──▶ EnvironConfig / *Defaults
//!                     └──────────────┘
//! ```

pub mod attribute;
pub mod cache;
pub mod document;
pub mod error;
pub mod resolver;
pub mod schema;

pub use attribute::{ConfigAttribute, ENV_PREFIX};
pub use cache::ConfigCache;
pub use document::{
    ClusterDefaults, ConfigDocument, DatabaseConfig, DatabaseTarget, EnvironConfig, NodeDefaults,
    RepositoryDefaults,
};
pub use error::*;
pub use resolver::{SourceRequest, load, locate, resolve};
pub use schema::{ElementSpec, KeySpec, Validation, validate};
