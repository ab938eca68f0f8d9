//! Entity records and the enums stored alongside them

use crate::error::{ClusteredError, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Encryptor,
    Repository,
    Cluster,
    Node,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Encryptor => "Encryptor",
            EntityKind::Repository => "Repository",
            EntityKind::Cluster => "Cluster",
            EntityKind::Node => "Node",
        };
        f.write_str(name)
    }
}

/// Soft-delete marker, stored as `'Y'` / `'N'`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActiveFlag {
    #[serde(rename = "Y")]
    Active,
    #[serde(rename = "N")]
    Inactive,
}

impl ActiveFlag {
    pub fn as_char(&self) -> char {
        match self {
            ActiveFlag::Active => 'Y',
            ActiveFlag::Inactive => 'N',
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ActiveFlag::Active)
    }
}

impl fmt::Display for ActiveFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl ToSql for ActiveFlag {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(match self {
            ActiveFlag::Active => "Y",
            ActiveFlag::Inactive => "N",
        }))
    }
}

impl FromSql for ActiveFlag {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Y" => Ok(ActiveFlag::Active),
            "N" => Ok(ActiveFlag::Inactive),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Role of a node within its cluster, stored as `'M'` / `'S'`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeType {
    Master,
    Slave,
}

impl NodeType {
    pub fn code(&self) -> &'static str {
        match self {
            NodeType::Master => "M",
            NodeType::Slave => "S",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Master => write!(f, "MASTER"),
            NodeType::Slave => write!(f, "SLAVE"),
        }
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "M" | "MASTER" => Ok(NodeType::Master),
            "S" | "SLAVE" => Ok(NodeType::Slave),
            other => Err(format!("unknown node type '{}' (expected master or slave)", other)),
        }
    }
}

impl ToSql for NodeType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for NodeType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "M" => Ok(NodeType::Master),
            "S" => Ok(NodeType::Slave),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Provisioning state recorded for repositories, clusters and nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceState {
    Available,
    Running,
    Stopped,
    Terminated,
}

impl ResourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Available => "AVAILABLE",
            ResourceState::Running => "RUNNING",
            ResourceState::Stopped => "STOPPED",
            ResourceState::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVAILABLE" => Ok(ResourceState::Available),
            "RUNNING" => Ok(ResourceState::Running),
            "STOPPED" => Ok(ResourceState::Stopped),
            "TERMINATED" => Ok(ResourceState::Terminated),
            other => Err(format!("unknown state '{}'", other)),
        }
    }
}

impl ToSql for ResourceState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ResourceState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// Minimal projection returned by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub name: String,
    pub active: ActiveFlag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptorRecord {
    pub id: i64,
    pub name: String,
    pub active: ActiveFlag,
}

/// Repository row; credentials stay encrypted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRecord {
    pub id: i64,
    pub name: String,
    pub encryptor: String,
    pub description: Option<String>,
    pub region: Option<String>,
    pub vpc_id: Option<String>,
    pub subnets: Vec<String>,
    pub state: ResourceState,
    pub active: ActiveFlag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterRecord {
    pub id: i64,
    pub name: String,
    pub repository: String,
    pub description: Option<String>,
    pub security_group_id: Option<String>,
    pub whitelisted_ips: Vec<String>,
    pub state: ResourceState,
    pub active: ActiveFlag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: i64,
    pub name: String,
    pub cluster: String,
    pub repository: String,
    pub node_type: NodeType,
    pub description: Option<String>,
    pub instance_type: Option<String>,
    pub instance_id: Option<String>,
    pub key_pair_name: Option<String>,
    pub block_device_mapping: Option<serde_json::Value>,
    pub state: ResourceState,
    pub active: ActiveFlag,
}

/// Input for `Repositories::add`; credentials are plaintext here and encrypted on write
#[derive(Debug, Clone, Default)]
pub struct NewRepository {
    pub name: String,
    pub encryptor: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
    pub description: Option<String>,
}

/// Decrypted repository credentials for the provisioning layer
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &"***")
            .field("secret_key", &"***")
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusterSpec {
    pub name: String,
    pub repository: String,
    pub description: Option<String>,
    pub security_group_id: Option<String>,
    pub whitelisted_ips: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub node_type: NodeType,
    pub cluster: ClusterRef,
    pub description: Option<String>,
    pub instance_type: Option<String>,
    pub key_pair_name: Option<String>,
    pub block_device_mapping: Option<serde_json::Value>,
}

/// A cluster addressed by its name and its repository's name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRef {
    pub cluster: String,
    pub repository: String,
}

impl ClusterRef {
    pub fn new(cluster: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            repository: repository.into(),
        }
    }
}

/// Names are matched case-insensitively by storing them upper-cased
pub fn normalize_name(kind: EntityKind, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ClusteredError::InvalidName { kind });
    }
    Ok(trimmed.to_uppercase())
}
