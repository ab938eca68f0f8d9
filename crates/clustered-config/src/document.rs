use crate::attribute::ConfigAttribute;
use crate::error::{ConfigError, Result, SourceOrigin};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A validated configuration document and where it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub attribute: ConfigAttribute,
    pub source: PathBuf,
    pub origin: SourceOrigin,
    pub data: Map<String, Value>,
}

impl ConfigDocument {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Serialized form written to the workspace
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.data)
    }
}

/// Engine and location of the metadata store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub engine: String,
    pub file: Option<PathBuf>,
}

/// Connection target derived from [`DatabaseConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Sqlite { path: PathBuf },
}

impl DatabaseTarget {
    pub fn url(&self) -> String {
        match self {
            DatabaseTarget::Sqlite { path } => format!("sqlite:///{}", path.display()),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DatabaseTarget::Sqlite { path } => path,
        }
    }
}

impl DatabaseConfig {
    /// Only sqlite is supported; it needs `DB_FILE`
    pub fn target(&self) -> Result<DatabaseTarget> {
        if !self.engine.eq_ignore_ascii_case("sqlite") {
            return Err(ConfigError::UnsupportedDatabase(self.engine.clone()));
        }
        let path = self.file.clone().ok_or(ConfigError::MissingDbFile)?;
        Ok(DatabaseTarget::Sqlite { path })
    }
}

/// Typed view of ENVIRON_CONFIG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironConfig {
    pub database: DatabaseConfig,
}

impl TryFrom<&ConfigDocument> for EnvironConfig {
    type Error = ConfigError;

    fn try_from(doc: &ConfigDocument) -> Result<Self> {
        let db = doc
            .get("DB_CONFIG")
            .and_then(Value::as_object)
            .ok_or_else(|| ConfigError::MandatoryKeyMissing {
                path: "DB_CONFIG".into(),
            })?;
        let engine = db
            .get("DB_ENGINE")
            .and_then(scalar_text)
            .ok_or_else(|| ConfigError::MandatoryKeyMissing {
                path: "DB_CONFIG >> DB_ENGINE".into(),
            })?;
        let file = db.get("DB_FILE").and_then(scalar_text).map(PathBuf::from);

        Ok(Self {
            database: DatabaseConfig { engine, file },
        })
    }
}

/// Typed view of REPOSITORY_CONFIG
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryDefaults {
    pub cloud_type: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
}

impl TryFrom<&ConfigDocument> for RepositoryDefaults {
    type Error = ConfigError;

    fn try_from(doc: &ConfigDocument) -> Result<Self> {
        let cloud_type = doc.get("CLOUD_TYPE").and_then(scalar_text).ok_or_else(|| {
            ConfigError::MandatoryKeyMissing {
                path: "CLOUD_TYPE".into(),
            }
        })?;
        Ok(Self {
            cloud_type,
            access_key: text(&doc.data, "ACCESS_KEY"),
            secret_key: text(&doc.data, "SECRET_KEY"),
            region: text(&doc.data, "REGION"),
        })
    }
}

/// Typed view of CLUSTER_CONFIG
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterDefaults {
    pub description: Option<String>,
    pub security_group_id: Option<String>,
    pub whitelisted_ips: Vec<String>,
}

impl From<&ConfigDocument> for ClusterDefaults {
    fn from(doc: &ConfigDocument) -> Self {
        let whitelisted_ips = doc
            .get("WHITELISTED_IPS")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(scalar_text).collect())
            .unwrap_or_default();
        Self {
            description: text(&doc.data, "DESCRIPTION"),
            security_group_id: text(&doc.data, "SECURITY_GROUP_ID"),
            whitelisted_ips,
        }
    }
}

/// Typed view of PARENT_NODE_CONFIG / CHILD_NODE_CONFIG
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDefaults {
    pub description: Option<String>,
    pub instance_type: Option<String>,
    pub key_pair_name: Option<String>,
    pub block_device_mapping: Option<Value>,
}

impl From<&ConfigDocument> for NodeDefaults {
    fn from(doc: &ConfigDocument) -> Self {
        Self {
            description: text(&doc.data, "DESCRIPTION"),
            instance_type: text(&doc.data, "INSTANCE_TYPE"),
            key_pair_name: text(&doc.data, "KEY_PAIR_NAME"),
            block_device_mapping: doc
                .get("BLOCK_DEVICE_MAPPING")
                .filter(|v| !v.is_null())
                .cloned(),
        }
    }
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(scalar_text)
}

/// Render a scalar as text; empty strings count as absent
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(attribute: ConfigAttribute, value: Value) -> ConfigDocument {
        ConfigDocument {
            attribute,
            source: PathBuf::from("test.json"),
            origin: SourceOrigin::Explicit,
            data: value.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_pretty_json_keeps_data() {
        let doc = document(ConfigAttribute::Cluster, json!({"DESCRIPTION": "batch"}));
        let text = doc.to_json_pretty().unwrap();
        let back: Map<String, Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc.data);
    }

    #[test]
    fn test_environ_sqlite_target() {
        let doc = document(
            ConfigAttribute::Environ,
            json!({"DB_CONFIG": {"DB_ENGINE": "sqlite", "DB_FILE": "/tmp/meta.db"}}),
        );
        let environ = EnvironConfig::try_from(&doc).unwrap();
        let target = environ.database.target().unwrap();
        assert_eq!(target.path(), Path::new("/tmp/meta.db"));
        assert_eq!(target.url(), "sqlite:////tmp/meta.db");
    }

    #[test]
    fn test_unsupported_engine() {
        let doc = document(
            ConfigAttribute::Environ,
            json!({"DB_CONFIG": {"DB_ENGINE": "postgres", "DB_FILE": "x"}}),
        );
        let environ = EnvironConfig::try_from(&doc).unwrap();
        let err = environ.database.target().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedDatabase(engine) if engine == "postgres"));
    }

    #[test]
    fn test_sqlite_without_file() {
        let doc = document(
            ConfigAttribute::Environ,
            json!({"DB_CONFIG": {"DB_ENGINE": "sqlite"}}),
        );
        let environ = EnvironConfig::try_from(&doc).unwrap();
        assert!(matches!(
            environ.database.target(),
            Err(ConfigError::MissingDbFile)
        ));
    }

    #[test]
    fn test_repository_defaults() {
        let doc = document(
            ConfigAttribute::Repository,
            json!({"CLOUD_TYPE": "AWS", "REGION": "us-east-1", "ACCESS_KEY": ""}),
        );
        let defaults = RepositoryDefaults::try_from(&doc).unwrap();
        assert_eq!(defaults.cloud_type, "AWS");
        assert_eq!(defaults.region.as_deref(), Some("us-east-1"));
        assert_eq!(defaults.access_key, None);
        assert_eq!(defaults.secret_key, None);
    }

    #[test]
    fn test_cluster_and_node_defaults() {
        let doc = document(
            ConfigAttribute::Cluster,
            json!({"DESCRIPTION": "analytics", "WHITELISTED_IPS": ["10.0.0.1", "10.0.0.2"]}),
        );
        let cluster = ClusterDefaults::from(&doc);
        assert_eq!(cluster.description.as_deref(), Some("analytics"));
        assert_eq!(cluster.whitelisted_ips.len(), 2);
        assert_eq!(cluster.security_group_id, None);

        let doc = document(
            ConfigAttribute::ParentNode,
            json!({"INSTANCE_TYPE": "t3.large", "BLOCK_DEVICE_MAPPING": [{"SIZE": 20}]}),
        );
        let node = NodeDefaults::from(&doc);
        assert_eq!(node.instance_type.as_deref(), Some("t3.large"));
        assert_eq!(node.block_device_mapping, Some(json!([{"SIZE": 20}])));
        assert_eq!(node.key_pair_name, None);
    }
}
