use crate::error::Result;
use crate::schema::{KeySpec, parse_declarations};
use std::fmt;

/// Prefix shared by every environment variable the application reads
pub const ENV_PREFIX: &str = "CLUSTERED__";

const ENVIRON_KEYS: &str = r#"[
    {"name": "DB_CONFIG", "kind": "dict", "children": [
        {"name": "DB_ENGINE", "kind": "scalar"}
    ]}
]"#;

const REPOSITORY_KEYS: &str = r#"[
    {"name": "CLOUD_TYPE", "kind": "scalar"}
]"#;

const NO_KEYS: &str = "[]";

/// The configuration documents captured into the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigAttribute {
    Environ,
    Repository,
    Cluster,
    ParentNode,
    ChildNode,
}

impl ConfigAttribute {
    pub const ALL: [ConfigAttribute; 5] = [
        ConfigAttribute::Environ,
        ConfigAttribute::Repository,
        ConfigAttribute::Cluster,
        ConfigAttribute::ParentNode,
        ConfigAttribute::ChildNode,
    ];

    /// Attributes that may be (re)captured after initiation
    pub const OPTIONAL: [ConfigAttribute; 4] = [
        ConfigAttribute::Repository,
        ConfigAttribute::Cluster,
        ConfigAttribute::ParentNode,
        ConfigAttribute::ChildNode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConfigAttribute::Environ => "ENVIRON_CONFIG",
            ConfigAttribute::Repository => "REPOSITORY_CONFIG",
            ConfigAttribute::Cluster => "CLUSTER_CONFIG",
            ConfigAttribute::ParentNode => "PARENT_NODE_CONFIG",
            ConfigAttribute::ChildNode => "CHILD_NODE_CONFIG",
        }
    }

    /// Only the environment document must be present at initiation
    pub fn is_mandatory(&self) -> bool {
        matches!(self, ConfigAttribute::Environ)
    }

    /// `CLUSTERED__ENVIRON_CONFIG_FILE` and friends
    pub fn env_file_var(&self) -> String {
        format!("{}{}_FILE", ENV_PREFIX, self.name())
    }

    /// File name looked up inside the fallback directory
    pub fn default_file_name(&self) -> &'static str {
        match self {
            ConfigAttribute::Environ => "Environment_config.json",
            ConfigAttribute::Repository => "Repository_config.json",
            ConfigAttribute::Cluster => "Cluster_config.json",
            ConfigAttribute::ParentNode => "Parent_Node_config.json",
            ConfigAttribute::ChildNode => "Child_Node_config.json",
        }
    }

    /// File name of the persisted copy inside the workspace
    pub fn file_name(&self) -> String {
        format!(".{}.json", self.name())
    }

    /// Mandatory keys every document of this attribute must carry
    pub fn key_spec(&self) -> Result<Vec<KeySpec>> {
        let declarations = match self {
            ConfigAttribute::Environ => ENVIRON_KEYS,
            ConfigAttribute::Repository => REPOSITORY_KEYS,
            ConfigAttribute::Cluster | ConfigAttribute::ParentNode | ConfigAttribute::ChildNode => {
                NO_KEYS
            }
        };
        parse_declarations(declarations)
    }
}

impl fmt::Display for ConfigAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_files() {
        assert_eq!(ConfigAttribute::ParentNode.name(), "PARENT_NODE_CONFIG");
        assert_eq!(
            ConfigAttribute::Environ.env_file_var(),
            "CLUSTERED__ENVIRON_CONFIG_FILE"
        );
        assert_eq!(
            ConfigAttribute::ChildNode.file_name(),
            ".CHILD_NODE_CONFIG.json"
        );
        assert_eq!(
            ConfigAttribute::Repository.default_file_name(),
            "Repository_config.json"
        );
    }

    #[test]
    fn test_builtin_key_specs_parse() {
        for attribute in ConfigAttribute::ALL {
            assert!(attribute.key_spec().is_ok(), "{} spec", attribute);
        }

        let environ = ConfigAttribute::Environ.key_spec().unwrap();
        assert_eq!(
            environ,
            vec![KeySpec::dict("DB_CONFIG", vec![KeySpec::scalar("DB_ENGINE")])]
        );
        assert!(ConfigAttribute::Cluster.key_spec().unwrap().is_empty());
    }

    #[test]
    fn test_only_environ_is_mandatory() {
        let mandatory: Vec<_> = ConfigAttribute::ALL
            .iter()
            .filter(|a| a.is_mandatory())
            .collect();
        assert_eq!(mandatory, vec![&ConfigAttribute::Environ]);
        assert!(!ConfigAttribute::OPTIONAL.contains(&ConfigAttribute::Environ));
    }
}
