//! Application lifecycle: initiate, refresh and destroy
//!
//! ```text
//! uninitiated ──initiate──▶ initiated ──destroy──▶ uninitiated
//!                              │  ▲
//!                              └──┘ refresh
//! ```
//!
//! `initiate` is all-or-nothing: any failure after the workspace directory
//! was created removes it (and a database file created by the same call)
//! before the error is returned.

use crate::error::{ClusteredError, Result};
use crate::model::NodeType;
use crate::store::MetaStore;
use crate::workspace::Workspace;
use clustered_config::{
    ClusterDefaults, ConfigAttribute, ConfigCache, ConfigDocument, ConfigError, EnvironConfig,
    NodeDefaults, RepositoryDefaults, SourceRequest,
};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_DIR: &str = "config";

/// Where each configuration document may be read from
#[derive(Debug, Clone)]
pub struct ConfigSources {
    pub environ: Option<PathBuf>,
    pub repository: Option<PathBuf>,
    pub cluster: Option<PathBuf>,
    pub parent_node: Option<PathBuf>,
    pub child_node: Option<PathBuf>,
    /// Directory holding the default `*_config.json` files
    pub fallback_dir: PathBuf,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            environ: None,
            repository: None,
            cluster: None,
            parent_node: None,
            child_node: None,
            fallback_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
        }
    }
}

impl ConfigSources {
    pub fn explicit(&self, attribute: ConfigAttribute) -> Option<&PathBuf> {
        match attribute {
            ConfigAttribute::Environ => self.environ.as_ref(),
            ConfigAttribute::Repository => self.repository.as_ref(),
            ConfigAttribute::Cluster => self.cluster.as_ref(),
            ConfigAttribute::ParentNode => self.parent_node.as_ref(),
            ConfigAttribute::ChildNode => self.child_node.as_ref(),
        }
    }

    pub fn request(&self, attribute: ConfigAttribute) -> SourceRequest {
        let request = if attribute.is_mandatory() {
            SourceRequest::required()
        } else {
            SourceRequest::optional()
        };
        request
            .with_explicit(self.explicit(attribute).cloned())
            .with_fallback(self.fallback_dir.join(attribute.default_file_name()))
    }
}

/// Owns the workspace and the configuration cache for one process
pub struct Application {
    workspace: Workspace,
    cache: ConfigCache,
}

impl Application {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            cache: ConfigCache::new(),
        }
    }

    /// Application bound to the per-user workspace
    pub fn locate() -> Result<Self> {
        Ok(Self::new(Workspace::locate()?))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn is_initiated(&self) -> bool {
        self.workspace.exists()
    }

    /// Capture every configuration document and create the metadata store
    pub fn initiate(&mut self, sources: &ConfigSources) -> Result<PathBuf> {
        self.workspace.create()?;

        let mut created_db = None;
        match self.capture(sources, &mut created_db) {
            Ok(db) => {
                tracing::info!(workspace = %self.workspace.root().display(), "application initiated");
                Ok(db)
            }
            Err(e) => {
                self.rollback(created_db.as_deref());
                Err(e)
            }
        }
    }

    fn capture(&mut self, sources: &ConfigSources, created_db: &mut Option<PathBuf>) -> Result<PathBuf> {
        for attribute in ConfigAttribute::ALL {
            let request = sources.request(attribute);
            if let Some(document) = self.cache.resolve(attribute, &request, true)? {
                self.workspace.persist(document)?;
            } else {
                tracing::debug!(attribute = %attribute, "optional configuration not supplied");
            }
        }

        let environ = self.environ()?;
        let target = environ.database.target()?;
        let path = target.path().to_path_buf();
        if !path.exists() {
            *created_db = Some(path.clone());
        }
        MetaStore::create(&path)?;
        tracing::debug!(url = %target.url(), "metadata schema created");
        Ok(path)
    }

    fn rollback(&mut self, created_db: Option<&Path>) {
        tracing::warn!(workspace = %self.workspace.root().display(), "initiation failed, rolling back");
        if let Some(db) = created_db
            && db.exists()
            && let Err(e) = std::fs::remove_file(db)
        {
            tracing::warn!(path = %db.display(), error = %e, "database file could not be removed");
        }
        if let Err(e) = self.workspace.remove() {
            tracing::warn!(error = %e, "workspace could not be removed");
        }
        self.cache.clear();
    }

    /// Re-capture the optional documents; ENVIRON_CONFIG is fixed at initiation
    pub fn refresh(&mut self, sources: &ConfigSources) -> Result<Vec<ConfigAttribute>> {
        self.workspace.ensure_initiated()?;

        let mut refreshed = Vec::new();
        for attribute in ConfigAttribute::OPTIONAL {
            let request = sources.request(attribute);
            if let Some(document) = self.cache.resolve(attribute, &request, true)? {
                self.workspace.persist(document)?;
                refreshed.push(attribute);
            } else {
                // keep serving the persisted copy, if any
                self.cache.invalidate(attribute);
            }
        }
        tracing::info!(count = refreshed.len(), "configuration refreshed");
        Ok(refreshed)
    }

    /// Remove the metadata store and the workspace
    pub fn destroy(&mut self) -> Result<()> {
        self.workspace.ensure_initiated()?;

        let environ = self.environ()?;
        let target = environ.database.target().map_err(|e| match e {
            ConfigError::UnsupportedDatabase(engine) => ClusteredError::UnsupportedDestroy(engine),
            other => ClusteredError::Config(other),
        })?;

        let db = target.path();
        if db.exists() {
            std::fs::remove_file(db)?;
            tracing::debug!(path = %db.display(), "metadata store removed");
        } else {
            tracing::warn!(path = %db.display(), "metadata store already missing");
        }

        self.workspace.remove()?;
        self.cache.clear();
        tracing::info!("application destroyed");
        Ok(())
    }

    /// Open the metadata store recorded in ENVIRON_CONFIG
    pub fn open_store(&mut self) -> Result<MetaStore> {
        self.workspace.ensure_initiated()?;
        let environ = self.environ()?;
        let target = environ.database.target()?;
        MetaStore::open(target.path())
    }

    pub fn environ(&mut self) -> Result<EnvironConfig> {
        let document = self
            .persisted(ConfigAttribute::Environ)?
            .ok_or(ClusteredError::PersistedConfigMissing {
                attribute: ConfigAttribute::Environ,
            })?;
        Ok(EnvironConfig::try_from(document)?)
    }

    pub fn repository_defaults(&mut self) -> Result<Option<RepositoryDefaults>> {
        match self.persisted(ConfigAttribute::Repository)? {
            Some(document) => Ok(Some(RepositoryDefaults::try_from(document)?)),
            None => Ok(None),
        }
    }

    pub fn cluster_defaults(&mut self) -> Result<ClusterDefaults> {
        Ok(self
            .persisted(ConfigAttribute::Cluster)?
            .map(ClusterDefaults::from)
            .unwrap_or_default())
    }

    /// Parent-node defaults for masters, child-node defaults for slaves
    pub fn node_defaults(&mut self, node_type: NodeType) -> Result<NodeDefaults> {
        let attribute = match node_type {
            NodeType::Master => ConfigAttribute::ParentNode,
            NodeType::Slave => ConfigAttribute::ChildNode,
        };
        Ok(self
            .persisted(attribute)?
            .map(NodeDefaults::from)
            .unwrap_or_default())
    }

    /// Workspace copy of a document, read once and then served from the cache
    fn persisted(&mut self, attribute: ConfigAttribute) -> Result<Option<&ConfigDocument>> {
        if !self.cache.contains(attribute) {
            self.workspace.ensure_initiated()?;
            let document = self.workspace.load(attribute)?;
            self.cache.insert(attribute, document);
        }
        Ok(self.cache.get(attribute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        config_dir: PathBuf,
        db: PathBuf,
        app: Application,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let config_dir = temp.path().join("config");
        fs::create_dir(&config_dir).unwrap();
        let db = temp.path().join("meta.db");
        fs::write(
            config_dir.join("Environment_config.json"),
            format!(
                r#"{{"DB_CONFIG": {{"DB_ENGINE": "sqlite", "DB_FILE": "{}"}}}}"#,
                db.display()
            ),
        )
        .unwrap();
        let app = Application::new(Workspace::new(temp.path().join(".clustered")));
        Fixture {
            config_dir,
            db,
            app,
            _temp: temp,
        }
    }

    fn sources(f: &Fixture) -> ConfigSources {
        ConfigSources {
            fallback_dir: f.config_dir.clone(),
            ..Default::default()
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_initiate_and_destroy() {
        let mut f = fixture();
        let sources = sources(&f);
        let db = f.app.initiate(&sources).unwrap();
        assert_eq!(db, f.db);
        assert!(f.db.exists());
        assert!(f.app.workspace().document_path(ConfigAttribute::Environ).exists());
        assert!(!f.app.workspace().document_path(ConfigAttribute::Cluster).exists());

        f.app.open_store().unwrap();
        f.app.destroy().unwrap();
        assert!(!f.db.exists());
        assert!(!f.app.is_initiated());
        assert!(matches!(
            f.app.destroy(),
            Err(ClusteredError::NotInitiated(_))
        ));
    }

    #[test]
    #[serial_test::serial]
    fn test_unsupported_engine_rolls_back() {
        let mut f = fixture();
        fs::write(
            f.config_dir.join("Environment_config.json"),
            r#"{"DB_CONFIG": {"DB_ENGINE": "mysql", "DB_FILE": "x"}}"#,
        )
        .unwrap();
        let sources = sources(&f);

        let err = f.app.initiate(&sources).unwrap_err();
        assert!(matches!(
            err,
            ClusteredError::Config(ConfigError::UnsupportedDatabase(_))
        ));
        assert!(!f.app.is_initiated());
    }

    #[test]
    #[serial_test::serial]
    fn test_refresh_replaces_optional_documents() {
        let mut f = fixture();
        let sources = sources(&f);
        f.app.initiate(&sources).unwrap();
        assert_eq!(f.app.cluster_defaults().unwrap(), ClusterDefaults::default());

        fs::write(
            f.config_dir.join("Cluster_config.json"),
            r#"{"DESCRIPTION": "refreshed", "WHITELISTED_IPS": ["1.2.3.4"]}"#,
        )
        .unwrap();
        let refreshed = f.app.refresh(&sources).unwrap();
        assert_eq!(refreshed, vec![ConfigAttribute::Cluster]);
        assert_eq!(
            f.app.cluster_defaults().unwrap().description.as_deref(),
            Some("refreshed")
        );
        assert!(f.app.repository_defaults().unwrap().is_none());
    }

    #[test]
    #[serial_test::serial]
    fn test_environ_is_not_refreshed() {
        let mut f = fixture();
        let sources = sources(&f);
        f.app.initiate(&sources).unwrap();

        fs::write(
            f.config_dir.join("Environment_config.json"),
            r#"{"DB_CONFIG": {"DB_ENGINE": "sqlite", "DB_FILE": "/elsewhere.db"}}"#,
        )
        .unwrap();
        f.app.refresh(&sources).unwrap();

        let mut reopened = Application::new(f.app.workspace().clone());
        let environ = reopened.environ().unwrap();
        assert_eq!(environ.database.file.as_deref(), Some(f.db.as_path()));
    }

    #[test]
    #[serial_test::serial]
    fn test_destroy_requires_persisted_environ() {
        let mut f = fixture();
        let sources = sources(&f);
        f.app.initiate(&sources).unwrap();
        let persisted = f.app.workspace().document_path(ConfigAttribute::Environ);
        fs::remove_file(&persisted).unwrap();

        let mut app = Application::new(f.app.workspace().clone());
        assert!(matches!(
            app.destroy(),
            Err(ClusteredError::PersistedConfigMissing {
                attribute: ConfigAttribute::Environ
            })
        ));
        assert!(app.is_initiated());
        assert!(f.db.exists());
    }

    #[test]
    #[serial_test::serial]
    fn test_destroy_with_corrupted_environ() {
        let mut f = fixture();
        let sources = sources(&f);
        f.app.initiate(&sources).unwrap();
        let persisted = f.app.workspace().document_path(ConfigAttribute::Environ);
        fs::write(&persisted, "{ not json").unwrap();

        let mut app = Application::new(f.app.workspace().clone());
        assert!(matches!(
            app.destroy(),
            Err(ClusteredError::Config(ConfigError::Parse { .. }))
        ));
        assert!(app.is_initiated());
    }

    #[test]
    #[serial_test::serial]
    fn test_destroy_rejects_non_sqlite_engine() {
        let mut f = fixture();
        let sources = sources(&f);
        f.app.initiate(&sources).unwrap();
        let persisted = f.app.workspace().document_path(ConfigAttribute::Environ);
        fs::write(
            &persisted,
            r#"{"DB_CONFIG": {"DB_ENGINE": "postgres", "DB_FILE": "x"}}"#,
        )
        .unwrap();

        let mut app = Application::new(f.app.workspace().clone());
        match app.destroy() {
            Err(ClusteredError::UnsupportedDestroy(engine)) => assert_eq!(engine, "postgres"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(app.is_initiated());
        assert!(f.db.exists());
    }

    #[test]
    #[serial_test::serial]
    fn test_node_defaults_follow_type() {
        let mut f = fixture();
        fs::write(
            f.config_dir.join("Parent_Node_config.json"),
            r#"{"INSTANCE_TYPE": "m5.large"}"#,
        )
        .unwrap();
        fs::write(
            f.config_dir.join("Child_Node_config.json"),
            r#"{"INSTANCE_TYPE": "t3.small"}"#,
        )
        .unwrap();
        let sources = sources(&f);
        f.app.initiate(&sources).unwrap();

        let mut app = Application::new(f.app.workspace().clone());
        assert_eq!(
            app.node_defaults(NodeType::Master).unwrap().instance_type.as_deref(),
            Some("m5.large")
        );
        assert_eq!(
            app.node_defaults(NodeType::Slave).unwrap().instance_type.as_deref(),
            Some("t3.small")
        );
    }
}
