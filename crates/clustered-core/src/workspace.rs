//! Workspace directory management
//!
//! The workspace lives at `~/.clustered` and holds one `.{ATTRIBUTE}.json`
//! copy per captured configuration document. Its presence is the
//! "application initiated" marker.

use crate::error::{ClusteredError, Result};
use clustered_config::{ConfigAttribute, ConfigDocument, SourceOrigin};
use std::fs;
use std::path::{Path, PathBuf};

const WORKSPACE_DIR: &str = ".clustered";

/// Handle on the workspace directory
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The per-user workspace under the home directory
    pub fn locate() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ClusteredError::HomeDirNotFound)?;
        Ok(Self::new(home.join(WORKSPACE_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn ensure_initiated(&self) -> Result<()> {
        if !self.exists() {
            return Err(ClusteredError::NotInitiated(self.root.clone()));
        }
        Ok(())
    }

    /// Create the directory; it must not exist yet
    pub fn create(&self) -> Result<()> {
        if self.root.exists() {
            return Err(ClusteredError::AlreadyInitiated(self.root.clone()));
        }
        fs::create_dir_all(&self.root).map_err(|e| ClusteredError::WorkspaceBuild {
            path: self.root.clone(),
            source: e,
        })?;
        tracing::debug!(path = %self.root.display(), "workspace created");
        Ok(())
    }

    pub fn document_path(&self, attribute: ConfigAttribute) -> PathBuf {
        self.root.join(attribute.file_name())
    }

    /// Write a document into the workspace, replacing any previous copy
    pub fn persist(&self, document: &ConfigDocument) -> Result<PathBuf> {
        let path = self.document_path(document.attribute);
        let content = document.to_json_pretty()?;
        fs::write(&path, content).map_err(|e| ClusteredError::ConfigPersist {
            attribute: document.attribute,
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(
            attribute = %document.attribute,
            from = %document.source.display(),
            "configuration persisted"
        );
        Ok(path)
    }

    /// Read a persisted document back; `None` if it was never captured
    pub fn load(&self, attribute: ConfigAttribute) -> Result<Option<ConfigDocument>> {
        let path = self.document_path(attribute);
        if !path.is_file() {
            return Ok(None);
        }
        let document = clustered_config::load(attribute, &path, SourceOrigin::Workspace)?;
        Ok(Some(document))
    }

    pub fn remove(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
            tracing::debug!(path = %self.root.display(), "workspace removed");
        }
        Ok(())
    }
}
