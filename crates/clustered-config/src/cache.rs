use crate::attribute::ConfigAttribute;
use crate::document::ConfigDocument;
use crate::error::Result;
use crate::resolver::{SourceRequest, resolve};
use std::collections::HashMap;

/// Per-attribute resolution results kept for the lifetime of the owner
///
/// "Absent" outcomes are cached too, so an optional document that was not
/// found is not searched for again until a refresh is requested.
#[derive(Debug, Default)]
pub struct ConfigCache {
    entries: HashMap<ConfigAttribute, Option<ConfigDocument>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `attribute`, reusing a cached outcome unless `refresh` is set
    ///
    /// A failed resolution leaves any cached entry untouched.
    pub fn resolve(
        &mut self,
        attribute: ConfigAttribute,
        request: &SourceRequest,
        refresh: bool,
    ) -> Result<Option<&ConfigDocument>> {
        if refresh || !self.entries.contains_key(&attribute) {
            let resolved = resolve(attribute, request)?;
            self.entries.insert(attribute, resolved);
        } else {
            tracing::debug!(attribute = %attribute, "configuration served from cache");
        }
        Ok(self.get(attribute))
    }

    /// Store an outcome obtained elsewhere (e.g. a workspace read)
    pub fn insert(&mut self, attribute: ConfigAttribute, document: Option<ConfigDocument>) {
        self.entries.insert(attribute, document);
    }

    pub fn get(&self, attribute: ConfigAttribute) -> Option<&ConfigDocument> {
        self.entries.get(&attribute).and_then(Option::as_ref)
    }

    pub fn contains(&self, attribute: ConfigAttribute) -> bool {
        self.entries.contains_key(&attribute)
    }

    pub fn invalidate(&mut self, attribute: ConfigAttribute) {
        self.entries.remove(&attribute);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn cluster_request(path: &std::path::Path) -> SourceRequest {
        SourceRequest::optional().with_explicit(Some(path.to_path_buf()))
    }

    #[test]
    fn test_cached_until_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        fs::write(&path, r#"{"DESCRIPTION": "first"}"#).unwrap();

        let mut cache = ConfigCache::new();
        let request = cluster_request(&path);
        let first = cache
            .resolve(ConfigAttribute::Cluster, &request, false)
            .unwrap()
            .cloned()
            .unwrap();
        assert_eq!(first.get("DESCRIPTION").unwrap(), "first");

        fs::write(&path, r#"{"DESCRIPTION": "second"}"#).unwrap();
        let cached = cache
            .resolve(ConfigAttribute::Cluster, &request, false)
            .unwrap()
            .unwrap();
        assert_eq!(cached.get("DESCRIPTION").unwrap(), "first");

        let refreshed = cache
            .resolve(ConfigAttribute::Cluster, &request, true)
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.get("DESCRIPTION").unwrap(), "second");
    }

    #[test]
    fn test_failed_refresh_keeps_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        fs::write(&path, r#"{"DESCRIPTION": "kept"}"#).unwrap();

        let mut cache = ConfigCache::new();
        cache
            .resolve(ConfigAttribute::Cluster, &cluster_request(&path), false)
            .unwrap();

        let missing = cluster_request(&dir.path().join("missing.json"));
        assert!(cache.resolve(ConfigAttribute::Cluster, &missing, true).is_err());
        assert_eq!(
            cache.get(ConfigAttribute::Cluster).unwrap().get("DESCRIPTION").unwrap(),
            "kept"
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_absent_outcome_is_cached() {
        let mut cache = ConfigCache::new();
        let request = SourceRequest::optional().with_fallback("/nonexistent/Child_Node_config.json");
        temp_env::with_var_unset("CLUSTERED__CHILD_NODE_CONFIG_FILE", || {
            assert!(
                cache
                    .resolve(ConfigAttribute::ChildNode, &request, false)
                    .unwrap()
                    .is_none()
            );
        });
        assert!(cache.contains(ConfigAttribute::ChildNode));

        cache.invalidate(ConfigAttribute::ChildNode);
        assert!(!cache.contains(ConfigAttribute::ChildNode));
    }
}
