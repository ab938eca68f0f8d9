//! Locate, load and validate one configuration document
//!
//! Source precedence (first match wins):
//! 1. explicit path given by the caller
//! 2. `CLUSTERED__{ATTRIBUTE}_FILE` environment variable
//! 3. fallback path, if the file exists
//! 4. error when the document is required, otherwise absent

use crate::attribute::{ConfigAttribute, ENV_PREFIX};
use crate::document::ConfigDocument;
use crate::error::{ConfigError, Result, SourceOrigin};
use crate::schema::{KeySpec, Validation, validate};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Inputs that decide where a document is read from
#[derive(Debug, Clone, Default)]
pub struct SourceRequest {
    pub explicit: Option<PathBuf>,
    pub fallback: Option<PathBuf>,
    pub required: bool,
}

impl SourceRequest {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn optional() -> Self {
        Self::default()
    }

    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    pub fn with_fallback(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback = Some(path.into());
        self
    }
}

/// Pick the file to read for `attribute`, or `None` when optional and nothing is available
pub fn locate(
    attribute: ConfigAttribute,
    request: &SourceRequest,
) -> Result<Option<(PathBuf, SourceOrigin)>> {
    if let Some(path) = &request.explicit {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.clone(),
                origin: SourceOrigin::Explicit,
            });
        }
        return Ok(Some((path.clone(), SourceOrigin::Explicit)));
    }

    let var = attribute.env_file_var();
    if let Some(declared) = non_empty_env(&var) {
        let path = PathBuf::from(declared);
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path,
                origin: SourceOrigin::Environment(var),
            });
        }
        return Ok(Some((path, SourceOrigin::Environment(var))));
    }

    if let Some(fallback) = &request.fallback
        && fallback.is_file()
    {
        return Ok(Some((fallback.clone(), SourceOrigin::Fallback)));
    }

    if request.required {
        return Err(ConfigError::NoSourceAvailable {
            attribute,
            fallback: request
                .fallback
                .clone()
                .unwrap_or_else(|| PathBuf::from(attribute.default_file_name())),
        });
    }

    tracing::debug!(attribute = %attribute, "no configuration source available");
    Ok(None)
}

/// Resolve `attribute` through the precedence chain and load the chosen file
#[tracing::instrument(skip(request), fields(required = request.required))]
pub fn resolve(
    attribute: ConfigAttribute,
    request: &SourceRequest,
) -> Result<Option<ConfigDocument>> {
    match locate(attribute, request)? {
        Some((path, origin)) => {
            tracing::debug!(path = %path.display(), origin = %origin, "configuration source selected");
            load(attribute, &path, origin).map(Some)
        }
        None => Ok(None),
    }
}

/// Read a JSON document, fill mandatory keys from the environment and validate it
pub fn load(attribute: ConfigAttribute, path: &Path, origin: SourceOrigin) -> Result<ConfigDocument> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let Value::Object(mut data) = value else {
        return Err(ConfigError::NotAnObject(path.to_path_buf()));
    };

    let specs = attribute.key_spec()?;
    fill_from_env(&specs, &mut data);

    if let Validation::Missing { path: key_path } = validate(&specs, &data) {
        return Err(ConfigError::MandatoryKeyMissing { path: key_path });
    }

    Ok(ConfigDocument {
        attribute,
        source: path.to_path_buf(),
        origin,
        data,
    })
}

/// Top-level mandatory keys that are absent or blank take `CLUSTERED__{KEY}`
fn fill_from_env(specs: &[KeySpec], data: &mut Map<String, Value>) {
    for spec in specs {
        let name = spec.name();
        if !is_blank(data.get(name)) {
            continue;
        }
        let Some(raw) = non_empty_env(&format!("{}{}", ENV_PREFIX, name)) else {
            continue;
        };

        let value = match spec {
            KeySpec::Scalar { .. } => Some(Value::String(raw)),
            KeySpec::List { .. } | KeySpec::Dict { .. } => match serde_json::from_str(&raw) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(key = name, error = %e, "ignoring unparsable environment value");
                    None
                }
            },
        };
        if let Some(value) = value {
            tracing::debug!(key = name, "mandatory key filled from environment");
            data.insert(name.to_string(), value);
        }
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ENVIRON_VAR: &str = "CLUSTERED__ENVIRON_CONFIG_FILE";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn environ_json(file: &str) -> String {
        format!(
            r#"{{"DB_CONFIG": {{"DB_ENGINE": "sqlite", "DB_FILE": "{}"}}}}"#,
            file
        )
    }

    #[test]
    #[serial]
    fn test_precedence_explicit_env_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = write(&dir, "explicit.json", &environ_json("a.db"));
        let declared = write(&dir, "declared.json", &environ_json("b.db"));
        let fallback = write(&dir, "fallback.json", &environ_json("c.db"));

        temp_env::with_var(ENVIRON_VAR, Some(declared.to_str().unwrap()), || {
            let request = SourceRequest::required()
                .with_explicit(Some(explicit.clone()))
                .with_fallback(&fallback);
            let (path, origin) = locate(ConfigAttribute::Environ, &request).unwrap().unwrap();
            assert_eq!(path, explicit);
            assert_eq!(origin, SourceOrigin::Explicit);

            let request = SourceRequest::required().with_fallback(&fallback);
            let (path, origin) = locate(ConfigAttribute::Environ, &request).unwrap().unwrap();
            assert_eq!(path, declared);
            assert!(matches!(origin, SourceOrigin::Environment(_)));
        });

        temp_env::with_var_unset(ENVIRON_VAR, || {
            let request = SourceRequest::required().with_fallback(&fallback);
            let (path, origin) = locate(ConfigAttribute::Environ, &request).unwrap().unwrap();
            assert_eq!(path, fallback);
            assert_eq!(origin, SourceOrigin::Fallback);

            let missing = dir.path().join("missing.json");
            let request = SourceRequest::required().with_fallback(&missing);
            assert!(matches!(
                locate(ConfigAttribute::Environ, &request),
                Err(ConfigError::NoSourceAvailable { .. })
            ));

            let request = SourceRequest::optional().with_fallback(&missing);
            assert!(locate(ConfigAttribute::Environ, &request).unwrap().is_none());
        });
    }

    #[test]
    #[serial]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = write(&dir, "fallback.json", &environ_json("c.db"));
        let request = SourceRequest::optional()
            .with_explicit(Some(dir.path().join("nope.json")))
            .with_fallback(&fallback);

        let err = locate(ConfigAttribute::Environ, &request).unwrap_err();
        match err {
            ConfigError::FileNotFound { path, origin } => {
                assert!(path.ends_with("nope.json"));
                assert_eq!(origin, SourceOrigin::Explicit);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    #[serial]
    fn test_declared_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = write(&dir, "fallback.json", &environ_json("c.db"));
        let missing = dir.path().join("declared.json");

        temp_env::with_var(ENVIRON_VAR, Some(missing.to_str().unwrap()), || {
            let request = SourceRequest::optional().with_fallback(&fallback);
            let err = locate(ConfigAttribute::Environ, &request).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::FileNotFound {
                    origin: SourceOrigin::Environment(_),
                    ..
                }
            ));
        });
    }

    #[test]
    #[serial]
    fn test_empty_env_var_counts_as_unset() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = write(&dir, "fallback.json", &environ_json("c.db"));

        temp_env::with_var(ENVIRON_VAR, Some(""), || {
            let request = SourceRequest::required().with_fallback(&fallback);
            let (path, _) = locate(ConfigAttribute::Environ, &request).unwrap().unwrap();
            assert_eq!(path, fallback);
        });
    }

    #[test]
    #[serial]
    fn test_no_source_message_lists_options() {
        temp_env::with_var_unset(ENVIRON_VAR, || {
            let request = SourceRequest::required();
            let message = locate(ConfigAttribute::Environ, &request)
                .unwrap_err()
                .to_string();
            assert!(message.contains("CLUSTERED__ENVIRON_CONFIG_FILE"));
            assert!(message.contains("Environment_config.json"));
            assert!(message.contains("1."));
            assert!(message.contains("3."));
        });
    }

    #[test]
    #[serial]
    fn test_resolve_validates_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "env.json", r#"{"DB_CONFIG": {"DB_FILE": "x.db"}}"#);

        temp_env::with_var_unset(ENVIRON_VAR, || {
            let request = SourceRequest::required().with_explicit(Some(path.clone()));
            let err = resolve(ConfigAttribute::Environ, &request).unwrap_err();
            assert!(matches!(
                &err,
                ConfigError::MandatoryKeyMissing { path } if path == "DB_CONFIG >> DB_ENGINE"
            ));
            assert!(err.to_string().contains("Mandatory key `DB_CONFIG >> DB_ENGINE`"));
        });
    }

    #[test]
    #[serial]
    fn test_resolve_returns_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "env.json", &environ_json("meta.db"));

        let request = SourceRequest::required().with_explicit(Some(path.clone()));
        let doc = resolve(ConfigAttribute::Environ, &request).unwrap().unwrap();
        assert_eq!(doc.attribute, ConfigAttribute::Environ);
        assert_eq!(doc.source, path);
        assert!(doc.get("DB_CONFIG").is_some());
    }

    #[test]
    #[serial]
    fn test_mandatory_key_filled_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "repo.json", r#"{"CLOUD_TYPE": "", "REGION": "eu-west-1"}"#);

        temp_env::with_var("CLUSTERED__CLOUD_TYPE", Some("AWS"), || {
            let doc = load(ConfigAttribute::Repository, &path, SourceOrigin::Explicit).unwrap();
            assert_eq!(doc.get("CLOUD_TYPE"), Some(&Value::String("AWS".into())));
        });

        temp_env::with_var_unset("CLUSTERED__CLOUD_TYPE", || {
            let err = load(ConfigAttribute::Repository, &path, SourceOrigin::Explicit).unwrap_err();
            assert!(matches!(err, ConfigError::MandatoryKeyMissing { .. }));
        });
    }

    #[test]
    #[serial]
    fn test_file_value_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "repo.json", r#"{"CLOUD_TYPE": "GCP"}"#);

        temp_env::with_var("CLUSTERED__CLOUD_TYPE", Some("AWS"), || {
            let doc = load(ConfigAttribute::Repository, &path, SourceOrigin::Explicit).unwrap();
            assert_eq!(doc.get("CLOUD_TYPE"), Some(&Value::String("GCP".into())));
        });
    }

    #[test]
    #[serial]
    fn test_dict_key_filled_from_env_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "env.json", "{}");

        temp_env::with_var(
            "CLUSTERED__DB_CONFIG",
            Some(r#"{"DB_ENGINE": "sqlite", "DB_FILE": "meta.db"}"#),
            || {
                let doc = load(ConfigAttribute::Environ, &path, SourceOrigin::Explicit).unwrap();
                assert!(doc.get("DB_CONFIG").unwrap().is_object());
            },
        );
    }

    #[test]
    fn test_invalid_json_and_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let broken = write(&dir, "broken.json", "{not json");
        let array = write(&dir, "array.json", "[1, 2]");

        assert!(matches!(
            load(ConfigAttribute::Cluster, &broken, SourceOrigin::Explicit),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            load(ConfigAttribute::Cluster, &array, SourceOrigin::Explicit),
            Err(ConfigError::NotAnObject(_))
        ));
    }
}
