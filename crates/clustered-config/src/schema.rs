//! Declarative key specifications and the recursive document validator
//!
//! A key specification is declared as JSON:
//!
//! ```json
//! [
//!   {"name": "DB_CONFIG", "kind": "dict", "children": [
//!     {"name": "DB_ENGINE", "kind": "scalar"}
//!   ]}
//! ]
//! ```
//!
//! Declarations are parsed once into [`KeySpec`] trees. An unknown `kind` is a
//! defect in the declaration itself and surfaces as
//! [`ConfigError::UnexpectedSystem`], never as a validation failure.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

const PATH_SEPARATOR: &str = " >> ";

/// One required key and the shape its value must have
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    Scalar {
        name: String,
    },
    List {
        name: String,
        element: ElementSpec,
    },
    Dict {
        name: String,
        children: Vec<KeySpec>,
    },
}

/// Shape of each element of a list value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementSpec {
    Scalar,
    Dict(Vec<KeySpec>),
}

impl KeySpec {
    pub fn scalar(name: impl Into<String>) -> Self {
        KeySpec::Scalar { name: name.into() }
    }

    pub fn list(name: impl Into<String>, element: ElementSpec) -> Self {
        KeySpec::List {
            name: name.into(),
            element,
        }
    }

    pub fn dict(name: impl Into<String>, children: Vec<KeySpec>) -> Self {
        KeySpec::Dict {
            name: name.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            KeySpec::Scalar { name } | KeySpec::List { name, .. } | KeySpec::Dict { name, .. } => {
                name
            }
        }
    }
}

/// Raw declaration as written in JSON
#[derive(Debug, Deserialize)]
struct KeyDeclaration {
    name: String,
    kind: String,
    #[serde(default)]
    elem_kind: Option<String>,
    #[serde(default)]
    elem_children: Vec<KeyDeclaration>,
    #[serde(default)]
    children: Vec<KeyDeclaration>,
}

/// Parse a JSON array of key declarations
pub fn parse_declarations(source: &str) -> Result<Vec<KeySpec>> {
    let declarations: Vec<KeyDeclaration> = serde_json::from_str(source).map_err(|e| {
        ConfigError::UnexpectedSystem(format!("malformed key specification: {}", e))
    })?;
    declarations.into_iter().map(build_spec).collect()
}

fn build_spec(decl: KeyDeclaration) -> Result<KeySpec> {
    match decl.kind.as_str() {
        "scalar" => Ok(KeySpec::scalar(decl.name)),
        "dict" => {
            let children = decl
                .children
                .into_iter()
                .map(build_spec)
                .collect::<Result<Vec<_>>>()?;
            Ok(KeySpec::dict(decl.name, children))
        }
        "list" => {
            let element = match decl.elem_kind.as_deref() {
                Some("scalar") => ElementSpec::Scalar,
                Some("dict") => ElementSpec::Dict(
                    decl.elem_children
                        .into_iter()
                        .map(build_spec)
                        .collect::<Result<Vec<_>>>()?,
                ),
                other => {
                    return Err(ConfigError::UnexpectedSystem(format!(
                        "unrecognized element kind {:?} for key '{}'",
                        other, decl.name
                    )));
                }
            };
            Ok(KeySpec::list(decl.name, element))
        }
        other => Err(ConfigError::UnexpectedSystem(format!(
            "unrecognized key kind '{}' for key '{}'",
            other, decl.name
        ))),
    }
}

/// Outcome of validating a document against a key specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// The first key that is absent or has the wrong shape, ancestors joined by `" >> "`
    Missing { path: String },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    fn nested(parent: &str, inner: Validation) -> Validation {
        match inner {
            Validation::Valid => Validation::Valid,
            Validation::Missing { path } => Validation::Missing {
                path: format!("{}{}{}", parent, PATH_SEPARATOR, path),
            },
        }
    }

    fn missing(name: &str) -> Validation {
        Validation::Missing {
            path: name.to_string(),
        }
    }
}

/// Check `document` against every spec in order, stopping at the first failure
pub fn validate(specs: &[KeySpec], document: &Map<String, Value>) -> Validation {
    for spec in specs {
        let Some(value) = document.get(spec.name()) else {
            return Validation::missing(spec.name());
        };

        let outcome = check_value(spec, value);
        if !outcome.is_valid() {
            return outcome;
        }
    }
    Validation::Valid
}

fn check_value(spec: &KeySpec, value: &Value) -> Validation {
    match spec {
        KeySpec::Scalar { name } => {
            if is_scalar(value) {
                Validation::Valid
            } else {
                Validation::missing(name)
            }
        }
        KeySpec::Dict { name, children } => match value.as_object() {
            Some(map) => Validation::nested(name, validate(children, map)),
            None => Validation::missing(name),
        },
        KeySpec::List { name, element } => {
            let Some(items) = value.as_array() else {
                return Validation::missing(name);
            };
            for item in items {
                match element {
                    ElementSpec::Scalar => {
                        if !is_scalar(item) {
                            return Validation::missing(name);
                        }
                    }
                    ElementSpec::Dict(children) => {
                        let Some(map) = item.as_object() else {
                            return Validation::missing(name);
                        };
                        let outcome = Validation::nested(name, validate(children, map));
                        if !outcome.is_valid() {
                            return outcome;
                        }
                    }
                }
            }
            Validation::Valid
        }
    }
}

/// Strings, integers and booleans are scalars. Floats and null are not.
fn is_scalar(value: &Value) -> bool {
    match value {
        Value::String(_) | Value::Bool(_) => true,
        Value::Number(n) => n.is_i64() || n.is_u64(),
        _ => false,
    }
}
