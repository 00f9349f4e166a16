//! Manifest schema validation
//!
//! Every document must at least satisfy [`Schema::manifest`]: a mapping with
//! non-empty string `apiVersion` and `kind`. A [`Loader`](crate::Loader) can
//! carry one additional JSON Schema checked against every document.

use std::sync::{Arc, OnceLock};

use kosko_core::{Error, Result, Value};

const MANIFEST_SCHEMA: &str = r#"{
  "type": "object",
  "required": ["apiVersion", "kind"],
  "properties": {
    "apiVersion": { "type": "string", "minLength": 1 },
    "kind": { "type": "string", "minLength": 1 }
  }
}"#;

/// A compiled JSON Schema checked against manifest documents
#[derive(Debug, Clone)]
pub struct Schema {
    compiled: Arc<jsonschema::Validator>,
}

impl Schema {
    /// The minimal schema every manifest satisfies
    pub fn manifest() -> Result<&'static Schema> {
        static MANIFEST: OnceLock<Schema> = OnceLock::new();
        if let Some(schema) = MANIFEST.get() {
            return Ok(schema);
        }
        let schema = Schema::from_json(MANIFEST_SCHEMA)?;
        Ok(MANIFEST.get_or_init(|| schema))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::parse(format!("Schema is not valid JSON: {}", e)))
            .and_then(Self::compile)
    }

    /// Schemas are often kept next to manifests as YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::parse(format!("Schema is not valid YAML: {}", e)))
            .and_then(Self::compile)
    }

    fn compile(schema: serde_json::Value) -> Result<Self> {
        jsonschema::validator_for(&schema)
            .map(|compiled| Self {
                compiled: Arc::new(compiled),
            })
            .map_err(|e| Error::parse(format!("Schema does not compile: {}", e)))
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.compiled.is_valid(&to_json(value))
    }

    /// Check `value`, failing with the first violation.
    ///
    /// The error carries the document as JSON and, when the violation is
    /// nested, the JSON pointer of the offending value as its path.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let instance = to_json(value);

        let Some(violation) = self.compiled.iter_errors(&instance).next() else {
            return Ok(());
        };

        let pointer = violation.instance_path.to_string();
        let err = Error::schema_violation(format!("{}: {}", violation, value.to_json_string()));
        if pointer.is_empty() {
            Err(err)
        } else {
            Err(err.with_path(pointer))
        }
    }
}

/// Check that `value` is a manifest document
pub fn validate_manifest(value: &Value) -> Result<()> {
    if !value.is_mapping() {
        return Err(Error::schema_violation(format!(
            "The value must be an object: {}",
            value.to_json_string()
        )));
    }

    if !Schema::manifest()?.is_valid(value) {
        return Err(Error::schema_violation(format!(
            "apiVersion and kind are required: {}",
            value.to_json_string()
        )));
    }

    Ok(())
}

fn to_json(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
