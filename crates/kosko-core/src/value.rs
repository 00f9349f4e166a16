//! Structured data values
//!
//! Override modules, variable sets and manifest documents are all
//! represented as [`Value`]: scalars, sequences, or insertion-ordered
//! mappings.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A plain data value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(IndexMap<String, Value>),
}

impl Value {
    /// An empty mapping, the starting point of every variable fold
    pub fn empty_mapping() -> Self {
        Value::Mapping(IndexMap::new())
    }

    /// Convert a parsed YAML value.
    ///
    /// Non-string keys are rendered to their scalar text and tags are
    /// dropped in favour of the tagged value.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Self {
        match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    // u64 beyond i64::MAX and real floats
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (yaml_key_to_string(k), Value::from_yaml(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float or Integer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a direct key of a mapping
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Get a value by path (e.g., "metadata.name" or "spec.ports[0].port")
    pub fn get_path(&self, path: &str) -> Result<&Value> {
        if path.is_empty() {
            return Ok(self);
        }

        let segments = parse_path(path)?;
        let mut current = self;

        for segment in &segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Mapping(map)) => map
                    .get(key.as_str())
                    .ok_or_else(|| path_not_found(path))?,
                (PathSegment::Index(idx), Value::Sequence(seq)) => {
                    seq.get(*idx).ok_or_else(|| path_not_found(path))?
                }
                _ => return Err(path_not_found(path)),
            };
        }

        Ok(current)
    }

    /// Set a value at a path, creating intermediate mappings as needed
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<()> {
        if path.is_empty() {
            *self = value;
            return Ok(());
        }

        let segments = parse_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            *self = value;
            return Ok(());
        };

        let mut current = self;
        for (i, segment) in parents.iter().enumerate() {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Mapping(map)) => {
                    let next_is_index = matches!(segments.get(i + 1), Some(PathSegment::Index(_)));
                    map.entry(key.clone()).or_insert_with(|| {
                        if next_is_index {
                            Value::Sequence(Vec::new())
                        } else {
                            Value::empty_mapping()
                        }
                    })
                }
                (PathSegment::Index(idx), Value::Sequence(seq)) => {
                    seq.get_mut(*idx).ok_or_else(|| path_not_found(path))?
                }
                _ => return Err(path_not_found(path)),
            };
        }

        match (last, current) {
            (PathSegment::Key(key), Value::Mapping(map)) => {
                map.insert(key.clone(), value);
                Ok(())
            }
            (PathSegment::Index(idx), Value::Sequence(seq)) if *idx < seq.len() => {
                seq[*idx] = value;
                Ok(())
            }
            _ => Err(path_not_found(path)),
        }
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Deep-merge `other` into this value, `other` taking precedence.
    ///
    /// - Mappings: merged key by key, recursively
    /// - Sequences: `other` replaces entirely
    /// - Scalars, null and type mismatches: `other` replaces
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Mapping(base), Value::Mapping(overlay)) => {
                for (key, overlay_value) in overlay {
                    match base.get_mut(&key) {
                        Some(base_value) => base_value.merge(overlay_value),
                        None => {
                            base.insert(key, overlay_value);
                        }
                    }
                }
            }
            (this, other) => *this = other,
        }
    }

    /// Create a merged value from two values (non-mutating)
    pub fn merged(mut self, other: Value) -> Value {
        self.merge(other);
        self
    }

    /// Render as compact JSON for diagnostics.
    ///
    /// Non-finite floats render as `null`, as serde_json encodes them.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }

    /// Convert into a caller-defined type through serde
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T> {
        let json = serde_json::to_value(self)
            .map_err(|e| Error::parse(format!("Value is not representable as JSON: {}", e)))?;
        serde_json::from_value(json).map_err(|e| Error::parse(e.to_string()))
    }
}

fn yaml_key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => Value::from_yaml(other).to_json_string(),
    }
}

fn path_not_found(path: &str) -> Error {
    Error::internal(format!("No value at path '{}'", path))
        .with_path(path)
        .with_help(format!("Check that '{}' exists in the document", path))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Mapping(m)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Mapping(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse "key", "key.subkey", "key[0]", "key[0].subkey"
fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut current_key = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
            }
            '[' => {
                if !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
                let index_str: String = chars.by_ref().take_while(|&c| c != ']').collect();
                let idx: usize = index_str.parse().map_err(|_| {
                    Error::parse(format!("Invalid array index in path: {}", index_str))
                })?;
                segments.push(PathSegment::Index(idx));
            }
            ']' => return Err(Error::parse("Unexpected ']' in path")),
            _ => current_key.push(c),
        }
    }

    if !current_key.is_empty() {
        segments.push(PathSegment::Key(current_key));
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn yaml(s: &str) -> Value {
        Value::from_yaml(serde_yaml::from_str(s).unwrap())
    }

    #[test]
    fn test_parse_complex_path() {
        let segments = parse_path("spec.ports[0].port").unwrap();
        assert_eq!(
            segments,
            vec![
                PathSegment::Key("spec".into()),
                PathSegment::Key("ports".into()),
                PathSegment::Index(0),
                PathSegment::Key("port".into())
            ]
        );
    }

    #[test]
    fn test_parse_invalid_index() {
        assert!(parse_path("items[x]").is_err());
        assert!(parse_path("items]").is_err());
    }

    #[test]
    fn test_from_yaml_keeps_order_and_types() {
        let value = yaml("b: 1\na: 2.5\nc: [true, null]\n");
        let keys: Vec<&String> = value.as_mapping().unwrap().keys().collect();

        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(value.get("b").unwrap().as_i64(), Some(1));
        assert_eq!(value.get("a").unwrap().as_f64(), Some(2.5));
        assert_eq!(
            value.get("c").unwrap(),
            &Value::Sequence(vec![Value::Bool(true), Value::Null])
        );
    }

    #[test]
    fn test_from_yaml_non_string_keys_and_tags() {
        let value = yaml("1: one\ntrue: yes\nkey: !Secret hidden\n");

        assert_eq!(value.get("1").unwrap().as_str(), Some("one"));
        assert_eq!(value.get("true").unwrap().as_str(), Some("yes"));
        assert_eq!(value.get("key").unwrap().as_str(), Some("hidden"));
    }

    #[test]
    fn test_get_path() {
        let value = yaml("metadata:\n  name: nginx\nspec:\n  ports:\n    - port: 80\n");

        assert_eq!(value.get_path("metadata.name").unwrap().as_str(), Some("nginx"));
        assert_eq!(value.get_path("spec.ports[0].port").unwrap().as_i64(), Some(80));
        assert!(value.get_path("spec.ports[1]").is_err());
        assert!(value.get_path("metadata.name.first").is_err());
    }

    #[test]
    fn test_set_path_creates_mappings() {
        let mut value = Value::empty_mapping();
        value.set_path("metadata.labels.app", "nginx".into()).unwrap();

        assert_eq!(
            value.get_path("metadata.labels.app").unwrap().as_str(),
            Some("nginx")
        );
    }

    #[test]
    fn test_set_path_sequence_index() {
        let mut value = yaml("items: [a, b]");
        value.set_path("items[1]", "c".into()).unwrap();

        assert_eq!(value.get_path("items[1]").unwrap().as_str(), Some("c"));
        assert!(value.set_path("items[5]", "d".into()).is_err());
    }

    #[test]
    fn test_merge_deep() {
        let base = yaml("database:\n  host: localhost\n  port: 5432\n");
        let merged = base.merged(yaml("database:\n  host: prod-db\n"));

        assert_eq!(merged, yaml("database:\n  host: prod-db\n  port: 5432\n"));
    }

    #[test]
    fn test_merge_array_replaces() {
        let merged = yaml("servers: [a, b]").merged(yaml("servers: [c]"));

        assert_eq!(merged, yaml("servers: [c]"));
    }

    #[test]
    fn test_merge_null_overrides_and_keeps_key() {
        let merged = yaml("replicas: 3\nimage: nginx\n").merged(yaml("replicas: null"));

        assert_eq!(merged.get("replicas"), Some(&Value::Null));
        assert_eq!(merged.get("image").unwrap().as_str(), Some("nginx"));
    }

    #[test]
    fn test_merge_type_mismatch() {
        let merged = yaml("database:\n  host: localhost\n").merged(yaml("database: conn-string"));

        assert_eq!(merged.get("database").unwrap().as_str(), Some("conn-string"));
    }

    #[test]
    fn test_to_json_string() {
        let value = yaml("kind: Pod\nspec: {replicas: 2}\n");
        assert_eq!(value.to_json_string(), r#"{"kind":"Pod","spec":{"replicas":2}}"#);

        assert_eq!(Value::Float(f64::NAN).to_json_string(), "null");
    }

    #[test]
    fn test_deserialize_into() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Vars {
            replicas: u32,
            image: String,
        }

        let vars: Vars = yaml("replicas: 2\nimage: nginx\n").deserialize_into().unwrap();
        assert_eq!(
            vars,
            Vars {
                replicas: 2,
                image: "nginx".into()
            }
        );
    }
}
