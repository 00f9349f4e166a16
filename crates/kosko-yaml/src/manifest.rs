//! Kubernetes manifests

use std::fmt;

use kosko_core::{Result, Value};

use crate::resource::{ResourceKind, ResourceModule};
use crate::schema::validate_manifest;

/// A structured document identified by `apiVersion` and `kind`.
///
/// Manifests are always schema-valid: every constructor and mutator
/// re-checks the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    api_version: String,
    kind: String,
    document: Value,
    constructed_by: Option<ResourceModule>,
}

impl Manifest {
    /// Create a manifest from a raw document
    pub fn new(document: Value) -> Result<Self> {
        validate_manifest(&document)?;

        let field = |name: &str| {
            document
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok(Self {
            api_version: field("apiVersion"),
            kind: field("kind"),
            document,
            constructed_by: None,
        })
    }

    /// Record the resource module this manifest was built by
    pub fn with_constructor(mut self, module: ResourceModule) -> Self {
        self.constructed_by = Some(module);
        self
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn resource_kind(&self) -> ResourceKind {
        ResourceKind::new(&self.api_version, &self.kind)
    }

    /// `metadata.name`, if present
    pub fn name(&self) -> Option<&str> {
        self.get("metadata.name").and_then(Value::as_str)
    }

    /// `metadata.namespace`, if present
    pub fn namespace(&self) -> Option<&str> {
        self.get("metadata.namespace").and_then(Value::as_str)
    }

    /// Get a value by path (e.g., "spec.replicas")
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.document.get_path(path).ok()
    }

    /// Set a value at a path.
    ///
    /// Fails without modifying the manifest if the change would leave an
    /// invalid document.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let mut document = self.document.clone();
        document.set_path(path, value.into())?;

        let updated = Manifest::new(document)?;
        self.api_version = updated.api_version;
        self.kind = updated.kind;
        self.document = updated.document;
        Ok(())
    }

    /// The resource module that constructed this manifest, if any
    pub fn constructed_by(&self) -> Option<&ResourceModule> {
        self.constructed_by.as_ref()
    }

    pub fn as_value(&self) -> &Value {
        &self.document
    }

    pub fn into_value(self) -> Value {
        self.document
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)?;
        if let Some(name) = self.name() {
            write!(f, " {}", name)?;
        }
        Ok(())
    }
}

impl TryFrom<Value> for Manifest {
    type Error = kosko_core::Error;

    fn try_from(document: Value) -> Result<Self> {
        Manifest::new(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kosko_core::ErrorKind;

    fn yaml(s: &str) -> Value {
        Value::from_yaml(serde_yaml::from_str(s).unwrap())
    }

    #[test]
    fn test_new_manifest() {
        let manifest =
            Manifest::new(yaml("apiVersion: apps/v1\nkind: Deployment\nmetadata: {name: web, namespace: prod}"))
                .unwrap();

        assert_eq!(manifest.api_version(), "apps/v1");
        assert_eq!(manifest.kind(), "Deployment");
        assert_eq!(manifest.name(), Some("web"));
        assert_eq!(manifest.namespace(), Some("prod"));
        assert_eq!(manifest.resource_kind(), ResourceKind::new("apps/v1", "Deployment"));
        assert_eq!(manifest.to_string(), "apps/v1/Deployment web");
        assert!(manifest.constructed_by().is_none());
    }

    #[test]
    fn test_new_rejects_invalid() {
        let err = Manifest::new(yaml("kind: Pod")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
    }

    #[test]
    fn test_set_value() {
        let mut manifest = Manifest::new(yaml("apiVersion: v1\nkind: Pod")).unwrap();
        manifest.set("metadata.namespace", "prod").unwrap();

        assert_eq!(manifest.namespace(), Some("prod"));
    }

    #[test]
    fn test_set_kind_updates_accessor() {
        let mut manifest = Manifest::new(yaml("apiVersion: v1\nkind: Pod")).unwrap();
        manifest.set("kind", "Service").unwrap();

        assert_eq!(manifest.kind(), "Service");
    }

    #[test]
    fn test_set_rejects_invalid_change() {
        let mut manifest = Manifest::new(yaml("apiVersion: v1\nkind: Pod")).unwrap();

        assert!(manifest.set("kind", "").is_err());
        assert!(manifest.set("apiVersion", 1).is_err());
        assert_eq!(manifest.kind(), "Pod");
        assert_eq!(manifest.as_value(), &yaml("apiVersion: v1\nkind: Pod"));
    }

    #[test]
    fn test_try_from_value() {
        let manifest: Manifest = yaml("apiVersion: v1\nkind: Secret").try_into().unwrap();
        assert_eq!(manifest.into_value(), yaml("apiVersion: v1\nkind: Secret"));
    }
}
