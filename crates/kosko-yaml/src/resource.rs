//! Resource modules: custom constructors per `(apiVersion, kind)`
//!
//! A [`ResourceModuleResolver`] maps a resource kind to a
//! [`ResourceModule`] reference, and a [`ConstructorRegistry`] turns that
//! reference into a [`ManifestConstructor`]. Both steps are best-effort:
//! the loader falls back to the plain document when either fails.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use kosko_core::{Error, Result, Value};

use crate::manifest::Manifest;

/// Identifies the type of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    pub api_version: String,
    pub kind: String,
}

impl ResourceKind {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Split `apiVersion` into group and version; the core group is `None`
    pub fn group_version(&self) -> Option<(Option<&str>, &str)> {
        match self.api_version.split_once('/') {
            None if !self.api_version.is_empty() => Some((None, self.api_version.as_str())),
            Some((group, version))
                if !group.is_empty() && !version.is_empty() && !version.contains('/') =>
            {
                Some((Some(group), version))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// Where to find the constructor of a resource kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceModule {
    pub path: String,
    pub export: String,
}

impl ResourceModule {
    pub fn new(path: impl Into<String>, export: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            export: export.into(),
        }
    }
}

impl fmt::Display for ResourceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path, self.export)
    }
}

/// Trait for resource module lookup
pub trait ResourceModuleResolver: Send + Sync {
    fn resolve(&self, kind: &ResourceKind) -> Option<ResourceModule>;
}

/// The conventional `kubernetes-models` module of a resource kind.
///
/// `apps/v1` `Deployment` maps to `kubernetes-models/apps/v1/Deployment`,
/// core `v1` `Pod` to `kubernetes-models/v1/Pod`; the export is the kind.
pub fn kubernetes_models_module(kind: &ResourceKind) -> Option<ResourceModule> {
    let (group, version) = kind.group_version()?;
    if kind.kind.is_empty() {
        return None;
    }

    let path = match group {
        Some(group) => format!("kubernetes-models/{}/{}/{}", group, version, kind.kind),
        None => format!("kubernetes-models/{}/{}", version, kind.kind),
    };
    Some(ResourceModule::new(path, kind.kind.clone()))
}

/// Explicit resource module table with optional `kubernetes-models` fallback
#[derive(Debug, Clone)]
pub struct ResourceModuleMap {
    modules: HashMap<ResourceKind, ResourceModule>,
    kubernetes_models: bool,
}

impl Default for ResourceModuleMap {
    /// An empty table falling back to `kubernetes-models`
    fn default() -> Self {
        Self {
            modules: HashMap::new(),
            kubernetes_models: true,
        }
    }
}

impl ResourceModuleMap {
    /// An empty table without fallback
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
            kubernetes_models: false,
        }
    }

    pub fn insert(&mut self, kind: ResourceKind, module: ResourceModule) {
        self.modules.insert(kind, module);
    }

    pub fn with_module(mut self, kind: ResourceKind, module: ResourceModule) -> Self {
        self.insert(kind, module);
        self
    }

    pub fn with_kubernetes_models(mut self, enabled: bool) -> Self {
        self.kubernetes_models = enabled;
        self
    }
}

impl ResourceModuleResolver for ResourceModuleMap {
    fn resolve(&self, kind: &ResourceKind) -> Option<ResourceModule> {
        if let Some(module) = self.modules.get(kind) {
            return Some(module.clone());
        }
        if self.kubernetes_models {
            return kubernetes_models_module(kind);
        }
        None
    }
}

/// Builds a manifest from a raw, schema-valid document
pub trait ManifestConstructor: Send + Sync {
    fn construct(&self, document: Value) -> Result<Manifest>;
}

/// A constructor backed by a function
pub struct FnConstructor<F>
where
    F: Fn(Value) -> Result<Manifest> + Send + Sync,
{
    func: F,
}

impl<F> FnConstructor<F>
where
    F: Fn(Value) -> Result<Manifest> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ManifestConstructor for FnConstructor<F>
where
    F: Fn(Value) -> Result<Manifest> + Send + Sync,
{
    fn construct(&self, document: Value) -> Result<Manifest> {
        (self.func)(document)
    }
}

/// Constructors grouped by module path and export name
#[derive(Clone, Default)]
pub struct ConstructorRegistry {
    modules: HashMap<String, HashMap<String, Arc<dyn ManifestConstructor>>>,
}

impl ConstructorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        path: impl Into<String>,
        export: impl Into<String>,
        constructor: Arc<dyn ManifestConstructor>,
    ) {
        self.modules
            .entry(path.into())
            .or_default()
            .insert(export.into(), constructor);
    }

    /// Register a function as the constructor at `path#export`
    pub fn register_fn<F>(&mut self, path: impl Into<String>, export: impl Into<String>, func: F)
    where
        F: Fn(Value) -> Result<Manifest> + Send + Sync + 'static,
    {
        self.register(path, export, Arc::new(FnConstructor::new(func)));
    }

    pub fn with_fn<F>(mut self, path: impl Into<String>, export: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Result<Manifest> + Send + Sync + 'static,
    {
        self.register_fn(path, export, func);
        self
    }

    /// Resolve `module` to its constructor
    pub fn import(&self, module: &ResourceModule) -> Result<Arc<dyn ManifestConstructor>> {
        let exports = self
            .modules
            .get(&module.path)
            .ok_or_else(|| Error::module_not_found(&module.path))?;

        exports
            .get(&module.export)
            .cloned()
            .ok_or_else(|| Error::export_not_found(&module.path, &module.export))
    }
}

impl fmt::Debug for ConstructorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}
