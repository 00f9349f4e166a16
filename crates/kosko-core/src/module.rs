//! Module loading
//!
//! A module is a data file addressed by an identifier without extension,
//! e.g. `environments/dev` resolves to `environments/dev.yaml` or
//! `environments/dev/index.yaml`. Loaders report a missing module with
//! [`ErrorKind::ModuleNotFound`](crate::error::ErrorKind::ModuleNotFound),
//! which [`SafeModuleLoader`] turns into an empty mapping.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result, SourceLocation};
use crate::value::Value;

/// Extensions tried, in order, when resolving a module identifier
pub const MODULE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Trait for module loader implementations
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load the default value of the module identified by `id`
    async fn load(&self, id: &Path) -> Result<Value>;
}

/// Loads YAML and JSON modules from the filesystem
#[derive(Debug, Clone, Default)]
pub struct FileModuleLoader;

impl FileModuleLoader {
    pub fn new() -> Self {
        Self
    }

    /// Candidate files for `id` in resolution order
    pub fn candidates(id: &Path) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(1 + 2 * MODULE_EXTENSIONS.len());
        candidates.push(id.to_path_buf());

        let file_name = id.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        for ext in MODULE_EXTENSIONS {
            let mut name = file_name.clone();
            name.push(".");
            name.push(ext);
            candidates.push(id.with_file_name(name));
        }
        for ext in MODULE_EXTENSIONS {
            candidates.push(id.join(format!("index.{}", ext)));
        }

        candidates
    }

    async fn resolve(id: &Path) -> Result<Option<PathBuf>> {
        for candidate in Self::candidates(id) {
            match tokio::fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() => return Ok(Some(candidate)),
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => continue,
                Err(e) => {
                    return Err(Error::io(format!(
                        "Failed to stat '{}': {}",
                        candidate.display(),
                        e
                    )))
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ModuleLoader for FileModuleLoader {
    async fn load(&self, id: &Path) -> Result<Value> {
        let Some(file) = Self::resolve(id).await? else {
            return Err(Error::module_not_found(id.display().to_string()));
        };

        let content = tokio::fs::read_to_string(&file).await.map_err(|e| {
            Error::io(format!("Failed to read file '{}': {}", file.display(), e))
        })?;
        log::debug!("Module loaded from: {}", file.display());

        parse_module(&file, &content)
    }
}

fn parse_module(file: &Path, content: &str) -> Result<Value> {
    let location = || SourceLocation {
        file: file.display().to_string(),
        line: None,
        column: None,
    };

    if content.trim().is_empty() {
        return Ok(Value::Null);
    }

    let is_json = file.extension().and_then(|e| e.to_str()) == Some("json");
    if is_json {
        return serde_json::from_str(content).map_err(|e| {
            Error::parse(e.to_string()).with_source_location(SourceLocation {
                line: Some(e.line()),
                column: Some(e.column()),
                ..location()
            })
        });
    }

    let mut yaml: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| {
        let mut loc = location();
        if let Some(mark) = e.location() {
            loc.line = Some(mark.line());
            loc.column = Some(mark.column());
        }
        Error::parse(e.to_string()).with_source_location(loc)
    })?;
    yaml.apply_merge()
        .map_err(|e| Error::parse(e.to_string()).with_source_location(location()))?;
    Ok(Value::from_yaml(yaml))
}

/// In-memory module registry keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<PathBuf, Value>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the module at `id`
    pub fn insert(&mut self, id: impl Into<PathBuf>, value: Value) {
        self.modules.insert(id.into(), value);
    }

    /// Builder form of [`ModuleRegistry::insert`]
    pub fn with_module(mut self, id: impl Into<PathBuf>, value: Value) -> Self {
        self.insert(id, value);
        self
    }

    pub fn contains(&self, id: &Path) -> bool {
        self.modules.contains_key(id)
    }
}

#[async_trait]
impl ModuleLoader for ModuleRegistry {
    async fn load(&self, id: &Path) -> Result<Value> {
        self.modules
            .get(id)
            .cloned()
            .ok_or_else(|| Error::module_not_found(id.display().to_string()))
    }
}

/// Module loader that treats a missing module as an empty mapping.
///
/// Loaded values must be mappings; a null module (an empty file) counts as
/// empty. Every error other than "not found" propagates.
#[derive(Clone)]
pub struct SafeModuleLoader {
    inner: Arc<dyn ModuleLoader>,
}

impl SafeModuleLoader {
    pub fn new(inner: Arc<dyn ModuleLoader>) -> Self {
        Self { inner }
    }

    pub async fn load(&self, id: &Path) -> Result<Value> {
        match self.inner.load(id).await {
            Ok(Value::Null) => Ok(Value::empty_mapping()),
            Ok(value @ Value::Mapping(_)) => Ok(value),
            Ok(other) => Err(Error::module_load(
                id.display().to_string(),
                format!("Override modules must be mappings, got {}", other.type_name()),
            )),
            Err(e) if e.is_not_found() => {
                log::debug!("Module not found: {}", id.display());
                Ok(Value::empty_mapping())
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for SafeModuleLoader {
    fn default() -> Self {
        Self::new(Arc::new(FileModuleLoader::new()))
    }
}

impl std::fmt::Debug for SafeModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeModuleLoader").finish_non_exhaustive()
    }
}
