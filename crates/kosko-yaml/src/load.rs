//! Load Kubernetes YAML from strings, files and URLs
//!
//! Every document of the stream is validated, built with its resource
//! constructor when one resolves, and passed through the caller's transform.
//! The first invalid document aborts the whole load.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
#[cfg(feature = "http")]
use std::sync::OnceLock;
#[cfg(feature = "http")]
use std::time::Duration;

use kosko_core::error::SourceLocation;
use kosko_core::{Error, Result, Value};
use serde::Deserialize;

use crate::manifest::Manifest;
use crate::resource::{
    ConstructorRegistry, ManifestConstructor, ResourceKind, ResourceModule, ResourceModuleMap,
    ResourceModuleResolver,
};
use crate::schema::Schema;

/// Applied to every manifest; returning `None` drops it
pub type Transform = Arc<dyn Fn(Manifest) -> Option<Manifest> + Send + Sync>;

/// Future returned by a [`DeferredLoad`]
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<Vec<Manifest>>> + Send + 'static>>;

/// Per-load options
#[derive(Clone, Default)]
pub struct LoadOptions {
    transform: Option<Transform>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Manifest) -> Option<Manifest> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    fn apply(&self, manifest: Manifest) -> Option<Manifest> {
        match &self.transform {
            Some(transform) => transform(manifest),
            None => Some(manifest),
        }
    }
}

impl std::fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOptions")
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Options for [`Loader::load_url`]
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct UrlOptions {
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub load: LoadOptions,
}

#[cfg(feature = "http")]
impl Default for UrlOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            timeout: Duration::from_secs(30),
            load: LoadOptions::default(),
        }
    }
}

#[cfg(feature = "http")]
impl UrlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Manifest) -> Option<Manifest> + Send + Sync + 'static,
    {
        self.load = self.load.with_transform(transform);
        self
    }
}

/// A load that performs its I/O only when invoked.
///
/// May be invoked any number of times; each call reads the source again.
pub struct DeferredLoad {
    source: String,
    producer: Box<dyn Fn() -> LoadFuture + Send + Sync>,
}

impl DeferredLoad {
    fn new<F>(source: String, producer: F) -> Self
    where
        F: Fn() -> LoadFuture + Send + Sync + 'static,
    {
        Self {
            source,
            producer: Box::new(producer),
        }
    }

    /// The file path or URL this load reads from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub async fn load(&self) -> Result<Vec<Manifest>> {
        (self.producer)().await
    }
}

impl std::fmt::Debug for DeferredLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredLoad")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Manifest loader
#[derive(Clone)]
pub struct Loader {
    resolver: Arc<dyn ResourceModuleResolver>,
    constructors: Arc<ConstructorRegistry>,
    schema: Option<Schema>,
    /// Falls back to a shared client, built on first fetch
    #[cfg(feature = "http")]
    http: Option<reqwest::Client>,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            resolver: Arc::new(ResourceModuleMap::default()),
            constructors: Arc::new(ConstructorRegistry::new()),
            schema: None,
            #[cfg(feature = "http")]
            http: None,
        }
    }
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: impl ResourceModuleResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_constructors(mut self, constructors: ConstructorRegistry) -> Self {
        self.constructors = Arc::new(constructors);
        self
    }

    /// Validate every document against `schema` in addition to the manifest schema
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[cfg(feature = "http")]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Load manifests from YAML text
    pub fn load_string(&self, content: &str, options: &LoadOptions) -> Result<Vec<Manifest>> {
        let documents = parse_documents(content)?;
        let mut manifests = Vec::with_capacity(documents.len());

        for document in documents {
            let manifest = self.build(document)?;
            if let Some(manifest) = options.apply(manifest) {
                manifests.push(manifest);
            }
        }

        Ok(manifests)
    }

    /// Load manifests from a YAML file, lazily
    pub fn load_file(&self, path: impl Into<PathBuf>, options: LoadOptions) -> DeferredLoad {
        let path = path.into();
        let loader = self.clone();

        DeferredLoad::new(path.display().to_string(), move || {
            let loader = loader.clone();
            let path = path.clone();
            let options = options.clone();

            Box::pin(async move {
                let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    Error::io(format!("Failed to read file '{}': {}", path.display(), e))
                })?;
                log::debug!("File loaded from: {}", path.display());

                loader.load_string(&content, &options).map_err(|mut e| {
                    let file = path.display().to_string();
                    match e.source_location.as_mut() {
                        Some(location) => location.file = file,
                        None => {
                            e.source_location = Some(SourceLocation {
                                file,
                                line: None,
                                column: None,
                            })
                        }
                    }
                    e
                })
            })
        })
    }

    /// Load manifests from a YAML file served over HTTP(S), lazily.
    ///
    /// The request is sent once per invocation; a non-2xx response fails
    /// without parsing the body.
    #[cfg(feature = "http")]
    pub fn load_url(&self, url: impl Into<String>, options: UrlOptions) -> DeferredLoad {
        let url = url.into();
        let loader = self.clone();

        DeferredLoad::new(url.clone(), move || {
            let loader = loader.clone();
            let url = url.clone();
            let options = options.clone();

            Box::pin(async move {
                let content = loader.fetch(&url, &options).await?;
                loader.load_string(&content, &options.load)
            })
        })
    }

    #[cfg(feature = "http")]
    async fn fetch(&self, url: &str, options: &UrlOptions) -> Result<String> {
        let parsed = url::Url::parse(url).map_err(|e| {
            Error::fetch_failed(url, None).with_help(format!("Invalid URL: {}", e))
        })?;

        let client = match &self.http {
            Some(client) => client,
            None => default_http_client()?,
        };

        let mut request = client.get(parsed).timeout(options.timeout);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            Error::fetch_failed(url, e.status().map(|s| s.as_u16()))
                .with_help(format!("Connection error: {}", e))
        })?;

        let status = response.status();
        log::debug!("Fetch \"{}\": status={}", url, status.as_u16());

        if !status.is_success() {
            return Err(Error::fetch_failed(url, Some(status.as_u16())));
        }

        response.text().await.map_err(|e| {
            Error::fetch_failed(url, Some(status.as_u16()))
                .with_help(format!("Failed to read response body: {}", e))
        })
    }

    fn build(&self, document: Value) -> Result<Manifest> {
        let manifest = Manifest::new(document)?;

        if let Some(schema) = &self.schema {
            schema.validate(manifest.as_value())?;
        }

        match self.constructor_for(&manifest.resource_kind()) {
            Some((module, constructor)) => Ok(constructor
                .construct(manifest.into_value())?
                .with_constructor(module)),
            None => Ok(manifest),
        }
    }

    fn constructor_for(
        &self,
        kind: &ResourceKind,
    ) -> Option<(ResourceModule, Arc<dyn ManifestConstructor>)> {
        let Some(module) = self.resolver.resolve(kind) else {
            log::debug!("No resource modules for {}", kind);
            return None;
        };

        match self.constructors.import(&module) {
            Ok(constructor) => Some((module, constructor)),
            Err(e) => {
                log::debug!("Failed to import the resource module {}: {}", module, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("constructors", &self.constructors)
            .field("schema", &self.schema.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "http")]
fn default_http_client() -> Result<&'static reqwest::Client> {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| Error::internal(format!("Failed to build HTTP client: {}", e)))?;
    Ok(CLIENT.get_or_init(|| client))
}

/// Parse a multi-document YAML stream, dropping null documents
fn parse_documents(content: &str) -> Result<Vec<Value>> {
    let mut documents = Vec::new();

    for document in serde_yaml::Deserializer::from_str(content) {
        let mut yaml = serde_yaml::Value::deserialize(document).map_err(|e| {
            let err = Error::parse(e.to_string());
            match e.location() {
                Some(mark) => err.with_source_location(SourceLocation {
                    file: "<string>".into(),
                    line: Some(mark.line()),
                    column: Some(mark.column()),
                }),
                None => err,
            }
        })?;
        // `<<` merge keys
        yaml.apply_merge().map_err(|e| Error::parse(e.to_string()))?;

        let value = Value::from_yaml(yaml);
        if !value.is_null() {
            documents.push(value);
        }
    }

    Ok(documents)
}

/// Load manifests from YAML text with the default [`Loader`]
pub fn load_string(content: &str, options: &LoadOptions) -> Result<Vec<Manifest>> {
    Loader::default().load_string(content, options)
}

/// Load manifests from a YAML file with the default [`Loader`], lazily
pub fn load_file(path: impl Into<PathBuf>, options: LoadOptions) -> DeferredLoad {
    Loader::default().load_file(path, options)
}

/// Load manifests from a URL with the default [`Loader`], lazily
#[cfg(feature = "http")]
pub fn load_url(url: impl Into<String>, options: UrlOptions) -> DeferredLoad {
    Loader::default().load_url(url, options)
}
