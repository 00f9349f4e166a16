//! kosko-yaml: load Kubernetes YAML manifests
//!
//! Multi-document YAML from a string, a file or a URL is parsed into
//! [`Manifest`]s. Each document is validated, optionally built by a resource
//! constructor, and passed through a caller-supplied transform.
//!
//! # Example
//!
//! ```rust
//! use kosko_yaml::{load_string, LoadOptions};
//!
//! let yaml = r#"
//! apiVersion: v1
//! kind: ConfigMap
//! metadata:
//!   name: config
//! ---
//! apiVersion: apps/v1
//! kind: Deployment
//! metadata:
//!   name: web
//! "#;
//!
//! let options = LoadOptions::new().with_transform(|m| (m.kind() == "Deployment").then_some(m));
//! let manifests = load_string(yaml, &options).unwrap();
//! assert_eq!(manifests.len(), 1);
//! assert_eq!(manifests[0].name(), Some("web"));
//! ```

pub mod load;
pub mod manifest;
pub mod resource;
pub mod schema;

#[cfg(feature = "http")]
pub use load::{load_url, UrlOptions};
pub use load::{load_file, load_string, DeferredLoad, LoadFuture, LoadOptions, Loader, Transform};
pub use manifest::Manifest;
pub use resource::{
    kubernetes_models_module, ConstructorRegistry, FnConstructor, ManifestConstructor,
    ResourceKind, ResourceModule, ResourceModuleMap, ResourceModuleResolver,
};
pub use schema::{validate_manifest, Schema};

pub use kosko_core::{Error, ErrorKind, Result, Value};
