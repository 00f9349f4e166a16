//! kosko-core: environment variables for Kubernetes manifest generation
//!
//! This crate computes the variables of a generation run by merging
//! environment-specific override modules with a chain of reducers.
//!
//! # Example
//!
//! ```rust
//! use kosko_core::{merge, Value};
//!
//! let base = Value::from_yaml(serde_yaml::from_str("replicas: 1\nimage: nginx").unwrap());
//! let prod = Value::from_yaml(serde_yaml::from_str("replicas: 3").unwrap());
//!
//! let vars = merge([base, prod]);
//! assert_eq!(vars.get("replicas").and_then(Value::as_i64), Some(3));
//! assert_eq!(vars.get("image").and_then(Value::as_str), Some("nginx"));
//! ```

pub mod env;
pub mod error;
pub mod merge;
pub mod module;
pub mod paths;
pub mod value;

pub use env::{ComponentReducer, Environment, FnReducer, GlobalReducer, Reducer};
pub use error::{Error, ErrorKind, Result};
pub use merge::merge;
pub use module::{FileModuleLoader, ModuleLoader, ModuleRegistry, SafeModuleLoader};
pub use paths::{format_path, PathVars, Paths};
pub use value::Value;
