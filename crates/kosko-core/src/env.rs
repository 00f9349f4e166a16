//! Environment variables and the reducer chain
//!
//! An [`Environment`] computes the variables of a generation run by folding
//! an ordered list of [`Reducer`]s over an empty mapping. Later reducers
//! win on conflicting keys. The two default reducers load override modules
//! for the selected environments:
//!
//! ```text
//! environments/
//!   dev/
//!     index.yaml    # global overrides for "dev"
//!     nginx.yaml    # overrides for the "nginx" component in "dev"
//! ```
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> kosko_core::Result<()> {
//! use kosko_core::Environment;
//!
//! let env = Environment::new("/path/to/project").with_env("dev");
//!
//! let globals = env.global().await?;
//! let nginx = env.component("nginx").await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::merge::merge;
use crate::module::{ModuleLoader, SafeModuleLoader};
use crate::paths::{format_path, PathVars, Paths};
use crate::value::Value;

/// A step in the variables overriding chain
#[async_trait]
pub trait Reducer: Send + Sync {
    /// Name of the reducer, for diagnostics only
    fn name(&self) -> &str;

    /// Override variables in `target`.
    ///
    /// `component` is `None` when global variables are being computed.
    async fn reduce(
        &self,
        env: &Environment,
        target: Value,
        component: Option<&str>,
    ) -> Result<Value>;
}

/// A reducer backed by a synchronous function
pub struct FnReducer<F>
where
    F: Fn(Value, Option<&str>) -> Result<Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnReducer<F>
where
    F: Fn(Value, Option<&str>) -> Result<Value> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> Reducer for FnReducer<F>
where
    F: Fn(Value, Option<&str>) -> Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn reduce(
        &self,
        _env: &Environment,
        target: Value,
        component: Option<&str>,
    ) -> Result<Value> {
        (self.func)(target, component)
    }
}

/// Merges global overrides of every selected environment.
///
/// Ignores the component name, so component folds still see global values.
#[derive(Debug, Default)]
pub struct GlobalReducer;

#[async_trait]
impl Reducer for GlobalReducer {
    fn name(&self) -> &str {
        "global"
    }

    async fn reduce(
        &self,
        env: &Environment,
        target: Value,
        _component: Option<&str>,
    ) -> Result<Value> {
        let overrides = env.load_all_envs(&env.paths.global, None).await?;
        Ok(merge(std::iter::once(target).chain(overrides)))
    }
}

/// Merges component overrides of every selected environment.
///
/// A no-op when no component is given.
#[derive(Debug, Default)]
pub struct ComponentReducer;

#[async_trait]
impl Reducer for ComponentReducer {
    fn name(&self) -> &str {
        "component"
    }

    async fn reduce(
        &self,
        env: &Environment,
        target: Value,
        component: Option<&str>,
    ) -> Result<Value> {
        let Some(component) = component else {
            return Ok(target);
        };

        let overrides = env
            .load_all_envs(&env.paths.component, Some(component))
            .await?;
        Ok(merge(std::iter::once(target).chain(overrides)))
    }
}

/// Variables of one generation run
pub struct Environment {
    /// Base directory override modules are resolved against
    pub cwd: PathBuf,
    /// Selected environments, lowest precedence first. Empty means unset.
    pub env: Vec<String>,
    /// Override path templates
    pub paths: Paths,
    loader: SafeModuleLoader,
    reducers: Vec<Arc<dyn Reducer>>,
}

impl Environment {
    /// Create an environment reading override modules from `cwd`
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        let mut env = Self {
            cwd: cwd.into(),
            env: Vec::new(),
            paths: Paths::default(),
            loader: SafeModuleLoader::default(),
            reducers: Vec::new(),
        };
        env.reset_reducers();
        env
    }

    /// Select a single environment
    pub fn with_env(mut self, name: impl Into<String>) -> Self {
        self.env = vec![name.into()];
        self
    }

    /// Select several environments; later ones take precedence
    pub fn with_envs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_paths(mut self, paths: Paths) -> Self {
        self.paths = paths;
        self
    }

    /// Use a different module loader (e.g. an in-memory registry)
    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = SafeModuleLoader::new(loader);
        self
    }

    /// Returns global variables.
    ///
    /// If env is not set or no override module exists, returns an empty mapping.
    pub async fn global(&self) -> Result<Value> {
        self.fold(None).await
    }

    /// Returns component variables merged with global variables.
    ///
    /// If env is not set or no override module exists, returns an empty mapping.
    pub async fn component(&self, name: &str) -> Result<Value> {
        self.fold(Some(name)).await
    }

    /// Replace the reducers with the result of `transform`.
    ///
    /// `transform` receives a copy of the current list.
    pub fn set_reducers<F>(&mut self, transform: F)
    where
        F: FnOnce(Vec<Arc<dyn Reducer>>) -> Vec<Arc<dyn Reducer>>,
    {
        self.reducers = transform(self.reducers.clone());
    }

    /// Reset reducers to the defaults: "global" then "component"
    pub fn reset_reducers(&mut self) {
        let defaults: Vec<Arc<dyn Reducer>> =
            vec![Arc::new(GlobalReducer), Arc::new(ComponentReducer)];
        self.set_reducers(|_| defaults);
    }

    /// The current reducers, in fold order
    pub fn reducers(&self) -> &[Arc<dyn Reducer>] {
        &self.reducers
    }

    pub fn reducer_names(&self) -> Vec<&str> {
        self.reducers.iter().map(|r| r.name()).collect()
    }

    /// Load the module at `template` for every selected environment, in order.
    ///
    /// Missing modules contribute an empty mapping.
    pub async fn load_all_envs(
        &self,
        template: &str,
        component: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(self.env.len());

        for name in &self.env {
            let mut vars = PathVars::new(name);
            if let Some(component) = component {
                vars = vars.with_component(component);
            }
            let path = format_path(template, &vars)?;
            values.push(self.loader.load(&self.cwd.join(path)).await?);
        }

        Ok(values)
    }

    async fn fold(&self, component: Option<&str>) -> Result<Value> {
        let mut target = Value::empty_mapping();

        for reducer in &self.reducers {
            target = reducer.reduce(self, target, component).await?;
            log::trace!(
                "Reducer '{}' applied (component: {})",
                reducer.name(),
                component.unwrap_or("<global>")
            );
        }

        Ok(target)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .field("paths", &self.paths)
            .field("reducers", &self.reducer_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::module::ModuleRegistry;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn yaml(s: &str) -> Value {
        Value::from_yaml(serde_yaml::from_str(s).unwrap())
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn registry_env(modules: &[(&str, &str)]) -> Environment {
        let registry = modules
            .iter()
            .fold(ModuleRegistry::new(), |registry, (id, content)| {
                registry.with_module(Path::new("/project").join(id), yaml(content))
            });
        Environment::new("/project").with_loader(Arc::new(registry))
    }

    fn fn_reducer(
        name: &str,
        func: impl Fn(Value, Option<&str>) -> Result<Value> + Send + Sync + 'static,
    ) -> Arc<dyn Reducer> {
        Arc::new(FnReducer::new(name, func))
    }

    #[test]
    fn test_default_reducers() {
        let env = Environment::new("/project");
        assert_eq!(env.reducer_names(), vec!["global", "component"]);
    }

    #[test]
    fn test_reset_reducers() {
        let mut env = Environment::new("/project");
        env.set_reducers(|mut reducers| {
            reducers.reverse();
            reducers.push(fn_reducer("extra", |v, _| Ok(v)));
            reducers
        });
        assert_eq!(env.reducer_names(), vec!["component", "global", "extra"]);

        env.reset_reducers();
        assert_eq!(env.reducer_names(), vec!["global", "component"]);
    }

    #[tokio::test]
    async fn test_env_unset_returns_empty() {
        let env = registry_env(&[
            ("environments/dev", "a: 1"),
            ("environments/dev/nginx", "b: 2"),
        ]);

        assert_eq!(env.global().await.unwrap(), Value::empty_mapping());
        assert_eq!(env.component("nginx").await.unwrap(), Value::empty_mapping());
    }

    #[tokio::test]
    async fn test_global_single_env() {
        let env = registry_env(&[("environments/dev", "replicas: 1\nimage: nginx")])
            .with_env("dev");

        assert_eq!(
            env.global().await.unwrap(),
            yaml("replicas: 1\nimage: nginx")
        );
    }

    #[tokio::test]
    async fn test_global_ignores_component_overrides() {
        let env = registry_env(&[
            ("environments/dev", "a: 1"),
            ("environments/dev/nginx", "a: 2"),
        ])
        .with_env("dev");

        assert_eq!(env.global().await.unwrap(), yaml("a: 1"));
    }

    #[tokio::test]
    async fn test_component_layers_on_global() {
        let env = registry_env(&[
            ("environments/dev", "replicas: 1\nimage: nginx\nresources: {cpu: 1, memory: 1Gi}"),
            ("environments/dev/nginx", "replicas: 3\nresources: {cpu: 2}"),
        ])
        .with_env("dev");

        assert_eq!(
            env.component("nginx").await.unwrap(),
            yaml("replicas: 3\nimage: nginx\nresources: {cpu: 2, memory: 1Gi}")
        );
    }

    #[tokio::test]
    async fn test_component_without_override_returns_global() {
        let env = registry_env(&[("environments/dev", "replicas: 1")]).with_env("dev");

        assert_eq!(env.component("redis").await.unwrap(), yaml("replicas: 1"));
    }

    #[tokio::test]
    async fn test_multiple_envs_later_wins() {
        let env = registry_env(&[
            ("environments/a", "x: from-a\nonly_a: true"),
            ("environments/b", "x: from-b"),
            ("environments/a/nginx", "y: from-a"),
            ("environments/b/nginx", "y: from-b"),
        ])
        .with_envs(["a", "b"]);

        assert_eq!(env.global().await.unwrap(), yaml("x: from-b\nonly_a: true"));
        assert_eq!(
            env.component("nginx").await.unwrap(),
            yaml("x: from-b\nonly_a: true\ny: from-b")
        );
    }

    #[tokio::test]
    async fn test_missing_env_module_is_skipped() {
        let env = registry_env(&[("environments/b", "x: from-b")]).with_envs(["a", "b", "c"]);

        assert_eq!(env.global().await.unwrap(), yaml("x: from-b"));
    }

    #[tokio::test]
    async fn test_custom_paths() {
        let env = registry_env(&[
            ("config/dev/globals", "a: 1"),
            ("config/dev/components/nginx", "b: 2"),
        ])
        .with_env("dev")
        .with_paths(Paths {
            global: "config/#{environment}/globals".into(),
            component: "config/#{environment}/components/#{component}".into(),
        });

        assert_eq!(env.component("nginx").await.unwrap(), yaml("a: 1\nb: 2"));
    }

    #[tokio::test]
    async fn test_fold_equals_sequential_reduce() {
        let mut env = Environment::new("/project");
        env.set_reducers(|_| {
            vec![
                fn_reducer("r1", |v, _| Ok(v.merged(yaml("x: 1\ny: 1")))),
                fn_reducer("r2", |v, _| Ok(v.merged(yaml("y: 2")))),
            ]
        });

        let r1 = env.reducers()[0].clone();
        let r2 = env.reducers()[1].clone();
        let step1 = r1.reduce(&env, Value::empty_mapping(), None).await.unwrap();
        let expected = r2.reduce(&env, step1, None).await.unwrap();

        assert_eq!(env.global().await.unwrap(), expected);
        assert_eq!(expected, yaml("x: 1\ny: 2"));
    }

    #[tokio::test]
    async fn test_reducer_receives_component_name() {
        let mut env = Environment::new("/project");
        env.set_reducers(|reducers| {
            let mut reducers = reducers;
            reducers.push(fn_reducer("name", |mut v, component| {
                v.set_path("component", component.unwrap_or("none").into())?;
                Ok(v)
            }));
            reducers
        });

        assert_eq!(env.global().await.unwrap(), yaml("component: none"));
        assert_eq!(env.component("nginx").await.unwrap(), yaml("component: nginx"));
    }

    #[tokio::test]
    async fn test_reducer_error_propagates() {
        let mut env = Environment::new("/project");
        env.set_reducers(|_| vec![fn_reducer("fail", |_, _| Err(Error::internal("boom")))]);

        let err = env.global().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "environments/dev/index.yaml", "replicas: 1\nimage: nginx\n");
        write(dir.path(), "environments/dev/nginx.json", r#"{"replicas": 2}"#);

        let env = Environment::new(dir.path()).with_env("dev");

        assert_eq!(env.global().await.unwrap(), yaml("replicas: 1\nimage: nginx"));
        assert_eq!(
            env.component("nginx").await.unwrap(),
            yaml("replicas: 2\nimage: nginx")
        );
    }

    #[tokio::test]
    async fn test_broken_override_module_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "environments/dev.yaml", "replicas: [1\n");

        let env = Environment::new(dir.path()).with_env("dev");

        let err = env.global().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_fields_mutable_between_queries() {
        let mut env = registry_env(&[
            ("environments/dev", "stage: dev"),
            ("environments/prod", "stage: prod"),
        ]);

        env.env = vec!["dev".into()];
        assert_eq!(env.global().await.unwrap(), yaml("stage: dev"));

        env.env = vec!["prod".into()];
        assert_eq!(env.global().await.unwrap(), yaml("stage: prod"));
    }
}
