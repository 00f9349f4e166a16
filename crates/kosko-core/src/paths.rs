//! Override path templates
//!
//! Templates carry `#{environment}` and `#{component}` placeholders, e.g.
//! `environments/#{environment}/#{component}`.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Path templates for global and per-component overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub global: String,
    pub component: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            global: "environments/#{environment}".into(),
            component: "environments/#{environment}/#{component}".into(),
        }
    }
}

/// Values bound to placeholders at render time
#[derive(Debug, Clone, Copy)]
pub struct PathVars<'a> {
    pub environment: &'a str,
    pub component: Option<&'a str>,
}

impl<'a> PathVars<'a> {
    pub fn new(environment: &'a str) -> Self {
        Self {
            environment,
            component: None,
        }
    }

    pub fn with_component(mut self, component: &'a str) -> Self {
        self.component = Some(component);
        self
    }

    fn lookup(&self, name: &str) -> Option<&'a str> {
        match name {
            "environment" => Some(self.environment),
            "component" => self.component,
            _ => None,
        }
    }
}

fn placeholder_regex() -> Result<&'static Regex> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    if let Some(regex) = PLACEHOLDER.get() {
        return Ok(regex);
    }
    let regex = Regex::new(r"#\{(\w+)\}").map_err(|e| Error::internal(e.to_string()))?;
    Ok(PLACEHOLDER.get_or_init(|| regex))
}

/// Render `template`, substituting every `#{name}` token.
///
/// Fails with a template error naming the first placeholder that has no value.
pub fn format_path(template: &str, vars: &PathVars<'_>) -> Result<String> {
    let regex = placeholder_regex()?;

    if let Some(missing) = regex
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .find(|name| vars.lookup(name).is_none())
    {
        return Err(Error::template(template, missing));
    }

    let rendered = regex.replace_all(template, |caps: &Captures<'_>| {
        vars.lookup(&caps[1]).unwrap_or_default().to_string()
    });

    Ok(rendered.into_owned())
}
