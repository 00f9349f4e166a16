//! Error types for kosko
//!
//! Errors are structured: a kind, optional context (the module or document
//! they refer to), the underlying cause and an actionable help message.

use std::fmt;

/// Result type alias for kosko operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kosko operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Value path the error refers to (e.g., "metadata.name")
    pub path: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error parsing YAML/JSON
    Parse,
    /// Path template could not be rendered
    Template { placeholder: String },
    /// No module exists for the identifier.
    ///
    /// This is the only kind the safe module loader recovers from.
    ModuleNotFound { module: String },
    /// A module exists but could not be loaded
    Module { module: String },
    /// A module was loaded but lacks the requested export
    ExportNotFound { module: String, export: String },
    /// A document does not satisfy the manifest schema
    SchemaViolation,
    /// Remote document could not be fetched
    Fetch { url: String, status: Option<u16> },
    /// I/O error (permission denied, etc.)
    Io,
    /// Internal error (bug in kosko)
    Internal,
}

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            source_location: None,
            help: None,
            cause: None,
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Parse)
        }
    }

    /// Create a template error for a placeholder that has no value
    pub fn template(template: impl Into<String>, placeholder: impl Into<String>) -> Self {
        let placeholder = placeholder.into();
        Self {
            help: Some(format!(
                "Supported placeholders are #{{environment}} and #{{component}}; \
                 '{}' cannot be rendered here",
                placeholder
            )),
            cause: Some(format!("Template: {}", template.into())),
            ..Self::from_kind(ErrorKind::Template { placeholder })
        }
    }

    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::ModuleNotFound {
            module: module.into(),
        })
    }

    /// Create a module load error (the module exists but is unusable)
    pub fn module_load(module: impl Into<String>, message: impl Into<String>) -> Self {
        let module = module.into();
        Self {
            help: Some(format!("Check the contents of '{}'", module)),
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Module { module })
        }
    }

    /// Create an export not found error
    pub fn export_not_found(module: impl Into<String>, export: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::ExportNotFound {
            module: module.into(),
            export: export.into(),
        })
    }

    /// Create a schema violation error.
    ///
    /// `message` must carry the offending raw value.
    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self {
            help: Some("Every document must be a mapping with non-empty apiVersion and kind".into()),
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::SchemaViolation)
        }
    }

    /// Create a fetch error for a remote document
    pub fn fetch_failed(url: impl Into<String>, status: Option<u16>) -> Self {
        let url = url.into();
        Self {
            cause: Some(format!("Failed to fetch YAML file from: {}", url)),
            ..Self::from_kind(ErrorKind::Fetch { url, status })
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Io)
        }
    }

    /// Create an internal error (bug in kosko)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            help: Some("This is likely a bug in kosko. Please report it.".into()),
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Internal)
        }
    }

    /// Whether this error means "no such module"
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::ModuleNotFound { .. })
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add the underlying cause to the error
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::Template { placeholder } => {
                write!(f, "Unresolved path placeholder: #{{{}}}", placeholder)?
            }
            ErrorKind::ModuleNotFound { module } => write!(f, "Module not found: {}", module)?,
            ErrorKind::Module { module } => write!(f, "Failed to load module: {}", module)?,
            ErrorKind::ExportNotFound { module, export } => {
                write!(f, "Module '{}' has no export '{}'", module, export)?
            }
            ErrorKind::SchemaViolation => write!(f, "Invalid manifest")?,
            ErrorKind::Fetch { url, status } => {
                write!(f, "HTTP request failed: {}", url)?;
                if let Some(s) = status {
                    write!(f, " (status {})", s)?;
                }
            }
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::Internal => write!(f, "Internal error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
