// src/error.rs

//! Error types for recipe compilation
//!
//! Every failure site has its own variant so callers (and operators reading
//! the message) can tell which file or field was at fault. Errors fall into
//! two families, reported by [`Error::kind`]:
//!
//! - **Structural**: a required file or field is missing
//! - **Validation**: a value is present but not acceptable

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// The documents that make up a recipe directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeFile {
    /// `compilers.yaml`
    Compilers,
    /// `packages.yaml`
    Packages,
    /// `config.yaml`
    Config,
    /// `modules.yaml`
    Modules,
    /// `mirrors.yaml`
    Mirrors,
}

impl RecipeFile {
    /// File name inside the recipe directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Compilers => "compilers.yaml",
            Self::Packages => "packages.yaml",
            Self::Config => "config.yaml",
            Self::Modules => "modules.yaml",
            Self::Mirrors => "mirrors.yaml",
        }
    }
}

impl std::fmt::Display for RecipeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required file or field is missing
    Structural,
    /// A value is present but semantically invalid
    Validation,
    /// The document could not be parsed
    Parse,
    /// Filesystem failure
    Io,
}

/// Errors raised while validating the top-level `config.yaml`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The key file '{0}' does not exist")]
    KeyFileNotFound(PathBuf),

    #[error("The 'system' field is missing: it must be one of {0}")]
    MissingSystem(String),

    #[error("The system '{name}' is not supported: it must be one of {supported}")]
    UnsupportedSystem { name: String, supported: String },

    #[error("The '{0}' field is missing")]
    MissingField(&'static str),
}

impl ConfigError {
    /// Classify this config error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingSystem(_) | Self::MissingField(_) => ErrorKind::Structural,
            Self::KeyFileNotFound(_) | Self::UnsupportedSystem { .. } => ErrorKind::Validation,
        }
    }
}

/// Errors that can occur while compiling a recipe
#[derive(Debug, Error)]
pub enum Error {
    #[error("The recipe path '{0}' does not exist")]
    RecipeNotFound(PathBuf),

    #[error("The recipe path '{}' does not contain {file}", path.display())]
    MissingRecipeFile { file: RecipeFile, path: PathBuf },

    #[error("{document}: missing required field '{field}'")]
    MissingField { document: String, field: String },

    #[error("Invalid configuration in config.yaml: {0}")]
    Config(#[from] ConfigError),

    #[error("Unsupported mpi: {0}")]
    UnsupportedMpi(String),

    #[error("The module template '{0}' does not exist")]
    ModuleTemplateNotFound(PathBuf),

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a missing-field error for a document
    pub fn missing_field(document: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            document: document.into(),
            field: field.into(),
        }
    }

    /// Classify this error as structural, validation, parse or I/O
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RecipeNotFound(_)
            | Self::MissingRecipeFile { .. }
            | Self::MissingField { .. }
            | Self::ModuleTemplateNotFound(_) => ErrorKind::Structural,
            Self::UnsupportedMpi(_) => ErrorKind::Validation,
            Self::Config(e) => e.kind(),
            Self::Parse { .. } | Self::Serialize { .. } => ErrorKind::Parse,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}
