// src/recipe/parser.rs

//! Recipe document parsing

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Parse a YAML document from a string
///
/// An empty document parses as the type's default, matching how an empty
/// file is read by the other tools that consume recipes.
pub fn parse_document<T>(content: &str, path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_yaml::from_str(content).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse a YAML document from a file
pub fn parse_document_file<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_document(&content, path)
}
