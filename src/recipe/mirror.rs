// src/recipe/mirror.rs

//! Binary cache (mirror) policy

use super::config::MirrorConfig;
use crate::error::RecipeFile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which mirror definition and signing key a build uses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorPolicy {
    source: Option<PathBuf>,
    key: Option<PathBuf>,
    enabled: bool,
}

impl MirrorPolicy {
    /// Resolve the policy from the recipe's mirror section and the mirror
    /// definition file found for the recipe, if any
    pub fn resolve(config: Option<&MirrorConfig>, candidate: Option<PathBuf>) -> Self {
        match config {
            None => Self::default(),
            Some(config) => {
                let enabled = config.enabled();
                Self {
                    source: if enabled { candidate } else { None },
                    key: config.key.clone(),
                    enabled,
                }
            }
        }
    }

    /// Mirror definition to install into the build configuration
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Signing key for pushing to the cache
    pub fn key(&self) -> Option<&Path> {
        self.key.as_deref()
    }

    /// Whether the recipe left mirroring enabled
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Built packages are pushed only when there is a cache and a key
    pub fn push_to_cache(&self) -> bool {
        self.source.is_some() && self.key.is_some()
    }
}

/// Locate the mirror definition for a recipe
///
/// The recipe's own `mirrors.yaml` wins over the one shipped with the
/// system configuration.
pub fn find_mirror_source(recipe_dir: &Path, system_config_dir: &Path) -> Option<PathBuf> {
    [recipe_dir, system_config_dir]
        .iter()
        .map(|dir| dir.join(RecipeFile::Mirrors.file_name()))
        .find(|path| path.is_file())
}
