// src/recipe/config.rs

//! Top-level recipe configuration (`config.yaml`)
//!
//! The raw document is deserialized into [`RawConfig`], where every field is
//! optional, and then checked by [`validate`] to produce a [`RecipeConfig`].
//! Keeping the two apart means a missing field is reported by name instead of
//! surfacing as a serde error.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Target systems with a cluster configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemName {
    Hohgant,
    Balfrin,
}

impl SystemName {
    /// All supported systems
    pub fn all() -> &'static [SystemName] {
        &[Self::Hohgant, Self::Balfrin]
    }

    /// Name as used in recipes and in the cluster-config directory
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hohgant => "hohgant",
            Self::Balfrin => "balfrin",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|system| system.as_str() == s)
    }

    /// Comma-separated list of supported names, for error messages
    pub fn supported_list() -> String {
        Self::all()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for SystemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `mirror` section of config.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Whether the binary cache is used (defaults to true)
    #[serde(default)]
    pub enable: Option<bool>,

    /// GPG key used to sign packages pushed to the cache
    #[serde(default)]
    pub key: Option<PathBuf>,
}

impl MirrorConfig {
    /// Whether mirroring is enabled
    pub fn enabled(&self) -> bool {
        self.enable.unwrap_or(true)
    }
}

/// `spack` section as written in config.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSpackConfig {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
}

/// Spack checkout to build with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpackConfig {
    /// Repository URL to clone
    pub repo: String,

    /// Branch, tag or commit to check out; the clone's default branch is
    /// used when absent
    pub commit: Option<String>,
}

/// config.yaml as written by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
    #[serde(default)]
    pub store: Option<PathBuf>,
    #[serde(default)]
    pub spack: Option<RawSpackConfig>,
    #[serde(default)]
    pub modules: Option<PathBuf>,
}

/// Validated top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeConfig {
    /// Target system
    pub system: SystemName,

    /// Mirror settings; `None` when the recipe has no mirror section
    pub mirror: Option<MirrorConfig>,

    /// Installation path of the software stack
    pub store: PathBuf,

    /// Spack checkout
    pub spack: SpackConfig,

    /// Optional module installation path
    pub modules: Option<PathBuf>,
}

/// Validate a raw config.yaml
///
/// Checks run in a fixed order: mirror key, system, store, spack. The raw
/// value is left untouched.
pub fn validate(raw: &RawConfig) -> Result<RecipeConfig, ConfigError> {
    if let Some(key) = raw.mirror.as_ref().and_then(|m| m.key.as_deref()) {
        check_key_file(key)?;
    }

    let system = match raw.system.as_deref() {
        None => return Err(ConfigError::MissingSystem(SystemName::supported_list())),
        Some(name) => SystemName::parse(name).ok_or_else(|| ConfigError::UnsupportedSystem {
            name: name.to_string(),
            supported: SystemName::supported_list(),
        })?,
    };

    let store = raw.store.clone().ok_or(ConfigError::MissingField("store"))?;

    let raw_spack = raw.spack.as_ref().ok_or(ConfigError::MissingField("spack"))?;
    let repo = raw_spack
        .repo
        .clone()
        .ok_or(ConfigError::MissingField("spack.repo"))?;
    let commit = raw_spack.commit.clone().filter(|c| !c.trim().is_empty());

    Ok(RecipeConfig {
        system,
        mirror: raw.mirror.clone(),
        store,
        spack: SpackConfig { repo, commit },
        modules: raw.modules.clone(),
    })
}

fn check_key_file(key: &Path) -> Result<(), ConfigError> {
    if key.is_file() {
        Ok(())
    } else {
        Err(ConfigError::KeyFileNotFound(key.to_path_buf()))
    }
}
