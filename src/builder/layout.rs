// src/builder/layout.rs

//! Directory layout of a build directory and of the installation prefix

use crate::recipe::StageName;
use std::path::{Path, PathBuf};

/// Paths inside a build directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    root: PathBuf,
}

impl BuildLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> PathBuf {
        self.root.join("store")
    }

    pub fn tmp(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn spack(&self) -> PathBuf {
        self.root.join("spack")
    }

    /// Spack configuration scope shared by all environments
    pub fn config(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn compilers(&self) -> PathBuf {
        self.root.join("compilers")
    }

    pub fn compiler(&self, stage: StageName) -> PathBuf {
        self.compilers().join(stage.as_str())
    }

    pub fn packages(&self) -> PathBuf {
        self.root.join("packages")
    }

    pub fn package_set(&self, name: &str) -> PathBuf {
        self.packages().join(name)
    }

    /// Configuration shipped inside the finished store
    pub fn generate_config(&self) -> PathBuf {
        self.root.join("generate-config")
    }

    pub fn modules(&self) -> PathBuf {
        self.root.join("modules")
    }

    /// Summary of the resolved plan
    pub fn plan(&self) -> PathBuf {
        self.root.join("plan.yaml")
    }
}

/// Paths inside the installation prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixLayout {
    root: PathBuf,
}

impl PrefixLayout {
    /// Files copied verbatim from `etc/` into the build directory
    pub const ETC_FILES: &'static [&'static str] = &["Make.inc", "bwrap-mutable-root.sh"];

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn etc(&self) -> PathBuf {
        self.root.join("etc")
    }

    /// Custom Spack package repository
    pub fn repo(&self) -> PathBuf {
        self.root.join("repo")
    }
}
