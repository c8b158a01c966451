// src/recipe/compiler.rs

//! Recipe compiler
//!
//! Loads the documents of a recipe directory, runs them through the
//! validators and resolvers, and assembles the [`ResolvedRecipe`].
//!
//! # Load Order
//!
//! 1. **compilers.yaml** - compiler stages
//! 2. **packages.yaml** - package sets
//! 3. **config.yaml** - system, store, spack checkout and mirror settings
//! 4. **modules.yaml** - optional, falls back to Spack's default template
//! 5. **mirrors.yaml** - optional, recipe first, then the system config
//!
//! The first failure aborts compilation; no partial plan is returned.

use super::compilers::{resolve_compilers, CompilersDocument};
use super::config::{validate, RawConfig, SystemName};
use super::mirror::{find_mirror_source, MirrorPolicy};
use super::packages::{resolve_package_sets, PackagesDocument};
use super::parser::parse_document_file;
use super::plan::ResolvedRecipe;
use crate::error::{Error, RecipeFile, Result};
use crate::report::Reporter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Location of Spack's own module template inside a build directory
pub const DEFAULT_MODULES_TEMPLATE: &str = "spack/etc/spack/defaults/modules.yaml";

/// Compiles recipe directories into build plans
pub struct RecipeCompiler {
    /// Installation root holding the cluster configurations
    prefix: PathBuf,

    /// Where diagnostics go
    reporter: Arc<dyn Reporter>,
}

impl RecipeCompiler {
    /// Create a compiler for the given installation prefix
    pub fn new(prefix: impl Into<PathBuf>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            prefix: prefix.into(),
            reporter,
        }
    }

    /// Default configuration directory for a target system
    pub fn system_config_dir(&self, system: SystemName) -> PathBuf {
        self.prefix
            .join("share")
            .join("cluster-config")
            .join(system.as_str())
    }

    /// Compile the recipe in `recipe_dir` for a build in `build_dir`
    pub fn compile(
        &self,
        recipe_dir: impl AsRef<Path>,
        build_dir: impl AsRef<Path>,
    ) -> Result<ResolvedRecipe> {
        self.reporter.debug("Generating recipe");

        let path = absolute(recipe_dir.as_ref())?;
        if !path.is_dir() {
            return Err(Error::RecipeNotFound(path));
        }

        let compilers_path = self.require(&path, RecipeFile::Compilers)?;
        let compilers_doc: CompilersDocument = parse_document_file(&compilers_path)?;
        let raw_compilers = compilers_doc
            .compilers
            .ok_or_else(|| Error::missing_field(RecipeFile::Compilers.file_name(), "compilers"))?;
        let compilers = resolve_compilers(&raw_compilers)?;

        let packages_path = self.require(&path, RecipeFile::Packages)?;
        let packages_doc: PackagesDocument = parse_document_file(&packages_path)?;
        let raw_packages = packages_doc
            .packages
            .ok_or_else(|| Error::missing_field(RecipeFile::Packages.file_name(), "packages"))?;
        let packages = resolve_package_sets(&raw_packages)?;

        let config_path = self.require(&path, RecipeFile::Config)?;
        let raw_config: RawConfig = parse_document_file(&config_path)?;
        let config = validate(&raw_config)?;

        let modules = self.modules_template(&path, build_dir.as_ref())?;

        let system_config_dir = self.system_config_dir(config.system);
        let mirror_source = find_mirror_source(&path, &system_config_dir);
        if let Some(source) = &mirror_source {
            self.reporter
                .debug(&format!("mirror configuration found at {}", source.display()));
        }
        let mirror = MirrorPolicy::resolve(config.mirror.as_ref(), mirror_source);
        if mirror.enabled() && mirror.source().is_none() {
            self.reporter
                .warn("mirror enabled but no mirrors.yaml found, building without a cache");
        }

        Ok(ResolvedRecipe {
            path,
            config,
            mirror,
            compilers,
            packages,
            modules,
            system_config_dir,
        })
    }

    /// Path of a required recipe document, or the error naming it
    fn require(&self, recipe_dir: &Path, file: RecipeFile) -> Result<PathBuf> {
        let path = recipe_dir.join(file.file_name());
        self.reporter.debug(&format!("opening {}", path.display()));

        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::MissingRecipeFile { file, path })
        }
    }

    fn modules_template(&self, recipe_dir: &Path, build_dir: &Path) -> Result<PathBuf> {
        let path = recipe_dir.join(RecipeFile::Modules.file_name());
        self.reporter.debug(&format!("opening {}", path.display()));

        if path.is_file() {
            return Ok(path);
        }

        let fallback = absolute(build_dir)?.join(DEFAULT_MODULES_TEMPLATE);
        self.reporter.debug(&format!(
            "no modules.yaml provided - using the {}",
            fallback.display()
        ));
        Ok(fallback)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
