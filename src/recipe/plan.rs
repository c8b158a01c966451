// src/recipe/plan.rs

//! The resolved build plan

use super::compilers::CompilerStages;
use super::config::RecipeConfig;
use super::mirror::MirrorPolicy;
use super::packages::PackageSet;
use super::parser::parse_document_file;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// A fully resolved recipe, ready to be written out as a build directory
///
/// Produced by [`RecipeCompiler::compile`](super::RecipeCompiler::compile)
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRecipe {
    pub(super) path: PathBuf,
    pub(super) config: RecipeConfig,
    pub(super) mirror: MirrorPolicy,
    pub(super) compilers: CompilerStages,
    pub(super) packages: IndexMap<String, PackageSet>,
    pub(super) modules: PathBuf,
    pub(super) system_config_dir: PathBuf,
}

impl ResolvedRecipe {
    /// Absolute path of the recipe directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validated config.yaml
    pub fn config(&self) -> &RecipeConfig {
        &self.config
    }

    /// Binary cache policy
    pub fn mirror(&self) -> &MirrorPolicy {
        &self.mirror
    }

    /// Compiler stages in build order
    pub fn compilers(&self) -> &CompilerStages {
        &self.compilers
    }

    /// Package sets in declaration order
    pub fn packages(&self) -> &IndexMap<String, PackageSet> {
        &self.packages
    }

    /// Module template the modules.yaml is generated from
    pub fn modules(&self) -> &Path {
        &self.modules
    }

    /// Default Spack configuration for the target system
    ///
    /// Not checked for existence here; the builder reads it.
    pub fn system_config_dir(&self) -> &Path {
        &self.system_config_dir
    }

    /// Whether packages built by this recipe are pushed to the binary cache
    pub fn push_to_cache(&self) -> bool {
        self.mirror.push_to_cache()
    }

    /// Render modules.yaml from the module template
    ///
    /// The template is passed through unchanged except for the tcl module
    /// root, which is placed inside the store.
    pub fn generate_modules(&self) -> Result<String> {
        if !self.modules.is_file() {
            return Err(Error::ModuleTemplateNotFound(self.modules.clone()));
        }

        let mut template: Value = parse_document_file(&self.modules)?;
        let document = self.modules.display().to_string();

        let default = template
            .get_mut("modules")
            .and_then(|modules| modules.get_mut("default"))
            .and_then(Value::as_mapping_mut)
            .ok_or_else(|| Error::missing_field(document.clone(), "modules.default"))?;

        let roots = default
            .entry(Value::from("roots"))
            .or_insert(Value::Mapping(Mapping::new()))
            .as_mapping_mut()
            .ok_or_else(|| Error::missing_field(document, "modules.default.roots"))?;

        let tcl_root = self.config.store.join("modules");
        roots.insert(
            Value::from("tcl"),
            Value::from(tcl_root.to_string_lossy().into_owned()),
        );

        serde_yaml::to_string(&template).map_err(|source| Error::Serialize {
            what: "modules.yaml",
            source,
        })
    }
}
