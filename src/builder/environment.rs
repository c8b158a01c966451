// src/builder/environment.rs

//! Spack environment documents (`spack.yaml`)
//!
//! Every compiler stage and every package set is installed from its own
//! Spack environment. The documents are built as typed values and
//! serialized, so the output is always well-formed YAML.

use crate::recipe::{CompilerStage, PackageSet};
use indexmap::IndexMap;
use serde::Serialize;

const COMPILERS_YAML: &str = "compilers.yaml";
const PACKAGES_YAML: &str = "packages.yaml";

/// A complete spack.yaml
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpackEnvironment {
    pub spack: SpackSection,
}

/// The `spack:` section of an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpackSection {
    /// Configuration files written next to spack.yaml by the Makefiles
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    pub specs: Vec<String>,
    pub view: bool,
    pub concretizer: Concretizer,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub packages: IndexMap<String, PackageSettings>,
}

/// Concretizer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Concretizer {
    pub unify: bool,
    pub reuse: bool,
}

impl Default for Concretizer {
    fn default() -> Self {
        Self {
            unify: true,
            reuse: false,
        }
    }
}

/// Per-package settings under `packages:`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buildable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<String>,
}

impl SpackEnvironment {
    /// Environment for a compiler stage
    ///
    /// Host tools are marked non-buildable so they are picked up as
    /// externals, and the stage's variant overrides are applied.
    pub fn for_stage(stage: &CompilerStage) -> Self {
        let mut packages = IndexMap::new();
        let mut include = vec![COMPILERS_YAML.to_string()];

        if let Some(settings) = &stage.packages {
            include.push(PACKAGES_YAML.to_string());
            for tool in &settings.external {
                packages.insert(
                    tool.clone(),
                    PackageSettings {
                        buildable: Some(false),
                        variants: None,
                    },
                );
            }
            for (name, variants) in &settings.variants {
                packages.entry(name.clone()).or_default().variants = Some(variants.clone());
            }
        }

        Self {
            spack: SpackSection {
                include,
                specs: stage.specs.clone(),
                view: false,
                concretizer: Concretizer::default(),
                packages,
            },
        }
    }

    /// Environment for a package set
    pub fn for_package_set(set: &PackageSet) -> Self {
        Self {
            spack: SpackSection {
                include: vec![COMPILERS_YAML.to_string()],
                specs: set.specs.clone(),
                view: false,
                concretizer: Concretizer::default(),
                packages: IndexMap::new(),
            },
        }
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
