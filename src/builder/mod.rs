// src/builder/mod.rs

//! Build directory generation
//!
//! The builder takes a [`ResolvedRecipe`] and writes out everything needed
//! to build the stack with Spack and make. It makes no decisions of its own:
//! every choice (which mirror to install, which stages exist, where modules
//! go) is read from the plan.
//!
//! # Output
//!
//! ```text
//! <build>/
//! ├── Makefile, Make.user               build driver (see [`Makefiles`])
//! ├── Make.inc, bwrap-mutable-root.sh   copied from <prefix>/etc
//! ├── plan.yaml                         stage order, package sets, cache settings
//! ├── spack/                            Spack checkout
//! ├── store/repo/                       custom package repository
//! ├── tmp/
//! ├── config/                           system configuration (+ mirrors.yaml, repos.yaml)
//! ├── compilers/Makefile, <stage>/spack.yaml
//! ├── packages/Makefile, <set>/spack.yaml
//! ├── generate-config/Makefile
//! └── modules/modules.yaml
//! ```

mod environment;
mod layout;
mod makefile;
mod spack;

pub use environment::{Concretizer, PackageSettings, SpackEnvironment, SpackSection};
pub use layout::{BuildLayout, PrefixLayout};
pub use makefile::{Makefiles, CACHE_MIRROR};
pub use spack::SpackCheckout;

use crate::error::RecipeFile;
use crate::recipe::{ResolvedRecipe, StageName};
use crate::report::Reporter;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Something that turns a build plan into files
pub trait BuildPlanEmitter {
    fn emit(&self, recipe: &ResolvedRecipe) -> Result<()>;
}

/// Writes a build directory for a resolved recipe
pub struct Builder {
    layout: BuildLayout,
    prefix: PrefixLayout,
    reporter: Arc<dyn Reporter>,
    checkout: bool,
}

impl Builder {
    /// Create a builder for `path`, using assets from `prefix`
    ///
    /// The build path may not exist yet, but if it does it must be a
    /// directory.
    pub fn new(
        path: impl AsRef<Path>,
        prefix: impl Into<PathBuf>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        let path = std::path::absolute(path.as_ref())
            .with_context(|| format!("invalid build path {}", path.as_ref().display()))?;

        if path.exists() && !path.is_dir() {
            bail!("build path {} is not a directory", path.display());
        }

        Ok(Self {
            layout: BuildLayout::new(path),
            prefix: PrefixLayout::new(prefix),
            reporter,
            checkout: true,
        })
    }

    /// Enable or disable cloning and checking out Spack
    pub fn with_checkout(mut self, checkout: bool) -> Self {
        self.checkout = checkout;
        self
    }

    /// Absolute path of the build directory
    pub fn path(&self) -> &Path {
        self.layout.root()
    }

    /// Write the build directory
    pub fn generate(&self, recipe: &ResolvedRecipe) -> Result<()> {
        for dir in [
            self.layout.root().to_path_buf(),
            self.layout.store(),
            self.layout.tmp(),
        ] {
            create_dir(&dir)?;
        }

        if self.checkout {
            SpackCheckout::new(&recipe.config().spack, self.layout.spack(), &*self.reporter)
                .ensure()?;
        } else {
            self.reporter.debug("spack: checkout skipped");
        }

        for name in PrefixLayout::ETC_FILES {
            copy_file(&self.prefix.etc().join(name), &self.layout.root().join(name))?;
        }

        self.write_system_config(recipe)?;
        self.install_repo(recipe)?;
        self.write_compilers(recipe)?;
        self.write_package_sets(recipe)?;
        self.write_modules(recipe)?;

        let plan = PlanSummary::new(self.path(), recipe);
        write_yaml(&self.layout.plan(), &plan)?;
        self.write_makefiles(&plan)?;

        Ok(())
    }

    /// Copy the system configuration, then the selected mirror definition
    fn write_system_config(&self, recipe: &ResolvedRecipe) -> Result<()> {
        let config_path = self.layout.config();
        create_dir(&config_path)?;

        let system_config = recipe.system_config_dir();
        let entries = fs::read_dir(system_config).with_context(|| {
            format!(
                "Failed to read system configuration {}",
                system_config.display()
            )
        })?;

        for entry in entries {
            let entry = entry?;
            // mirrors.yaml is only installed from the mirror policy below
            if entry.file_name() == RecipeFile::Mirrors.file_name() {
                continue;
            }
            if entry.file_type()?.is_file() {
                copy_file(&entry.path(), &config_path.join(entry.file_name()))?;
            }
        }

        if let Some(source) = recipe.mirror().source() {
            self.reporter
                .info(&format!("using mirror configuration {}", source.display()));
            copy_file(source, &config_path.join(RecipeFile::Mirrors.file_name()))?;
        }

        Ok(())
    }

    /// Replace the store's package repository and register it with Spack
    fn install_repo(&self, recipe: &ResolvedRecipe) -> Result<()> {
        let repo_dst = self.layout.store().join("repo");
        if repo_dst.exists() {
            fs::remove_dir_all(&repo_dst)
                .with_context(|| format!("Failed to remove {}", repo_dst.display()))?;
        }
        copy_tree(&self.prefix.repo(), &repo_dst)?;

        let repo_path = recipe.config().store.join("repo");
        let repos = ReposYaml {
            repos: vec![repo_path.to_string_lossy().into_owned()],
        };
        write_yaml(&self.layout.config().join("repos.yaml"), &repos)
    }

    fn write_compilers(&self, recipe: &ResolvedRecipe) -> Result<()> {
        create_dir(&self.layout.compilers())?;
        for stage in recipe.compilers().iter() {
            let dir = self.layout.compiler(stage.name);
            create_dir(&dir)?;
            write_yaml(&dir.join("spack.yaml"), &SpackEnvironment::for_stage(stage))?;
        }
        Ok(())
    }

    fn write_package_sets(&self, recipe: &ResolvedRecipe) -> Result<()> {
        create_dir(&self.layout.packages())?;
        for (name, set) in recipe.packages() {
            let dir = self.layout.package_set(name);
            create_dir(&dir)?;
            write_yaml(&dir.join("spack.yaml"), &SpackEnvironment::for_package_set(set))?;
        }
        Ok(())
    }

    fn write_modules(&self, recipe: &ResolvedRecipe) -> Result<()> {
        let modules = recipe.generate_modules()?;
        let dir = self.layout.modules();
        create_dir(&dir)?;
        write_file(&dir.join("modules.yaml"), &modules)
    }

    fn write_makefiles(&self, plan: &PlanSummary) -> Result<()> {
        let makefiles = Makefiles::new(plan);
        let root = self.layout.root();

        write_file(&root.join("Makefile"), &makefiles.top_level()?)?;
        write_file(&root.join("Make.user"), &makefiles.make_user()?)?;
        write_file(&self.layout.compilers().join("Makefile"), &makefiles.compilers()?)?;
        write_file(&self.layout.packages().join("Makefile"), &makefiles.packages()?)?;

        let generate_config = self.layout.generate_config();
        create_dir(&generate_config)?;
        write_file(&generate_config.join("Makefile"), &makefiles.generate_config()?)
    }
}

impl BuildPlanEmitter for Builder {
    fn emit(&self, recipe: &ResolvedRecipe) -> Result<()> {
        self.generate(recipe)
    }
}

/// config/repos.yaml
#[derive(Debug, Serialize)]
struct ReposYaml {
    repos: Vec<String>,
}

/// Everything the build needs to know about a plan
///
/// Written to `plan.yaml` and rendered into the Makefiles.
#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub build_path: PathBuf,
    pub store: PathBuf,
    pub all_compilers: Vec<StageName>,
    pub release_compilers: Vec<StageName>,
    pub requires: Vec<StageRequirement>,
    pub environments: Vec<String>,
    pub modules: Option<PathBuf>,
    pub cache: CacheSummary,
}

/// Which compiler a stage is built with
#[derive(Debug, Serialize)]
pub struct StageRequirement {
    pub stage: StageName,
    pub requires: Option<String>,
}

/// Binary cache settings
#[derive(Debug, Serialize)]
pub struct CacheSummary {
    pub enabled: bool,
    pub mirror: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub push_to_cache: bool,
}

impl PlanSummary {
    pub fn new(build_path: &Path, recipe: &ResolvedRecipe) -> Self {
        let compilers = recipe.compilers();
        let mirror = recipe.mirror();

        Self {
            build_path: build_path.to_path_buf(),
            store: recipe.config().store.clone(),
            all_compilers: compilers.names(),
            release_compilers: compilers.release_names(),
            requires: compilers
                .iter()
                .map(|stage| StageRequirement {
                    stage: stage.name,
                    requires: stage.requires.clone(),
                })
                .collect(),
            environments: recipe.packages().keys().cloned().collect(),
            modules: recipe.config().modules.clone(),
            cache: CacheSummary {
                enabled: mirror.source().is_some(),
                mirror: mirror.source().map(Path::to_path_buf),
                key: mirror.key().map(Path::to_path_buf),
                push_to_cache: mirror.push_to_cache(),
            },
        }
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_yaml::to_string(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_file(path, &content)
}

/// Recursively copy a directory tree
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        bail!("directory {} does not exist", src.display());
    }

    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel_path = entry.path().strip_prefix(src)?;
        let target = dst.join(rel_path);

        if entry.file_type().is_dir() {
            create_dir(&target)?;
        } else if entry.file_type().is_file() {
            copy_file(entry.path(), &target)?;
        }
    }

    Ok(())
}
