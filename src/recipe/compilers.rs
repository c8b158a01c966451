// src/recipe/compilers.rs

//! Compiler stage resolution (`compilers.yaml`)
//!
//! The compiler toolchain is bootstrapped in a strict order:
//!
//! 1. **bootstrap** - a minimal gcc built with the system compiler
//! 2. **gcc** - the release gcc, built with the bootstrap compiler
//! 3. **llvm** (optional) - llvm/nvhpc, built with a gcc from stage 2
//!
//! Each stage becomes its own Spack environment. This module turns the
//! user's short description of each stage into the full specs and package
//! settings those environments need.

use crate::error::{Error, RecipeFile, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Tools taken from the host instead of being built in the compiler stages
pub const EXTERNAL_TOOLS: &[&str] = &[
    "perl", "m4", "autoconf", "automake", "libtool", "gawk", "python", "texinfo",
];

/// Auxiliary spec always built alongside the bootstrap compiler
pub const SQUASHFS_SPEC: &str = "squashfs default_compression=zstd";

/// Suffix added to the first bootstrap spec
const BOOTSTRAP_LANGUAGES: &str = "languages=c,c++";

const NVHPC_SUFFIX: &str = "~mpi~blas~lapack";
const LLVM_SUFFIX: &str = " +clang targets=x86 ~gold ^ninja@kitware";

/// Compiler bootstrap stages in build order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Bootstrap,
    Gcc,
    Llvm,
}

impl StageName {
    /// Name used for the stage's directory and Makefile targets
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Gcc => "gcc",
            Self::Llvm => "llvm",
        }
    }

    /// Whether the stage's compilers are part of the released stack
    pub fn is_release(&self) -> bool {
        !matches!(self, Self::Bootstrap)
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// compilers.yaml document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompilersDocument {
    #[serde(default)]
    pub compilers: Option<RawCompilers>,
}

/// The `compilers` mapping as written by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawCompilers {
    #[serde(default)]
    pub bootstrap: Option<RawStage>,
    #[serde(default)]
    pub gcc: Option<RawStage>,
    #[serde(default)]
    pub llvm: Option<RawStage>,
}

/// A single stage as written by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawStage {
    #[serde(default)]
    pub specs: Option<Vec<String>>,
    #[serde(default)]
    pub requires: Option<String>,
}

impl RawStage {
    fn specs(&self) -> &[String] {
        self.specs.as_deref().unwrap_or_default()
    }
}

/// Package settings applied inside a stage's environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePackages {
    /// Packages taken from the host
    pub external: Vec<String>,

    /// Variant overrides, package name to variant string
    pub variants: IndexMap<String, String>,
}

impl StagePackages {
    fn toolchain(gcc_variants: &str) -> Self {
        let variants = [
            ("gcc", gcc_variants),
            ("mpc", "[libs=static]"),
            ("gmp", "[libs=static]"),
            ("mpfr", "[libs=static]"),
            ("zstd", "[libs=static]"),
            ("zlib", "[~shared]"),
        ]
        .into_iter()
        .map(|(name, variant)| (name.to_string(), variant.to_string()))
        .collect();

        Self {
            external: EXTERNAL_TOOLS.iter().map(|t| t.to_string()).collect(),
            variants,
        }
    }

    /// Settings for the bootstrap compiler
    pub fn bootstrap() -> Self {
        Self::toolchain("[build_type=Release ~bootstrap +strip]")
    }

    /// Settings for the release gcc
    pub fn release() -> Self {
        Self::toolchain("[build_type=Release +profiled +strip]")
    }
}

/// A fully resolved compiler stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerStage {
    /// Which stage this is
    pub name: StageName,

    /// Specs to install, in order
    pub specs: Vec<String>,

    /// Package settings; `None` for stages without overrides
    pub packages: Option<StagePackages>,

    /// Spec of the compiler this stage is built with
    pub requires: Option<String>,
}

/// All resolved compiler stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerStages {
    pub bootstrap: CompilerStage,
    pub gcc: CompilerStage,
    pub llvm: Option<CompilerStage>,
}

impl CompilerStages {
    /// Stages in build order
    pub fn iter(&self) -> impl Iterator<Item = &CompilerStage> {
        [Some(&self.bootstrap), Some(&self.gcc), self.llvm.as_ref()]
            .into_iter()
            .flatten()
    }

    /// Names of all configured stages, in build order
    pub fn names(&self) -> Vec<StageName> {
        self.iter().map(|s| s.name).collect()
    }

    /// Names of the stages whose compilers are released to users
    pub fn release_names(&self) -> Vec<StageName> {
        self.iter()
            .map(|s| s.name)
            .filter(StageName::is_release)
            .collect()
    }
}

/// Resolve the compiler stages of a recipe
pub fn resolve_compilers(raw: &RawCompilers) -> Result<CompilerStages> {
    let missing = |field: &str| Error::missing_field(RecipeFile::Compilers.file_name(), field);

    let raw_bootstrap = raw.bootstrap.as_ref().ok_or_else(|| missing("bootstrap"))?;
    let raw_gcc = raw.gcc.as_ref().ok_or_else(|| missing("gcc"))?;

    let bootstrap_spec = raw_bootstrap
        .specs()
        .first()
        .ok_or_else(|| missing("bootstrap.specs"))?;

    let bootstrap = CompilerStage {
        name: StageName::Bootstrap,
        specs: vec![
            format!("{} {}", bootstrap_spec, BOOTSTRAP_LANGUAGES),
            SQUASHFS_SPEC.to_string(),
        ],
        packages: Some(StagePackages::bootstrap()),
        requires: None,
    };

    let gcc = CompilerStage {
        name: StageName::Gcc,
        specs: raw_gcc.specs().to_vec(),
        packages: Some(StagePackages::release()),
        requires: Some(bootstrap_spec.clone()),
    };

    let llvm = raw.llvm.as_ref().map(resolve_llvm).transpose()?;

    Ok(CompilerStages {
        bootstrap,
        gcc,
        llvm,
    })
}

fn resolve_llvm(raw: &RawStage) -> Result<CompilerStage> {
    // `requires` is trusted as written; it is not checked against stage names
    let requires = raw.requires.clone().ok_or_else(|| {
        Error::missing_field(RecipeFile::Compilers.file_name(), "llvm.requires")
    })?;

    let specs = raw
        .specs()
        .iter()
        .map(|spec| llvm_spec(spec))
        .collect();

    Ok(CompilerStage {
        name: StageName::Llvm,
        specs,
        packages: None,
        requires: Some(requires),
    })
}

fn llvm_spec(spec: &str) -> String {
    if spec.starts_with("nvhpc") {
        format!("{}{}", spec, NVHPC_SUFFIX)
    } else if spec.starts_with("llvm") {
        format!("{}{}", spec, LLVM_SUFFIX)
    } else {
        spec.to_string()
    }
}
