// src/recipe/mod.rs

//! Recipe compilation
//!
//! A recipe is a directory of YAML documents describing a software stack:
//! - `compilers.yaml`: the compiler bootstrap stages
//! - `packages.yaml`: package sets, each with optional MPI and GPU settings
//! - `config.yaml`: target system, store path, Spack checkout, mirror
//! - `modules.yaml` (optional): module file template
//! - `mirrors.yaml` (optional): binary cache definition
//!
//! Compiling a recipe validates these documents and resolves every implicit
//! default into a [`ResolvedRecipe`] that the builder writes out.
//!
//! # Example Recipe
//!
//! ```yaml
//! # compilers.yaml
//! compilers:
//!   bootstrap:
//!     specs: [gcc@11]
//!   gcc:
//!     specs: [gcc@11]
//!   llvm:
//!     requires: gcc@11
//!     specs: [nvhpc@22.7, llvm@14]
//!
//! # packages.yaml
//! packages:
//!   gcc-env:
//!     specs: [hdf5+mpi, fftw]
//!     mpi: mpich
//!     gpu: cuda
//! ```

mod compiler;
pub mod compilers;
pub mod config;
pub mod mirror;
pub mod packages;
pub mod parser;
mod plan;

pub use compiler::{RecipeCompiler, DEFAULT_MODULES_TEMPLATE};
pub use compilers::{
    resolve_compilers, CompilerStage, CompilerStages, StageName, StagePackages, EXTERNAL_TOOLS,
};
pub use config::{validate, MirrorConfig, RawConfig, RecipeConfig, SpackConfig, SystemName};
pub use mirror::{find_mirror_source, MirrorPolicy};
pub use packages::{mpi_spec, resolve_package_sets, PackageSet};
pub use plan::ResolvedRecipe;
