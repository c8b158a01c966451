// src/lib.rs

//! Stackinator
//!
//! Compiles a software stack recipe (compilers, MPI, GPU options, package
//! sets, binary cache policy) into a build directory that Spack and make
//! turn into an installed stack.
//!
//! # Architecture
//!
//! - Recipe compiler: validates the recipe documents and resolves every
//!   implicit default into a [`ResolvedRecipe`]
//! - Builder: writes the build directory from a resolved recipe
//! - Reporter: diagnostics are passed in, never written to a global logger

pub mod builder;
mod error;
pub mod recipe;
pub mod report;

pub use builder::{BuildPlanEmitter, Builder};
pub use error::{ConfigError, Error, ErrorKind, RecipeFile, Result};
pub use recipe::{
    CompilerStage, CompilerStages, MirrorPolicy, PackageSet, RecipeCompiler, RecipeConfig,
    ResolvedRecipe, StageName, SystemName,
};
pub use report::{CallbackReporter, LogReporter, ReportEvent, ReportLevel, Reporter, SilentReporter};
