// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const COMPILERS_YAML: &str = r#"
compilers:
  bootstrap:
    specs:
      - gcc@11
  gcc:
    specs:
      - gcc@11
  llvm:
    requires: gcc@11
    specs:
      - nvhpc@22.7
      - llvm@14
"#;

pub const PACKAGES_YAML: &str = r#"
packages:
  tools:
    specs:
      - cmake
      - python@3.10
  gcc-env:
    specs:
      - hdf5+mpi
      - fftw
    mpi: mpich
  cuda-env:
    specs:
      - cuda@11.8
    mpi: mvapich2@2.3.7
    gpu: cuda
"#;

pub const CONFIG_YAML: &str = r#"
system: hohgant
store: /user-environment
spack:
  repo: https://github.com/spack/spack.git
  commit: releases/v0.19
"#;

pub const MODULES_YAML: &str = r#"
modules:
  default:
    arch_folder: false
    roots:
      tcl: /placeholder
    tcl:
      all:
        autoload: none
"#;

/// A prefix, a recipe directory and a build path inside a temporary directory.
///
/// Keep the fixture alive for as long as the paths are used.
pub struct Fixture {
    pub temp: TempDir,
    pub prefix: PathBuf,
    pub recipe: PathBuf,
    pub build: PathBuf,
}

impl Fixture {
    /// System configuration directory of the fixture's system
    pub fn system_config(&self) -> PathBuf {
        self.prefix.join("share/cluster-config/hohgant")
    }

    /// Write a file in the recipe directory
    pub fn write_recipe(&self, name: &str, content: &str) {
        write(&self.recipe.join(name), content);
    }

    /// Remove a file from the recipe directory
    pub fn remove_recipe(&self, name: &str) {
        fs::remove_file(self.recipe.join(name)).unwrap();
    }
}

/// Write a file, creating parent directories
pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Create a complete prefix and recipe.
pub fn setup_fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let prefix = temp.path().join("prefix");
    let recipe = temp.path().join("recipe");
    let build = temp.path().join("build");

    let system = prefix.join("share/cluster-config/hohgant");
    write(&system.join("compilers.yaml"), "compilers: []\n");
    write(&system.join("packages.yaml"), "packages:\n  all:\n    target: [zen2]\n");
    write(&system.join("upstreams.yaml"), "upstreams: {}\n");

    write(&prefix.join("etc/Make.inc"), "# make include\n");
    write(&prefix.join("etc/bwrap-mutable-root.sh"), "#!/bin/bash\n");
    write(&prefix.join("repo/repo.yaml"), "repo:\n  namespace: alps\n");
    write(&prefix.join("repo/packages/cray-mpich-binary/package.py"), "# package\n");

    write(&recipe.join("compilers.yaml"), COMPILERS_YAML);
    write(&recipe.join("packages.yaml"), PACKAGES_YAML);
    write(&recipe.join("config.yaml"), CONFIG_YAML);
    write(&recipe.join("modules.yaml"), MODULES_YAML);

    Fixture {
        temp,
        prefix,
        recipe,
        build,
    }
}
