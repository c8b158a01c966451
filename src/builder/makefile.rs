// src/builder/makefile.rs

//! Makefiles that drive the build
//!
//! Everything is rendered from the [`PlanSummary`], so the Makefiles and
//! `plan.yaml` always agree. Each environment directory gets its own
//! `compilers.yaml` (and `packages.yaml` for stages with host tools) written
//! by Spack with the user scope pointed at that directory; the rendered
//! `spack.yaml` includes them.
//!
//! ```text
//! Makefile                  spack-setup -> mirror-setup -> compilers -> packages
//!                           -> generate-config -> modules -> store.squashfs
//! Make.user                 paths and tool variables shared by all Makefiles
//! compilers/Makefile        one environment per compiler stage
//! packages/Makefile         one environment per package set
//! generate-config/Makefile  Spack configuration shipped inside the store
//! ```

use super::PlanSummary;
use crate::recipe::{StageName, EXTERNAL_TOOLS};
use anyhow::Result;
use std::fmt::Write;

/// Name of the build cache mirror packages are pushed to
pub const CACHE_MIRROR: &str = "alpscache";

/// Renders the Makefiles of a build directory
pub struct Makefiles<'a> {
    plan: &'a PlanSummary,
}

impl<'a> Makefiles<'a> {
    pub fn new(plan: &'a PlanSummary) -> Self {
        Self { plan }
    }

    /// Top-level Makefile
    pub fn top_level(&self) -> Result<String> {
        let cache = &self.plan.cache;
        let mut out = String::new();

        writeln!(out, "-include Make.user")?;
        writeln!(out)?;
        writeln!(out, ".PHONY: compilers packages generate-config modules clean")?;
        writeln!(out)?;
        writeln!(out, "all: store.squashfs")?;
        writeln!(out)?;
        writeln!(out, "# Keep track of the spack version used to build the stack")?;
        writeln!(out, "spack-version:")?;
        writeln!(out, "\t$(SANDBOX) $(SPACK) --version > $@")?;
        writeln!(out)?;
        writeln!(out, "spack-setup: spack-version")?;
        writeln!(out, "\ttouch $@")?;
        writeln!(out)?;
        writeln!(out, "mirror-setup: spack-setup")?;
        if cache.enabled {
            writeln!(out, "\t$(SANDBOX) $(SPACK) buildcache keys --install --trust")?;
            if let Some(key) = &cache.key {
                writeln!(out, "\t$(SANDBOX) $(SPACK) gpg trust {}", key.display())?;
            }
        }
        writeln!(out, "\ttouch $@")?;
        writeln!(out)?;
        writeln!(out, "compilers: mirror-setup")?;
        writeln!(out, "\t$(SANDBOX) $(MAKE) -C $@")?;
        writeln!(out)?;
        writeln!(out, "packages: compilers")?;
        writeln!(out, "\t$(SANDBOX) $(MAKE) -C $@")?;
        writeln!(out)?;
        writeln!(out, "generate-config: packages")?;
        writeln!(out, "\t$(SANDBOX) $(MAKE) -C $@")?;
        writeln!(out)?;
        writeln!(out, "modules: generate-config")?;
        writeln!(
            out,
            "\t$(SANDBOX) $(SPACK) -C $(BUILD_ROOT)/modules module tcl refresh --upstream-modules --delete-tree --yes-to-all"
        )?;
        writeln!(out)?;
        writeln!(out, "store.squashfs: modules")?;
        writeln!(
            out,
            "\t$(SANDBOX) \"$$($(SANDBOX) $(SPACK_HELPER) -e ./compilers/{} find --format='{{prefix}}' squashfs | head -n1)/bin/mksquashfs\" $(STORE) $@ -all-root -no-recovery -noappend -Xcompression-level 3",
            StageName::Bootstrap
        )?;
        writeln!(out)?;
        writeln!(out, "clean:")?;
        writeln!(
            out,
            "\trm -rf -- $(wildcard */*/spack.lock) $(wildcard */*/.spack-env) $(wildcard */*/Makefile) $(wildcard */*/generated) $(wildcard */*/compilers.yaml) $(wildcard */*/packages.yaml) spack-version spack-setup mirror-setup store.squashfs"
        )?;
        writeln!(out)?;
        writeln!(out, "include Make.inc")?;

        Ok(out)
    }

    /// Make.user, the variables shared by every Makefile
    pub fn make_user(&self) -> Result<String> {
        let mut out = String::new();

        writeln!(out, "# vim: filetype=make")?;
        writeln!(out)?;
        writeln!(out, "BUILD_ROOT := {}", self.plan.build_path.display())?;
        writeln!(out, "STORE := {}", self.plan.store.display())?;
        writeln!(out)?;
        writeln!(out, "SPACK := spack")?;
        writeln!(out, "SPACK_HELPER := $(SPACK) --color=never")?;
        writeln!(out)?;
        writeln!(out, "# Run spack with its user scope in the directory of the target")?;
        writeln!(out, "SPACK_SCOPED = SPACK_USER_CONFIG_PATH=$(dir $@) $(SPACK)")?;
        writeln!(out)?;
        writeln!(out, "SANDBOX := $(BUILD_ROOT)/bwrap-mutable-root.sh $\\")?;
        writeln!(out, "\t--tmpfs ~ $\\")?;
        writeln!(out, "\t--bind $(BUILD_ROOT)/tmp /tmp $\\")?;
        writeln!(out, "\t--bind $(BUILD_ROOT)/store $(STORE)")?;
        writeln!(out)?;
        writeln!(out, "# Directories holding compiler executables below the given prefixes")?;
        writeln!(
            out,
            "compiler_bin_dirs = $$(find $(1) '(' -name gcc -o -name clang -o -name nvc ')' -path '*/bin/*' '(' -type f -o -type l ')' -exec dirname {{}} +)"
        )?;
        writeln!(out)?;
        writeln!(out, "export SPACK_SYSTEM_CONFIG_PATH := $(BUILD_ROOT)/config")?;
        writeln!(out, "export SPACK_USER_CACHE_PATH := $(BUILD_ROOT)/cache")?;
        writeln!(out, "export SPACK_USER_CONFIG_PATH := ~")?;

        Ok(out)
    }

    /// compilers/Makefile
    ///
    /// Each stage finds the compiler it `requires` in the environment of the
    /// stage before it; the bootstrap stage uses the host compiler.
    pub fn compilers(&self) -> Result<String> {
        let stages = &self.plan.all_compilers;
        let mut out = String::new();

        write_header(&mut out)?;
        write_env_targets(&mut out, stages.iter().map(StageName::as_str), self.plan.cache.push_to_cache)?;

        let mut previous: Option<StageName> = None;
        for requirement in &self.plan.requires {
            let stage = requirement.stage;
            match (previous, &requirement.requires) {
                (Some(provider), Some(requires)) => {
                    writeln!(out, "{}/compilers.yaml: {}/generated/env", stage, provider)?;
                    writeln!(
                        out,
                        "\t$(SPACK_SCOPED) compiler find --scope=user $(call compiler_bin_dirs, $$($(SPACK_HELPER) -e ./{} find --format '{{prefix}}' {}))",
                        provider, requires
                    )?;
                }
                _ => {
                    writeln!(out, "{}/compilers.yaml:", stage)?;
                    writeln!(out, "\t$(SPACK_SCOPED) compiler find --scope=user")?;
                }
            }
            writeln!(out)?;

            if has_host_tools(stage) {
                writeln!(out, "{}/packages.yaml:", stage)?;
                writeln!(
                    out,
                    "\t$(SPACK_SCOPED) external find --scope=user {}",
                    EXTERNAL_TOOLS.join(" ")
                )?;
                writeln!(out)?;
            }

            write_env_rules(&mut out, stage.as_str(), has_host_tools(stage))?;
            previous = Some(stage);
        }

        writeln!(out, "include ../Make.inc")?;
        Ok(out)
    }

    /// packages/Makefile
    ///
    /// Every package set is built with all release compilers.
    pub fn packages(&self) -> Result<String> {
        let mut out = String::new();

        write_header(&mut out)?;
        write_env_targets(
            &mut out,
            self.plan.environments.iter().map(String::as_str),
            self.plan.cache.push_to_cache,
        )?;

        let find = self.release_compiler_prefixes("../compilers");
        for env in &self.plan.environments {
            writeln!(out, "{}/compilers.yaml:", env)?;
            writeln!(
                out,
                "\t$(SPACK_SCOPED) compiler find --scope=user $(call compiler_bin_dirs, {})",
                find
            )?;
            writeln!(out)?;
            write_env_rules(&mut out, env, false)?;
        }

        writeln!(out, "include ../Make.inc")?;
        Ok(out)
    }

    /// generate-config/Makefile
    ///
    /// Writes the Spack configuration that ships inside the store, so users
    /// can chain their own Spack to it.
    pub fn generate_config(&self) -> Result<String> {
        let mut out = String::new();

        writeln!(out, "-include ../Make.user")?;
        writeln!(out)?;
        writeln!(out, "CONFIG_DIR = $(STORE)/config")?;
        writeln!(out, "MODULE_DIR = $(BUILD_ROOT)/modules")?;
        writeln!(out)?;
        writeln!(
            out,
            "all: $(CONFIG_DIR)/upstreams.yaml $(CONFIG_DIR)/compilers.yaml $(CONFIG_DIR)/packages.yaml $(CONFIG_DIR)/repos.yaml $(CONFIG_DIR)/modules.yaml $(MODULE_DIR)/upstreams.yaml $(MODULE_DIR)/compilers.yaml"
        )?;
        writeln!(out)?;
        writeln!(out, "$(CONFIG_DIR)/upstreams.yaml:")?;
        writeln!(out, "\tmkdir -p $(CONFIG_DIR)")?;
        writeln!(
            out,
            "\t$(SPACK_SCOPED) config --scope=user add upstreams:system:install_tree:$(STORE)"
        )?;
        writeln!(out)?;
        writeln!(out, "$(CONFIG_DIR)/compilers.yaml:")?;
        writeln!(out, "\tmkdir -p $(CONFIG_DIR)")?;
        writeln!(
            out,
            "\t$(SPACK_SCOPED) compiler find --scope=user $(call compiler_bin_dirs, {})",
            self.release_compiler_prefixes("$(BUILD_ROOT)/compilers")
        )?;
        writeln!(out)?;
        for file in ["packages.yaml", "repos.yaml"] {
            writeln!(out, "$(CONFIG_DIR)/{}: $(BUILD_ROOT)/config/{}", file, file)?;
            writeln!(out, "\tinstall -D -m 644 $< $@")?;
            writeln!(out)?;
        }
        writeln!(out, "$(CONFIG_DIR)/modules.yaml: $(MODULE_DIR)/modules.yaml")?;
        writeln!(out, "\tinstall -D -m 644 $< $@")?;
        writeln!(out)?;
        writeln!(out, "$(MODULE_DIR)/%.yaml: $(CONFIG_DIR)/%.yaml")?;
        writeln!(out, "\tinstall -D -m 644 $< $@")?;

        Ok(out)
    }

    /// Shell snippet listing the install prefixes of all release compilers
    fn release_compiler_prefixes(&self, compilers_dir: &str) -> String {
        self.plan
            .release_compilers
            .iter()
            .map(|stage| {
                format!(
                    "$$($(SPACK_HELPER) -e {}/{} find --format '{{prefix}}' {})",
                    compilers_dir,
                    stage,
                    provided_compilers(*stage)
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Stages whose environment takes build tools from the host
fn has_host_tools(stage: StageName) -> bool {
    !matches!(stage, StageName::Llvm)
}

/// Compiler packages installed by a stage
fn provided_compilers(stage: StageName) -> &'static str {
    match stage {
        StageName::Bootstrap | StageName::Gcc => "gcc",
        StageName::Llvm => "llvm nvhpc",
    }
}

fn write_header(out: &mut String) -> Result<()> {
    writeln!(out, "-include ../Make.user")?;
    writeln!(out)?;
    writeln!(out, "MAKEFLAGS += --output-sync=recurse")?;
    writeln!(out)?;
    writeln!(out, ".PHONY: all .locks")?;
    writeln!(out)?;
    Ok(())
}

/// `all` and `.locks` over a list of environments
fn write_env_targets<'s>(
    out: &mut String,
    envs: impl Iterator<Item = &'s str> + Clone,
    push_to_cache: bool,
) -> Result<()> {
    let goal = if push_to_cache { "build_cache" } else { "env" };
    let targets: Vec<String> = envs
        .clone()
        .map(|env| format!("{}/generated/{}", env, goal))
        .collect();
    let locks: Vec<String> = envs.map(|env| format!("{}/spack.lock", env)).collect();

    writeln!(out, "all: {}", targets.join(" "))?;
    writeln!(out)?;
    writeln!(out, "# Keep spack.lock files, make would remove them as intermediates")?;
    writeln!(out, ".locks: {}", locks.join(" "))?;
    writeln!(out)?;
    Ok(())
}

/// Concretize, depfile and cache rules of a single environment
fn write_env_rules(out: &mut String, env: &str, host_tools: bool) -> Result<()> {
    let extra = if host_tools {
        format!(" {}/packages.yaml", env)
    } else {
        String::new()
    };

    writeln!(out, "{}/spack.lock: {}/spack.yaml {}/compilers.yaml{}", env, env, env, extra)?;
    writeln!(out, "\t$(SPACK) -e ./{} concretize -f", env)?;
    writeln!(out)?;
    writeln!(out, "{}/Makefile: {}/spack.lock", env, env)?;
    writeln!(
        out,
        "\t$(SPACK_HELPER) -e ./{} env depfile --make-target-prefix {}/generated -o $@",
        env, env
    )?;
    writeln!(out)?;
    writeln!(out, "{}/generated/build_cache: {}/generated/env", env, env)?;
    writeln!(
        out,
        "\t$(SPACK) -e ./{} buildcache create --rebuild-index --allow-root --only=package -m {} $$($(SPACK_HELPER) -e ./{} find --format '/{{hash}}')",
        env, CACHE_MIRROR, env
    )?;
    writeln!(out, "\ttouch $@")?;
    writeln!(out)?;
    writeln!(out, "-include {}/Makefile", env)?;
    writeln!(out)?;
    Ok(())
}
