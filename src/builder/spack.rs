// src/builder/spack.rs

//! Spack checkout inside the build directory

use crate::recipe::SpackConfig;
use crate::report::Reporter;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Clones and checks out the Spack version a recipe asks for
pub struct SpackCheckout<'a> {
    config: &'a SpackConfig,
    path: PathBuf,
    reporter: &'a dyn Reporter,
}

impl<'a> SpackCheckout<'a> {
    /// Create a checkout of `config` at `path`
    pub fn new(config: &'a SpackConfig, path: impl Into<PathBuf>, reporter: &'a dyn Reporter) -> Self {
        Self {
            config,
            path: path.into(),
            reporter,
        }
    }

    /// Whether a clone already exists at the checkout path
    pub fn is_cloned(&self) -> bool {
        self.path.join(".git").is_dir()
    }

    /// Clone the repository if needed, then check out the requested commit
    ///
    /// An existing clone is reused. Without a commit the clone stays on its
    /// current branch.
    pub fn ensure(&self) -> Result<()> {
        let git = which::which("git").context("git not found in PATH")?;

        if !self.is_cloned() {
            self.reporter
                .info(&format!("spack: clone repository {}", self.config.repo));
            let path = self.path.to_string_lossy().into_owned();
            run(&git, &["clone", self.config.repo.as_str(), path.as_str()], None, self.reporter)
                .with_context(|| format!("error cloning the repository {}", self.config.repo))?;
        }

        if let Some(commit) = &self.config.commit {
            self.reporter
                .info(&format!("spack: checkout branch/commit {}", commit));
            run(&git, &["checkout", commit.as_str()], Some(&self.path), self.reporter)
                .with_context(|| format!("unable to change to the requested commit {}", commit))?;
        }

        Ok(())
    }
}

/// Run git, logging its combined output
fn run(git: &Path, args: &[&str], dir: Option<&Path>, reporter: &dyn Reporter) -> Result<()> {
    let mut cmd = Command::new(git);
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

    let output = cmd
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        reporter.debug(stdout.trim());
    }
    if !stderr.trim().is_empty() {
        reporter.debug(stderr.trim());
    }

    if !output.status.success() {
        bail!(
            "git {} exited with {}: {}",
            args.join(" "),
            output.status,
            stderr.trim()
        );
    }

    Ok(())
}
