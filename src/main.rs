// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use stackinator::report::{LogReporter, Reporter};
use stackinator::{Builder, RecipeCompiler};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "stack-config")]
#[command(author, version, about = "Generate a build configuration for a spack stack from a recipe", long_about = None)]
struct Cli {
    /// Path where the build directory is created
    #[arg(short, long)]
    build: PathBuf,

    /// Path of the recipe directory
    #[arg(short, long)]
    recipe: PathBuf,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Installation prefix holding cluster-config, etc and repo
    /// (default: parent of the directory containing this executable)
    #[arg(long)]
    prefix: Option<PathBuf>,

    /// Do not clone or check out spack
    #[arg(long)]
    no_checkout: bool,

    /// Print the resolved recipe as YAML and exit
    #[arg(long)]
    dump_plan: bool,
}

/// Installation prefix relative to the running executable (`<prefix>/bin/stack-config`)
fn default_prefix() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the stack-config executable")?;
    exe.parent()
        .and_then(|bin| bin.parent())
        .map(PathBuf::from)
        .context("Failed to determine the installation prefix")
}

/// Name of this run's log file, unique per run
fn log_file_name() -> String {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("log_config_{}_{}", stamp, std::process::id())
}

/// Console output on stderr at info (or debug with `-d`), plus a full debug trace in
/// a log file in the current directory
///
/// Returns the log file path, or `None` when it could not be created.
fn init_logging(debug: bool) -> Option<PathBuf> {
    let default_level = if debug { "debug" } else { "info" };
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    );

    let path = PathBuf::from(log_file_name());
    let (file_layer, file_error) = match File::create(&path) {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::DEBUG),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();

    match file_error {
        Some(e) => {
            warn!("unable to create log file {}: {}", path.display(), e);
            None
        }
        None => Some(path),
    }
}

fn run(cli: &Cli) -> Result<()> {
    info!("Stack Configuration Tool");
    info!("  recipe path: {}", cli.recipe.display());
    info!("  build path : {}", cli.build.display());

    let prefix = match &cli.prefix {
        Some(prefix) => prefix.clone(),
        None => default_prefix()?,
    };
    debug!("installation prefix: {}", prefix.display());

    let reporter: Arc<dyn Reporter> = Arc::new(LogReporter::new("recipe"));
    let recipe = RecipeCompiler::new(&prefix, reporter).compile(&cli.recipe, &cli.build)?;

    if cli.dump_plan {
        print!("{}", serde_yaml::to_string(&recipe)?);
        return Ok(());
    }

    let builder = Builder::new(&cli.build, &prefix, Arc::new(LogReporter::new("builder")))?
        .with_checkout(!cli.no_checkout);
    builder.generate(&recipe)?;

    info!("");
    info!("Configuration finished, run the following to build the environment:");
    info!("");
    info!("cd {}", builder.path().display());
    info!("env --ignore-environment PATH=/usr/bin:/bin:`pwd`/spack/bin make modules -j32");
    info!("env --ignore-environment PATH=/usr/bin:/bin:`pwd`/spack/bin make store.squashfs");

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_file = init_logging(cli.debug);

    debug!("Command line arguments: {:?}", cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            if let Some(path) = &log_file {
                info!("see {} for more information", path.display());
            }
            ExitCode::FAILURE
        }
    }
}
