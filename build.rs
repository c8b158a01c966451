// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Mirror of the stack-config arguments, used only for the man page
fn build_cli() -> Command {
    Command::new("stack-config")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Stackinator Contributors")
        .about("Generate a build configuration for a spack stack from a recipe")
        .arg(
            Arg::new("build")
                .short('b')
                .long("build")
                .value_name("PATH")
                .required(true)
                .help("Path where the build directory is created"),
        )
        .arg(
            Arg::new("recipe")
                .short('r')
                .long("recipe")
                .value_name("PATH")
                .required(true)
                .help("Path of the recipe directory"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable debug output"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .value_name("PATH")
                .help("Installation prefix holding cluster-config, etc and repo"),
        )
        .arg(
            Arg::new("no_checkout")
                .long("no-checkout")
                .action(ArgAction::SetTrue)
                .help("Do not clone or check out spack"),
        )
        .arg(
            Arg::new("dump_plan")
                .long("dump-plan")
                .action(ArgAction::SetTrue)
                .help("Print the resolved recipe as YAML and exit"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=OUT_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = out_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    if let Err(e) = fs::write(man_dir.join("stack-config.1"), buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
