// tests/recipe_compile.rs

//! Integration tests for compiling recipe directories.

mod common;

use common::{setup_fixture, write};
use stackinator::report::{silent, CallbackReporter, ReportLevel};
use stackinator::{
    ConfigError, Error, ErrorKind, RecipeCompiler, RecipeFile, StageName, SystemName,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

fn compiler(prefix: &Path) -> RecipeCompiler {
    RecipeCompiler::new(prefix, silent())
}

#[test]
fn test_compile_full_recipe() {
    let fixture = setup_fixture();
    let recipe = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap();

    assert_eq!(recipe.path(), fixture.recipe.as_path());
    assert_eq!(recipe.config().system, SystemName::Hohgant);
    assert_eq!(recipe.system_config_dir(), fixture.system_config());
    assert_eq!(recipe.modules(), fixture.recipe.join("modules.yaml"));

    let compilers = recipe.compilers();
    assert_eq!(
        compilers.names(),
        vec![StageName::Bootstrap, StageName::Gcc, StageName::Llvm]
    );
    assert_eq!(compilers.bootstrap.specs[0], "gcc@11 languages=c,c++");
    assert_eq!(compilers.gcc.requires.as_deref(), Some("gcc@11"));
    assert_eq!(
        compilers.llvm.as_ref().unwrap().specs,
        vec![
            "nvhpc@22.7~mpi~blas~lapack",
            "llvm@14 +clang targets=x86 ~gold ^ninja@kitware",
        ]
    );

    let packages = recipe.packages();
    assert_eq!(
        packages.keys().collect::<Vec<_>>(),
        vec!["tools", "gcc-env", "cuda-env"]
    );
    assert_eq!(packages["tools"].specs, vec!["cmake", "python@3.10"]);
    assert_eq!(
        packages["gcc-env"].specs.last().unwrap(),
        "mpich@4.1rc2 device=ch4 netmod=ofi +slurm"
    );
    assert_eq!(
        packages["cuda-env"].specs.last().unwrap(),
        "mvapich2@2.3.7 +xpmem fabrics=ch4ofi ch4_max_vcis=4 process_managers=slurm cuda_arch=80"
    );

    // No mirror section
    assert_eq!(recipe.mirror().source(), None);
    assert_eq!(recipe.mirror().key(), None);
    assert!(!recipe.push_to_cache());
}

#[test]
fn test_compile_is_deterministic() {
    let fixture = setup_fixture();
    let compiler = compiler(&fixture.prefix);

    let first = compiler.compile(&fixture.recipe, &fixture.build).unwrap();
    let second = compiler.compile(&fixture.recipe, &fixture.build).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_yaml::to_string(&first).unwrap(),
        serde_yaml::to_string(&second).unwrap()
    );
}

#[test]
fn test_missing_recipe_directory() {
    let fixture = setup_fixture();
    let err = compiler(&fixture.prefix)
        .compile(fixture.temp.path().join("no-such-recipe"), &fixture.build)
        .unwrap_err();

    assert!(matches!(err, Error::RecipeNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn test_missing_files_are_distinguished() {
    for (name, expected) in [
        ("compilers.yaml", RecipeFile::Compilers),
        ("packages.yaml", RecipeFile::Packages),
        ("config.yaml", RecipeFile::Config),
    ] {
        let fixture = setup_fixture();
        fixture.remove_recipe(name);

        let err = compiler(&fixture.prefix)
            .compile(&fixture.recipe, &fixture.build)
            .unwrap_err();

        match err {
            Error::MissingRecipeFile { file, ref path } => {
                assert_eq!(file, expected);
                assert_eq!(path, &fixture.recipe.join(name));
                assert!(err.to_string().contains(name));
            }
            other => panic!("expected missing {}, got {:?}", name, other),
        }
    }
}

#[test]
fn test_missing_top_level_keys() {
    let fixture = setup_fixture();
    fixture.write_recipe("compilers.yaml", "bootstrap:\n  specs: [gcc@11]\n");
    let err = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap_err();
    assert!(matches!(err, Error::MissingField { ref field, .. } if field == "compilers"));

    let fixture = setup_fixture();
    fixture.write_recipe("packages.yaml", "");
    let err = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap_err();
    assert!(matches!(err, Error::MissingField { ref field, .. } if field == "packages"));
}

#[test]
fn test_missing_gcc_stage() {
    let fixture = setup_fixture();
    fixture.write_recipe(
        "compilers.yaml",
        "compilers:\n  bootstrap:\n    specs: [gcc@11]\n",
    );

    let err = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap_err();
    assert!(matches!(err, Error::MissingField { ref field, .. } if field == "gcc"));
}

#[test]
fn test_missing_system() {
    let fixture = setup_fixture();
    fixture.write_recipe(
        "config.yaml",
        "store: /user-environment\nspack:\n  repo: https://github.com/spack/spack.git\n",
    );

    let err = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::MissingSystem(_))));
    assert!(err.to_string().contains("'system'"));
}

#[test]
fn test_unsupported_system() {
    let fixture = setup_fixture();
    fixture.write_recipe(
        "config.yaml",
        "system: daint\nstore: /user-environment\nspack:\n  repo: https://github.com/spack/spack.git\n",
    );

    let err = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::UnsupportedSystem { ref name, .. }) if name == "daint"
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_unsupported_mpi_aborts_compilation() {
    let fixture = setup_fixture();
    fixture.write_recipe(
        "packages.yaml",
        "packages:\n  good:\n    mpi: mpich\n  bad:\n    mpi: openmpi@4.1.4\n",
    );

    let err = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedMpi(ref name) if name == "openmpi"));
}

#[test]
fn test_mirror_from_system_config() {
    let fixture = setup_fixture();
    let key = fixture.temp.path().join("key.gpg");
    write(&key, "secret");
    write(&fixture.system_config().join("mirrors.yaml"), "mirrors: {}\n");
    fixture.write_recipe(
        "config.yaml",
        &format!(
            "{}mirror:\n  enable: true\n  key: {}\n",
            common::CONFIG_YAML,
            key.display()
        ),
    );

    let recipe = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap();

    assert_eq!(
        recipe.mirror().source(),
        Some(fixture.system_config().join("mirrors.yaml").as_path())
    );
    assert_eq!(recipe.mirror().key(), Some(key.as_path()));
    assert!(recipe.push_to_cache());
}

#[test]
fn test_recipe_mirror_wins() {
    let fixture = setup_fixture();
    write(&fixture.system_config().join("mirrors.yaml"), "mirrors: {}\n");
    fixture.write_recipe("mirrors.yaml", "mirrors: {}\n");
    fixture.write_recipe("config.yaml", &format!("{}mirror: {{}}\n", common::CONFIG_YAML));

    let recipe = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap();

    assert_eq!(
        recipe.mirror().source(),
        Some(fixture.recipe.join("mirrors.yaml").as_path())
    );
    assert!(!recipe.push_to_cache());
}

#[test]
fn test_disabled_mirror() {
    let fixture = setup_fixture();
    fixture.write_recipe("mirrors.yaml", "mirrors: {}\n");
    fixture.write_recipe(
        "config.yaml",
        &format!("{}mirror:\n  enable: false\n", common::CONFIG_YAML),
    );

    let recipe = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap();
    assert_eq!(recipe.mirror().source(), None);
}

#[test]
fn test_enabled_mirror_without_definition_warns() {
    let fixture = setup_fixture();
    fixture.write_recipe("config.yaml", &format!("{}mirror: {{}}\n", common::CONFIG_YAML));

    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let reporter = Arc::new(CallbackReporter::new(move |event| {
        events_clone.lock().unwrap().push(event);
    }));

    let recipe = RecipeCompiler::new(&fixture.prefix, reporter)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap();
    assert_eq!(recipe.mirror().source(), None);

    let events = events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| e.level == ReportLevel::Warn && e.message.contains("mirrors.yaml")));
}

#[test]
fn test_missing_key_file() {
    let fixture = setup_fixture();
    fixture.write_recipe(
        "config.yaml",
        &format!(
            "{}mirror:\n  key: {}\n",
            common::CONFIG_YAML,
            fixture.temp.path().join("missing.gpg").display()
        ),
    );

    let err = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::KeyFileNotFound(_))));
}

#[test]
fn test_modules_fallback() {
    let fixture = setup_fixture();
    fixture.remove_recipe("modules.yaml");

    let recipe = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap();

    // Recorded even though the build directory does not exist yet
    assert_eq!(
        recipe.modules(),
        fixture.build.join("spack/etc/spack/defaults/modules.yaml")
    );
    assert!(matches!(
        recipe.generate_modules().unwrap_err(),
        Error::ModuleTemplateNotFound(_)
    ));
}

#[test]
fn test_generate_modules() {
    let fixture = setup_fixture();
    let recipe = compiler(&fixture.prefix)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap();

    let modules = recipe.generate_modules().unwrap();
    let value: serde_yaml::Value = serde_yaml::from_str(&modules).unwrap();
    assert_eq!(
        value["modules"]["default"]["roots"]["tcl"].as_str(),
        Some("/user-environment/modules")
    );
    assert_eq!(
        value["modules"]["default"]["tcl"]["all"]["autoload"].as_str(),
        Some("none")
    );
}

#[test]
fn test_compiler_reports_through_injected_reporter() {
    let fixture = setup_fixture();
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let reporter = Arc::new(CallbackReporter::new(move |event| {
        events_clone.lock().unwrap().push(event);
    }));

    RecipeCompiler::new(&fixture.prefix, reporter)
        .compile(&fixture.recipe, &fixture.build)
        .unwrap();

    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.level == ReportLevel::Debug));
    assert!(events.iter().any(|e| e.message.contains("compilers.yaml")));
    assert!(events.iter().any(|e| e.message.contains("config.yaml")));
}
