// src/recipe/packages.rs

//! Package set resolution (`packages.yaml`)
//!
//! Each package set becomes a Spack environment. Besides the specs listed by
//! the user, a set may name an MPI implementation (`mpi: mpich@4.1`), which
//! is expanded into a full spec with the build options the target systems
//! need, and may request GPU support, which adds the CUDA architecture to
//! that MPI spec.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// MPI implementation that is installed as a binary and never built for GPUs
pub const CRAY_MPICH_BINARY: &str = "cray-mpich-binary";

/// Clause appended to GPU-aware MPI specs
const CUDA_ARCH: &str = "cuda_arch=80";

/// Defaults for a supported MPI implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpiDefaults {
    /// Implementation name as understood by Spack
    pub name: &'static str,
    /// Version used when the recipe does not pin one
    pub default_version: Option<&'static str>,
    /// Variants always applied to the implementation
    pub options: Option<&'static str>,
}

/// Supported MPI implementations
pub const MPI_SPECS: &[MpiDefaults] = &[
    MpiDefaults {
        name: CRAY_MPICH_BINARY,
        default_version: None,
        options: None,
    },
    MpiDefaults {
        name: "mpich",
        default_version: Some("4.1rc2"),
        options: Some("device=ch4 netmod=ofi +slurm"),
    },
    MpiDefaults {
        name: "mvapich2",
        default_version: Some("3.0a"),
        options: Some("+xpmem fabrics=ch4ofi ch4_max_vcis=4 process_managers=slurm"),
    },
];

/// Look up a supported MPI implementation
pub fn mpi_defaults(implementation: &str) -> Option<&'static MpiDefaults> {
    MPI_SPECS.iter().find(|m| m.name == implementation)
}

/// packages.yaml document
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PackagesDocument {
    #[serde(default)]
    pub packages: Option<IndexMap<String, Option<RawPackageSet>>>,
}

/// A package set as written by the user
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPackageSet {
    #[serde(default)]
    pub specs: Option<Vec<String>>,
    #[serde(default)]
    pub mpi: Option<String>,
    #[serde(default)]
    pub gpu: Option<serde_yaml::Value>,
}

/// A fully resolved package set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSet {
    /// Specs to install; a requested MPI spec is always last
    pub specs: Vec<String>,

    /// MPI implementation as requested by the user
    pub mpi: Option<String>,

    /// GPU target as requested by the user
    pub gpu: Option<String>,
}

/// Resolve all package sets of a recipe
///
/// Resolution is all-or-nothing: the first unsupported MPI implementation
/// fails the whole batch.
pub fn resolve_package_sets(
    raw: &IndexMap<String, Option<RawPackageSet>>,
) -> Result<IndexMap<String, PackageSet>> {
    raw.iter()
        .map(|(name, set)| {
            let set = resolve_package_set(set.as_ref().unwrap_or(&RawPackageSet::default()))?;
            Ok((name.clone(), set))
        })
        .collect()
}

/// Resolve a single package set
pub fn resolve_package_set(raw: &RawPackageSet) -> Result<PackageSet> {
    let mut specs = raw.specs.clone().unwrap_or_default();
    // A blank but non-empty request still names an (empty) implementation
    let mpi = raw
        .mpi
        .as_deref()
        .filter(|m| !m.is_empty())
        .map(|m| m.trim().to_string());
    let gpu = raw.gpu.as_ref().and_then(normalize_gpu);

    if let Some(mpi) = &mpi {
        specs.push(mpi_spec(mpi, gpu.is_some())?);
    }

    Ok(PackageSet { specs, mpi, gpu })
}

/// Expand an `mpi` request (`impl` or `impl@version`) into a full spec
pub fn mpi_spec(mpi: &str, gpu: bool) -> Result<String> {
    let (implementation, version) = match mpi.trim().split_once('@') {
        Some((implementation, version)) => (implementation, Some(version)),
        None => (mpi.trim(), None),
    };

    let defaults =
        mpi_defaults(implementation).ok_or_else(|| Error::UnsupportedMpi(implementation.to_string()))?;

    let version = version
        .filter(|v| !v.is_empty())
        .or(defaults.default_version)
        .map(|v| format!("@{}", v))
        .unwrap_or_default();

    let mut spec = format!("{}{} {}", implementation, version, defaults.options.unwrap_or(""))
        .trim()
        .to_string();

    if gpu && implementation != CRAY_MPICH_BINARY {
        spec.push(' ');
        spec.push_str(CUDA_ARCH);
    }

    Ok(spec)
}

/// Reduce a raw `gpu` value to an optional target name
///
/// `null`, `false`, zero, `""`, `[]` and `{}` mean no GPU. Any other value
/// requests one; strings are kept verbatim, whitespace included.
fn normalize_gpu(value: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;

    match value {
        Value::Null => None,
        Value::Bool(enabled) => enabled.then(|| "true".to_string()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Sequence(seq) if seq.is_empty() => None,
        Value::Mapping(map) if map.is_empty() => None,
        Value::Tagged(tagged) => normalize_gpu(&tagged.value),
        other => serde_yaml::to_string(other)
            .ok()
            .map(|s| s.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(specs: &[&str], mpi: Option<&str>, gpu: Option<&str>) -> RawPackageSet {
        RawPackageSet {
            specs: Some(specs.iter().map(|s| s.to_string()).collect()),
            mpi: mpi.map(String::from),
            gpu: gpu.map(|g| serde_yaml::Value::String(g.to_string())),
        }
    }

    #[test]
    fn test_mpich_default_version() {
        assert_eq!(
            mpi_spec("mpich", false).unwrap(),
            "mpich@4.1rc2 device=ch4 netmod=ofi +slurm"
        );
    }

    #[test]
    fn test_explicit_version_overrides_default() {
        for (mpi, clause) in [
            ("mpich@4.0.2", "@4.0.2"),
            ("mvapich2@2.3.7", "@2.3.7"),
            ("cray-mpich-binary@8.1.18", "@8.1.18"),
        ] {
            let spec = mpi_spec(mpi, false).unwrap();
            let (implementation, _) = mpi.split_once('@').unwrap();
            assert!(
                spec.starts_with(&format!("{}{}", implementation, clause)),
                "{} resolved to {}",
                mpi,
                spec
            );
        }
    }

    #[test]
    fn test_cray_mpich_binary() {
        assert_eq!(mpi_spec("cray-mpich-binary", false).unwrap(), "cray-mpich-binary");
        // No cuda_arch for the binary distribution
        assert_eq!(mpi_spec("cray-mpich-binary", true).unwrap(), "cray-mpich-binary");
    }

    #[test]
    fn test_mvapich2_gpu() {
        let spec = mpi_spec("mvapich2", true).unwrap();
        assert_eq!(
            spec,
            "mvapich2@3.0a +xpmem fabrics=ch4ofi ch4_max_vcis=4 process_managers=slurm cuda_arch=80"
        );
        assert!(spec.ends_with("cuda_arch=80"));
    }

    #[test]
    fn test_empty_version_uses_default() {
        assert_eq!(
            mpi_spec("mpich@", false).unwrap(),
            "mpich@4.1rc2 device=ch4 netmod=ofi +slurm"
        );
    }

    #[test]
    fn test_unsupported_mpi() {
        let err = mpi_spec("openmpi@4.1", false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMpi(ref name) if name == "openmpi"));
    }

    #[test]
    fn test_resolve_appends_mpi_last() {
        let resolved =
            resolve_package_set(&set(&["fftw", "hdf5+mpi"], Some(" mpich@4.0 "), None)).unwrap();
        assert_eq!(
            resolved.specs,
            vec!["fftw", "hdf5+mpi", "mpich@4.0 device=ch4 netmod=ofi +slurm"]
        );
        assert_eq!(resolved.mpi.as_deref(), Some("mpich@4.0"));
        assert_eq!(resolved.gpu, None);
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = resolve_package_set(&RawPackageSet::default()).unwrap();
        assert!(resolved.specs.is_empty());
        assert_eq!(resolved.mpi, None);
        assert_eq!(resolved.gpu, None);

        let resolved = resolve_package_set(&set(&["python"], Some(""), None)).unwrap();
        assert_eq!(resolved.specs, vec!["python"]);
        assert_eq!(resolved.mpi, None);
    }

    #[test]
    fn test_gpu_values() {
        let mut raw = set(&[], Some("mpich"), None);

        raw.gpu = Some(serde_yaml::Value::Bool(true));
        assert!(resolve_package_set(&raw).unwrap().specs[0].ends_with("cuda_arch=80"));

        raw.gpu = Some(serde_yaml::Value::Bool(false));
        assert!(!resolve_package_set(&raw).unwrap().specs[0].contains("cuda_arch"));

        raw.gpu = Some(serde_yaml::Value::String(String::new()));
        assert!(!resolve_package_set(&raw).unwrap().specs[0].contains("cuda_arch"));

        raw.gpu = Some(serde_yaml::Value::String("cuda".to_string()));
        let resolved = resolve_package_set(&raw).unwrap();
        assert_eq!(resolved.gpu.as_deref(), Some("cuda"));
        assert!(resolved.specs[0].ends_with("cuda_arch=80"));
    }

    #[test]
    fn test_gpu_values_from_yaml() {
        let gpu_of = |value: &str| -> (Option<String>, bool) {
            let raw: RawPackageSet =
                serde_yaml::from_str(&format!("mpi: mpich\ngpu: {}\n", value)).unwrap();
            let resolved = resolve_package_set(&raw).unwrap();
            let cuda = resolved.specs[0].contains("cuda_arch=80");
            (resolved.gpu, cuda)
        };

        for off in ["0", "0.0", "[]", "{}", "false", "null", "''", "~"] {
            assert_eq!(gpu_of(off), (None, false), "gpu: {}", off);
        }

        assert_eq!(gpu_of("' '"), (Some(" ".to_string()), true));
        assert_eq!(gpu_of("1"), (Some("1".to_string()), true));
        assert_eq!(gpu_of("true"), (Some("true".to_string()), true));
        assert!(gpu_of("[a100]").1);
    }

    #[test]
    fn test_blank_mpi_is_unsupported() {
        let err = resolve_package_set(&set(&["fftw"], Some("  "), None)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMpi(ref name) if name.is_empty()));
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut raw = IndexMap::new();
        raw.insert("ok".to_string(), Some(set(&["zlib"], Some("mpich"), None)));
        raw.insert("bad".to_string(), Some(set(&[], Some("openmpi"), None)));
        raw.insert("after".to_string(), Some(set(&["fftw"], None, None)));

        let err = resolve_package_sets(&raw).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMpi(ref name) if name == "openmpi"));
    }

    #[test]
    fn test_batch_preserves_order_and_raw() {
        let mut raw = IndexMap::new();
        raw.insert("tools".to_string(), Some(set(&["cmake"], None, None)));
        raw.insert("gpu".to_string(), Some(set(&["cuda"], Some("mvapich2"), Some("a100"))));
        raw.insert("empty".to_string(), None);
        let before = raw.clone();

        let resolved = resolve_package_sets(&raw).unwrap();
        assert_eq!(
            resolved.keys().collect::<Vec<_>>(),
            vec!["tools", "gpu", "empty"]
        );
        assert_eq!(resolved["gpu"].specs.len(), 2);
        assert!(resolved["empty"].specs.is_empty());
        assert_eq!(raw, before);
    }
}
