use std::path::{Path, PathBuf};

use edgefn_core::{BundlerKind, EdgeRuntimeConfig, FunctionSlug};
use tokio_util::sync::CancellationToken;

use crate::docker::DockerBundler;
use crate::executor::ExecError;
use crate::native::NativeBundler;

/// Inputs to a single bundler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    pub slug: FunctionSlug,
    /// Absolute path of the function entrypoint
    pub entrypoint: PathBuf,
    /// Absolute path of the import map, if one applies
    pub import_map: Option<PathBuf>,
}

/// Produces a raw (uncompressed) bundle for one function.
///
/// Implementations must yield the same bytes for the same inputs so the
/// container and native variants can be swapped freely.
#[allow(async_fn_in_trait)]
pub trait Bundler: Send + Sync {
    async fn bundle(
        &self,
        request: &BundleRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BundleError>;
}

/// Bundler selected from `[edge_runtime]` config.
pub enum EdgeBundler {
    Docker(DockerBundler),
    Native(NativeBundler),
}

impl EdgeBundler {
    /// `source_dir` is the host directory holding function sources; the
    /// docker variant mounts it read-only.
    pub fn from_config(config: &EdgeRuntimeConfig, source_dir: &Path, verbose: bool) -> Self {
        match config.bundler {
            BundlerKind::Docker => Self::Docker(
                DockerBundler::new(&config.image, &config.cache_volume, source_dir)
                    .verbose(verbose),
            ),
            BundlerKind::Native => Self::Native(NativeBundler::new(&config.native_bin).verbose(verbose)),
        }
    }

    pub fn kind(&self) -> BundlerKind {
        match self {
            Self::Docker(_) => BundlerKind::Docker,
            Self::Native(_) => BundlerKind::Native,
        }
    }
}

impl Bundler for EdgeBundler {
    async fn bundle(
        &self,
        request: &BundleRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BundleError> {
        match self {
            Self::Docker(b) => b.bundle(request, cancel).await,
            Self::Native(b) => b.bundle(request, cancel).await,
        }
    }
}

/// Arguments shared by both variants:
/// `bundle --entrypoint <p> --output <p> [--import-map <p>] [--verbose]`.
pub(crate) fn bundle_args(
    entrypoint: &str,
    output: &str,
    import_map: Option<&str>,
    verbose: bool,
) -> Vec<String> {
    let mut args = vec![
        "bundle".to_owned(),
        "--entrypoint".to_owned(),
        entrypoint.to_owned(),
        "--output".to_owned(),
        output.to_owned(),
    ];
    if let Some(import_map) = import_map {
        args.push("--import-map".to_owned());
        args.push(import_map.to_owned());
    }
    if verbose {
        args.push("--verbose".to_owned());
    }
    args
}

/// Read the artifact a bundler reported as written.
pub(crate) async fn read_output(path: &Path) -> Result<Vec<u8>, BundleError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "read raw bundle");
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BundleError::MissingOutput {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(BundleError::ReadOutput {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

impl From<ExecError> for BundleError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Failed {
                status,
                stdout,
                stderr,
                ..
            } => {
                let diagnostics = if stderr.trim().is_empty() { stdout } else { stderr };
                BundleError::Failed {
                    status,
                    diagnostics,
                }
            }
            ExecError::Cancelled { .. } => BundleError::Cancelled,
            other => BundleError::Exec { source: other },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("failed to create output directory {path}")]
    CreateOutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to run bundler")]
    Exec { source: ExecError },

    #[error("bundler exited with {status}\n{diagnostics}")]
    Failed { status: String, diagnostics: String },

    #[error("bundler reported success but wrote no artifact at {path}")]
    MissingOutput { path: PathBuf },

    #[error("failed to read bundle artifact {path}")]
    ReadOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("bundling was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_command_contract() {
        assert_eq!(
            bundle_args("/p/index.ts", "/out/output.eszip", Some("/p/import_map.json"), true),
            vec![
                "bundle",
                "--entrypoint",
                "/p/index.ts",
                "--output",
                "/out/output.eszip",
                "--import-map",
                "/p/import_map.json",
                "--verbose",
            ]
        );
    }

    #[test]
    fn args_omit_optional_flags() {
        assert_eq!(
            bundle_args("/p/index.ts", "/out/o.eszip", None, false),
            vec!["bundle", "--entrypoint", "/p/index.ts", "--output", "/out/o.eszip"]
        );
    }

    #[test]
    fn failed_exec_prefers_stderr_as_diagnostics() {
        let err = BundleError::from(ExecError::Failed {
            program: "docker".to_owned(),
            status: "exit status: 1".to_owned(),
            stdout: "progress".to_owned(),
            stderr: "error: Module not found".to_owned(),
        });
        assert!(matches!(
            err,
            BundleError::Failed { ref diagnostics, .. } if diagnostics == "error: Module not found"
        ));
    }

    #[test]
    fn cancelled_exec_is_cancelled_bundle() {
        let err = BundleError::from(ExecError::Cancelled {
            program: "edge-runtime".to_owned(),
        });
        assert!(matches!(err, BundleError::Cancelled));
    }
}
