use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::bundler::{BundleError, BundleRequest, Bundler, bundle_args, read_output};
use crate::executor::{CommandExecutor, RealExecutor};
use crate::guard::ScratchPath;

/// Dependency cache directory inside the container (DENO_DIR).
const CONTAINER_CACHE_DIR: &str = "/root/.cache/deno";

/// Writable output mount inside the container.
const CONTAINER_OUTPUT_DIR: &str = "/root/eszips";

const OUTPUT_FILE: &str = "output.eszip";

/// Runs the bundler in an ephemeral container.
///
/// Mounts per invocation:
/// - `<cache_volume>` at [`CONTAINER_CACHE_DIR`], shared across runs
/// - the source directory read-only, at its host path
/// - a fresh world-writable output directory at [`CONTAINER_OUTPUT_DIR`]
///
/// The output directory is removed when `bundle` returns, whatever the outcome.
pub struct DockerBundler<E: CommandExecutor = RealExecutor> {
    executor: E,
    image: String,
    cache_volume: String,
    source_dir: PathBuf,
    scratch_root: PathBuf,
    verbose: bool,
}

impl DockerBundler<RealExecutor> {
    pub fn new(image: &str, cache_volume: &str, source_dir: &Path) -> Self {
        Self::with_executor(RealExecutor, image, cache_volume, source_dir)
    }
}

impl<E: CommandExecutor> DockerBundler<E> {
    pub fn with_executor(executor: E, image: &str, cache_volume: &str, source_dir: &Path) -> Self {
        Self {
            executor,
            image: image.to_owned(),
            cache_volume: cache_volume.to_owned(),
            source_dir: source_dir.to_path_buf(),
            scratch_root: std::env::temp_dir(),
            verbose: false,
        }
    }

    /// Pass `--verbose` to the bundler.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Host directory under which per-invocation output directories are created.
    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = dir.into();
        self
    }

    fn docker_args(&self, request: &BundleRequest, output_dir: &Path, name: &str) -> Vec<String> {
        let source_dir = self.source_dir.to_string_lossy();
        let mut binds = vec![
            format!("{}:{CONTAINER_CACHE_DIR}:rw", self.cache_volume),
            format!("{source_dir}:{source_dir}:ro"),
            format!("{}:{CONTAINER_OUTPUT_DIR}:rw", output_dir.to_string_lossy()),
        ];

        // Import maps outside the source tree need their own mount.
        if let Some(import_map) = &request.import_map {
            if !import_map.starts_with(&self.source_dir) {
                let path = import_map.to_string_lossy();
                binds.push(format!("{path}:{path}:ro"));
            }
        }

        let mut args = vec!["run".to_owned(), "--rm".to_owned(), "--name".to_owned(), name.to_owned()];
        for bind in binds {
            args.push("-v".to_owned());
            args.push(bind);
        }
        args.push(self.image.clone());

        let import_map = request
            .import_map
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        args.extend(bundle_args(
            &request.entrypoint.to_string_lossy(),
            &format!("{CONTAINER_OUTPUT_DIR}/{OUTPUT_FILE}"),
            import_map.as_deref(),
            self.verbose,
        ));
        args
    }

    async fn remove_container(&self, name: &str) {
        let args = vec!["rm".to_owned(), "-f".to_owned(), name.to_owned()];
        if let Err(e) = self.executor.run("docker", &args, &CancellationToken::new()).await {
            tracing::warn!(container = name, error = %e, "failed to remove bundler container");
        }
    }
}

impl<E: CommandExecutor> Bundler for DockerBundler<E> {
    async fn bundle(
        &self,
        request: &BundleRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BundleError> {
        let slug = &request.slug;
        tracing::info!(%slug, image = %self.image, "bundling function in container");

        let output_path = self.scratch_root.join(format!(".output_{slug}"));
        let output_dir =
            ScratchPath::create_dir(output_path.clone()).map_err(|e| BundleError::CreateOutputDir {
                path: output_path,
                source: e,
            })?;

        let name = format!("edgefn_bundle_{slug}_{}", std::process::id());
        let args = self.docker_args(request, output_dir.path(), &name);

        match self.executor.run("docker", &args, cancel).await {
            Ok(output) => {
                if !output.stdout.trim().is_empty() {
                    tracing::debug!(%slug, stdout = %output.stdout.trim(), "bundler output");
                }
            }
            Err(e) => {
                let err = BundleError::from(e);
                if matches!(err, BundleError::Cancelled) {
                    self.remove_container(&name).await;
                }
                return Err(err);
            }
        }

        read_output(&output_dir.path().join(OUTPUT_FILE)).await
    }
}
