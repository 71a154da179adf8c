use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::bundler::{BundleError, BundleRequest, Bundler, bundle_args, read_output};
use crate::executor::{CommandExecutor, RealExecutor};
use crate::guard::ScratchPath;

/// Runs a locally installed bundler executable.
///
/// The artifact is written to `<scratch_root>/<slug>.eszip` and deleted
/// once read.
pub struct NativeBundler<E: CommandExecutor = RealExecutor> {
    executor: E,
    bin_path: String,
    scratch_root: PathBuf,
    verbose: bool,
}

impl NativeBundler<RealExecutor> {
    pub fn new(bin_path: &str) -> Self {
        Self::with_executor(RealExecutor, bin_path)
    }
}

impl<E: CommandExecutor> NativeBundler<E> {
    pub fn with_executor(executor: E, bin_path: &str) -> Self {
        Self {
            executor,
            bin_path: bin_path.to_owned(),
            scratch_root: std::env::temp_dir(),
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = dir.into();
        self
    }
}

impl<E: CommandExecutor> Bundler for NativeBundler<E> {
    async fn bundle(
        &self,
        request: &BundleRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BundleError> {
        let slug = &request.slug;
        tracing::info!(%slug, bin = %self.bin_path, "bundling function");

        let output = ScratchPath::file(self.scratch_root.join(format!("{slug}.eszip")));
        let import_map = request
            .import_map
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let args = bundle_args(
            &request.entrypoint.to_string_lossy(),
            &output.path().to_string_lossy(),
            import_map.as_deref(),
            self.verbose,
        );

        let result = self.executor.run(&self.bin_path, &args, cancel).await?;
        if !result.stdout.trim().is_empty() {
            tracing::debug!(%slug, stdout = %result.stdout.trim(), "bundler output");
        }

        read_output(output.path()).await
    }
}
