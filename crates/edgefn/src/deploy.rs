use std::path::{Path, PathBuf};
use std::sync::Arc;

use edgefn_build::{
    BundleError, BundleRequest, Bundler, CompressError, DirSource, SourceTree, WalkError, compress,
};
use edgefn_cloud::{
    BundleFile, DeployedFunction, FunctionMetadata, FunctionUploader, UploadError, UploadManifest,
};
use edgefn_core::{
    ApiConfig, FALLBACK_IMPORT_MAP, FUNCTIONS_DIR, FunctionSlug, ProjectConfig, ProjectRef,
};
use tokio_util::sync::CancellationToken;

/// Entrypoint file name looked up in each function directory.
const ENTRYPOINT_FILE: &str = "index.ts";

/// Per-invocation overrides, usually taken from command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Functions to deploy. Empty means every function found on disk.
    pub slugs: Vec<String>,
    /// Import map applied to every function in the batch
    pub import_map: Option<PathBuf>,
    /// Replaces each function's configured `verify_jwt`
    pub verify_jwt: Option<bool>,
}

/// Outcome of a successful batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploySummary {
    pub deployed: Vec<DeployedFunction>,
    /// Functions disabled in config
    pub skipped: Vec<FunctionSlug>,
}

impl DeploySummary {
    pub fn deployed_slugs(&self) -> Vec<&str> {
        self.deployed.iter().map(|f| f.slug.as_str()).collect()
    }

    /// `Deployed Functions on project <ref>: a, b`
    pub fn message(&self, project_ref: &ProjectRef) -> String {
        format!(
            "Deployed Functions on project {project_ref}: {}",
            self.deployed_slugs().join(", ")
        )
    }
}

/// Dashboard page listing the project's functions.
pub fn dashboard_url(api: &ApiConfig, project_ref: &ProjectRef) -> String {
    format!(
        "{}/project/{project_ref}/functions",
        api.dashboard_url.trim_end_matches('/')
    )
}

/// A function's settings once defaults and overrides are applied.
///
/// Paths are logical: relative to the working directory unless absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedFunction {
    slug: FunctionSlug,
    enabled: bool,
    entrypoint: String,
    import_map: Option<String>,
    verify_jwt: Option<bool>,
    static_patterns: Vec<String>,
}

/// Bundles, compresses and uploads functions one at a time.
///
/// The batch stops at the first failure. Functions deployed before it stay
/// deployed.
pub struct Deployer<B, U> {
    config: ProjectConfig,
    workdir: PathBuf,
    source: Arc<DirSource>,
    bundler: B,
    uploader: U,
}

impl<B: Bundler, U: FunctionUploader> Deployer<B, U> {
    /// `workdir` holds `config.toml` and the `functions/` directory.
    pub fn new(config: ProjectConfig, workdir: impl Into<PathBuf>, bundler: B, uploader: U) -> Self {
        let workdir = workdir.into();
        Self {
            config,
            source: Arc::new(DirSource::new(&workdir)),
            workdir,
            bundler,
            uploader,
        }
    }

    pub async fn deploy(
        &self,
        options: &DeployOptions,
        cancel: &CancellationToken,
    ) -> Result<DeploySummary, DeployError> {
        let slugs = self.select_slugs(&options.slugs)?;
        let functions: Vec<ResolvedFunction> = slugs
            .into_iter()
            .map(|slug| self.resolve(slug, options))
            .collect();

        // Entrypoints are checked before anything is bundled.
        for function in functions.iter().filter(|f| f.enabled) {
            let path = self.source.resolve(&function.entrypoint);
            if !path.is_file() {
                return Err(DeployError::MissingEntrypoint {
                    slug: function.slug.clone(),
                    path,
                });
            }
        }

        let mut summary = DeploySummary::default();
        for function in functions {
            if !function.enabled {
                tracing::info!(slug = %function.slug, "skipping disabled function");
                summary.skipped.push(function.slug);
                continue;
            }
            if cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }
            let deployed = self.deploy_one(&function, cancel).await?;
            summary.deployed.push(deployed);
        }
        Ok(summary)
    }

    /// Validated slugs in request order, or every function on disk.
    fn select_slugs(&self, requested: &[String]) -> Result<Vec<FunctionSlug>, DeployError> {
        if requested.is_empty() {
            return self.discover_slugs();
        }
        let mut slugs: Vec<FunctionSlug> = Vec::with_capacity(requested.len());
        for raw in requested {
            let slug = FunctionSlug::parse(raw)?;
            if !slugs.contains(&slug) {
                slugs.push(slug);
            }
        }
        Ok(slugs)
    }

    fn discover_slugs(&self) -> Result<Vec<FunctionSlug>, DeployError> {
        let pattern = format!("{FUNCTIONS_DIR}/*/{ENTRYPOINT_FILE}");
        let entrypoints = self
            .source
            .glob(&pattern)
            .map_err(|e| DeployError::Discover { source: e })?;

        let mut slugs = Vec::new();
        for path in entrypoints {
            let Some(name) = path.split('/').rev().nth(1) else {
                continue;
            };
            match FunctionSlug::parse(name) {
                Ok(slug) => slugs.push(slug),
                Err(e) => tracing::debug!(name, error = %e, "ignoring function directory"),
            }
        }
        slugs.sort();

        if slugs.is_empty() {
            return Err(DeployError::NoFunctions {
                dir: self.workdir.join(FUNCTIONS_DIR),
            });
        }
        tracing::debug!(count = slugs.len(), "discovered functions");
        Ok(slugs)
    }

    fn resolve(&self, slug: FunctionSlug, options: &DeployOptions) -> ResolvedFunction {
        let config = self.config.function(slug.as_str());
        let entrypoint = config
            .entrypoint
            .unwrap_or_else(|| format!("{FUNCTIONS_DIR}/{slug}/{ENTRYPOINT_FILE}"));
        let import_map = match (&options.import_map, config.import_map) {
            (Some(path), _) => Some(self.logical(path)),
            (None, Some(path)) => Some(path),
            (None, None) if self.source.resolve(FALLBACK_IMPORT_MAP).is_file() => {
                Some(FALLBACK_IMPORT_MAP.to_owned())
            }
            (None, None) => None,
        };

        ResolvedFunction {
            slug,
            enabled: config.enabled,
            entrypoint,
            import_map,
            verify_jwt: options.verify_jwt.or(config.verify_jwt),
            static_patterns: config.static_files,
        }
    }

    /// Logical form of a host path: relative when inside the working directory.
    fn logical(&self, path: &Path) -> String {
        // arch-lint: allow(no-silent-result-drop) reason="paths outside the working directory stay absolute"
        let Ok(relative) = path.strip_prefix(&self.workdir) else {
            return path.to_string_lossy().into_owned();
        };
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    async fn deploy_one(
        &self,
        function: &ResolvedFunction,
        cancel: &CancellationToken,
    ) -> Result<DeployedFunction, DeployError> {
        let slug = &function.slug;

        tracing::info!(%slug, entrypoint = %function.entrypoint, "bundling function");
        let request = BundleRequest {
            slug: slug.clone(),
            entrypoint: self.source.resolve(&function.entrypoint),
            import_map: function.import_map.as_deref().map(|p| self.source.resolve(p)),
        };
        let raw = self
            .bundler
            .bundle(&request, cancel)
            .await
            .map_err(|e| DeployError::Bundle {
                slug: slug.clone(),
                source: e,
            })?;

        // Removed when dropped at the end of this function.
        let bundle = compress_to_temp(slug, &raw).await?;
        drop(raw);

        let manifest = UploadManifest {
            slug: slug.clone(),
            metadata: FunctionMetadata {
                name: slug.to_string(),
                entrypoint_path: function.entrypoint.clone(),
                import_map_path: function.import_map.clone(),
                verify_jwt: function.verify_jwt,
                static_patterns: function.static_patterns.clone(),
            },
            source: self.source.clone(),
            bundle: Some(BundleFile {
                name: format!("{slug}.eszip"),
                path: bundle.path().to_path_buf(),
            }),
        };

        self.uploader
            .upload(manifest, cancel)
            .await
            .map_err(|e| DeployError::Upload {
                slug: slug.clone(),
                source: e,
            })
    }
}

async fn compress_to_temp(
    slug: &FunctionSlug,
    raw: &[u8],
) -> Result<tempfile::NamedTempFile, DeployError> {
    let temp = tempfile::Builder::new()
        .prefix(&format!("{slug}-"))
        .suffix(".eszip")
        .tempfile()
        .map_err(|e| DeployError::TempFile { source: e })?;
    let handle = temp
        .as_file()
        .try_clone()
        .map_err(|e| DeployError::TempFile { source: e })?;
    let mut writer = tokio::fs::File::from_std(handle);

    let mut reader = raw;
    compress(&mut reader, &mut writer)
        .await
        .map_err(|e| DeployError::Compress {
            slug: slug.clone(),
            source: e,
        })?;
    tracing::debug!(%slug, path = %temp.path().display(), "compressed bundle written");
    Ok(temp)
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("invalid configuration")]
    Config {
        #[from]
        source: edgefn_core::Error,
    },

    #[error("failed to discover functions")]
    Discover { source: WalkError },

    #[error("no functions specified or found in {dir}")]
    NoFunctions { dir: PathBuf },

    #[error("entrypoint for function {slug} not found at {path}")]
    MissingEntrypoint { slug: FunctionSlug, path: PathBuf },

    #[error("failed to bundle function {slug}")]
    Bundle {
        slug: FunctionSlug,
        source: BundleError,
    },

    #[error("failed to create temporary bundle file")]
    TempFile { source: std::io::Error },

    #[error("failed to compress bundle for function {slug}")]
    Compress {
        slug: FunctionSlug,
        source: CompressError,
    },

    #[error("failed to deploy function {slug}")]
    Upload {
        slug: FunctionSlug,
        source: UploadError,
    },

    #[error("deploy was cancelled")]
    Cancelled,
}

impl DeployError {
    /// True when the batch stopped because of the cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Bundle {
                    source: BundleError::Cancelled,
                    ..
                }
                | Self::Upload {
                    source: UploadError::Cancelled,
                    ..
                }
        )
    }
}
