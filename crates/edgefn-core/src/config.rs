use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Config file name inside the working directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Directory holding one sub-directory per function.
pub const FUNCTIONS_DIR: &str = "functions";

/// Project-level import map used when a function does not name its own.
pub const FALLBACK_IMPORT_MAP: &str = "functions/import_map.json";

/// config.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project ref used when `--project-ref` is not given
    pub project_id: Option<String>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub edge_runtime: EdgeRuntimeConfig,
    /// Per-function settings keyed by slug
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Management API base URL
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Dashboard base URL printed after a deploy
    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundlerKind {
    /// Run the bundler inside an ephemeral container
    #[default]
    Docker,
    /// Run a locally installed bundler executable
    Native,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRuntimeConfig {
    /// Container image providing the `bundle` command
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default)]
    pub bundler: BundlerKind,
    /// Bundler executable used by the native bundler
    #[serde(default = "default_native_bin")]
    pub native_bin: String,
    /// Named volume reused as the dependency cache between container runs
    #[serde(default = "default_cache_volume")]
    pub cache_volume: String,
}

/// Per-function settings as written in config.toml.
///
/// Unset fields are resolved by the deployer: the entrypoint defaults to
/// `functions/<slug>/index.ts` and the import map falls back to
/// [`FALLBACK_IMPORT_MAP`] when that file exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Tri-state: unset leaves the platform default in place
    #[serde(default)]
    pub verify_jwt: Option<bool>,
    #[serde(default)]
    pub import_map: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    /// Glob patterns, relative to the working directory, uploaded as-is
    #[serde(default)]
    pub static_files: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            dashboard_url: default_dashboard_url(),
        }
    }
}

impl Default for EdgeRuntimeConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            bundler: BundlerKind::default(),
            native_bin: default_native_bin(),
            cache_volume: default_cache_volume(),
        }
    }
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            verify_jwt: None,
            import_map: None,
            entrypoint: None,
            static_files: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Load from config.toml in the given directory, or return defaults if not found.
    pub fn load(workdir: &Path) -> crate::Result<Self> {
        let config_path = workdir.join(CONFIG_FILE);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            let config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path.clone(),
                source: e,
            })?;
            tracing::debug!(
                path = %config_path.display(),
                functions = config.functions.len(),
                "loaded project config",
            );
            Ok(config)
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Settings for `slug`, or defaults when the function is not listed.
    pub fn function(&self, slug: &str) -> FunctionConfig {
        self.functions.get(slug).cloned().unwrap_or_default()
    }
}

fn default_api_url() -> String {
    "https://api.supabase.com".to_owned()
}

fn default_dashboard_url() -> String {
    "https://supabase.com/dashboard".to_owned()
}

fn default_image() -> String {
    "supabase/edge-runtime:v1.58.2".to_owned()
}

fn default_native_bin() -> String {
    "edge-runtime".to_owned()
}

fn default_cache_volume() -> String {
    "supabase_edge_runtime_cache".to_owned()
}

fn default_enabled() -> bool {
    true
}
