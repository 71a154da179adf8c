use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use edgefn_build::SourceTree;
use edgefn_core::FunctionSlug;
use serde::{Deserialize, Serialize};

/// Metadata sent as the `metadata` form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub name: String,
    pub entrypoint_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_map_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_jwt: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_patterns: Vec<String>,
}

/// Compressed bundle on disk, streamed as the last file field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    /// Logical name reported in the form
    pub name: String,
    pub path: PathBuf,
}

/// Everything uploaded for one function.
///
/// File entries are not materialized up front. They are read from `source`
/// while the form is being encoded, in this order:
/// 1. the import map at `metadata.import_map_path`, if set
/// 2. files matching each of `metadata.static_patterns`, in match order
/// 3. the entrypoint and its import graph, in walk order
/// 4. `bundle`, if present
#[derive(Clone)]
pub struct UploadManifest {
    pub slug: FunctionSlug,
    pub metadata: FunctionMetadata,
    pub source: Arc<dyn SourceTree>,
    pub bundle: Option<BundleFile>,
}

impl fmt::Debug for UploadManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadManifest")
            .field("slug", &self.slug)
            .field("metadata", &self.metadata)
            .field("bundle", &self.bundle)
            .finish_non_exhaustive()
    }
}
