//! Upload side of the edgefn deploy pipeline.
//!
//! [`FunctionsClient`] streams an [`UploadManifest`] to the deploy endpoint
//! as `multipart/form-data`. Encoding and transmission run concurrently,
//! joined by an in-memory pipe:
//!
//! ```text
//!  producer task                         consumer (HTTP request)
//!  ─────────────                         ───────────────────────
//!  metadata ─┐                          ┌─> POST /v1/projects/{ref}/functions/deploy
//!  import map├─> MultipartWriter ─> pipe ─┘
//!  static    │
//!  imports   │
//!  bundle  ──┘
//! ```
//!
//! The pipe is bounded, so memory stays at roughly one chunk regardless of
//! bundle size. The producer's result is joined after the response arrives,
//! and a producer failure always takes precedence over the HTTP status.

pub mod client;
pub mod manifest;
pub mod multipart;

pub use client::{DeployedFunction, FunctionUploader, FunctionsClient, UploadError};
pub use manifest::{BundleFile, FunctionMetadata, UploadManifest};
pub use multipart::MultipartWriter;
