//! Bundling, compression, and source enumeration for edgefn.
//!
//! # Deploy pipeline (per function)
//!
//! ```text
//! edgefn deploy
//!   1. Bundle    ── Bundler::bundle()  (docker run … bundle | edge-runtime bundle)
//!   2. Compress  ── compress()         ("EZBR" tag + brotli stream)
//!   3. Enumerate ── SourceTree::glob() for static files,
//!                   ImportWalker for the entrypoint's import graph
//!   4. Upload    ── edgefn-cloud streams the multipart manifest
//! ```
//!
//! # Bundler variants
//!
//! Both variants run the same command contract,
//! `bundle --entrypoint <p> --output <p> [--import-map <p>] [--verbose]`:
//! - [`DockerBundler`] inside an ephemeral container with a shared
//!   dependency-cache volume
//! - [`NativeBundler`] as a local subprocess
//!
//! [`EdgeBundler`] selects one of them from `[edge_runtime]` config.

pub mod bundler;
pub mod compress;
pub mod docker;
pub mod executor;
mod guard;
pub mod native;
pub mod source;
pub mod walk;

pub use bundler::{BundleError, BundleRequest, Bundler, EdgeBundler};
pub use compress::{CompressError, MAGIC_ID, compress, decompress, is_compressed};
pub use docker::DockerBundler;
pub use executor::{CommandExecutor, CommandOutput, ExecError, RealExecutor};
pub use native::NativeBundler;
pub use source::{DirSource, SourceTree};
pub use walk::{ImportWalker, SourceFile, WalkError, resolve_specifier};
