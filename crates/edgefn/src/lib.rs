//! Bundle and deploy Edge Functions.
//!
//! This is the facade crate: [`Deployer`] drives the per-function pipeline
//! and the sub-crates are re-exported for callers that need the pieces.
//!
//! | Module | Crate | Description |
//! |--------|-------|-------------|
//! | root | `edgefn-core` | Configuration and shared types |
//! | [`build`] | `edgefn-build` | Bundlers, compression, import graph walking |
//! | [`cloud`] | `edgefn-cloud` | Streaming upload to the deploy endpoint |
//!
//! ```rust,no_run
//! use std::path::Path;
//! use edgefn::{DeployOptions, Deployer, ProjectConfig};
//! use edgefn::build::EdgeBundler;
//! use edgefn::cloud::FunctionsClient;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(client: FunctionsClient) -> Result<(), Box<dyn std::error::Error>> {
//! let workdir = Path::new("/srv/app/supabase");
//! let config = ProjectConfig::load(workdir)?;
//! let bundler = EdgeBundler::from_config(&config.edge_runtime, workdir, false);
//! let deployer = Deployer::new(config, workdir, bundler, client);
//! let summary = deployer
//!     .deploy(&DeployOptions::default(), &CancellationToken::new())
//!     .await?;
//! println!("{} deployed", summary.deployed.len());
//! # Ok(())
//! # }
//! ```

pub mod deploy;

pub use deploy::{DeployError, DeployOptions, DeploySummary, Deployer, dashboard_url};

// Core types flattened into root namespace for convenience.
pub use edgefn_core::*;

/// Bundling, compression, and source enumeration.
pub mod build {
    pub use edgefn_build::*;
}

/// Streaming upload to the functions deploy endpoint.
pub mod cloud {
    pub use edgefn_cloud::*;
}
