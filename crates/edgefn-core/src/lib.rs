//! Core types and configuration for edgefn.
//!
//! This crate defines the `config.toml` schema ([`ProjectConfig`]), the
//! validated identifiers ([`FunctionSlug`], [`ProjectRef`]), import map
//! parsing ([`ImportMap`]), and shared error types.

pub mod config;
pub mod error;
pub mod import_map;
pub mod slug;

pub use config::{
    ApiConfig, BundlerKind, EdgeRuntimeConfig, FunctionConfig, ProjectConfig, CONFIG_FILE,
    FALLBACK_IMPORT_MAP, FUNCTIONS_DIR,
};
pub use error::{Error, Result};
pub use import_map::ImportMap;
pub use slug::{FunctionSlug, ProjectRef};
