use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Identifiers ──
    #[error("invalid function slug {0:?}: must start with a letter and contain only letters, digits, '_' or '-'")]
    InvalidSlug(String),

    #[error("invalid project ref {0:?}: must be 20 lowercase letters")]
    InvalidProjectRef(String),

    // ── Import map ──
    #[error("failed to parse import map {path}")]
    ImportMapParse {
        path: String,
        source: serde_json::Error,
    },
}
