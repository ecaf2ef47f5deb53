use route_enrich_lib::EnrichError;
use std::path::PathBuf;

/// Everything that can stop a command
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
