use crate::config::ConfigError;
use crate::db::gateway::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal startup errors. Anything after startup is handled per cycle.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("env file not found: {0}")]
    EnvFileMissing(PathBuf),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, AppError>;
