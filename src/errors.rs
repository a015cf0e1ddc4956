// src/errors.rs

//! Crate-wide error type.
//!
//! Per-task outcomes that are *expected* (a lost claim race, a failed
//! generation) are not errors here; they are typed results in
//! [`crate::store`] and [`crate::generator`]. `FamiliarError` covers what
//! actually has to propagate: bad configuration, watcher setup failures, and
//! tasks that could not be moved out of `Processing/`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FamiliarError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    /// A claimed task could not be relocated to `Done/` or `Failed/`.
    ///
    /// The file is left in `Processing/` for manual recovery.
    #[error("Failed to finalize {task:?} (left at {left_at:?}): {source}")]
    FinalizeError {
        task: String,
        left_at: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FamiliarError>;
