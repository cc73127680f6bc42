//! Error types for the trajview application.

use std::path::PathBuf;
use thiserror::Error;
use trajview_core::{SyncError, TrajectoryError};
use trajview_env::EnvError;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid configuration {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Value out of its allowed range
    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl std::fmt::Display) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Image and animation output errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Animation requested with nothing to show
    #[error("No frames to encode")]
    NoFrames,

    #[error("Scene {0} has no frames")]
    EmptyScene(String),

    #[error("Invalid colour '{0}', expected #RRGGBB")]
    InvalidColor(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error of application operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Synchronization failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid trajectory: {0}")]
    Trajectory(#[from] TrajectoryError),

    /// Operation produced nothing usable
    #[error("Nothing to render: {0}")]
    Empty(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
