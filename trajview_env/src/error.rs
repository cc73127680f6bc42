//! Error types for the trajview environment layer.

use std::path::PathBuf;
use thiserror::Error;
use trajview_core::TrajectoryError;

/// Errors raised while loading scenes, sensor data or model outputs.
#[derive(Debug, Error)]
pub enum EnvError {
    /// No scene with this token in the source
    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    /// Frame index past the end of the scene
    #[error("Frame {frame} out of range for scene {token} ({available} frames)")]
    FrameOutOfRange {
        token: String,
        frame: usize,
        available: usize,
    },

    /// Data directory or log file does not exist
    #[error("Data path not found: {}", .0.display())]
    DataNotFound(PathBuf),

    /// Model checkpoint does not exist
    #[error("Checkpoint not found: {}", .0.display())]
    CheckpointMissing(PathBuf),

    /// Checkpoint has no trajectory for this scene frame
    #[error("No prediction for scene {token} frame {frame}")]
    PredictionMissing { token: String, frame: usize },

    /// Sensor blob referenced by a scene is missing on disk
    #[error("Missing sensor file for scene {token}: {}", .path.display())]
    MissingSensor { token: String, path: PathBuf },

    /// Unknown model type string
    #[error("Unsupported model type: {0}")]
    UnsupportedModel(String),

    /// Malformed JSON or record contents
    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// Stored poses do not form a valid trajectory
    #[error("Invalid trajectory: {0}")]
    InvalidTrajectory(#[from] TrajectoryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvError {
    /// Creates a scene-not-found error.
    pub fn scene_not_found(token: impl std::fmt::Display) -> Self {
        Self::SceneNotFound(token.to_string())
    }

    /// Creates a parse error for `path`.
    pub fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
