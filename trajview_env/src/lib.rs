//! trajview environment layer
//!
//! Separates the application from where its inputs come from:
//! - **Scenes**: [`SceneSource`] serves recorded driving segments and their
//!   reference trajectories (ground truth, PDM-Closed)
//! - **Models**: [`TrajectoryPredictor`] turns an [`AgentInput`] into a
//!   future ego trajectory
//!
//! # Example
//!
//! ```ignore
//! use trajview_env::{load_predictor, LogDirSource, ModelConfig, SceneSource};
//!
//! let source = LogDirSource::open(&logs, &blobs, Some(&cache))?;
//! let predictor = load_predictor(&ModelConfig::default())?;
//! for token in source.tokens() {
//!     let scene = source.load_scene(&token)?;
//!     let input = scene.agent_input(scene.current_frame_index())?;
//!     let prediction = predictor.predict(&input)?;
//! }
//! ```

mod error;
mod types;
mod source;
mod predictor;
mod log_source;
pub mod records;

pub use error::EnvError;
pub use types::{
    AgentBox, AgentInput, DrivingCommand, EgoStatus, Frame, MapElementKind, MapPolyline, Scene,
    SceneMetadata, SceneToken, FRONT_CAMERA,
};
pub use source::{SceneSource, SceneStatistics, GROUND_TRUTH, PDM_CLOSED, PREDICTION};
pub use predictor::{
    load_predictor, ConstantVelocityPredictor, ExportedPredictor, ModelConfig, ModelInfo,
    ModelType, Prediction, TrajectoryPredictor,
};
pub use log_source::{LogDirSource, MissingFilesReport};
