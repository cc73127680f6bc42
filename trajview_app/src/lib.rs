//! trajview application layer
//!
//! Turns synchronized trajectory sets into images and animations:
//!
//! ```text
//!  SceneSource (logs / synthetic)    TrajectoryPredictor (export / kinematic)
//!        │ ground truth, PDM-Closed          │ prediction
//!        └─────────────────┬─────────────────┘
//!                          ▼
//!                 synchronize (core)
//!                          ▼
//!        Renderer ──► PNG / GIF + JSON / YAML reports
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use trajview_app::{AppConfig, TrajectoryApp};
//!
//! let app = TrajectoryApp::from_config(AppConfig::default(), Some(42))?;
//! let token = app.random_scenes(1).remove(0);
//! let report = app.predict_single_scene(&token, Some((0.0, 3.0)), None)?;
//! ```

pub mod app;
pub mod config;
mod error;
pub mod exporter;
pub mod gif;
pub mod render;
mod synthetic;
mod visualizer;

pub use app::{check_data, open_source, AppInfo, DemoResult, TrajectoryApp};
pub use config::AppConfig;
pub use error::{AppError, ConfigError, RenderError};
pub use exporter::{BatchSummary, FrameMetadata, GifResult, SceneReport};
pub use synthetic::SyntheticSource;
pub use visualizer::RerunLogger;
