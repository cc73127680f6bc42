//! Trajectory predictors.
//!
//! Learned models (DiffusionDrive, Transfuser) are served from an exported
//! prediction file; the constant-velocity model is computed in place.

use crate::records::{read_json, PredictionExport};
use crate::{AgentInput, EnvError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn};
use trajview_core::{normalize_angle, Pose2D, Trajectory, TrajectorySampling};

/// Yaw rates below this are treated as straight driving.
const MIN_YAW_RATE: f64 = 1e-6;

/// Supported model types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    #[serde(rename = "diffusiondrive")]
    DiffusionDrive,
    Transfuser,
    ConstantVelocity,
}

impl ModelType {
    /// Whether the model needs an exported prediction file.
    pub fn is_learned(&self) -> bool {
        !matches!(self, ModelType::ConstantVelocity)
    }

    pub fn all() -> Vec<ModelType> {
        vec![
            ModelType::DiffusionDrive,
            ModelType::Transfuser,
            ModelType::ConstantVelocity,
        ]
    }
}

impl FromStr for ModelType {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "diffusiondrive" | "diffusion_drive" => Ok(ModelType::DiffusionDrive),
            "transfuser" => Ok(ModelType::Transfuser),
            "constant_velocity" | "cv" => Ok(ModelType::ConstantVelocity),
            _ => Err(EnvError::UnsupportedModel(s.to_string())),
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::DiffusionDrive => write!(f, "diffusiondrive"),
            ModelType::Transfuser => write!(f, "transfuser"),
            ModelType::ConstantVelocity => write!(f, "constant_velocity"),
        }
    }
}

/// Model section of the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(rename = "type")]
    pub model_type: ModelType,

    /// Exported prediction file for learned models
    #[serde(default)]
    pub checkpoint_path: Option<PathBuf>,

    #[serde(default)]
    pub sampling: TrajectorySampling,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::DiffusionDrive,
            checkpoint_path: None,
            sampling: TrajectorySampling::default(),
        }
    }
}

/// Output of one inference call.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Ego-frame poses at `(i + 1) * interval`, origin not included
    pub trajectory: Trajectory,
    pub inference_time_secs: f64,
    pub model_type: ModelType,
}

/// Describes a loaded predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: ModelType,
    pub sampling: TrajectorySampling,
    /// Checkpoint path, or "kinematic" for built-in models
    pub source: String,
}

/// Produces a future ego trajectory for one frame.
pub trait TrajectoryPredictor {
    fn model_info(&self) -> ModelInfo;

    fn predict(&self, input: &AgentInput) -> Result<Prediction, EnvError>;
}

// ============================================================================
// CONSTANT VELOCITY
// ============================================================================

/// Constant speed, constant yaw rate roll-out of the current ego state.
#[derive(Debug, Clone)]
pub struct ConstantVelocityPredictor {
    sampling: TrajectorySampling,
    /// Reported model type; differs from `ConstantVelocity` when standing in for a learned model
    reported_as: ModelType,
}

impl ConstantVelocityPredictor {
    pub fn new(sampling: TrajectorySampling) -> Self {
        Self {
            sampling,
            reported_as: ModelType::ConstantVelocity,
        }
    }

    /// Kinematic stand-in reported under another model's name.
    pub fn standing_in_for(model_type: ModelType, sampling: TrajectorySampling) -> Self {
        Self {
            sampling,
            reported_as: model_type,
        }
    }

    /// Yaw rate from the last two history poses, rad/s.
    fn yaw_rate(history: &Trajectory) -> f64 {
        let n = history.len();
        if n < 2 {
            return 0.0;
        }
        let (t0, t1) = (history.timestamps()[n - 2], history.timestamps()[n - 1]);
        let dt = t1 - t0;
        if dt <= 0.0 {
            return 0.0;
        }
        let (h0, h1) = (history.poses()[n - 2].heading, history.poses()[n - 1].heading);
        normalize_angle(h1 - h0) / dt
    }

    fn pose_at(speed: f64, yaw_rate: f64, t: f64) -> Pose2D {
        if yaw_rate.abs() < MIN_YAW_RATE {
            return Pose2D::new(speed * t, 0.0, 0.0);
        }
        let theta = yaw_rate * t;
        let radius = speed / yaw_rate;
        Pose2D::new(radius * theta.sin(), radius * (1.0 - theta.cos()), normalize_angle(theta))
    }
}

impl TrajectoryPredictor for ConstantVelocityPredictor {
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_type: self.reported_as,
            sampling: self.sampling,
            source: "kinematic".to_string(),
        }
    }

    fn predict(&self, input: &AgentInput) -> Result<Prediction, EnvError> {
        let started = Instant::now();
        let speed = input.ego_status.speed();
        let yaw_rate = Self::yaw_rate(&input.history);
        let poses = (1..=self.sampling.num_poses)
            .map(|i| Self::pose_at(speed, yaw_rate, i as f64 * self.sampling.interval_length))
            .collect();
        let trajectory = Trajectory::from_sampling(poses, self.sampling)?;
        Ok(Prediction {
            trajectory,
            inference_time_secs: started.elapsed().as_secs_f64(),
            model_type: self.reported_as,
        })
    }
}

// ============================================================================
// EXPORTED PREDICTIONS
// ============================================================================

/// Serves trajectories a learned model produced offline.
#[derive(Debug, Clone)]
pub struct ExportedPredictor {
    model_type: ModelType,
    sampling: TrajectorySampling,
    checkpoint: PathBuf,
    predictions: BTreeMap<String, BTreeMap<usize, Vec<[f64; 3]>>>,
}

impl ExportedPredictor {
    /// Loads an exported prediction file.
    pub fn load(model_type: ModelType, checkpoint: &Path) -> Result<Self, EnvError> {
        if !checkpoint.exists() {
            return Err(EnvError::CheckpointMissing(checkpoint.to_path_buf()));
        }
        let export: PredictionExport = read_json(checkpoint)?;
        if export.model_type != model_type {
            warn!(
                "Checkpoint {} was exported from {}, serving it as {}",
                checkpoint.display(),
                export.model_type,
                model_type
            );
        }
        let frames: usize = export.predictions.values().map(BTreeMap::len).sum();
        info!(
            "Loaded {} predictions for {} scenes from {}",
            frames,
            export.predictions.len(),
            checkpoint.display()
        );
        Ok(Self {
            model_type,
            sampling: export.sampling,
            checkpoint: checkpoint.to_path_buf(),
            predictions: export.predictions,
        })
    }

    /// Number of scenes with at least one prediction.
    pub fn scene_count(&self) -> usize {
        self.predictions.len()
    }
}

impl TrajectoryPredictor for ExportedPredictor {
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_type: self.model_type,
            sampling: self.sampling,
            source: self.checkpoint.display().to_string(),
        }
    }

    fn predict(&self, input: &AgentInput) -> Result<Prediction, EnvError> {
        let started = Instant::now();
        let rows = self
            .predictions
            .get(input.token.as_str())
            .and_then(|frames| frames.get(&input.frame_idx))
            .ok_or_else(|| EnvError::PredictionMissing {
                token: input.token.to_string(),
                frame: input.frame_idx,
            })?;
        let poses: Vec<Pose2D> = rows.iter().map(|r| Pose2D::from(*r)).collect();
        let sampling = TrajectorySampling::new(poses.len(), self.sampling.interval_length);
        let trajectory = Trajectory::from_sampling(poses, sampling)?;
        Ok(Prediction {
            trajectory,
            inference_time_secs: started.elapsed().as_secs_f64(),
            model_type: self.model_type,
        })
    }
}

/// Builds the predictor named by the model configuration.
///
/// A learned model without a checkpoint falls back to the kinematic model
/// with a warning; a checkpoint path that does not exist is an error.
pub fn load_predictor(config: &ModelConfig) -> Result<Box<dyn TrajectoryPredictor>, EnvError> {
    if !config.model_type.is_learned() {
        return Ok(Box::new(ConstantVelocityPredictor::new(config.sampling)));
    }
    match &config.checkpoint_path {
        Some(path) => Ok(Box::new(ExportedPredictor::load(config.model_type, path)?)),
        None => {
            warn!(
                "No checkpoint for {}, using constant-velocity predictions",
                config.model_type
            );
            Ok(Box::new(ConstantVelocityPredictor::standing_in_for(
                config.model_type,
                config.sampling,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::write_json;
    use crate::types::fixtures::straight_scene;
    use approx::assert_relative_eq;

    #[test]
    fn test_model_type_from_str() {
        assert_eq!("diffusiondrive".parse::<ModelType>().unwrap(), ModelType::DiffusionDrive);
        assert_eq!("Transfuser".parse::<ModelType>().unwrap(), ModelType::Transfuser);
        assert_eq!("constant-velocity".parse::<ModelType>().unwrap(), ModelType::ConstantVelocity);
        assert!(matches!(
            "vad".parse::<ModelType>(),
            Err(EnvError::UnsupportedModel(_))
        ));
        for model in ModelType::all() {
            assert_eq!(model.to_string().parse::<ModelType>().unwrap(), model);
        }
    }

    #[test]
    fn test_constant_velocity_straight() {
        let scene = straight_scene("s");
        let input = scene.agent_input(3).unwrap();
        let predictor = ConstantVelocityPredictor::new(TrajectorySampling::default());
        let prediction = predictor.predict(&input).unwrap();

        assert_eq!(prediction.trajectory.len(), 8);
        assert_relative_eq!(prediction.trajectory.start_time().unwrap(), 0.5);
        let last = prediction.trajectory.final_pose().unwrap();
        assert_relative_eq!(last.x, 20.0, epsilon = 1e-9);
        assert_relative_eq!(last.y, 0.0);
    }

    #[test]
    fn test_constant_velocity_turning() {
        let mut scene = straight_scene("s");
        // previous frame 0.1 rad to the right of the current heading
        scene.frames[2].ego_pose.heading = -0.1;
        let input = scene.agent_input(3).unwrap();
        let predictor = ConstantVelocityPredictor::new(TrajectorySampling::new(4, 0.5));
        let prediction = predictor.predict(&input).unwrap();

        let last = prediction.trajectory.final_pose().unwrap();
        assert!(last.y > 0.0, "left turn expected, got y = {}", last.y);
        assert_relative_eq!(last.heading, 0.4, epsilon = 1e-9);
        // arc length is preserved
        let chord = (last.x.powi(2) + last.y.powi(2)).sqrt();
        assert!(chord < 10.0 && chord > 9.0);
    }

    #[test]
    fn test_exported_predictor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diffusiondrive.json");
        let export = PredictionExport {
            model_type: ModelType::DiffusionDrive,
            sampling: TrajectorySampling::default(),
            predictions: BTreeMap::from([(
                "s".to_string(),
                BTreeMap::from([(3, (1..=8).map(|i| [i as f64, 0.0, 0.0]).collect())]),
            )]),
        };
        write_json(&path, &export).unwrap();

        let predictor = ExportedPredictor::load(ModelType::DiffusionDrive, &path).unwrap();
        assert_eq!(predictor.scene_count(), 1);

        let scene = straight_scene("s");
        let prediction = predictor.predict(&scene.agent_input(3).unwrap()).unwrap();
        assert_eq!(prediction.model_type, ModelType::DiffusionDrive);
        assert_relative_eq!(prediction.trajectory.end_time().unwrap(), 4.0);

        assert!(matches!(
            predictor.predict(&scene.agent_input(4).unwrap()),
            Err(EnvError::PredictionMissing { frame: 4, .. })
        ));
    }

    #[test]
    fn test_load_predictor_dispatch() {
        let fallback = load_predictor(&ModelConfig::default()).unwrap();
        assert_eq!(fallback.model_info().model_type, ModelType::DiffusionDrive);
        assert_eq!(fallback.model_info().source, "kinematic");

        let missing = ModelConfig {
            model_type: ModelType::Transfuser,
            checkpoint_path: Some(PathBuf::from("/nonexistent/transfuser.json")),
            sampling: TrajectorySampling::default(),
        };
        assert!(matches!(
            load_predictor(&missing),
            Err(EnvError::CheckpointMissing(_))
        ));
    }
}
