//! On-disk JSON formats.
//!
//! - scene logs: `<navsim_log_path>/<log_name>.json` holding a [`SceneLog`]
//! - metric cache: `<cache_path>/<token>.json` holding a [`MetricCacheEntry`]
//! - exported predictions: a [`PredictionExport`] per checkpoint file

use crate::{EnvError, ModelType, Scene};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use trajview_core::{Pose2D, Trajectory, TrajectorySampling};

/// All scenes of one recorded log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneLog {
    pub log_name: String,
    pub scenes: Vec<Scene>,
}

/// Uniformly sampled ego-frame poses as `[x, y, heading]` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledPoses {
    pub interval_length: f64,
    pub poses: Vec<[f64; 3]>,
}

impl SampledPoses {
    pub fn sampling(&self) -> TrajectorySampling {
        TrajectorySampling::new(self.poses.len(), self.interval_length)
    }

    /// Poses stamped at `(i + 1) * interval_length`, without an origin sample.
    pub fn to_trajectory(&self) -> Result<Trajectory, EnvError> {
        let poses = self.poses.iter().map(|p| Pose2D::from(*p)).collect();
        Ok(Trajectory::from_sampling(poses, self.sampling())?)
    }
}

/// Per-scene metric cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCacheEntry {
    pub pdm_closed: SampledPoses,
}

/// Trajectories exported from a learned model, keyed by scene token and frame index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionExport {
    pub model_type: ModelType,
    #[serde(default)]
    pub sampling: TrajectorySampling,
    pub predictions: BTreeMap<String, BTreeMap<usize, Vec<[f64; 3]>>>,
}

/// Reads and deserializes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, EnvError> {
    if !path.exists() {
        return Err(EnvError::DataNotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| EnvError::parse(path, e))
}

/// Serializes to pretty JSON and writes the file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), EnvError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| EnvError::parse(path, e))?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sampled_poses_to_trajectory() {
        let sampled = SampledPoses {
            interval_length: 0.1,
            poses: (1..=40).map(|i| [i as f64 * 0.5, 0.0, 0.0]).collect(),
        };
        let traj = sampled.to_trajectory().unwrap();
        assert_eq!(traj.len(), 40);
        assert_relative_eq!(traj.start_time().unwrap(), 0.1);
        assert_relative_eq!(traj.end_time().unwrap(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_prediction_export_parses_integer_frame_keys() {
        let json = r#"{
            "model_type": "diffusiondrive",
            "predictions": { "tok": { "3": [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0]] } }
        }"#;
        let export: PredictionExport = serde_json::from_str(json).unwrap();
        assert_eq!(export.model_type, ModelType::DiffusionDrive);
        assert_eq!(export.sampling, TrajectorySampling::default());
        assert_eq!(export.predictions["tok"][&3].len(), 2);
    }

    #[test]
    fn test_read_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            read_json::<MetricCacheEntry>(&missing),
            Err(EnvError::DataNotFound(_))
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            read_json::<MetricCacheEntry>(&bad),
            Err(EnvError::Parse { .. })
        ));
    }
}
