//! Scene source trait.

use crate::{EnvError, Scene, SceneToken};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trajview_core::Trajectory;

/// Source name of the model's predicted trajectory.
pub const PREDICTION: &str = "prediction";

/// Source name of the recorded ego trajectory.
pub const GROUND_TRUTH: &str = "ground_truth";

/// Source name of the PDM-Closed planner trajectory.
pub const PDM_CLOSED: &str = "pdm_closed";

/// Summary of what a source can serve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneStatistics {
    pub total_scenes: usize,
    pub map_locations: Vec<String>,
    pub log_names: Vec<String>,
    pub has_metric_cache: bool,
    pub metric_cache_scenes: usize,
}

/// Where scenes and their reference trajectories come from.
///
/// # Implementations
///
/// - **Recorded logs**: `LogDirSource` - JSON scene logs + metric cache on disk
/// - **Synthetic**: deterministic generated scenes (in the application crate)
pub trait SceneSource {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// All scene tokens, in a stable order.
    fn tokens(&self) -> Vec<SceneToken>;

    /// Loads a full scene.
    fn load_scene(&self, token: &SceneToken) -> Result<Scene, EnvError>;

    /// PDM-Closed trajectory for the scene's current frame, in its ego frame.
    ///
    /// `Ok(None)` when the source has no planner output for this scene.
    fn pdm_trajectory(&self, scene: &Scene) -> Result<Option<Trajectory>, EnvError>;

    /// Counts and names for reporting.
    fn statistics(&self) -> SceneStatistics;

    /// Ground truth and, when available, PDM-Closed for the scene's current frame.
    fn reference_trajectories(
        &self,
        scene: &Scene,
    ) -> Result<BTreeMap<String, Trajectory>, EnvError> {
        let mut references = BTreeMap::new();
        let ground_truth = scene.future_trajectory(scene.current_frame_index(), None)?;
        references.insert(GROUND_TRUTH.to_string(), ground_truth);
        if let Some(pdm) = self.pdm_trajectory(scene)? {
            references.insert(PDM_CLOSED.to_string(), pdm);
        }
        Ok(references)
    }
}
