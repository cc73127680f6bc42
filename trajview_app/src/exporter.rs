//! Run reports.
//!
//! Every rendered scene gets a JSON sidecar ([`SceneReport`]); batch runs
//! add a `batch_summary.yaml` ([`BatchSummary`]); animations return a
//! [`GifResult`] with per-frame metadata.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use trajview_core::{DisplacementMetrics, MetricsAggregate, SkipReason, SynchronizedSet, TimeWindow};
use trajview_env::{ModelType, Scene, GROUND_TRUTH};

/// Size of one synchronized source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub points: usize,
    pub duration_secs: f64,
}

/// Everything known about one rendered scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneReport {
    pub token: String,
    pub log_name: String,
    pub map_name: String,
    pub scenario_type: String,
    pub model_type: ModelType,

    pub time_window: TimeWindow,
    pub horizon: f64,
    pub dt: f64,

    /// Synchronized sources
    pub trajectories: BTreeMap<String, TrajectorySummary>,

    /// Sources left out of the synchronized set
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub skipped: BTreeMap<String, SkipReason>,

    /// Each non-ground-truth source against ground truth
    pub metrics: BTreeMap<String, DisplacementMetrics>,

    pub inference_time_secs: f64,
    pub processing_time_secs: f64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_path: Option<PathBuf>,
}

impl SceneReport {
    /// Summarizes a synchronized set; metrics are filled in when ground truth is present.
    pub fn new(scene: &Scene, model_type: ModelType, window: TimeWindow, set: &SynchronizedSet) -> Self {
        let trajectories = set
            .trajectories
            .iter()
            .map(|(name, traj)| {
                let summary = TrajectorySummary {
                    points: traj.len(),
                    duration_secs: traj.duration(),
                };
                (name.clone(), summary)
            })
            .collect();

        let metrics = match set.get(GROUND_TRUTH) {
            Some(gt) => set
                .trajectories
                .iter()
                .filter(|(name, _)| name.as_str() != GROUND_TRUTH)
                .map(|(name, traj)| (name.clone(), DisplacementMetrics::between(gt, traj)))
                .collect(),
            None => BTreeMap::new(),
        };

        Self {
            token: scene.token().to_string(),
            log_name: scene.metadata.log_name.clone(),
            map_name: scene.metadata.map_name.clone(),
            scenario_type: scene.metadata.scenario_type.clone(),
            model_type,
            time_window: window,
            horizon: set.horizon,
            dt: set.dt,
            trajectories,
            skipped: set.skipped.clone(),
            metrics,
            inference_time_secs: 0.0,
            processing_time_secs: 0.0,
            image_path: None,
        }
    }

    /// Metrics of one source against ground truth.
    pub fn metrics_for(&self, source: &str) -> Option<&DisplacementMetrics> {
        self.metrics.get(source)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

// ============================================================================
// BATCH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub mean_ade: f64,
    pub mean_fde: f64,
    pub mean_processing_time: f64,
}

/// Per-map counts and means.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioBreakdown {
    pub count: usize,
    pub mean_ade: f64,
    pub mean_fde: f64,
}

/// A scene the batch had to skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub token: String,
    pub error: String,
}

/// Outcome of a batch run, written as `batch_summary.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_scenes: usize,
    pub successful_scenes: usize,
    pub failed_scenes: usize,
    /// Percent of scenes that rendered
    pub success_rate: f64,
    pub aggregate_metrics: AggregateMetrics,
    pub scenario_breakdown: BTreeMap<String, ScenarioBreakdown>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<BatchFailure>,

    #[serde(skip)]
    overall: MetricsAggregate,
    #[serde(skip)]
    per_map: BTreeMap<String, MetricsAggregate>,
    #[serde(skip)]
    total_processing_time: f64,
}

impl BatchSummary {
    /// Creates an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a rendered scene; its prediction metrics count towards the means.
    pub fn add_success(&mut self, report: &SceneReport, prediction_source: &str) {
        self.total_scenes += 1;
        self.successful_scenes += 1;
        self.total_processing_time += report.processing_time_secs;

        let per_map = self.per_map.entry(report.map_name.clone()).or_default();
        let breakdown = self.scenario_breakdown.entry(report.map_name.clone()).or_default();
        breakdown.count += 1;
        if let Some(metrics) = report.metrics_for(prediction_source) {
            self.overall.add(metrics);
            per_map.add(metrics);
        }
    }

    /// Records a skipped scene.
    pub fn add_failure(&mut self, token: impl Into<String>, error: impl std::fmt::Display) {
        self.total_scenes += 1;
        self.failed_scenes += 1;
        self.failures.push(BatchFailure {
            token: token.into(),
            error: error.to_string(),
        });
    }

    /// Computes rates and means from the recorded scenes.
    pub fn finalize(&mut self) {
        self.success_rate = if self.total_scenes == 0 {
            0.0
        } else {
            self.successful_scenes as f64 / self.total_scenes as f64 * 100.0
        };
        self.aggregate_metrics = AggregateMetrics {
            mean_ade: self.overall.mean_ade(),
            mean_fde: self.overall.mean_fde(),
            mean_processing_time: if self.successful_scenes == 0 {
                0.0
            } else {
                self.total_processing_time / self.successful_scenes as f64
            },
        };
        for (map, breakdown) in self.scenario_breakdown.iter_mut() {
            if let Some(agg) = self.per_map.get(map) {
                breakdown.mean_ade = agg.mean_ade();
                breakdown.mean_fde = agg.mean_fde();
            }
        }
    }

    /// Writes to a YAML file.
    pub fn write_to_file(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }
}

// ============================================================================
// ANIMATIONS
// ============================================================================

/// What one animation frame shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub frame_idx: usize,
    /// Seconds relative to the scene's current frame
    pub timestamp: f64,
    pub prediction_points: usize,
    pub gt_points: usize,
}

/// A written GIF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GifResult {
    pub path: PathBuf,
    pub frames: usize,
    pub fps: f64,
    pub file_size_bytes: u64,
    pub processing_time_secs: f64,

    /// First and last recorded frame shown
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub frame_range: Option<(usize, usize)>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub frame_metadata: Vec<FrameMetadata>,

    /// Animation steps that could not be rendered
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped_steps: Vec<String>,
}

impl GifResult {
    pub fn file_size_mb(&self) -> f64 {
        self.file_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;
    use trajview_core::{synchronize, Pose2D, Trajectory};
    use trajview_env::{SceneSource, PREDICTION};

    fn report(map: &str, offset: f64, time: f64) -> SceneReport {
        let source = crate::synthetic::SyntheticSource::new(1, 1);
        let mut scene = source.load_scene(&source.tokens()[0]).unwrap();
        scene.metadata.map_name = map.to_string();

        let line = |dy: f64| {
            Trajectory::new(
                (0..5).map(|i| Pose2D::new(i as f64, dy, 0.0)).collect(),
                (0..5).map(|i| i as f64).collect(),
            )
            .unwrap()
        };
        let sources = BTreeMap::from([
            (GROUND_TRUTH.to_string(), line(0.0)),
            (PREDICTION.to_string(), line(offset)),
        ]);
        let set = synchronize(&sources, 4.0, 1.0).unwrap();
        let mut report = SceneReport::new(&scene, ModelType::ConstantVelocity, (0.0, 3.0), &set);
        report.processing_time_secs = time;
        report
    }

    #[test]
    fn test_scene_report_metrics() {
        let r = report("boston", 2.0, 0.5);
        assert_eq!(r.trajectories[PREDICTION].points, 5);
        assert_relative_eq!(r.trajectories[GROUND_TRUTH].duration_secs, 4.0);
        assert_relative_eq!(r.metrics_for(PREDICTION).unwrap().ade, 2.0);
        assert!(r.metrics_for(GROUND_TRUTH).is_none());
    }

    #[test]
    fn test_batch_summary_aggregation() {
        let mut summary = BatchSummary::new();
        summary.add_success(&report("boston", 1.0, 1.0), PREDICTION);
        summary.add_success(&report("boston", 3.0, 2.0), PREDICTION);
        summary.add_success(&report("vegas", 2.0, 3.0), PREDICTION);
        summary.add_failure("deadbeef", "Scene not found: deadbeef");
        summary.finalize();

        assert_eq!(summary.total_scenes, 4);
        assert_eq!(summary.failed_scenes, 1);
        assert_relative_eq!(summary.success_rate, 75.0);
        assert_relative_eq!(summary.aggregate_metrics.mean_ade, 2.0);
        assert_relative_eq!(summary.aggregate_metrics.mean_processing_time, 2.0);
        assert_eq!(summary.scenario_breakdown["boston"].count, 2);
        assert_relative_eq!(summary.scenario_breakdown["boston"].mean_fde, 2.0);
        assert_eq!(summary.failures[0].token, "deadbeef");
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let r = report("boston", 1.0, 0.2);
        let json_path = dir.path().join("scene.json");
        r.write_to_file(&json_path).unwrap();
        let back: SceneReport = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(back.token, r.token);

        let mut summary = BatchSummary::new();
        summary.add_success(&r, PREDICTION);
        summary.finalize();
        let yaml_path = dir.path().join("out/batch_summary.yaml");
        summary.write_to_file(&yaml_path).unwrap();
        let text = fs::read_to_string(&yaml_path).unwrap();
        assert!(text.contains("success_rate: 100"));
        assert!(text.contains("scenario_breakdown"));
    }
}
