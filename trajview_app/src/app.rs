//! Application operations.
//!
//! [`TrajectoryApp`] ties a scene source, a predictor and the renderer
//! together. Each operation loads what it needs, synchronizes the sources
//! and writes its outputs under the configured output directory.
//!
//! Batch and demo runs skip scenes that fail and record them; animations
//! skip individual steps that fail. Everything else propagates its error.

use crate::config::{AppConfig, FrameSequenceConfig, SlidingConfig};
use crate::error::{AppError, RenderError};
use crate::exporter::{BatchFailure, BatchSummary, FrameMetadata, GifResult, SceneReport};
use crate::gif::write_gif;
use crate::render::{save_png, BevLayer, Renderer, StyleSet, TextRenderer};
use crate::synthetic::SyntheticSource;
use crate::visualizer::RerunLogger;
use image::RgbaImage;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use trajview_core::timeline::{frame_sequence, history_alpha, sampling_times, sweep_windows};
use trajview_core::{synchronize, SynchronizedSet, TimeWindow, Trajectory};
use trajview_env::{
    load_predictor, LogDirSource, MissingFilesReport, ModelInfo, ModelType, Prediction, Scene,
    SceneSource, SceneStatistics, SceneToken, TrajectoryPredictor, GROUND_TRUTH, PDM_CLOSED,
    PREDICTION,
};

/// Extra seconds synchronized past the end of the displayed window.
const HORIZON_MARGIN: f64 = 1.0;

/// Settings echoed by [`TrajectoryApp::app_info`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub model_type: ModelType,
    pub data_split: String,
    pub has_checkpoint: bool,
    pub output_dir: PathBuf,
}

/// Model, data and configuration overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub status: String,
    pub model: ModelInfo,
    pub data: SceneStatistics,
    pub config: ConfigSummary,
}

/// Images written for one demo scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoScene {
    pub token: String,
    pub images: Vec<PathBuf>,
}

/// Outcome of [`TrajectoryApp::create_demo_visualization`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoResult {
    pub output_dir: PathBuf,
    pub scenes: Vec<DemoScene>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<BatchFailure>,
}

/// Opens the scene source the configuration points at.
///
/// A synthetic seed, or a configuration without `navsim_log_path`, selects
/// generated scenes.
pub fn open_source(config: &AppConfig, synthetic_seed: Option<u64>) -> Result<Box<dyn SceneSource>, AppError> {
    let data = &config.data;
    match (synthetic_seed, &data.navsim_log_path) {
        (None, Some(log_path)) => {
            let blobs = data.sensor_blobs_path.clone().unwrap_or_else(|| log_path.clone());
            let source = LogDirSource::open(log_path, &blobs, data.cache_path.as_deref())?;
            Ok(Box::new(source))
        }
        (seed, _) => {
            let seed = seed.unwrap_or(data.synthetic.seed);
            Ok(Box::new(SyntheticSource::new(seed, data.synthetic.num_scenes)))
        }
    }
}

/// Sensor-file check over the configured recorded logs.
pub fn check_data(config: &AppConfig, max_scenes_per_log: Option<usize>) -> Result<MissingFilesReport, AppError> {
    let data = &config.data;
    let log_path = data
        .navsim_log_path
        .as_ref()
        .ok_or_else(|| AppError::Empty("data.navsim_log_path is not configured".to_string()))?;
    let blobs = data.sensor_blobs_path.clone().unwrap_or_else(|| log_path.clone());
    let source = LogDirSource::open(log_path, &blobs, data.cache_path.as_deref())?;
    Ok(source.check_missing_files(max_scenes_per_log))
}

/// The visualization harness.
pub struct TrajectoryApp {
    config: AppConfig,
    source: Box<dyn SceneSource>,
    predictor: Box<dyn TrajectoryPredictor>,
    renderer: Renderer,
    rerun: RerunLogger,
}

impl TrajectoryApp {
    /// Creates an app over explicit components.
    pub fn new(
        config: AppConfig,
        source: Box<dyn SceneSource>,
        predictor: Box<dyn TrajectoryPredictor>,
    ) -> Result<Self, AppError> {
        let styles = StyleSet::with_overrides(&config.visualization.trajectory_styles)?;
        let viz = &config.visualization;
        let text = TextRenderer::load(&viz.font_family, viz.font_path.as_deref());
        let renderer = Renderer::new(styles, viz.projector()).with_text(text);
        Ok(Self {
            config,
            source,
            predictor,
            renderer,
            rerun: RerunLogger::disabled(),
        })
    }

    /// Builds source and predictor from the configuration.
    pub fn from_config(config: AppConfig, synthetic_seed: Option<u64>) -> Result<Self, AppError> {
        let source = open_source(&config, synthetic_seed)?;
        let predictor = load_predictor(&config.model)?;
        info!(
            "Initialized {} predictor over '{}' scenes",
            predictor.model_info().model_type,
            source.name()
        );
        Self::new(config, source, predictor)
    }

    /// Streams every synchronized set to Rerun as well.
    pub fn with_rerun(mut self, rerun: RerunLogger) -> Self {
        self.rerun = rerun;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn source(&self) -> &dyn SceneSource {
        self.source.as_ref()
    }

    fn output_dir(&self, output_dir: Option<&Path>) -> PathBuf {
        output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.visualization.output_dir.clone())
    }

    /// Prediction plus references at the scene's current frame, on one grid.
    fn synchronized_scene(&self, scene: &Scene, horizon: f64) -> Result<(SynchronizedSet, Prediction), AppError> {
        let mut sources = self.source.reference_trajectories(scene)?;
        let input = scene.agent_input(scene.current_frame_index())?;
        let prediction = self.predictor.predict(&input)?;
        sources.insert(PREDICTION.to_string(), prediction.trajectory.with_origin());

        let set = synchronize(&sources, horizon, self.config.visualization.dt)?;
        for (name, reason) in &set.skipped {
            warn!("Scene {}: '{}' left out ({})", scene.token(), name, reason);
        }
        if set.is_empty() {
            return Err(AppError::Empty(format!("no trajectories to show for scene {}", scene.token())));
        }
        Ok((set, prediction))
    }

    // ========================================================================
    // STATIC IMAGES
    // ========================================================================

    /// Renders the comprehensive view of one scene and writes PNG + JSON report.
    pub fn predict_single_scene(
        &self,
        token: &SceneToken,
        window: Option<TimeWindow>,
        output_dir: Option<&Path>,
    ) -> Result<SceneReport, AppError> {
        let started = Instant::now();
        let window = window.unwrap_or(self.config.visualization.time_window);
        let scene = self.source.load_scene(token)?;
        let (set, prediction) = self.synchronized_scene(&scene, window.1 + HORIZON_MARGIN)?;

        let image = self.renderer.comprehensive_view(&scene, &set, window)?;
        let dir = self.output_dir(output_dir);
        let image_path = dir.join(format!("scene_{}_prediction.png", token.short()));
        save_png(&image, &image_path)?;

        let mut report = SceneReport::new(&scene, prediction.model_type, window, &set);
        report.inference_time_secs = prediction.inference_time_secs;
        report.image_path = Some(image_path.clone());
        report.processing_time_secs = started.elapsed().as_secs_f64();
        report.write_to_file(&image_path.with_extension("json"))?;

        self.rerun.log_trajectories(token.as_str(), &set, &self.renderer.styles);
        if let Some(metrics) = report.metrics_for(PREDICTION) {
            self.rerun.log_metrics(PREDICTION, metrics);
            info!(
                "Scene {}: ADE {:.3} m, FDE {:.3} m ({:.2}s) -> {}",
                token,
                metrics.ade,
                metrics.fde,
                report.processing_time_secs,
                image_path.display()
            );
        } else {
            info!("Scene {} -> {}", token, image_path.display());
        }
        Ok(report)
    }

    /// One comprehensive view per window, written as `{prefix}_{i:03}.png`.
    pub fn export_animation_frames(
        &self,
        token: &SceneToken,
        windows: &[TimeWindow],
        output_dir: &Path,
        prefix: &str,
    ) -> Result<Vec<PathBuf>, AppError> {
        let horizon = windows.iter().map(|w| w.1).fold(0.0, f64::max);
        let scene = self.source.load_scene(token)?;
        let (set, _) = self.synchronized_scene(&scene, horizon)?;

        let mut paths = Vec::with_capacity(windows.len());
        for (i, window) in windows.iter().enumerate() {
            let image = self.renderer.comprehensive_view(&scene, &set, *window)?;
            let path = output_dir.join(format!("{}_{:03}.png", prefix, i));
            save_png(&image, &path)?;
            paths.push(path);
        }
        info!("Exported {} frames to {}", paths.len(), output_dir.display());
        Ok(paths)
    }

    // ========================================================================
    // ANIMATIONS
    // ========================================================================

    /// Sweeps a fixed-size window over one synchronized set.
    pub fn create_trajectory_gif(
        &self,
        token: &SceneToken,
        total_duration: f64,
        window_size: f64,
        step: f64,
        fps: f64,
        output_dir: Option<&Path>,
    ) -> Result<GifResult, AppError> {
        let started = Instant::now();
        let windows = sweep_windows(total_duration, window_size, step);
        if windows.is_empty() {
            return Err(AppError::Empty(format!(
                "no {}s windows fit in {}s",
                window_size, total_duration
            )));
        }
        let scene = self.source.load_scene(token)?;
        let (set, _) = self.synchronized_scene(&scene, total_duration)?;

        let mut frames = Vec::with_capacity(windows.len());
        let mut skipped_steps = Vec::new();
        for (i, window) in windows.iter().enumerate() {
            match self.renderer.comprehensive_view(&scene, &set, *window) {
                Ok(image) => frames.push(image),
                Err(e) => {
                    warn!("Skipping window {:?}: {}", window, e);
                    skipped_steps.push(format!("window {}: {}", i, e));
                }
            }
            debug!("Rendered window {}/{}", i + 1, windows.len());
        }

        let path = self.output_dir(output_dir).join(format!("scene_{}_trajectory.gif", token.short()));
        self.finish_gif(frames, fps, path, started, None, Vec::new(), skipped_steps)
    }

    /// One prediction per sampling time, with fading earlier predictions.
    ///
    /// Each prediction is made at the frame closest to its sampling time and
    /// kept in the scene's reference frame; every GIF frame is drawn around
    /// the ego pose of its own frame.
    pub fn create_sliding_window_gif(
        &self,
        token: &SceneToken,
        params: &SlidingConfig,
        output_dir: Option<&Path>,
    ) -> Result<GifResult, AppError> {
        let started = Instant::now();
        let times = sampling_times(params.sampling_rate, params.total_duration);
        if times.is_empty() {
            return Err(AppError::Empty("no sampling times".to_string()));
        }
        let scene = self.source.load_scene(token)?;
        let reference_idx = scene.current_frame_index();
        let reference_pose = scene.frame(reference_idx)?.ego_pose;
        let ground_truth = scene.future_trajectory(reference_idx, None)?;
        let pdm = self.source.pdm_trajectory(&scene)?;
        let horizon = params.prediction_horizon;

        // (prediction in the reference frame, scene time it was made at)
        let mut history: Vec<(Trajectory, f64)> = Vec::new();
        let mut frames = Vec::with_capacity(times.len());
        let mut metadata = Vec::with_capacity(times.len());
        let mut skipped_steps = Vec::new();

        for (step, t) in times.iter().enumerate() {
            let Some((frame_idx, _)) = scene.closest_frame(*t) else {
                continue;
            };
            let frame = scene.frame(frame_idx)?;
            let frame_time = scene.frame_time(frame_idx).unwrap_or(*t);

            let predicted = scene
                .agent_input(frame_idx)
                .map_err(AppError::from)
                .and_then(|input| self.predictor.predict(&input).map_err(AppError::from));
            let prediction = match predicted {
                Ok(p) => p
                    .trajectory
                    .with_origin()
                    .truncate_to(horizon)
                    .reframe(&frame.ego_pose, &reference_pose)
                    .shifted(frame_time),
                Err(e) => {
                    warn!("Skipping t={:.1}s (frame {}): {}", t, frame_idx, e);
                    skipped_steps.push(format!("t={:.1}s: {}", t, e));
                    continue;
                }
            };

            let window = (frame_time, frame_time + horizon);
            let to_frame = |traj: &Trajectory| traj.reframe(&reference_pose, &frame.ego_pose);
            let current = to_frame(&prediction);
            let gt = to_frame(&ground_truth);
            let planner = pdm.as_ref().map(to_frame);
            let faded: Vec<(Trajectory, f64, TimeWindow)> = if params.show_history {
                history
                    .iter()
                    .rev()
                    .enumerate()
                    .map(|(i, (traj, made_at))| {
                        let alpha = history_alpha(1.0, i + 1, params.history_fade_steps);
                        (to_frame(traj), alpha, (*made_at, *made_at + horizon))
                    })
                    .filter(|(_, alpha, _)| *alpha > 0.0)
                    .collect()
            } else {
                Vec::new()
            };

            let mut layers: Vec<BevLayer<'_>> = Vec::new();
            if let Some(planner) = &planner {
                layers.push(BevLayer::new(PDM_CLOSED, planner, window));
            }
            layers.push(BevLayer::new(GROUND_TRUTH, &gt, window));
            for (traj, alpha, w) in faded.iter().rev() {
                layers.push(BevLayer {
                    alpha_scale: *alpha,
                    markers: false,
                    ..BevLayer::new(PREDICTION, traj, *w)
                });
            }
            layers.push(BevLayer::new(PREDICTION, &current, window));

            let progress = (step + 1) as f64 / times.len() as f64;
            match self.renderer.frame_view(frame, &scene, &layers, Some(progress)) {
                Ok(image) => {
                    frames.push(image);
                    metadata.push(FrameMetadata {
                        frame_idx,
                        timestamp: frame_time,
                        prediction_points: prediction.len(),
                        gt_points: gt.window(window.0, window.1).len(),
                    });
                }
                Err(e) => {
                    warn!("Skipping t={:.1}s: {}", t, e);
                    skipped_steps.push(format!("t={:.1}s: {}", t, e));
                }
            }
            debug!("Sliding step {}/{} at frame {}", step + 1, times.len(), frame_idx);
            history.push((prediction, frame_time));
        }

        let path = self.output_dir(output_dir).join(format!("scene_{}_sliding.gif", token.short()));
        self.finish_gif(frames, params.fps, path, started, None, metadata, skipped_steps)
    }

    /// One BEV frame per recorded frame, each centred on that frame's ego pose.
    pub fn create_frame_sequence_gif(
        &self,
        token: &SceneToken,
        params: &FrameSequenceConfig,
        output_dir: Option<&Path>,
    ) -> Result<GifResult, AppError> {
        let started = Instant::now();
        let scene = self.source.load_scene(token)?;
        let indices = frame_sequence(params.start_frame, params.num_frames, params.frame_step, scene.frames.len());
        let (Some(&first), Some(&last)) = (indices.first(), indices.last()) else {
            return Err(AppError::Empty(format!(
                "start frame {} is past the {} frames of scene {}",
                params.start_frame,
                scene.frames.len(),
                token
            )));
        };
        let horizon = params.prediction_horizon;
        let window = (0.0, horizon);
        let current_idx = scene.current_frame_index();
        let pdm = self.source.pdm_trajectory(&scene)?;

        let mut frames = Vec::with_capacity(indices.len());
        let mut metadata = Vec::with_capacity(indices.len());
        let mut skipped_steps = Vec::new();

        for (i, &frame_idx) in indices.iter().enumerate() {
            let rendered = self.render_sequence_frame(
                &scene,
                frame_idx,
                horizon,
                window,
                pdm.as_ref().filter(|_| frame_idx == current_idx),
                (i + 1) as f64 / indices.len() as f64,
            );
            match rendered {
                Ok((image, meta)) => {
                    frames.push(image);
                    metadata.push(meta);
                }
                Err(e) => {
                    warn!("Skipping frame {}: {}", frame_idx, e);
                    skipped_steps.push(format!("frame {}: {}", frame_idx, e));
                }
            }
            debug!("Frame {}/{} (index {})", i + 1, indices.len(), frame_idx);
        }

        let path = self
            .output_dir(output_dir)
            .join(format!("scene_{}_frames_{}_{}.gif", token.short(), first, last));
        self.finish_gif(frames, params.fps, path, started, Some((first, last)), metadata, skipped_steps)
    }

    fn render_sequence_frame(
        &self,
        scene: &Scene,
        frame_idx: usize,
        horizon: f64,
        window: TimeWindow,
        pdm: Option<&Trajectory>,
        progress: f64,
    ) -> Result<(RgbaImage, FrameMetadata), AppError> {
        let frame = scene.frame(frame_idx)?;
        let input = scene.agent_input(frame_idx)?;
        let prediction = self.predictor.predict(&input)?.trajectory.with_origin().truncate_to(horizon);
        let gt = scene.future_trajectory(frame_idx, Some(horizon))?;

        let mut layers = Vec::with_capacity(3);
        if let Some(pdm) = pdm {
            layers.push(BevLayer::new(PDM_CLOSED, pdm, window));
        }
        layers.push(BevLayer::new(GROUND_TRUTH, &gt, window));
        layers.push(BevLayer::new(PREDICTION, &prediction, window));

        let image = self.renderer.frame_view(frame, scene, &layers, Some(progress))?;
        let meta = FrameMetadata {
            frame_idx,
            timestamp: scene.frame_time(frame_idx).unwrap_or_default(),
            prediction_points: prediction.len(),
            gt_points: gt.len(),
        };
        Ok((image, meta))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_gif(
        &self,
        frames: Vec<RgbaImage>,
        fps: f64,
        path: PathBuf,
        started: Instant,
        frame_range: Option<(usize, usize)>,
        frame_metadata: Vec<FrameMetadata>,
        skipped_steps: Vec<String>,
    ) -> Result<GifResult, AppError> {
        if frames.is_empty() {
            return Err(RenderError::NoFrames.into());
        }
        let count = frames.len();
        let file_size_bytes = write_gif(frames, fps, &path)?;
        Ok(GifResult {
            path,
            frames: count,
            fps,
            file_size_bytes,
            processing_time_secs: started.elapsed().as_secs_f64(),
            frame_range,
            frame_metadata,
            skipped_steps,
        })
    }

    // ========================================================================
    // BATCH & DEMO
    // ========================================================================

    /// Renders up to `max_scenes` scenes, skipping failures, and writes
    /// `batch_summary.yaml`.
    pub fn predict_batch_scenes(
        &self,
        tokens: &[SceneToken],
        window: Option<TimeWindow>,
        max_scenes: Option<usize>,
        output_dir: Option<&Path>,
    ) -> Result<BatchSummary, AppError> {
        let dir = self.output_dir(output_dir);
        let limit = max_scenes.unwrap_or(tokens.len()).min(tokens.len());
        info!("Batch over {} of {} scenes", limit, tokens.len());

        let mut summary = BatchSummary::new();
        for (i, token) in tokens.iter().take(limit).enumerate() {
            match self.predict_single_scene(token, window, Some(&dir)) {
                Ok(report) => summary.add_success(&report, PREDICTION),
                Err(e) => {
                    error!("Scene {} failed: {}", token, e);
                    self.rerun.log_event("batch/failures", &format!("{}: {}", token, e));
                    summary.add_failure(token.as_str(), &e);
                }
            }
            debug!("Batch progress {}/{}", i + 1, limit);
        }
        summary.finalize();

        summary.write_to_file(&dir.join("batch_summary.yaml"))?;
        info!(
            "Batch complete: {}/{} scenes ({:.1}%), mean ADE {:.3} m",
            summary.successful_scenes, summary.total_scenes, summary.success_rate, summary.aggregate_metrics.mean_ade
        );
        Ok(summary)
    }

    /// Renders randomly chosen scenes at several window lengths into
    /// `<output>/demo/scene_<n>/`.
    pub fn create_demo_visualization(
        &self,
        num_scenes: usize,
        windows: Option<&[TimeWindow]>,
    ) -> Result<DemoResult, AppError> {
        let windows = windows.unwrap_or(self.config.visualization.time_windows.as_slice());
        let demo_dir = self.config.visualization.output_dir.join("demo");
        let mut result = DemoResult {
            output_dir: demo_dir.clone(),
            scenes: Vec::new(),
            failures: Vec::new(),
        };

        for (i, token) in self.random_scenes(num_scenes).iter().enumerate() {
            let scene_dir = demo_dir.join(format!("scene_{}", i + 1));
            let mut images = Vec::with_capacity(windows.len());
            for window in windows {
                match self.demo_image(token, *window, &scene_dir) {
                    Ok(path) => images.push(path),
                    Err(e) => {
                        error!("Demo scene {} window {:?} failed: {}", token, window, e);
                        result.failures.push(BatchFailure {
                            token: token.to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            result.scenes.push(DemoScene {
                token: token.to_string(),
                images,
            });
        }

        info!("Demo written to {}", demo_dir.display());
        Ok(result)
    }

    /// Renders one window and renames the outputs with a `_t{end}s` suffix.
    fn demo_image(&self, token: &SceneToken, window: TimeWindow, dir: &Path) -> Result<PathBuf, AppError> {
        let report = self.predict_single_scene(token, Some(window), Some(dir))?;
        let stem = format!("scene_{}_prediction_t{:.1}s", token.short(), window.1);
        let image = dir.join(format!("{}.png", stem));
        if let Some(rendered) = &report.image_path {
            fs::rename(rendered, &image)?;
            fs::rename(rendered.with_extension("json"), image.with_extension("json"))?;
        }
        Ok(image)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Up to `n` distinct tokens, chosen reproducibly from the configured seed.
    pub fn random_scenes(&self, n: usize) -> Vec<SceneToken> {
        let tokens = self.source.tokens();
        if n > tokens.len() {
            warn!("Requested {} scenes, only {} available", n, tokens.len());
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.data.synthetic.seed);
        tokens.choose_multiple(&mut rng, n).cloned().collect()
    }

    pub fn app_info(&self) -> AppInfo {
        let data_split = self
            .config
            .data
            .navsim_log_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.name().to_string());
        AppInfo {
            status: "ready".to_string(),
            model: self.predictor.model_info(),
            data: self.source.statistics(),
            config: ConfigSummary {
                model_type: self.config.model.model_type,
                data_split,
                has_checkpoint: self.config.model.checkpoint_path.is_some(),
                output_dir: self.config.visualization.output_dir.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trajview_core::{SyncError, TrajectorySampling};
    use trajview_env::ConstantVelocityPredictor;

    fn app(dir: &Path) -> TrajectoryApp {
        let mut config = AppConfig::default();
        config.visualization.output_dir = dir.to_path_buf();
        config.visualization.bev_size = 128;
        config.data.synthetic.num_scenes = 4;
        TrajectoryApp::new(
            config,
            Box::new(SyntheticSource::new(5, 4)),
            Box::new(ConstantVelocityPredictor::new(TrajectorySampling::default())),
        )
        .unwrap()
    }

    #[test]
    fn test_predict_single_scene() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let token = app.source().tokens()[0].clone();

        let report = app.predict_single_scene(&token, None, None).unwrap();
        let image_path = report.image_path.clone().unwrap();
        assert_eq!(
            image_path.file_name().unwrap().to_string_lossy(),
            format!("scene_{}_prediction.png", token.short())
        );
        assert!(image_path.is_file());
        assert!(image_path.with_extension("json").is_file());
        // default window (0, 3) synchronizes to 4 s at 0.1 s
        assert_eq!(report.trajectories[PREDICTION].points, 41);
        assert!(report.metrics_for(PREDICTION).is_some());
        assert!(report.metrics_for(PDM_CLOSED).is_some());
    }

    #[test]
    fn test_unknown_scene_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let err = app.predict_single_scene(&SceneToken::new("missing"), None, None);
        assert!(matches!(err, Err(AppError::Env(_))));
    }

    #[test]
    fn test_oversized_window_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let token = app.source().tokens()[0].clone();

        let err = app.predict_single_scene(&token, Some((0.0, 1e12)), None);
        assert!(matches!(err, Err(AppError::Sync(SyncError::GridTooLarge { .. }))));

        let gif = app.create_trajectory_gif(&token, 1e30, 0.0, 1e-9, 2.0, None);
        assert!(matches!(gif, Err(AppError::Empty(_))));
    }

    #[test]
    fn test_trajectory_gif_frame_count() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let token = app.source().tokens()[1].clone();

        let result = app.create_trajectory_gif(&token, 6.0, 3.0, 0.5, 2.0, None).unwrap();
        assert_eq!(result.frames, 7);
        assert!(result.path.is_file());
        assert!(result.skipped_steps.is_empty());

        let none = app.create_trajectory_gif(&token, 2.0, 3.0, 0.5, 2.0, None);
        assert!(matches!(none, Err(AppError::Empty(_))));
    }

    #[test]
    fn test_sliding_window_gif() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let token = app.source().tokens()[2].clone();
        let params = SlidingConfig {
            total_duration: 2.0,
            ..SlidingConfig::default()
        };

        let result = app.create_sliding_window_gif(&token, &params, None).unwrap();
        assert_eq!(result.frames, 5);
        let frames: Vec<usize> = result.frame_metadata.iter().map(|m| m.frame_idx).collect();
        assert_eq!(frames, vec![3, 4, 5, 6, 7]);
        assert!(result.frame_metadata.iter().all(|m| m.prediction_points > 0));
    }

    #[test]
    fn test_frame_sequence_gif() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let token = app.source().tokens()[0].clone();
        let params = FrameSequenceConfig {
            start_frame: 0,
            num_frames: 4,
            frame_step: 2,
            ..FrameSequenceConfig::default()
        };

        let result = app.create_frame_sequence_gif(&token, &params, None).unwrap();
        assert_eq!(result.frames, 4);
        assert_eq!(result.frame_range, Some((0, 6)));
        assert_eq!(result.frame_metadata[1].frame_idx, 2);
        // 3 s of recorded future at 2 Hz plus the origin
        assert_eq!(result.frame_metadata[0].gt_points, 7);

        let past_end = FrameSequenceConfig {
            start_frame: 50,
            ..FrameSequenceConfig::default()
        };
        assert!(matches!(
            app.create_frame_sequence_gif(&token, &past_end, None),
            Err(AppError::Empty(_))
        ));
    }

    #[test]
    fn test_batch_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let mut tokens = app.source().tokens();
        tokens.insert(1, SceneToken::new("not-a-scene"));

        let summary = app.predict_batch_scenes(&tokens, None, Some(3), None).unwrap();
        assert_eq!(summary.total_scenes, 3);
        assert_eq!(summary.successful_scenes, 2);
        assert_eq!(summary.failures[0].token, "not-a-scene");
        assert!(dir.path().join("batch_summary.yaml").is_file());
    }

    #[test]
    fn test_demo_visualization() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let result = app
            .create_demo_visualization(2, Some(&[(0.0, 1.5), (0.0, 3.0)]))
            .unwrap();
        assert_eq!(result.scenes.len(), 2);
        assert!(result.failures.is_empty());
        let first = &result.scenes[0].images;
        assert_eq!(first.len(), 2);
        assert!(first[0].ends_with(format!(
            "demo/scene_1/scene_{}_prediction_t1.5s.png",
            SceneToken::new(result.scenes[0].token.as_str()).short()
        )));
        assert!(first.iter().all(|p| p.is_file()));
    }

    #[test]
    fn test_export_animation_frames() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let token = app.source().tokens()[3].clone();
        let out = dir.path().join("frames");
        let paths = app
            .export_animation_frames(&token, &[(0.0, 1.0), (0.5, 1.5)], &out, "anim")
            .unwrap();
        assert_eq!(paths, vec![out.join("anim_000.png"), out.join("anim_001.png")]);
        assert!(paths.iter().all(|p| p.is_file()));
    }

    #[test]
    fn test_random_scenes_and_info() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let picked = app.random_scenes(2);
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0], picked[1]);
        assert_eq!(picked, app.random_scenes(2));
        assert_eq!(app.random_scenes(10).len(), 4);

        let info = app.app_info();
        assert_eq!(info.status, "ready");
        assert_eq!(info.data.total_scenes, 4);
        assert_eq!(info.config.data_split, "synthetic");
        assert!(!info.config.has_checkpoint);
    }

    #[test]
    fn test_open_source_selection() {
        let config = AppConfig::default();
        let source = open_source(&config, None).unwrap();
        assert_eq!(source.name(), "synthetic");
        assert_eq!(source.tokens().len(), config.data.synthetic.num_scenes);

        let mut missing = AppConfig::default();
        missing.data.navsim_log_path = Some(PathBuf::from("/nonexistent/navsim_logs"));
        assert!(open_source(&missing, None).is_err());
        assert!(open_source(&missing, Some(1)).is_ok());
        assert!(matches!(check_data(&AppConfig::default(), None), Err(AppError::Empty(_))));
    }
}
