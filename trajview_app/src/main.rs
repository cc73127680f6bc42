//! trajview CLI
//!
//! Render model predictions against ground truth and PDM-Closed as images
//! and GIF animations.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use trajview_app::{check_data, AppConfig, AppError, ConfigError, RerunLogger, TrajectoryApp};
use trajview_core::TimeWindow;
use trajview_env::SceneToken;

/// Trajectory prediction visualization harness
#[derive(Parser, Debug)]
#[command(name = "trajview")]
#[command(about = "Visualize predicted, ground-truth and PDM-Closed trajectories", long_about = None)]
struct Args {
    /// YAML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use generated scenes with this seed instead of recorded logs
    #[arg(long)]
    synthetic: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Stream trajectories to a Rerun viewer
    #[arg(long)]
    rerun: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show model, data and configuration
    Info,

    /// Render one scene (random when no token is given)
    Predict {
        #[arg(short, long)]
        scene: Option<String>,
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        window: Option<Vec<f64>>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render many scenes and write batch_summary.yaml
    Batch {
        #[arg(short, long)]
        max_scenes: Option<usize>,
        /// Pick scenes at random instead of in source order
        #[arg(long)]
        random: bool,
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        window: Option<Vec<f64>>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fixed time-window sweep as a GIF
    Gif {
        #[arg(short, long)]
        scene: Option<String>,
        #[arg(long)]
        total: Option<f64>,
        #[arg(long)]
        window_size: Option<f64>,
        #[arg(long)]
        step: Option<f64>,
        #[arg(long)]
        fps: Option<f64>,
        /// Also write each window as a PNG
        #[arg(long)]
        export_frames: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Per-step predictions with fading history as a GIF
    Sliding {
        #[arg(short, long)]
        scene: Option<String>,
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long)]
        total: Option<f64>,
        #[arg(long)]
        horizon: Option<f64>,
        #[arg(long)]
        no_history: bool,
        #[arg(long)]
        fade_steps: Option<usize>,
        #[arg(long)]
        fps: Option<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// One BEV frame per recorded frame as a GIF
    Frames {
        #[arg(short, long)]
        scene: Option<String>,
        #[arg(long)]
        start_frame: Option<usize>,
        #[arg(long)]
        num_frames: Option<usize>,
        #[arg(long)]
        frame_step: Option<usize>,
        #[arg(long)]
        horizon: Option<f64>,
        #[arg(long)]
        fps: Option<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Random scenes at several window lengths
    Demo {
        #[arg(short, long, default_value = "3")]
        num_scenes: usize,
    },

    /// Report sensor files missing from the recorded logs
    Check {
        #[arg(long)]
        max_per_log: Option<usize>,
    },
}

fn main() {
    let args = Args::parse();

    // Config first: its logging level feeds the subscriber
    let config = match &args.config {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    };

    let directive = if args.verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").ok().unwrap_or_else(|| {
            config
                .as_ref()
                .map(|c| c.log_level().to_string())
                .unwrap_or_else(|_| "info".to_string())
        })
    };
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args, config) {
        error!("✗ {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args, config: AppConfig) -> Result<(), AppError> {
    if let Command::Check { max_per_log } = &args.command {
        let report = check_data(&config, *max_per_log)?;
        if args.json {
            print_json(&report)?;
        } else {
            info!("Checked {} scenes", report.checked_scenes);
            for log in &report.logs_not_found {
                warn!("  unreadable log: {}", log);
            }
            info!("  missing lidar files:  {}", report.lidar.len());
            info!("  missing camera files: {}", report.cameras.len());
        }
        if !report.is_complete() {
            return Err(AppError::Empty(format!("{} sensor files missing", report.total_missing())));
        }
        return Ok(());
    }

    let mut app = TrajectoryApp::from_config(config, args.synthetic)?;
    if args.rerun {
        app = app.with_rerun(RerunLogger::new("trajview"));
    }
    let viz = app.config().visualization.clone();

    match &args.command {
        Command::Info => {
            let info = app.app_info();
            if args.json {
                print_json(&info)?;
            } else {
                info!("trajview v{}", env!("CARGO_PKG_VERSION"));
                info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
                info!("Model:   {} ({})", info.model.model_type, info.model.source);
                info!(
                    "Horizon: {} poses @ {}s",
                    info.model.sampling.num_poses, info.model.sampling.interval_length
                );
                info!("Data:    {} ({} scenes)", info.config.data_split, info.data.total_scenes);
                info!("Maps:    {}", info.data.map_locations.join(", "));
                info!(
                    "Metric cache: {} ({} scenes)",
                    info.data.has_metric_cache, info.data.metric_cache_scenes
                );
                info!("Output:  {}", info.config.output_dir.display());
                info!("Status:  {}", info.status);
            }
        }

        Command::Predict { scene, window, output } => {
            let token = resolve_scene(&app, scene)?;
            let window = parse_window(window)?;
            let report = app.predict_single_scene(&token, window, output.as_deref())?;
            if args.json {
                print_json(&report)?;
            } else if let Some(path) = &report.image_path {
                info!("✓ Scene {} -> {}", token, path.display());
            }
        }

        Command::Batch { max_scenes, random, window, output } => {
            let tokens = if *random {
                app.random_scenes(max_scenes.unwrap_or(app.source().tokens().len()))
            } else {
                app.source().tokens()
            };
            let window = parse_window(window)?;
            let summary = app.predict_batch_scenes(&tokens, window, *max_scenes, output.as_deref())?;
            if args.json {
                print_json(&summary)?;
            } else {
                info!(
                    "✓ {}/{} scenes, mean ADE {:.3} m, mean FDE {:.3} m",
                    summary.successful_scenes,
                    summary.total_scenes,
                    summary.aggregate_metrics.mean_ade,
                    summary.aggregate_metrics.mean_fde
                );
                for failure in &summary.failures {
                    error!("  - {}: {}", failure.token, failure.error);
                }
            }
        }

        Command::Gif { scene, total, window_size, step, fps, export_frames, output } => {
            let token = resolve_scene(&app, scene)?;
            let total = total.unwrap_or(viz.gif.total_duration);
            let window_size = window_size.unwrap_or(viz.gif.window_size);
            let step = step.unwrap_or(viz.gif.step_size);
            let result = app.create_trajectory_gif(
                &token,
                total,
                window_size,
                step,
                fps.unwrap_or(viz.gif.fps),
                output.as_deref(),
            )?;
            if *export_frames {
                let dir = output.clone().unwrap_or_else(|| viz.output_dir.clone()).join("frames");
                let windows = trajview_core::timeline::sweep_windows(total, window_size, step);
                app.export_animation_frames(&token, &windows, &dir, &format!("scene_{}", token.short()))?;
            }
            report_gif(args.json, &result)?;
        }

        Command::Sliding { scene, rate, total, horizon, no_history, fade_steps, fps, output } => {
            let token = resolve_scene(&app, scene)?;
            let defaults = &viz.sliding;
            let params = trajview_app::config::SlidingConfig {
                sampling_rate: rate.unwrap_or(defaults.sampling_rate),
                total_duration: total.unwrap_or(defaults.total_duration),
                prediction_horizon: horizon.unwrap_or(defaults.prediction_horizon),
                show_history: defaults.show_history && !no_history,
                history_fade_steps: fade_steps.unwrap_or(defaults.history_fade_steps),
                fps: fps.unwrap_or(defaults.fps),
            };
            let result = app.create_sliding_window_gif(&token, &params, output.as_deref())?;
            report_gif(args.json, &result)?;
        }

        Command::Frames { scene, start_frame, num_frames, frame_step, horizon, fps, output } => {
            let token = resolve_scene(&app, scene)?;
            let defaults = &viz.frames;
            let params = trajview_app::config::FrameSequenceConfig {
                start_frame: start_frame.unwrap_or(defaults.start_frame),
                num_frames: num_frames.unwrap_or(defaults.num_frames),
                frame_step: frame_step.unwrap_or(defaults.frame_step),
                prediction_horizon: horizon.unwrap_or(defaults.prediction_horizon),
                fps: fps.unwrap_or(defaults.fps),
            };
            let result = app.create_frame_sequence_gif(&token, &params, output.as_deref())?;
            report_gif(args.json, &result)?;
        }

        Command::Demo { num_scenes } => {
            let result = app.create_demo_visualization(*num_scenes, None)?;
            if args.json {
                print_json(&result)?;
            } else {
                let images: usize = result.scenes.iter().map(|s| s.images.len()).sum();
                info!("✓ {} images for {} scenes in {}", images, result.scenes.len(), result.output_dir.display());
                for failure in &result.failures {
                    error!("  - {}: {}", failure.token, failure.error);
                }
            }
        }

        Command::Check { .. } => {}
    }

    Ok(())
}

fn resolve_scene(app: &TrajectoryApp, scene: &Option<String>) -> Result<SceneToken, AppError> {
    match scene {
        Some(token) => Ok(SceneToken::new(token.as_str())),
        None => app
            .random_scenes(1)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Empty(format!("no scenes in source '{}'", app.source().name()))),
    }
}

fn parse_window(window: &Option<Vec<f64>>) -> Result<Option<TimeWindow>, AppError> {
    match window.as_deref() {
        None => Ok(None),
        Some([start, end]) if end > start => Ok(Some((*start, *end))),
        Some(values) => Err(ConfigError::invalid("--window", format!("{:?} is not START < END", values)).into()),
    }
}

fn report_gif(json: bool, result: &trajview_app::GifResult) -> Result<(), AppError> {
    if json {
        return print_json(result);
    }
    info!(
        "✓ {} ({} frames, {:.2} MB, {:.1}s)",
        result.path.display(),
        result.frames,
        result.file_size_mb(),
        result.processing_time_secs
    );
    for step in &result.skipped_steps {
        warn!("  skipped {}", step);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
