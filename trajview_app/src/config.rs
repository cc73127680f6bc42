//! Application configuration.
//!
//! A YAML document with four sections (`model`, `data`, `visualization`,
//! `logging`). Every string value may reference environment variables as
//! `$VAR` or `${VAR}`; unknown variables are kept verbatim.
//!
//! ```yaml
//! model:
//!   type: diffusiondrive
//!   checkpoint_path: ${NAVSIM_EXP_ROOT}/predictions/diffusiondrive.json
//! data:
//!   navsim_log_path: ${OPENSCENE_DATA_ROOT}/navsim_logs/test
//!   sensor_blobs_path: ${OPENSCENE_DATA_ROOT}/sensor_blobs/test
//!   cache_path: ${NAVSIM_EXP_ROOT}/metric_cache
//! visualization:
//!   output_dir: ./output
//!   font_family: DejaVuSans
//! ```

use crate::error::ConfigError;
use crate::render::StyleOverride;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use trajview_core::{BevProjector, TimeWindow};
use trajview_env::ModelConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub data: DataConfig,
    pub visualization: VisualizationConfig,
    pub logging: LoggingConfig,
}

/// Where scenes come from. Without `navsim_log_path` the synthetic source is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub navsim_log_path: Option<PathBuf>,
    pub sensor_blobs_path: Option<PathBuf>,
    pub cache_path: Option<PathBuf>,
    pub synthetic: SyntheticConfig,
}

/// Generated scenes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub num_scenes: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self { seed: 42, num_scenes: 8 }
    }
}

/// Fixed time-window sweep defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GifConfig {
    pub total_duration: f64,
    pub window_size: f64,
    pub step_size: f64,
    pub fps: f64,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            total_duration: 6.0,
            window_size: 3.0,
            step_size: 0.5,
            fps: 2.0,
        }
    }
}

/// Sliding-window animation defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlidingConfig {
    pub sampling_rate: f64,
    pub total_duration: f64,
    pub prediction_horizon: f64,
    pub show_history: bool,
    pub history_fade_steps: usize,
    pub fps: f64,
}

impl Default for SlidingConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 2.0,
            total_duration: 8.0,
            prediction_horizon: 4.0,
            show_history: true,
            history_fade_steps: 5,
            fps: 4.0,
        }
    }
}

/// Frame-sequence animation defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSequenceConfig {
    pub start_frame: usize,
    pub num_frames: usize,
    pub frame_step: usize,
    pub prediction_horizon: f64,
    pub fps: f64,
}

impl Default for FrameSequenceConfig {
    fn default() -> Self {
        Self {
            start_frame: 0,
            num_frames: 8,
            frame_step: 1,
            prediction_horizon: 3.0,
            fps: 2.0,
        }
    }
}

/// Rendering and output options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub output_dir: PathBuf,
    /// Windows used by the demo
    pub time_windows: Vec<TimeWindow>,
    /// Default window of single-scene predictions
    pub time_window: TimeWindow,
    /// Grid spacing of synchronization, seconds
    pub dt: f64,
    /// BEV half-range, metres
    pub bev_range: f64,
    /// BEV side length, pixels
    pub bev_size: u32,
    pub trajectory_styles: BTreeMap<String, StyleOverride>,
    /// TrueType family searched in the usual font directories
    pub font_family: String,
    /// Explicit font file, overrides `font_family`
    pub font_path: Option<PathBuf>,
    pub gif: GifConfig,
    pub sliding: SlidingConfig,
    pub frames: FrameSequenceConfig,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            time_windows: vec![(0.0, 1.5), (0.0, 3.0), (0.0, 6.0)],
            time_window: (0.0, 3.0),
            dt: 0.1,
            bev_range: 32.0,
            bev_size: 512,
            trajectory_styles: BTreeMap::new(),
            font_family: "DejaVuSans".to_string(),
            font_path: None,
            gif: GifConfig::default(),
            sliding: SlidingConfig::default(),
            frames: FrameSequenceConfig::default(),
        }
    }
}

impl VisualizationConfig {
    pub fn projector(&self) -> BevProjector {
        BevProjector::new(self.bev_range, self.bev_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads a YAML file, substituting environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&contents, |name| std::env::var(name).ok()).map_err(
            |source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
        )?;
        config.validate()?;
        Ok(config)
    }

    /// Parses YAML, resolving variables through `lookup`.
    pub fn from_yaml_str(
        yaml: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, serde_yaml::Error> {
        let mut value: Value = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            value = Value::Mapping(Default::default());
        }
        expand_value(&mut value, &lookup);
        serde_yaml::from_value(value)
    }

    /// Rejects settings no operation can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let viz = &self.visualization;
        if !(viz.dt > 0.0) {
            return Err(ConfigError::invalid("visualization.dt", "must be positive"));
        }
        if !(viz.bev_range > 0.0) || viz.bev_size == 0 {
            return Err(ConfigError::invalid("visualization.bev_range/bev_size", "must be positive"));
        }
        if !(self.model.sampling.interval_length > 0.0) {
            return Err(ConfigError::invalid("model.sampling.interval_length", "must be positive"));
        }
        for (start, end) in viz.time_windows.iter().chain(std::iter::once(&viz.time_window)) {
            if !(end > start) {
                return Err(ConfigError::invalid(
                    "visualization.time_windows",
                    format!("window ({start}, {end}) is empty"),
                ));
            }
        }
        Ok(())
    }

    /// Effective log filter directive.
    pub fn log_level(&self) -> &str {
        &self.logging.level
    }
}

fn expand_value(value: &mut Value, lookup: &impl Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => *s = expand_vars(s, lookup),
        Value::Sequence(items) => items.iter_mut().for_each(|v| expand_value(v, lookup)),
        Value::Mapping(map) => map.iter_mut().for_each(|(_, v)| expand_value(v, lookup)),
        Value::Tagged(tagged) => expand_value(&mut tagged.value, lookup),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Replaces `$NAME` and `${NAME}` with `lookup(NAME)`; unresolved references stay as written.
pub fn expand_vars(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(close) = braced.find('}') {
                let name = &braced[..close];
                match lookup(name) {
                    Some(v) if !name.is_empty() => out.push_str(&v),
                    _ => out.push_str(&rest[pos..pos + 2 + close + 1]),
                }
                rest = &braced[close + 1..];
                continue;
            }
            out.push_str(&rest[pos..]);
            return out;
        }

        let len = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
        let name = &after[..len];
        match (name.is_empty(), lookup(name)) {
            (false, Some(v)) => out.push_str(&v),
            _ => out.push_str(&rest[pos..pos + 1 + len]),
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use trajview_env::ModelType;

    fn env(name: &str) -> Option<String> {
        match name {
            "DATA_ROOT" => Some("/data".to_string()),
            "EXP" => Some("/exp".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_vars() {
        assert_eq!(expand_vars("$DATA_ROOT/logs", &env), "/data/logs");
        assert_eq!(expand_vars("${EXP}/cache", &env), "/exp/cache");
        assert_eq!(expand_vars("${DATA_ROOT}${EXP}", &env), "/data/exp");
        assert_eq!(expand_vars("$UNKNOWN/x", &env), "$UNKNOWN/x");
        assert_eq!(expand_vars("${UNKNOWN}/x", &env), "${UNKNOWN}/x");
        assert_eq!(expand_vars("cost $5", &env), "cost $5");
        assert_eq!(expand_vars("trailing $", &env), "trailing $");
        assert_eq!(expand_vars("${open", &env), "${open");
    }

    proptest! {
        #[test]
        fn test_unresolved_text_is_kept(input in "\\PC*") {
            prop_assert_eq!(expand_vars(&input, &|_: &str| None), input);
        }
    }

    #[test]
    fn test_defaults_from_empty_document() {
        let config = AppConfig::from_yaml_str("", env).unwrap();
        assert_eq!(config.model.model_type, ModelType::DiffusionDrive);
        assert_eq!(config.visualization.time_windows.len(), 3);
        assert_eq!(config.visualization.dt, 0.1);
        assert_eq!(config.data.synthetic.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_document() {
        let yaml = r##"
model:
  type: transfuser
  checkpoint_path: ${EXP}/predictions/transfuser.json
data:
  navsim_log_path: $DATA_ROOT/navsim_logs/test
  sensor_blobs_path: $DATA_ROOT/sensor_blobs/test
visualization:
  output_dir: ${EXP}/viz
  font_path: ${EXP}/fonts/mono.ttf
  time_windows: [[0.0, 2.0], [1.0, 4.0]]
  trajectory_styles:
    pdm_closed:
      color: "#000000"
  sliding:
    sampling_rate: 4.0
logging:
  level: debug
"##;
        let config = AppConfig::from_yaml_str(yaml, env).unwrap();
        assert_eq!(config.model.model_type, ModelType::Transfuser);
        assert_eq!(
            config.model.checkpoint_path,
            Some(PathBuf::from("/exp/predictions/transfuser.json"))
        );
        assert_eq!(config.data.navsim_log_path, Some(PathBuf::from("/data/navsim_logs/test")));
        assert_eq!(config.visualization.output_dir, PathBuf::from("/exp/viz"));
        assert_eq!(config.visualization.font_path, Some(PathBuf::from("/exp/fonts/mono.ttf")));
        assert_eq!(config.visualization.font_family, "DejaVuSans");
        assert_eq!(config.visualization.time_windows, vec![(0.0, 2.0), (1.0, 4.0)]);
        assert_eq!(config.visualization.sliding.sampling_rate, 4.0);
        assert_eq!(config.visualization.sliding.history_fade_steps, 5);
        assert!(config.visualization.trajectory_styles.contains_key("pdm_closed"));
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            AppConfig::load(Path::new("/nonexistent/config.yaml")),
            Err(ConfigError::NotFound(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model: [not, a, mapping").unwrap();
        assert!(matches!(AppConfig::load(file.path()), Err(ConfigError::Parse { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "visualization:\n  dt: 0").unwrap();
        assert!(matches!(AppConfig::load(file.path()), Err(ConfigError::Invalid { .. })));
    }
}
