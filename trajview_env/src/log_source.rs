//! File-backed scene source.
//!
//! Layout on disk:
//! - `<navsim_log_path>/<log_name>.json` - one [`SceneLog`] per recorded log
//! - `<sensor_blobs_path>/...` - camera and lidar blobs, referenced by relative path
//! - `<cache_path>/<token>.json` - PDM-Closed metric cache per scene

use crate::records::{read_json, MetricCacheEntry, SceneLog};
use crate::source::{SceneSource, SceneStatistics};
use crate::{EnvError, Scene, SceneToken};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use trajview_core::Trajectory;

/// Sensor blobs and logs that could not be found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingFilesReport {
    pub lidar: Vec<PathBuf>,
    pub cameras: Vec<PathBuf>,
    pub logs_not_found: Vec<String>,
    pub checked_scenes: usize,
}

impl MissingFilesReport {
    pub fn total_missing(&self) -> usize {
        self.lidar.len() + self.cameras.len()
    }

    pub fn is_complete(&self) -> bool {
        self.total_missing() == 0 && self.logs_not_found.is_empty()
    }
}

/// Scenes read from JSON logs in a directory.
pub struct LogDirSource {
    sensor_blobs_path: PathBuf,
    cache_path: Option<PathBuf>,
    scenes: BTreeMap<SceneToken, Scene>,
    /// Tokens per log, in log order
    logs: BTreeMap<String, Vec<SceneToken>>,
    unreadable_logs: Vec<String>,
}

impl LogDirSource {
    /// Reads every `*.json` log under `navsim_log_path`.
    ///
    /// Logs that fail to parse are skipped and remembered for
    /// [`check_missing_files`](Self::check_missing_files).
    pub fn open(
        navsim_log_path: &Path,
        sensor_blobs_path: &Path,
        cache_path: Option<&Path>,
    ) -> Result<Self, EnvError> {
        if !navsim_log_path.is_dir() {
            return Err(EnvError::DataNotFound(navsim_log_path.to_path_buf()));
        }

        let mut log_files: Vec<PathBuf> = fs::read_dir(navsim_log_path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        log_files.sort();

        let mut scenes = BTreeMap::new();
        let mut logs: BTreeMap<String, Vec<SceneToken>> = BTreeMap::new();
        let mut unreadable_logs = Vec::new();

        for path in log_files {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match read_json::<SceneLog>(&path) {
                Ok(log) => {
                    let tokens = logs.entry(log.log_name.clone()).or_default();
                    for scene in log.scenes {
                        let token = scene.token().clone();
                        if scenes.contains_key(&token) {
                            warn!("Duplicate scene token {} in {}", token, path.display());
                            continue;
                        }
                        tokens.push(token.clone());
                        scenes.insert(token, scene);
                    }
                }
                Err(e) => {
                    error!("Failed to load log {}: {}", path.display(), e);
                    unreadable_logs.push(stem);
                }
            }
        }

        if let Some(cache) = cache_path {
            if !cache.is_dir() {
                warn!("Metric cache {} not found, PDM-Closed disabled", cache.display());
            }
        }

        info!(
            "Loaded {} scenes from {} logs in {}",
            scenes.len(),
            logs.len(),
            navsim_log_path.display()
        );

        Ok(Self {
            sensor_blobs_path: sensor_blobs_path.to_path_buf(),
            cache_path: cache_path.map(Path::to_path_buf),
            scenes,
            logs,
            unreadable_logs,
        })
    }

    /// Log names whose file could not be parsed.
    pub fn unreadable_logs(&self) -> &[String] {
        &self.unreadable_logs
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.sensor_blobs_path.join(path)
        }
    }

    fn cache_file(&self, token: &SceneToken) -> Option<PathBuf> {
        self.cache_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", token)))
    }

    /// Checks that the sensor blobs referenced by the first
    /// `max_scenes_per_log` scenes of each log exist.
    pub fn check_missing_files(&self, max_scenes_per_log: Option<usize>) -> MissingFilesReport {
        let mut report = MissingFilesReport {
            logs_not_found: self.unreadable_logs.clone(),
            ..Default::default()
        };

        for (log_name, tokens) in &self.logs {
            let limit = max_scenes_per_log.unwrap_or(tokens.len());
            debug!("Checking {} of {} scenes in {}", limit.min(tokens.len()), tokens.len(), log_name);
            for token in tokens.iter().take(limit) {
                let Some(scene) = self.scenes.get(token) else {
                    continue;
                };
                report.checked_scenes += 1;
                for frame in &scene.frames {
                    if let Some(lidar) = &frame.lidar {
                        let path = self.resolve(lidar);
                        if !path.is_file() {
                            report.lidar.push(path);
                        }
                    }
                    for camera in frame.cameras.values() {
                        let path = self.resolve(camera);
                        if !path.is_file() {
                            report.cameras.push(path);
                        }
                    }
                }
            }
        }

        info!(
            "Checked {} scenes: {} lidar and {} camera files missing",
            report.checked_scenes,
            report.lidar.len(),
            report.cameras.len()
        );
        report
    }
}

impl SceneSource for LogDirSource {
    fn name(&self) -> &str {
        "navsim_logs"
    }

    fn tokens(&self) -> Vec<SceneToken> {
        self.logs.values().flatten().cloned().collect()
    }

    fn load_scene(&self, token: &SceneToken) -> Result<Scene, EnvError> {
        let mut scene = self
            .scenes
            .get(token)
            .cloned()
            .ok_or_else(|| EnvError::scene_not_found(token))?;
        for frame in &mut scene.frames {
            if let Some(lidar) = frame.lidar.take() {
                frame.lidar = Some(self.resolve(&lidar));
            }
            for camera in frame.cameras.values_mut() {
                *camera = self.resolve(camera);
            }
        }
        Ok(scene)
    }

    fn pdm_trajectory(&self, scene: &Scene) -> Result<Option<Trajectory>, EnvError> {
        let Some(path) = self.cache_file(scene.token()) else {
            return Ok(None);
        };
        if !path.is_file() {
            debug!("No metric cache entry for {}", scene.token());
            return Ok(None);
        }
        let entry: MetricCacheEntry = read_json(&path)?;
        Ok(Some(entry.pdm_closed.to_trajectory()?.with_origin()))
    }

    fn statistics(&self) -> SceneStatistics {
        let maps: BTreeSet<&str> = self
            .scenes
            .values()
            .map(|s| s.metadata.map_name.as_str())
            .collect();
        let metric_cache_scenes = self
            .scenes
            .keys()
            .filter(|t| self.cache_file(t).is_some_and(|p| p.is_file()))
            .count();
        SceneStatistics {
            total_scenes: self.scenes.len(),
            map_locations: maps.into_iter().map(String::from).collect(),
            log_names: self.logs.keys().cloned().collect(),
            has_metric_cache: self.cache_path.as_ref().is_some_and(|p| p.is_dir()),
            metric_cache_scenes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{write_json, SampledPoses};
    use crate::source::{GROUND_TRUTH, PDM_CLOSED};
    use crate::types::fixtures::straight_scene;
    use approx::assert_relative_eq;

    struct Layout {
        _dir: tempfile::TempDir,
        logs: PathBuf,
        blobs: PathBuf,
        cache: PathBuf,
    }

    fn layout() -> Layout {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let blobs = dir.path().join("blobs");
        let cache = dir.path().join("cache");
        for d in [&logs, &blobs, &cache] {
            fs::create_dir_all(d).unwrap();
        }
        let log = SceneLog {
            log_name: "log_a".to_string(),
            scenes: vec![straight_scene("scene_1"), straight_scene("scene_2")],
        };
        write_json(&logs.join("log_a.json"), &log).unwrap();
        Layout { _dir: dir, logs, blobs, cache }
    }

    #[test]
    fn test_open_missing_directory() {
        let result = LogDirSource::open(Path::new("/nonexistent/logs"), Path::new("/tmp"), None);
        assert!(matches!(result, Err(EnvError::DataNotFound(_))));
    }

    #[test]
    fn test_load_scene_resolves_sensor_paths() {
        let l = layout();
        let source = LogDirSource::open(&l.logs, &l.blobs, None).unwrap();
        assert_eq!(source.tokens().len(), 2);

        let scene = source.load_scene(&SceneToken::new("scene_1")).unwrap();
        assert_eq!(scene.frames[0].lidar, Some(l.blobs.join("lidar/0.pcd")));

        assert!(matches!(
            source.load_scene(&SceneToken::new("missing")),
            Err(EnvError::SceneNotFound(_))
        ));
    }

    #[test]
    fn test_reference_trajectories_with_metric_cache() {
        let l = layout();
        let entry = MetricCacheEntry {
            pdm_closed: SampledPoses {
                interval_length: 0.1,
                poses: (1..=40).map(|i| [i as f64 * 0.5, 0.0, 0.0]).collect(),
            },
        };
        write_json(&l.cache.join("scene_1.json"), &entry).unwrap();

        let source = LogDirSource::open(&l.logs, &l.blobs, Some(&l.cache)).unwrap();
        let with_cache = source.load_scene(&SceneToken::new("scene_1")).unwrap();
        let refs = source.reference_trajectories(&with_cache).unwrap();
        assert!(refs.contains_key(GROUND_TRUTH));
        let pdm = &refs[PDM_CLOSED];
        assert_eq!(pdm.len(), 41);
        assert_relative_eq!(pdm.start_time().unwrap(), 0.0);

        let without = source.load_scene(&SceneToken::new("scene_2")).unwrap();
        let refs = source.reference_trajectories(&without).unwrap();
        assert!(!refs.contains_key(PDM_CLOSED));

        let stats = source.statistics();
        assert_eq!(stats.total_scenes, 2);
        assert_eq!(stats.metric_cache_scenes, 1);
        assert!(stats.has_metric_cache);
        assert_eq!(stats.map_locations, vec!["us-nv-las-vegas-strip".to_string()]);
    }

    #[test]
    fn test_check_missing_files() {
        let l = layout();
        fs::write(l.logs.join("broken.json"), "not json").unwrap();
        fs::create_dir_all(l.blobs.join("lidar")).unwrap();
        for i in 0..12 {
            fs::write(l.blobs.join(format!("lidar/{i}.pcd")), b"").unwrap();
        }

        let source = LogDirSource::open(&l.logs, &l.blobs, None).unwrap();
        assert_eq!(source.unreadable_logs().to_vec(), vec!["broken".to_string()]);

        let report = source.check_missing_files(Some(1));
        assert_eq!(report.checked_scenes, 1);
        assert!(report.lidar.is_empty());
        assert_eq!(report.cameras.len(), 12);
        assert_eq!(report.logs_not_found, vec!["broken".to_string()]);
        assert!(!report.is_complete());
    }
}
