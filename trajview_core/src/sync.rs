//! Multi-source trajectory synchronization.
//!
//! Model predictions, recorded ground truth and planner output arrive with
//! different sample rates and horizons. [`synchronize`] resamples all of
//! them onto one grid `0, dt, 2·dt, … <= horizon` so they can be overlaid
//! and compared sample by sample.
//!
//! Each source keeps only the grid points inside the overlap of
//! `[0, horizon]` and its own time extent. Sources that cannot be
//! resampled are left out of the result and listed in
//! [`SynchronizedSet::skipped`]; callers treat absence as normal.

use crate::trajectory::{Pose2D, Trajectory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Slack used when deciding whether a grid point falls inside an extent.
const GRID_EPSILON: f64 = 1e-9;

/// Largest grid [`time_grid`] will build.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Rejected synchronization requests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("Sample interval must be positive, got {0}")]
    InvalidInterval(f64),

    #[error("Time horizon must be finite and non-negative, got {0}")]
    InvalidHorizon(f64),

    #[error("Horizon {horizon} at interval {dt} exceeds {max} grid points", max = MAX_GRID_POINTS)]
    GridTooLarge { horizon: f64, dt: f64 },
}

/// Why a source is missing from a synchronized set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer than two samples, nothing to interpolate between
    TooFewPoints,
    /// The source's extent contains no grid point within the horizon
    NoOverlap,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TooFewPoints => write!(f, "fewer than 2 points"),
            SkipReason::NoOverlap => write!(f, "no overlap with target grid"),
        }
    }
}

/// Resampled trajectories sharing one time grid.
#[derive(Debug, Clone, Default)]
pub struct SynchronizedSet {
    /// Horizon of the request
    pub horizon: f64,

    /// Grid spacing of the request
    pub dt: f64,

    /// Resampled sources by name
    pub trajectories: BTreeMap<String, Trajectory>,

    /// Sources left out, with the reason
    pub skipped: BTreeMap<String, SkipReason>,
}

impl SynchronizedSet {
    pub fn get(&self, name: &str) -> Option<&Trajectory> {
        self.trajectories.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.trajectories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.trajectories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }
}

/// The shared grid `k * dt` for `k = 0, 1, …` while `k * dt <= horizon`.
pub fn time_grid(horizon: f64, dt: f64) -> Result<Vec<f64>, SyncError> {
    if !(dt > 0.0) || !dt.is_finite() {
        return Err(SyncError::InvalidInterval(dt));
    }
    if !(horizon >= 0.0) || !horizon.is_finite() {
        return Err(SyncError::InvalidHorizon(horizon));
    }
    let steps = (horizon / dt + GRID_EPSILON).floor();
    if !(steps < MAX_GRID_POINTS as f64) {
        return Err(SyncError::GridTooLarge { horizon, dt });
    }
    let steps = steps as usize;
    Ok((0..=steps).map(|k| k as f64 * dt).collect())
}

/// Resamples one trajectory onto `grid`, keeping points inside its extent.
///
/// Returns `Err(reason)` when the source cannot contribute.
pub fn resample(trajectory: &Trajectory, grid: &[f64]) -> Result<Trajectory, SkipReason> {
    if trajectory.len() < 2 {
        return Err(SkipReason::TooFewPoints);
    }
    let (start, end) = match (trajectory.start_time(), trajectory.end_time()) {
        (Some(s), Some(e)) => (s, e),
        _ => return Err(SkipReason::TooFewPoints),
    };

    let mut poses: Vec<Pose2D> = Vec::new();
    let mut timestamps: Vec<f64> = Vec::new();
    for &t in grid {
        if t < start - GRID_EPSILON || t > end + GRID_EPSILON {
            continue;
        }
        // Grid points a hair outside the extent snap onto it
        let query = t.clamp(start, end);
        if let Some(pose) = trajectory.interpolate(query) {
            poses.push(pose);
            timestamps.push(t);
        }
    }

    if poses.is_empty() {
        return Err(SkipReason::NoOverlap);
    }
    Trajectory::new(poses, timestamps).map_err(|_| SkipReason::NoOverlap)
}

/// Resamples every source onto the grid for `horizon` / `dt`.
pub fn synchronize(
    sources: &BTreeMap<String, Trajectory>,
    horizon: f64,
    dt: f64,
) -> Result<SynchronizedSet, SyncError> {
    let grid = time_grid(horizon, dt)?;
    let mut set = SynchronizedSet {
        horizon,
        dt,
        ..Default::default()
    };

    for (name, trajectory) in sources {
        match resample(trajectory, &grid) {
            Ok(resampled) => {
                debug!(
                    "Synchronized '{}': {} -> {} samples",
                    name,
                    trajectory.len(),
                    resampled.len()
                );
                set.trajectories.insert(name.clone(), resampled);
            }
            Err(reason) => {
                debug!("Skipping '{}' during synchronization: {}", name, reason);
                set.skipped.insert(name.clone(), reason);
            }
        }
    }

    Ok(set)
}
