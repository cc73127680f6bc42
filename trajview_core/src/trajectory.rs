//! Poses and time-stamped trajectories.
//!
//! A [`Trajectory`] is an immutable, time-ordered list of planar poses.
//! Timestamps are seconds relative to the scene's current frame, so a
//! model's future trajectory typically spans `(0, horizon]` and recorded
//! history would carry negative times.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

/// Errors raised when building a trajectory from raw arrays.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    /// Pose and timestamp arrays differ in length
    #[error("Length mismatch: {poses} poses but {timestamps} timestamps")]
    LengthMismatch { poses: usize, timestamps: usize },

    /// Timestamps go backwards
    #[error("Timestamps out of order at index {index}: {previous} then {current}")]
    OutOfOrder { index: usize, previous: f64, current: f64 },

    /// NaN or infinite value in the input
    #[error("Non-finite value at index {0}")]
    NonFinite(usize),

    /// Sampling with a non-positive interval
    #[error("Invalid sampling interval: {0}")]
    InvalidInterval(f64),
}

/// Planar pose: position in metres, heading in radians (counter-clockwise from +x).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// The pose at the origin of its own frame.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Euclidean distance between positions (heading ignored).
    pub fn distance_to(&self, other: &Pose2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }
}

impl From<[f64; 3]> for Pose2D {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Pose2D> for [f64; 3] {
    fn from(p: Pose2D) -> Self {
        [p.x, p.y, p.heading]
    }
}

/// Wraps an angle into `(-PI, PI]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// Uniform sampling of a model output: `num_poses` poses, one every `interval_length` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySampling {
    pub num_poses: usize,
    pub interval_length: f64,
}

impl TrajectorySampling {
    pub fn new(num_poses: usize, interval_length: f64) -> Self {
        Self { num_poses, interval_length }
    }

    /// Time of the last pose.
    pub fn time_horizon(&self) -> f64 {
        self.num_poses as f64 * self.interval_length
    }
}

impl Default for TrajectorySampling {
    /// 4 seconds at 2 Hz.
    fn default() -> Self {
        Self::new(8, 0.5)
    }
}

/// Ordered, time-stamped sequence of poses. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    poses: Vec<Pose2D>,
    timestamps: Vec<f64>,
}

impl Trajectory {
    /// Builds a trajectory, validating lengths, finiteness and time order.
    ///
    /// Equal consecutive timestamps are accepted; interpolation then favours
    /// the later sample.
    pub fn new(poses: Vec<Pose2D>, timestamps: Vec<f64>) -> Result<Self, TrajectoryError> {
        if poses.len() != timestamps.len() {
            return Err(TrajectoryError::LengthMismatch {
                poses: poses.len(),
                timestamps: timestamps.len(),
            });
        }
        for (i, (pose, t)) in poses.iter().zip(&timestamps).enumerate() {
            if !pose.is_finite() || !t.is_finite() {
                return Err(TrajectoryError::NonFinite(i));
            }
        }
        for (i, pair) in timestamps.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(TrajectoryError::OutOfOrder {
                    index: i + 1,
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }
        Ok(Self { poses, timestamps })
    }

    /// Empty trajectory (no samples).
    pub fn empty() -> Self {
        Self { poses: Vec::new(), timestamps: Vec::new() }
    }

    /// Stamps model output poses: pose `i` lands at `(i + 1) * interval_length`.
    pub fn from_sampling(
        poses: Vec<Pose2D>,
        sampling: TrajectorySampling,
    ) -> Result<Self, TrajectoryError> {
        if !(sampling.interval_length > 0.0) {
            return Err(TrajectoryError::InvalidInterval(sampling.interval_length));
        }
        let timestamps = (1..=poses.len())
            .map(|i| i as f64 * sampling.interval_length)
            .collect();
        Self::new(poses, timestamps)
    }

    /// Prepends the identity pose at `t = 0` unless a sample already sits there.
    pub fn with_origin(&self) -> Self {
        if self.timestamps.first().is_some_and(|t| *t <= 0.0) {
            return self.clone();
        }
        let mut poses = Vec::with_capacity(self.len() + 1);
        let mut timestamps = Vec::with_capacity(self.len() + 1);
        poses.push(Pose2D::identity());
        timestamps.push(0.0);
        poses.extend_from_slice(&self.poses);
        timestamps.extend_from_slice(&self.timestamps);
        Self { poses, timestamps }
    }

    pub fn poses(&self) -> &[Pose2D] {
        &self.poses
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn start_time(&self) -> Option<f64> {
        self.timestamps.first().copied()
    }

    pub fn end_time(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }

    /// Time covered between first and last sample (0 for fewer than 2 samples).
    pub fn duration(&self) -> f64 {
        match (self.start_time(), self.end_time()) {
            (Some(s), Some(e)) => e - s,
            _ => 0.0,
        }
    }

    pub fn final_pose(&self) -> Option<Pose2D> {
        self.poses.last().copied()
    }

    /// Iterates `(timestamp, pose)` pairs.
    pub fn samples(&self) -> impl Iterator<Item = (f64, Pose2D)> + '_ {
        self.timestamps.iter().copied().zip(self.poses.iter().copied())
    }

    /// Pose at time `t`, or `None` if `t` lies outside the trajectory.
    ///
    /// A query equal to a stored timestamp returns that sample unchanged.
    /// Otherwise x and y are linear between the neighbours and the heading
    /// moves along the shortest arc from the earlier neighbour.
    pub fn interpolate(&self, t: f64) -> Option<Pose2D> {
        let start = self.start_time()?;
        let end = self.end_time()?;
        if !t.is_finite() || t < start || t > end {
            return None;
        }

        // First index whose timestamp is strictly greater than t
        let upper = self.timestamps.partition_point(|ts| *ts <= t);
        let lower = upper - 1;
        let (t0, p0) = (self.timestamps[lower], self.poses[lower]);
        if t0 == t || upper == self.len() {
            return Some(p0);
        }

        let (t1, p1) = (self.timestamps[upper], self.poses[upper]);
        let frac = (t - t0) / (t1 - t0);
        Some(Pose2D {
            x: p0.x + frac * (p1.x - p0.x),
            y: p0.y + frac * (p1.y - p0.y),
            heading: normalize_angle(p0.heading + frac * normalize_angle(p1.heading - p0.heading)),
        })
    }

    /// Samples whose timestamp lies in `[start, end]`.
    pub fn window(&self, start: f64, end: f64) -> Vec<(f64, Pose2D)> {
        self.samples()
            .filter(|(t, _)| *t >= start && *t <= end)
            .collect()
    }

    /// Keeps samples with `t <= horizon`.
    pub fn truncate_to(&self, horizon: f64) -> Self {
        let n = self.timestamps.partition_point(|t| *t <= horizon);
        Self {
            poses: self.poses[..n].to_vec(),
            timestamps: self.timestamps[..n].to_vec(),
        }
    }

    /// Same poses with every timestamp shifted by `offset` seconds.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            poses: self.poses.clone(),
            timestamps: self.timestamps.iter().map(|t| t + offset).collect(),
        }
    }

    /// Applies `f` to every pose, keeping timestamps.
    pub fn map_poses(&self, f: impl Fn(&Pose2D) -> Pose2D) -> Self {
        Self {
            poses: self.poses.iter().map(f).collect(),
            timestamps: self.timestamps.clone(),
        }
    }
}
