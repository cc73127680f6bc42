//! Trajectory accuracy metrics
//! ============================
//!
//! Displacement metrics between a reference (usually ground truth) and a
//! candidate trajectory:
//! - **ADE**: mean position error over compared samples
//! - **FDE**: position error at the last compared sample
//! - **Max error** and **RMSE** over the same samples
//!
//! Heading is ignored. Comparisons on synchronized trajectories pair
//! samples by grid timestamp; raw pose arrays are paired by index over
//! their common prefix.

use crate::trajectory::{Pose2D, Trajectory};
use serde::{Deserialize, Serialize};

/// Two grid timestamps closer than this are the same instant.
const TIMESTAMP_MATCH_EPSILON: f64 = 1e-6;

/// Displacement errors of one candidate against one reference.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplacementMetrics {
    /// Average Displacement Error (m)
    pub ade: f64,
    /// Final Displacement Error (m)
    pub fde: f64,
    /// Largest single-sample error (m)
    pub max_error: f64,
    /// Root mean square error (m)
    pub rmse: f64,
    /// Number of sample pairs compared
    pub compared_points: usize,
}

impl DisplacementMetrics {
    /// Compares two pose arrays index by index over their common prefix.
    ///
    /// Returns all zeros when either side is empty.
    pub fn from_poses(reference: &[Pose2D], candidate: &[Pose2D]) -> Self {
        let errors: Vec<f64> = reference
            .iter()
            .zip(candidate)
            .map(|(r, c)| r.distance_to(c))
            .collect();
        Self::from_errors(&errors)
    }

    /// Compares two trajectories at the timestamps they share.
    pub fn between(reference: &Trajectory, candidate: &Trajectory) -> Self {
        let mut errors = Vec::new();
        let mut j = 0;
        let cand_times = candidate.timestamps();
        for (t, r) in reference.samples() {
            while j < cand_times.len() && cand_times[j] < t - TIMESTAMP_MATCH_EPSILON {
                j += 1;
            }
            if j < cand_times.len() && (cand_times[j] - t).abs() <= TIMESTAMP_MATCH_EPSILON {
                errors.push(r.distance_to(&candidate.poses()[j]));
            }
        }
        Self::from_errors(&errors)
    }

    fn from_errors(errors: &[f64]) -> Self {
        let n = errors.len();
        if n == 0 {
            return Self::default();
        }
        let sum: f64 = errors.iter().sum();
        let sum_sq: f64 = errors.iter().map(|e| e * e).sum();
        Self {
            ade: sum / n as f64,
            fde: errors[n - 1],
            max_error: errors.iter().cloned().fold(0.0, f64::max),
            rmse: (sum_sq / n as f64).sqrt(),
            compared_points: n,
        }
    }

    /// True when no samples could be paired.
    pub fn is_empty(&self) -> bool {
        self.compared_points == 0
    }
}

/// Running means of ADE and FDE across scenes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsAggregate {
    pub count: usize,
    pub sum_ade: f64,
    pub sum_fde: f64,
}

impl MetricsAggregate {
    /// Adds one scene's metrics; empty comparisons are ignored.
    pub fn add(&mut self, metrics: &DisplacementMetrics) {
        if metrics.is_empty() {
            return;
        }
        self.count += 1;
        self.sum_ade += metrics.ade;
        self.sum_fde += metrics.fde;
    }

    pub fn mean_ade(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_ade / self.count as f64
        }
    }

    pub fn mean_fde(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_fde / self.count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn poses(xs: &[f64]) -> Vec<Pose2D> {
        xs.iter().map(|x| Pose2D::new(*x, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_identical_trajectories_have_zero_error() {
        let p = poses(&[0.0, 1.0, 2.0]);
        let m = DisplacementMetrics::from_poses(&p, &p);
        assert_eq!(m.compared_points, 3);
        assert_relative_eq!(m.ade, 0.0);
        assert_relative_eq!(m.rmse, 0.0);
    }

    #[test]
    fn test_ade_fde_max_rmse() {
        let gt = poses(&[0.0, 1.0, 2.0, 3.0]);
        let pred = vec![
            Pose2D::new(0.0, 0.0, 0.0),
            Pose2D::new(1.0, 1.0, 0.0),
            Pose2D::new(2.0, 2.0, 0.0),
            Pose2D::new(3.0, 3.0, 0.0),
        ];
        let m = DisplacementMetrics::from_poses(&gt, &pred);
        assert_relative_eq!(m.ade, 1.5);
        assert_relative_eq!(m.fde, 3.0);
        assert_relative_eq!(m.max_error, 3.0);
        assert_relative_eq!(m.rmse, (14.0f64 / 4.0).sqrt());
    }

    #[test]
    fn test_prefix_comparison_and_empty() {
        let m = DisplacementMetrics::from_poses(&poses(&[0.0, 1.0, 2.0]), &poses(&[0.5]));
        assert_eq!(m.compared_points, 1);
        assert_relative_eq!(m.fde, 0.5);

        let empty = DisplacementMetrics::from_poses(&[], &poses(&[1.0]));
        assert!(empty.is_empty());
        assert_eq!(empty, DisplacementMetrics::default());
    }

    #[test]
    fn test_between_pairs_by_timestamp() {
        let gt = Trajectory::new(poses(&[0.0, 1.0, 2.0, 3.0]), vec![0.0, 0.5, 1.0, 1.5]).unwrap();
        // Candidate starts later and carries an offset of 1 m
        let pred = Trajectory::new(poses(&[2.0, 3.0, 4.0]), vec![0.5, 1.0, 1.5]).unwrap();
        let m = DisplacementMetrics::between(&gt, &pred);
        assert_eq!(m.compared_points, 3);
        assert_relative_eq!(m.ade, 1.0);
        assert_relative_eq!(m.fde, 1.0);
    }

    #[test]
    fn test_aggregate_means() {
        let mut agg = MetricsAggregate::default();
        agg.add(&DisplacementMetrics { ade: 1.0, fde: 2.0, max_error: 2.0, rmse: 1.2, compared_points: 5 });
        agg.add(&DisplacementMetrics { ade: 3.0, fde: 4.0, max_error: 4.0, rmse: 3.2, compared_points: 5 });
        agg.add(&DisplacementMetrics::default());
        assert_eq!(agg.count, 2);
        assert_relative_eq!(agg.mean_ade(), 2.0);
        assert_relative_eq!(agg.mean_fde(), 3.0);
        assert_eq!(MetricsAggregate::default().mean_ade(), 0.0);
    }
}
