//! Rerun visualization of synchronized trajectories.
//!
//! Optional and only live with the `visualization` feature; without it every
//! method is a no-op so callers never need their own `cfg`.
//!
//! # What Gets Logged
//!
//! - Each synchronized source as a 2D line strip in the ego frame, coloured
//!   by its trajectory style
//! - Displacement metrics per source as scalars
//! - Skipped sources and failures as text events

#[cfg(feature = "visualization")]
use rerun::{Color, LineStrips2D, RecordingStream};
use crate::render::StyleSet;
use trajview_core::{DisplacementMetrics, SynchronizedSet};

/// Rerun logger for trajectory sets.
pub struct RerunLogger {
    #[cfg(feature = "visualization")]
    rec: Option<RecordingStream>,

    /// Whether visualization is enabled
    enabled: bool,
}

impl RerunLogger {
    /// Creates a new logger with visualization disabled.
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "visualization")]
            rec: None,
            enabled: false,
        }
    }

    /// Spawns a viewer; falls back to disabled when that fails.
    #[cfg(feature = "visualization")]
    pub fn new(name: &str) -> Self {
        match rerun::RecordingStreamBuilder::new(name).spawn() {
            Ok(rec) => {
                tracing::info!("Rerun visualization enabled");
                Self {
                    rec: Some(rec),
                    enabled: true,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to initialize Rerun: {:?}", e);
                Self::disabled()
            }
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn new(_name: &str) -> Self {
        tracing::info!("Rerun visualization not available (compile with --features visualization)");
        Self::disabled()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the animation time for subsequent logs.
    #[cfg(feature = "visualization")]
    pub fn set_time(&self, seconds: f64) {
        if let Some(ref rec) = self.rec {
            rec.set_time_seconds("scene_time", seconds);
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn set_time(&self, _seconds: f64) {}

    /// Logs every source of a synchronized set under `scenes/<token>/`.
    #[cfg(feature = "visualization")]
    pub fn log_trajectories(&self, token: &str, set: &SynchronizedSet, styles: &StyleSet) {
        let Some(ref rec) = self.rec else {
            return;
        };
        for (name, traj) in &set.trajectories {
            let strip: Vec<[f32; 2]> = traj.poses().iter().map(|p| [p.x as f32, p.y as f32]).collect();
            let color = styles
                .get(name)
                .and_then(|s| crate::render::style::parse_hex_color(&s.color).ok())
                .map(|[r, g, b]| Color::from_rgb(r, g, b))
                .unwrap_or(Color::from_rgb(128, 128, 128));
            let _ = rec.log(
                format!("scenes/{}/trajectories/{}", token, name),
                &LineStrips2D::new([strip]).with_colors([color]),
            );
        }
        for (name, reason) in &set.skipped {
            let _ = rec.log(
                format!("scenes/{}/events", token),
                &rerun::TextLog::new(format!("skipped {}: {}", name, reason)),
            );
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_trajectories(&self, _token: &str, _set: &SynchronizedSet, _styles: &StyleSet) {}

    /// Logs ADE and FDE of one source as scalars.
    #[cfg(feature = "visualization")]
    pub fn log_metrics(&self, source: &str, metrics: &DisplacementMetrics) {
        if let Some(ref rec) = self.rec {
            let _ = rec.log(format!("metrics/{}/ade", source), &rerun::Scalar::new(metrics.ade));
            let _ = rec.log(format!("metrics/{}/fde", source), &rerun::Scalar::new(metrics.fde));
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_metrics(&self, _source: &str, _metrics: &DisplacementMetrics) {}

    /// Logs a text annotation (e.g. a skipped scene).
    #[cfg(feature = "visualization")]
    pub fn log_event(&self, path: &str, message: &str) {
        if let Some(ref rec) = self.rec {
            let _ = rec.log(path, &rerun::TextLog::new(message));
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_event(&self, _path: &str, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_logger() {
        let logger = RerunLogger::disabled();
        assert!(!logger.is_enabled());

        // no-ops
        logger.set_time(1.0);
        logger.log_trajectories("abc", &SynchronizedSet::default(), &StyleSet::default());
        logger.log_metrics("prediction", &DisplacementMetrics::default());
        logger.log_event("events", "skipped");
    }
}
