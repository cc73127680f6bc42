//! Scene statistics panel.

use super::canvas::Canvas;
use super::style::StyleSet;
use super::text::TextRenderer;
use image::{Rgba, RgbaImage};
use trajview_core::{DisplacementMetrics, SynchronizedSet};
use trajview_env::{Scene, GROUND_TRUTH, PREDICTION};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BOX: Rgba<u8> = Rgba([211, 211, 211, 204]);
const INK: Rgba<u8> = Rgba([20, 20, 20, 255]);

/// Characters of the token shown before the ellipsis.
const TOKEN_CHARS: usize = 16;

/// Text of the statistics panel, one entry per line.
///
/// Metrics appear only when both ground truth and prediction survived
/// synchronization.
pub fn statistics_lines(scene: &Scene, set: &SynchronizedSet, styles: &StyleSet) -> Vec<String> {
    let meta = &scene.metadata;
    let token: String = meta.token.as_str().chars().take(TOKEN_CHARS).collect();
    let mut lines = vec![
        "Scene Information:".to_string(),
        format!("* Token: {}...", token),
        format!("* Scenario: {}", meta.scenario_type),
        format!("* Log: {}", meta.log_name),
        format!("* Timestamp: {}", meta.timestamp_us),
        String::new(),
        "Trajectory Details:".to_string(),
    ];

    for (name, traj) in &set.trajectories {
        let Some(style) = styles.get(name) else {
            continue;
        };
        lines.push(format!("* {}: {} points, {:.1}s", style.label, traj.len(), traj.duration()));
    }
    for (name, reason) in &set.skipped {
        let label = styles.get(name).map(|s| s.label.as_str()).unwrap_or(name.as_str());
        lines.push(format!("* {}: skipped ({})", label, reason));
    }

    if let (Some(gt), Some(pred)) = (set.get(GROUND_TRUTH), set.get(PREDICTION)) {
        let m = DisplacementMetrics::between(gt, pred);
        lines.extend([
            String::new(),
            "Trajectory Metrics:".to_string(),
            format!("* ADE: {:.2}m", m.ade),
            format!("* FDE: {:.2}m", m.fde),
            format!("* Max Error: {:.2}m", m.max_error),
            format!("* RMSE: {:.2}m", m.rmse),
        ]);
    }
    lines
}

/// Renders `lines` on a light box filling most of the panel.
pub fn render_statistics_panel(lines: &[String], text: &TextRenderer, width: u32, height: u32) -> RgbaImage {
    let mut canvas = Canvas::new(width, height, BACKGROUND);
    let margin = (width / 20).max(4);
    canvas.fill_rect(
        margin as i32,
        margin as i32,
        width.saturating_sub(2 * margin),
        height.saturating_sub(2 * margin),
        BOX,
    );
    let size = (height as f32 / 36.0).max(10.0);
    text.draw_lines(&mut canvas, 2 * margin as i32, 2 * margin as i32, lines, size, INK);
    canvas.into_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use trajview_core::{synchronize, Pose2D, Trajectory};
    use crate::synthetic::SyntheticSource;
    use trajview_env::{SceneSource, PDM_CLOSED};

    fn scene() -> Scene {
        let source = SyntheticSource::new(9, 1);
        source.load_scene(&source.tokens()[0]).unwrap()
    }

    fn line(speed: f64, offset: f64) -> Trajectory {
        Trajectory::new(
            (0..=8).map(|i| Pose2D::new(speed * i as f64 * 0.5, offset, 0.0)).collect(),
            (0..=8).map(|i| i as f64 * 0.5).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_lines_with_metrics() {
        let scene = scene();
        let sources = BTreeMap::from([
            (GROUND_TRUTH.to_string(), line(5.0, 0.0)),
            (PREDICTION.to_string(), line(5.0, 1.0)),
        ]);
        let set = synchronize(&sources, 4.0, 0.5).unwrap();
        let lines = statistics_lines(&scene, &set, &StyleSet::default());

        assert_eq!(lines[0], "Scene Information:");
        assert!(lines.iter().any(|l| l == &format!("* Scenario: {}", scene.metadata.scenario_type)));
        assert!(lines.iter().any(|l| l.ends_with(": 9 points, 4.0s")));
        // constant 1 m lateral offset
        assert!(lines.iter().any(|l| l == "* ADE: 1.00m"));
        assert!(lines.iter().any(|l| l == "* RMSE: 1.00m"));
    }

    #[test]
    fn test_no_metrics_without_ground_truth() {
        let scene = scene();
        let sources = BTreeMap::from([
            (PREDICTION.to_string(), line(5.0, 0.0)),
            (PDM_CLOSED.to_string(), Trajectory::new(vec![Pose2D::new(0.0, 0.0, 0.0)], vec![0.0]).unwrap()),
        ]);
        let set = synchronize(&sources, 4.0, 0.5).unwrap();
        let lines = statistics_lines(&scene, &set, &StyleSet::default());

        assert!(!lines.iter().any(|l| l.starts_with("Trajectory Metrics")));
        assert!(lines.iter().any(|l| l.contains("skipped (fewer than 2 points)")));
    }

    #[test]
    fn test_token_is_shortened() {
        let mut scene = scene();
        scene.metadata.token = trajview_env::SceneToken::new("0123456789abcdef0123456789");
        let lines = statistics_lines(&scene, &SynchronizedSet::default(), &StyleSet::default());
        assert_eq!(lines[1], "* Token: 0123456789abcdef...");
    }

    #[test]
    fn test_panel_has_text() {
        let lines = vec!["Scene Information:".to_string(), "* ADE: 1.00m".to_string()];
        let img = render_statistics_panel(&lines, &TextRenderer::bitmap(), 200, 300);
        assert_eq!(img.dimensions(), (200, 300));
        assert!(img.pixels().any(|p| p[0] < 64));
        assert!(img.pixels().all(|p| p[3] == 255));
    }
}
