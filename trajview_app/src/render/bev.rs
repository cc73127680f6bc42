//! Bird's-eye-view panel.
//!
//! Everything is drawn in the ego frame of one scene frame: map geometry and
//! agent boxes are converted from the map frame, trajectories are expected
//! in that ego frame already.

use super::canvas::{Canvas, WHITE};
use super::style::{LineStyle, StyleSet, TrajectoryStyle};
use crate::error::RenderError;
use image::{Rgba, RgbaImage};
use trajview_core::timeline::time_decay_alpha;
use trajview_core::transform::global_to_local;
use trajview_core::{BevProjector, Pose2D, TimeWindow, Trajectory};
use trajview_env::{AgentBox, Frame, MapElementKind, MapPolyline};

/// Markers drawn per trajectory at most.
pub const MAX_MARKERS: usize = 5;

const BACKGROUND: Rgba<u8> = Rgba([246, 246, 246, 255]);
const GRID: Rgba<u8> = Rgba([225, 225, 225, 255]);
const LANE: Rgba<u8> = Rgba([170, 170, 170, 255]);
const ROAD_EDGE: Rgba<u8> = Rgba([90, 90, 90, 255]);
const CROSSWALK: Rgba<u8> = Rgba([200, 200, 120, 200]);
const AGENT_FILL: Rgba<u8> = Rgba([70, 130, 180, 150]);
const AGENT_EDGE: Rgba<u8> = Rgba([40, 80, 120, 255]);
const EGO_FILL: Rgba<u8> = Rgba([255, 140, 0, 220]);

/// Ego box footprint, metres.
const EGO_LENGTH: f64 = 4.5;
const EGO_WIDTH: f64 = 2.0;

/// One trajectory to overlay on the BEV.
#[derive(Debug, Clone, Copy)]
pub struct BevLayer<'a> {
    /// Style key (source name)
    pub source: &'a str,
    pub trajectory: &'a Trajectory,
    /// Samples outside the window are not drawn
    pub window: TimeWindow,
    /// Extra opacity factor, used for faded history
    pub alpha_scale: f64,
    pub markers: bool,
}

impl<'a> BevLayer<'a> {
    pub fn new(source: &'a str, trajectory: &'a Trajectory, window: TimeWindow) -> Self {
        Self {
            source,
            trajectory,
            window,
            alpha_scale: 1.0,
            markers: true,
        }
    }
}

/// Indices of up to `max` evenly spaced samples out of `n`, first and last included.
pub fn marker_indices(n: usize, max: usize) -> Vec<usize> {
    let m = n.min(max);
    match m {
        0 => Vec::new(),
        1 => vec![0],
        _ => (0..m).map(|k| k * (n - 1) / (m - 1)).collect(),
    }
}

/// Renders BEV panels.
pub struct BevRenderer<'a> {
    pub projector: BevProjector,
    pub styles: &'a StyleSet,
}

impl<'a> BevRenderer<'a> {
    pub fn new(projector: BevProjector, styles: &'a StyleSet) -> Self {
        Self { projector, styles }
    }

    /// Full panel: scene context around `frame`, then `layers` in order, then the legend.
    pub fn render(
        &self,
        frame: &Frame,
        map: &[MapPolyline],
        layers: &[BevLayer<'_>],
    ) -> Result<RgbaImage, RenderError> {
        let size = self.projector.size_px;
        let mut canvas = Canvas::new(size, size, BACKGROUND);
        self.draw_grid(&mut canvas, 10.0);
        self.draw_map(&mut canvas, &frame.ego_pose, map);
        self.draw_agents(&mut canvas, &frame.ego_pose, &frame.agents);
        self.draw_ego(&mut canvas);
        for layer in layers {
            self.draw_layer(&mut canvas, layer)?;
        }
        let sources: Vec<&str> = layers.iter().map(|l| l.source).collect();
        self.draw_legend(&mut canvas, &sources)?;
        Ok(canvas.into_image())
    }

    fn px(&self, x: f64, y: f64) -> (f32, f32) {
        self.projector.to_pixel(x, y)
    }

    fn draw_grid(&self, canvas: &mut Canvas, spacing: f64) {
        let range = self.projector.range_m;
        let n = (range / spacing).floor() as i32;
        for i in -n..=n {
            let d = i as f64 * spacing;
            canvas.line(self.px(d, -range), self.px(d, range), 1.0, GRID);
            canvas.line(self.px(-range, d), self.px(range, d), 1.0, GRID);
        }
    }

    fn draw_map(&self, canvas: &mut Canvas, ego: &Pose2D, map: &[MapPolyline]) {
        for polyline in map {
            let points: Vec<(f32, f32)> = polyline
                .points
                .iter()
                .map(|p| {
                    let local = global_to_local(ego, &Pose2D::new(p[0], p[1], 0.0));
                    self.px(local.x, local.y)
                })
                .collect();
            match polyline.kind {
                MapElementKind::Lane => {
                    for pair in points.windows(2) {
                        canvas.line(pair[0], pair[1], 1.0, LANE);
                    }
                }
                MapElementKind::RoadEdge => {
                    for pair in points.windows(2) {
                        canvas.line(pair[0], pair[1], 2.0, ROAD_EDGE);
                    }
                }
                MapElementKind::Crosswalk => {
                    canvas.fill_polygon(&points, CROSSWALK);
                }
            }
        }
    }

    fn draw_agents(&self, canvas: &mut Canvas, ego: &Pose2D, agents: &[AgentBox]) {
        for agent in agents {
            let local = AgentBox {
                pose: global_to_local(ego, &agent.pose),
                ..agent.clone()
            };
            if !self.projector.contains(local.pose.x, local.pose.y) {
                continue;
            }
            let corners: Vec<(f32, f32)> = local.corners().iter().map(|c| self.px(c.0, c.1)).collect();
            canvas.fill_polygon(&corners, AGENT_FILL);
            canvas.outline(&corners, 1.0, AGENT_EDGE);
        }
    }

    fn draw_ego(&self, canvas: &mut Canvas) {
        let ego = AgentBox {
            pose: Pose2D::identity(),
            length: EGO_LENGTH,
            width: EGO_WIDTH,
            category: "ego".to_string(),
        };
        let corners: Vec<(f32, f32)> = ego.corners().iter().map(|c| self.px(c.0, c.1)).collect();
        canvas.fill_polygon(&corners, EGO_FILL);
        canvas.outline(&corners, 1.0, WHITE);
    }

    /// Time-windowed trajectory; segment opacity decays with time into the window.
    pub fn draw_layer(&self, canvas: &mut Canvas, layer: &BevLayer<'_>) -> Result<(), RenderError> {
        let Some(style) = self.styles.get(layer.source) else {
            return Ok(());
        };
        let (start, end) = layer.window;
        let samples = layer.trajectory.window(start, end);
        if samples.is_empty() {
            return Ok(());
        }
        let points: Vec<(f32, f32)> = samples.iter().map(|(_, p)| self.px(p.x, p.y)).collect();
        let colors = samples
            .iter()
            .take(samples.len().saturating_sub(1))
            .map(|(t, _)| style.rgba(time_decay_alpha(style.alpha, *t, layer.window) * layer.alpha_scale))
            .collect::<Result<Vec<_>, _>>()?;
        canvas.styled_polyline(&points, &colors, style.width, style.style);

        if layer.markers {
            let color = style.rgba(style.alpha * layer.alpha_scale)?;
            for idx in marker_indices(points.len(), MAX_MARKERS) {
                canvas.marker(style.marker, points[idx], style.marker_size, color);
            }
        }
        Ok(())
    }

    /// Swatch per drawn source in the top-left corner.
    fn draw_legend(&self, canvas: &mut Canvas, sources: &[&str]) -> Result<(), RenderError> {
        let mut shown: Vec<(&str, &TrajectoryStyle)> = Vec::new();
        for (name, style) in self.styles.iter() {
            if sources.contains(&name) {
                shown.push((name, style));
            }
        }
        if shown.is_empty() {
            return Ok(());
        }
        let row = 18;
        canvas.fill_rect(6, 6, 52, (row * shown.len() + 8) as u32, Rgba([255, 255, 255, 200]));
        for (i, (_, style)) in shown.iter().enumerate() {
            let y = 14.0 + (i * row) as f32;
            let color = style.rgba(style.alpha)?;
            let mut phase = 0.0;
            match style.style {
                LineStyle::Solid => canvas.line((12.0, y), (52.0, y), style.width, color),
                LineStyle::Dashed => {
                    canvas.dashed_line((12.0, y), (52.0, y), style.width, color, &mut phase)
                }
            }
            canvas.marker(style.marker, (32.0, y), style.marker_size, color);
        }
        Ok(())
    }
}
