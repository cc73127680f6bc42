//! Top-down x-y comparison plot, auto-fitted to the visible samples.

use super::canvas::Canvas;
use super::style::{MarkerShape, StyleSet};
use crate::error::RenderError;
use image::{Rgba, RgbaImage};
use std::collections::BTreeMap;
use trajview_core::{TimeWindow, Trajectory};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const GRID: Rgba<u8> = Rgba([0, 0, 0, 40]);
const AXIS: Rgba<u8> = Rgba([0, 0, 0, 120]);

/// Panel margin, pixels.
const MARGIN: f64 = 24.0;

/// Axis-aligned extent of the plotted data, metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl PlotBounds {
    /// Bounds of `points`, padded by 10 % and by at least one metre.
    pub fn fit(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut b = Self { min_x: x0, max_x: x0, min_y: y0, max_y: y0 };
        for (x, y) in iter {
            b.min_x = b.min_x.min(x);
            b.max_x = b.max_x.max(x);
            b.min_y = b.min_y.min(y);
            b.max_y = b.max_y.max(y);
        }
        let pad_x = ((b.max_x - b.min_x) * 0.1).max(1.0);
        let pad_y = ((b.max_y - b.min_y) * 0.1).max(1.0);
        Some(Self {
            min_x: b.min_x - pad_x,
            max_x: b.max_x + pad_x,
            min_y: b.min_y - pad_y,
            max_y: b.max_y + pad_y,
        })
    }
}

/// Grid spacing from {1, 2, 5} × 10^k giving roughly `target` lines over `span`.
pub fn nice_step(span: f64, target: usize) -> f64 {
    if !(span > 0.0) || target == 0 {
        return 1.0;
    }
    let raw = span / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Data-to-pixel mapping with equal scale on both axes; y points up.
struct PlotTransform {
    scale: f64,
    origin_x: f64,
    origin_y: f64,
    center: (f64, f64),
}

impl PlotTransform {
    fn new(bounds: &PlotBounds, width: u32, height: u32) -> Self {
        let usable_w = (width as f64 - 2.0 * MARGIN).max(1.0);
        let usable_h = (height as f64 - 2.0 * MARGIN).max(1.0);
        let scale = (usable_w / (bounds.max_x - bounds.min_x)).min(usable_h / (bounds.max_y - bounds.min_y));
        Self {
            scale,
            origin_x: width as f64 / 2.0,
            origin_y: height as f64 / 2.0,
            center: (
                (bounds.min_x + bounds.max_x) / 2.0,
                (bounds.min_y + bounds.max_y) / 2.0,
            ),
        }
    }

    fn apply(&self, x: f64, y: f64) -> (f32, f32) {
        (
            (self.origin_x + (x - self.center.0) * self.scale) as f32,
            (self.origin_y - (y - self.center.1) * self.scale) as f32,
        )
    }

    fn invert(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.center.0 + (col - self.origin_x) / self.scale,
            self.center.1 - (row - self.origin_y) / self.scale,
        )
    }
}

/// Comparison panel: each source's windowed path with a circle at its start
/// and a square at its end.
pub fn render_comparison_panel(
    trajectories: &BTreeMap<String, Trajectory>,
    window: TimeWindow,
    styles: &StyleSet,
    width: u32,
    height: u32,
) -> Result<RgbaImage, RenderError> {
    let mut canvas = Canvas::new(width, height, BACKGROUND);

    let visible: Vec<(&str, Vec<(f64, f64)>)> = trajectories
        .iter()
        .filter(|(name, _)| styles.get(name).is_some())
        .map(|(name, traj)| {
            let points = traj
                .window(window.0, window.1)
                .into_iter()
                .map(|(_, p)| (p.x, p.y))
                .collect::<Vec<_>>();
            (name.as_str(), points)
        })
        .filter(|(_, points)| !points.is_empty())
        .collect();

    let Some(bounds) = PlotBounds::fit(visible.iter().flat_map(|(_, pts)| pts.iter().copied())) else {
        return Ok(canvas.into_image());
    };
    let transform = PlotTransform::new(&bounds, width, height);

    // grid over the whole panel, not just the data extent
    let (left, top) = transform.invert(0.0, 0.0);
    let (right, bottom) = transform.invert(width as f64, height as f64);
    let step = nice_step((right - left).max(top - bottom), 8);
    let mut gx = (left / step).floor() * step;
    while gx <= right {
        let color = if gx.abs() < step * 1e-6 { AXIS } else { GRID };
        canvas.line(transform.apply(gx, bottom), transform.apply(gx, top), 1.0, color);
        gx += step;
    }
    let mut gy = (bottom / step).floor() * step;
    while gy <= top {
        let color = if gy.abs() < step * 1e-6 { AXIS } else { GRID };
        canvas.line(transform.apply(left, gy), transform.apply(right, gy), 1.0, color);
        gy += step;
    }

    for (name, points) in &visible {
        let Some(style) = styles.get(name) else {
            continue;
        };
        let color = style.rgba(style.alpha)?;
        let pixels: Vec<(f32, f32)> = points.iter().map(|(x, y)| transform.apply(*x, *y)).collect();
        let colors = vec![color; pixels.len().saturating_sub(1)];
        canvas.styled_polyline(&pixels, &colors, style.width, style.style);

        let marker_color = style.rgba(0.9)?;
        if let (Some(first), Some(last)) = (pixels.first(), pixels.last()) {
            canvas.marker(MarkerShape::Circle, *first, 5.0, marker_color);
            canvas.marker(MarkerShape::Square, *last, 5.0, marker_color);
        }
    }
    Ok(canvas.into_image())
}
