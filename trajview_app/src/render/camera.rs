//! Front camera panel with projected trajectories.

use super::canvas::Canvas;
use super::style::{LineStyle, StyleSet};
use crate::error::RenderError;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;
use trajview_core::{CameraModel, TimeWindow, Trajectory};

const PLACEHOLDER: Rgba<u8> = Rgba([60, 60, 60, 255]);
const PLACEHOLDER_CROSS: Rgba<u8> = Rgba([110, 110, 110, 255]);

/// Loads the camera image scaled to the panel, or a placeholder when the
/// file is absent or unreadable.
pub fn load_camera_image(path: Option<&Path>, width: u32, height: u32) -> RgbaImage {
    let Some(path) = path else {
        warn!("No front camera image for this frame");
        return placeholder(width, height);
    };
    match image::open(path) {
        Ok(img) => imageops::resize(&img.to_rgba8(), width, height, FilterType::Triangle),
        Err(e) => {
            warn!("Could not load camera image {}: {}", path.display(), e);
            placeholder(width, height)
        }
    }
}

fn placeholder(width: u32, height: u32) -> RgbaImage {
    let mut canvas = Canvas::new(width, height, PLACEHOLDER);
    let (w, h) = (width as f32, height as f32);
    canvas.line((0.0, 0.0), (w, h), 2.0, PLACEHOLDER_CROSS);
    canvas.line((0.0, h), (w, 0.0), 2.0, PLACEHOLDER_CROSS);
    canvas.into_image()
}

/// Camera image with every styled trajectory projected onto the ground plane.
///
/// Trajectories must be in the ego frame of the frame the image was taken at.
pub fn render_camera_panel(
    image: RgbaImage,
    camera: &CameraModel,
    trajectories: &BTreeMap<String, Trajectory>,
    window: TimeWindow,
    styles: &StyleSet,
) -> Result<RgbaImage, RenderError> {
    let (width, height) = image.dimensions();
    let camera = camera.scaled_to(width, height);
    let mut canvas = Canvas::from_image(image);

    for (name, trajectory) in trajectories {
        let Some(style) = styles.get(name) else {
            continue;
        };
        let color = style.rgba(style.alpha)?;
        let projected: Vec<Option<(f32, f32)>> = trajectory
            .window(window.0, window.1)
            .iter()
            .map(|(_, p)| camera.project_ground_point(p.x, p.y))
            .collect();
        let mut phase = 0.0;
        for pair in projected.windows(2) {
            if let (Some(a), Some(b)) = (pair[0], pair[1]) {
                match style.style {
                    LineStyle::Solid => canvas.line(a, b, style.width, color),
                    LineStyle::Dashed => {
                        canvas.dashed_line(a, b, style.width, color, &mut phase)
                    }
                }
            }
        }
        if let Some(Some(last)) = projected.iter().rev().find(|p| p.is_some()) {
            canvas.marker(style.marker, *last, style.marker_size, color);
        }
    }
    Ok(canvas.into_image())
}
