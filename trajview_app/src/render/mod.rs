//! Raster rendering of synchronized trajectories.
//!
//! Panels:
//! - **BEV**: map, agents, ego box and time-windowed trajectories ([`bev`])
//! - **Camera**: front image with ground-projected trajectories ([`camera`])
//! - **Comparison**: auto-fitted x-y plot ([`comparison`])
//! - **Statistics**: scene information, point counts and metrics ([`stats`])
//!
//! The comprehensive view places the four side by side under a title; the
//! simple view is the BEV alone.

pub mod bev;
pub mod camera;
pub mod canvas;
pub mod comparison;
pub mod stats;
pub mod style;
pub mod text;

pub use bev::{BevLayer, BevRenderer};
pub use style::{LineStyle, MarkerShape, StyleOverride, StyleSet, TrajectoryStyle};
pub use text::TextRenderer;

use crate::error::RenderError;
use canvas::Canvas;
use image::{Rgba, RgbaImage};
use std::path::Path;
use trajview_core::{BevProjector, SynchronizedSet, TimeWindow};
use trajview_env::{Frame, Scene, FRONT_CAMERA};

const PANEL_GAP: u32 = 8;
const TEXT_PAD: u32 = 4;
const PAGE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([20, 20, 20, 255]);
const OVERLAY: Rgba<u8> = Rgba([255, 255, 255, 204]);
const PROGRESS: Rgba<u8> = Rgba([220, 20, 60, 230]);

/// Characters of the token in the figure title.
const TITLE_TOKEN_CHARS: usize = 12;

/// Panel renderer configured once per application.
pub struct Renderer {
    pub styles: StyleSet,
    pub projector: BevProjector,
    pub text: TextRenderer,
}

impl Renderer {
    /// Renderer with bitmap text; see [`with_text`](Self::with_text).
    pub fn new(styles: StyleSet, projector: BevProjector) -> Self {
        Self {
            styles,
            projector,
            text: TextRenderer::bitmap(),
        }
    }

    pub fn with_text(mut self, text: TextRenderer) -> Self {
        self.text = text;
        self
    }

    fn bev(&self) -> BevRenderer<'_> {
        BevRenderer::new(self.projector, &self.styles)
    }

    /// Side panels share the BEV height.
    fn panel_height(&self) -> u32 {
        self.projector.size_px
    }

    fn title_size(&self) -> f32 {
        (self.panel_height() as f32 / 22.0).max(12.0)
    }

    fn label_size(&self) -> f32 {
        (self.panel_height() as f32 / 32.0).max(10.0)
    }

    /// BEV, camera, comparison and statistics for the scene's current
    /// frame, under a title naming scenario, token and window.
    pub fn comprehensive_view(
        &self,
        scene: &Scene,
        set: &SynchronizedSet,
        window: TimeWindow,
    ) -> Result<RgbaImage, RenderError> {
        let frame = current_frame(scene)?;
        let h = self.panel_height();
        let camera_w = h * 16 / 9;

        let bev = self.simple_view(scene, set, window)?;
        let image = camera::load_camera_image(
            frame.cameras.get(FRONT_CAMERA).map(|p| p.as_path()),
            camera_w,
            h,
        );
        let cam = camera::render_camera_panel(
            image,
            &scene.camera_model(),
            &set.trajectories,
            window,
            &self.styles,
        )?;
        let cam = self.ego_overlay(cam, frame);
        let cmp = comparison::render_comparison_panel(&set.trajectories, window, &self.styles, h, h)?;
        let lines = stats::statistics_lines(scene, set, &self.styles);
        let info = stats::render_statistics_panel(&lines, &self.text, h * 3 / 4, h);

        let row = canvas::hconcat(
            &[
                self.titled(bev, "Bird's Eye View"),
                self.titled(cam, "Front Camera View"),
                self.titled(cmp, "Trajectory Comparison (Top View)"),
                self.titled(info, "Scene Statistics"),
            ],
            PANEL_GAP,
            PAGE,
        );
        let header = self.figure_title(scene, window, row.width());
        Ok(canvas::vconcat(&[header, row], PAGE))
    }

    /// The two title lines of the comprehensive view.
    pub fn title_lines(scene: &Scene, window: TimeWindow) -> [String; 2] {
        let token: String = scene.token().as_str().chars().take(TITLE_TOKEN_CHARS).collect();
        [
            format!("Trajectory Analysis - {}", scene.metadata.scenario_type),
            format!(
                "Scene: {}... | Time Window: {:.1}s - {:.1}s",
                token, window.0, window.1
            ),
        ]
    }

    fn figure_title(&self, scene: &Scene, window: TimeWindow, width: u32) -> RgbaImage {
        let size = self.title_size();
        let lines = Self::title_lines(scene, window);
        let line_h = self.text.line_height(size);
        let mut canvas = Canvas::new(width.max(1), 2 * line_h + 2 * TEXT_PAD, PAGE);
        let mut y = TEXT_PAD as i32;
        for line in &lines {
            let x = width.saturating_sub(self.text.text_width(line, size)) / 2;
            self.text.draw(&mut canvas, x as i32, y, line, size, INK);
            y += line_h as i32;
        }
        canvas.into_image()
    }

    /// Panel with a caption strip above it.
    fn titled(&self, panel: RgbaImage, title: &str) -> RgbaImage {
        let size = self.label_size();
        let strip = self.text.line_height(size) + 2 * TEXT_PAD;
        let mut canvas = Canvas::new(panel.width(), panel.height() + strip, PAGE);
        self.text.draw(&mut canvas, TEXT_PAD as i32, TEXT_PAD as i32, title, size, INK);
        canvas.paste(&panel, 0, strip as i64);
        canvas.into_image()
    }

    /// Speed and driving command in the panel's top-left corner.
    fn ego_overlay(&self, panel: RgbaImage, frame: &Frame) -> RgbaImage {
        let status = &frame.ego_status;
        let lines = [
            format!("Speed: {:.1} m/s", status.speed()),
            format!("Cmd: {}", status.driving_command),
        ];
        let mut canvas = Canvas::from_image(panel);
        let at = (2 * TEXT_PAD) as i32;
        self.text.label_box(&mut canvas, (at, at), &lines, self.label_size(), INK, OVERLAY, TEXT_PAD);
        canvas.into_image()
    }

    /// BEV of the scene's current frame with every synchronized source.
    pub fn simple_view(
        &self,
        scene: &Scene,
        set: &SynchronizedSet,
        window: TimeWindow,
    ) -> Result<RgbaImage, RenderError> {
        let frame = current_frame(scene)?;
        let layers: Vec<BevLayer<'_>> = set
            .trajectories
            .iter()
            .map(|(name, traj)| BevLayer::new(name, traj, window))
            .collect();
        self.bev().render(frame, &scene.map, &layers)
    }

    /// BEV around an arbitrary frame with explicit layers and a progress bar.
    pub fn frame_view(
        &self,
        frame: &Frame,
        scene: &Scene,
        layers: &[BevLayer<'_>],
        progress: Option<f64>,
    ) -> Result<RgbaImage, RenderError> {
        let img = self.bev().render(frame, &scene.map, layers)?;
        Ok(match progress {
            Some(fraction) => {
                let mut canvas = Canvas::from_image(img);
                canvas.progress_bar(fraction, 6, PROGRESS);
                canvas.into_image()
            }
            None => img,
        })
    }
}

fn current_frame(scene: &Scene) -> Result<&Frame, RenderError> {
    scene
        .frames
        .get(scene.current_frame_index())
        .ok_or_else(|| RenderError::EmptyScene(scene.token().to_string()))
}

/// Writes a PNG, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), RenderError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticSource;
    use std::collections::BTreeMap;
    use trajview_core::synchronize;
    use trajview_env::SceneSource;

    fn scene_and_set() -> (Scene, SynchronizedSet) {
        let source = SyntheticSource::new(3, 1);
        let scene = source.load_scene(&source.tokens()[0]).unwrap();
        let sources: BTreeMap<_, _> = source.reference_trajectories(&scene).unwrap();
        let set = synchronize(&sources, 4.0, 0.1).unwrap();
        (scene, set)
    }

    fn renderer(size: u32) -> Renderer {
        Renderer::new(StyleSet::default(), BevProjector::new(32.0, size))
    }

    #[test]
    fn test_title_lines() {
        let (mut scene, _) = scene_and_set();
        scene.metadata.token = trajview_env::SceneToken::new("abcdef0123456789");
        scene.metadata.scenario_type = "left_turn".to_string();
        let [first, second] = Renderer::title_lines(&scene, (0.0, 3.0));
        assert_eq!(first, "Trajectory Analysis - left_turn");
        assert_eq!(second, "Scene: abcdef012345... | Time Window: 0.0s - 3.0s");
    }

    #[test]
    fn test_comprehensive_view_layout() {
        let (scene, set) = scene_and_set();
        let renderer = renderer(128);
        let img = renderer.comprehensive_view(&scene, &set, (0.0, 3.0)).unwrap();

        let h = 128;
        let panels_w = h + h * 16 / 9 + h + h * 3 / 4 + 3 * PANEL_GAP;
        let text = TextRenderer::bitmap();
        let strip = text.line_height(renderer.label_size()) + 2 * TEXT_PAD;
        let header = 2 * text.line_height(renderer.title_size()) + 2 * TEXT_PAD;
        assert_eq!(img.dimensions(), (panels_w, header + strip + h));

        // the header carries dark title text
        let dark_in_header = (0..header)
            .flat_map(|y| (0..img.width()).map(move |x| (x, y)))
            .filter(|(x, y)| img.get_pixel(*x, *y)[0] < 64)
            .count();
        assert!(dark_in_header > 0);
        assert!(img.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_ego_overlay_draws_box() {
        let (scene, _) = scene_and_set();
        let renderer = renderer(128);
        let frame = current_frame(&scene).unwrap();
        let panel = RgbaImage::from_pixel(200, 120, Rgba([0, 0, 0, 255]));
        let out = renderer.ego_overlay(panel, frame);
        // translucent white box over black
        let px = out.get_pixel(2 * TEXT_PAD + 1, 2 * TEXT_PAD + 1);
        assert!(px[0] > 150, "got {:?}", px);
        assert_eq!(px[3], 255);
        assert_eq!(*out.get_pixel(199, 119), Rgba([0, 0, 0, 255]));
    }
}
