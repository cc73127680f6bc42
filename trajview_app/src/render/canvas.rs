//! Alpha-blended drawing surface.

use super::style::{LineStyle, MarkerShape};
use image::{imageops, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut,
    draw_polygon_mut, Blend,
};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// Pixel coordinate far outside any panel; keeps casts in `i32` range.
const COORD_LIMIT: f32 = 1.0e6;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// RGBA image that alpha-blends everything drawn on it.
///
/// A canvas that starts fully opaque stays fully opaque: blending rounds
/// alpha down by one, so [`into_image`](Self::into_image) restores it.
pub struct Canvas {
    inner: Blend<RgbaImage>,
    opaque: bool,
}

fn clamp_coord(v: f32) -> f32 {
    v.clamp(-COORD_LIMIT, COORD_LIMIT)
}

fn to_i32(p: (f32, f32)) -> (i32, i32) {
    (clamp_coord(p.0).round() as i32, clamp_coord(p.1).round() as i32)
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self {
            inner: Blend(RgbaImage::from_pixel(width, height, background)),
            opaque: background[3] == u8::MAX,
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        let opaque = image.pixels().all(|p| p[3] == u8::MAX);
        Self {
            inner: Blend(image),
            opaque,
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.0.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.0.height()
    }

    pub fn into_image(self) -> RgbaImage {
        let mut image = self.inner.0;
        if self.opaque {
            for pixel in image.pixels_mut() {
                pixel[3] = u8::MAX;
            }
        }
        image
    }

    /// Copies `image` with its top-left corner at `(x, y)`.
    pub fn paste(&mut self, image: &RgbaImage, x: i64, y: i64) {
        imageops::overlay(&mut self.inner.0, image, x, y);
    }

    /// Blends one pixel; coordinates outside the canvas are ignored.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        self.inner.0.get_pixel_mut(x as u32, y as u32).blend(&color);
    }

    /// Straight line of the given width.
    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgba<u8>) {
        let from = (clamp_coord(from.0), clamp_coord(from.1));
        let to = (clamp_coord(to.0), clamp_coord(to.1));
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = (dx * dx + dy * dy).sqrt();
        if width < 1.5 || len < 1e-3 {
            draw_line_segment_mut(&mut self.inner, from, to, color);
            return;
        }
        let half = width / 2.0;
        let (nx, ny) = (-dy / len * half, dx / len * half);
        let quad = [
            (from.0 + nx, from.1 + ny),
            (to.0 + nx, to.1 + ny),
            (to.0 - nx, to.1 - ny),
            (from.0 - nx, from.1 - ny),
        ];
        if !self.fill_polygon(&quad, color) {
            draw_line_segment_mut(&mut self.inner, from, to, color);
        }
    }

    /// Line broken into dashes; `phase` carries the dash pattern across
    /// consecutive segments and is updated in place.
    pub fn dashed_line(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        color: Rgba<u8>,
        phase: &mut f32,
    ) {
        let dash = 3.0 * width + 4.0;
        let gap = 2.0 * width + 2.0;
        let period = dash + gap;
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = (dx * dx + dy * dy).sqrt();
        if len < 1e-3 || len > COORD_LIMIT {
            return;
        }
        let mut travelled = 0.0;
        while travelled < len {
            let pos = (*phase + travelled) % period;
            let (on, remaining) = if pos < dash { (true, dash - pos) } else { (false, period - pos) };
            let step = remaining.min(len - travelled);
            if on {
                let a = travelled / len;
                let b = (travelled + step) / len;
                self.line(
                    (from.0 + dx * a, from.1 + dy * a),
                    (from.0 + dx * b, from.1 + dy * b),
                    width,
                    color,
                );
            }
            travelled += step;
        }
        *phase = (*phase + len) % period;
    }

    /// Polyline with a fixed style; one colour per segment.
    pub fn styled_polyline(
        &mut self,
        points: &[(f32, f32)],
        segment_colors: &[Rgba<u8>],
        width: f32,
        style: LineStyle,
    ) {
        let mut phase = 0.0;
        for (pair, color) in points.windows(2).zip(segment_colors) {
            match style {
                LineStyle::Solid => self.line(pair[0], pair[1], width, *color),
                LineStyle::Dashed => self.dashed_line(pair[0], pair[1], width, *color, &mut phase),
            }
        }
    }

    /// Filled polygon. Returns false (drawing nothing) when the rounded
    /// outline is degenerate.
    pub fn fill_polygon(&mut self, points: &[(f32, f32)], color: Rgba<u8>) -> bool {
        let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
        for p in points {
            let (x, y) = to_i32(*p);
            let point = Point::new(x, y);
            if poly.last() != Some(&point) {
                poly.push(point);
            }
        }
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() < 3 {
            return false;
        }
        draw_polygon_mut(&mut self.inner, &poly, color);
        true
    }

    /// Closed outline through `points`.
    pub fn outline(&mut self, points: &[(f32, f32)], width: f32, color: Rgba<u8>) {
        for i in 0..points.len() {
            let next = points[(i + 1) % points.len()];
            self.line(points[i], next, width, color);
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgba<u8>) {
        if width == 0 || height == 0 {
            return;
        }
        draw_filled_rect_mut(&mut self.inner, Rect::at(x, y).of_size(width, height), color);
    }

    /// Marker centred on `center` with a thin white edge.
    pub fn marker(&mut self, shape: MarkerShape, center: (f32, f32), size: f32, color: Rgba<u8>) {
        let r = size.max(1.0);
        let (cx, cy) = to_i32(center);
        let edge = Rgba([255, 255, 255, color[3]]);
        match shape {
            MarkerShape::Circle => {
                draw_filled_circle_mut(&mut self.inner, (cx, cy), r.round() as i32, color);
                draw_hollow_circle_mut(&mut self.inner, (cx, cy), r.round() as i32, edge);
            }
            MarkerShape::Square => {
                let ri = r.round() as i32;
                let side = (2 * ri) as u32;
                self.fill_rect(cx - ri, cy - ri, side, side, color);
                let (x0, y0, x1, y1) = ((cx - ri) as f32, (cy - ri) as f32, (cx + ri) as f32, (cy + ri) as f32);
                self.outline(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)], 1.0, edge);
            }
            MarkerShape::Triangle => {
                let (x, y) = (center.0, center.1);
                let tri = [(x, y - r * 1.2), (x + r, y + r * 0.8), (x - r, y + r * 0.8)];
                self.fill_polygon(&tri, color);
                self.outline(&tri, 1.0, edge);
            }
        }
    }

    /// Horizontal progress bar along the bottom edge.
    pub fn progress_bar(&mut self, fraction: f64, height: u32, color: Rgba<u8>) {
        let (w, h) = (self.width(), self.height());
        let y = h.saturating_sub(height) as i32;
        self.fill_rect(0, y, w, height, Rgba([40, 40, 40, 160]));
        let filled = (w as f64 * fraction.clamp(0.0, 1.0)).round() as u32;
        self.fill_rect(0, y, filled, height, color);
    }
}

/// Places panels side by side on a common background.
pub fn hconcat(panels: &[RgbaImage], gap: u32, background: Rgba<u8>) -> RgbaImage {
    let width = panels.iter().map(|p| p.width()).sum::<u32>()
        + gap * panels.len().saturating_sub(1) as u32;
    let height = panels.iter().map(|p| p.height()).max().unwrap_or(0);
    let mut canvas = Canvas::new(width.max(1), height.max(1), background);
    let mut x = 0i64;
    for panel in panels {
        canvas.paste(panel, x, 0);
        x += panel.width() as i64 + gap as i64;
    }
    canvas.into_image()
}

/// Stacks images top to bottom, left-aligned.
pub fn vconcat(images: &[RgbaImage], background: Rgba<u8>) -> RgbaImage {
    let width = images.iter().map(|i| i.width()).max().unwrap_or(0);
    let height = images.iter().map(|i| i.height()).sum::<u32>();
    let mut canvas = Canvas::new(width.max(1), height.max(1), background);
    let mut y = 0i64;
    for image in images {
        canvas.paste(image, 0, y);
        y += image.height() as i64;
    }
    canvas.into_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn test_thick_line_covers_pixels() {
        let mut canvas = Canvas::new(50, 50, WHITE);
        canvas.line((5.0, 25.0), (45.0, 25.0), 5.0, RED);
        let img = canvas.into_image();
        assert_eq!(*img.get_pixel(25, 25), RED);
        assert_eq!(*img.get_pixel(25, 23), RED);
        assert_eq!(*img.get_pixel(25, 10), WHITE);
    }

    #[test]
    fn test_blending_half_alpha() {
        let mut canvas = Canvas::new(10, 10, WHITE);
        canvas.fill_rect(0, 0, 10, 10, Rgba([0, 0, 0, 128]));
        let px = canvas.into_image().get_pixel(5, 5).0;
        assert!(px[0] > 100 && px[0] < 150, "got {:?}", px);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_translucent_background_keeps_alpha() {
        let mut canvas = Canvas::new(4, 4, Rgba([0, 0, 0, 0]));
        canvas.fill_rect(0, 0, 2, 2, Rgba([255, 0, 0, 128]));
        let img = canvas.into_image();
        assert_eq!(img.get_pixel(3, 3)[3], 0);
        assert!(img.get_pixel(0, 0)[3] < 255);
    }

    #[test]
    fn test_layers_on_opaque_image_stay_opaque() {
        let mut canvas = Canvas::from_image(RgbaImage::from_pixel(8, 8, RED));
        for _ in 0..3 {
            canvas.fill_rect(0, 0, 8, 8, Rgba([0, 0, 255, 100]));
        }
        assert!(canvas.into_image().pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_dashed_line_has_gaps() {
        let mut canvas = Canvas::new(100, 10, WHITE);
        let mut phase = 0.0;
        canvas.dashed_line((0.0, 5.0), (100.0, 5.0), 1.0, RED, &mut phase);
        let img = canvas.into_image();
        let painted = (0..100).filter(|x| *img.get_pixel(*x, 5) == RED).count();
        assert!(painted > 40 && painted < 80, "painted {}", painted);
    }

    #[test]
    fn test_degenerate_polygon_is_skipped() {
        let mut canvas = Canvas::new(10, 10, WHITE);
        assert!(!canvas.fill_polygon(&[(1.0, 1.0), (1.2, 1.1), (1.0, 1.0)], RED));
        assert!(canvas.fill_polygon(&[(1.0, 1.0), (8.0, 1.0), (4.0, 8.0)], RED));
    }

    #[test]
    fn test_markers_off_canvas_do_not_panic() {
        let mut canvas = Canvas::new(20, 20, WHITE);
        for shape in [MarkerShape::Circle, MarkerShape::Square, MarkerShape::Triangle] {
            canvas.marker(shape, (-50.0, 300.0), 4.0, RED);
            canvas.marker(shape, (10.0, 10.0), 4.0, RED);
        }
        assert_eq!(*canvas.into_image().get_pixel(10, 10), RED);
    }

    #[test]
    fn test_blend_pixel_bounds() {
        let mut canvas = Canvas::new(4, 4, WHITE);
        canvas.blend_pixel(-1, 2, RED);
        canvas.blend_pixel(4, 0, RED);
        canvas.blend_pixel(1, 1, RED);
        let img = canvas.into_image();
        assert_eq!(*img.get_pixel(1, 1), RED);
        assert_eq!(img.pixels().filter(|p| **p == RED).count(), 1);
    }

    #[test]
    fn test_vconcat() {
        let a = RgbaImage::from_pixel(10, 3, RED);
        let b = RgbaImage::from_pixel(6, 4, RED);
        let out = vconcat(&[a, b], WHITE);
        assert_eq!(out.dimensions(), (10, 7));
        assert_eq!(*out.get_pixel(9, 2), RED);
        assert_eq!(*out.get_pixel(9, 5), WHITE);
    }

    #[test]
    fn test_hconcat() {
        let a = RgbaImage::from_pixel(10, 20, RED);
        let b = RgbaImage::from_pixel(5, 8, RED);
        let out = hconcat(&[a, b], 2, WHITE);
        assert_eq!(out.dimensions(), (17, 20));
        assert_eq!(*out.get_pixel(11, 0), WHITE);
        assert_eq!(*out.get_pixel(13, 19), WHITE);
    }
}
