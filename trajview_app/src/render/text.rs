//! Text drawing for titles, overlays and the statistics panel.
//!
//! A TrueType font is used when one can be found; otherwise text falls back
//! to a built-in 3x5 bitmap font (upper case only).

use super::canvas::Canvas;
use image::Rgba;
use rusttype::{point, Font, Scale};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bitmap glyph columns and rows before scaling.
const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;

/// Coverage below this is left undrawn.
const MIN_COVERAGE: f32 = 0.05;

/// Draws text with a TrueType font or the bitmap fallback.
pub struct TextRenderer {
    font: Option<Font<'static>>,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::bitmap()
    }
}

impl TextRenderer {
    /// Bitmap-only renderer.
    pub fn bitmap() -> Self {
        Self { font: None }
    }

    /// Parses TrueType data; `None` when it is not a font.
    pub fn from_font_bytes(data: Vec<u8>) -> Option<Self> {
        Font::try_from_vec(data).map(|font| Self { font: Some(font) })
    }

    /// Loads `path` when given, else searches common font directories for
    /// `family`. Falls back to the bitmap font.
    pub fn load(family: &str, path: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = match path {
            Some(p) => vec![p.to_path_buf()],
            None => font_candidates(family),
        };
        for candidate in &candidates {
            let Ok(data) = fs::read(candidate) else {
                continue;
            };
            if let Some(renderer) = Self::from_font_bytes(data) {
                info!("Loaded font from {}", candidate.display());
                return renderer;
            }
            debug!("{} is not a TrueType font", candidate.display());
        }
        info!("Could not find font '{}', falling back to bitmap text", family);
        Self::bitmap()
    }

    pub fn is_truetype(&self) -> bool {
        self.font.is_some()
    }

    /// Bitmap scale factor for a nominal pixel size.
    fn bitmap_scale(size: f32) -> u32 {
        ((size / 7.0).round() as u32).max(1)
    }

    /// Distance between baselines of consecutive lines.
    pub fn line_height(&self, size: f32) -> u32 {
        match &self.font {
            Some(font) => {
                let v = font.v_metrics(Scale::uniform(size));
                (v.ascent - v.descent + v.line_gap).ceil().max(1.0) as u32
            }
            None => (GLYPH_H + 2) * Self::bitmap_scale(size),
        }
    }

    pub fn text_width(&self, text: &str, size: f32) -> u32 {
        match &self.font {
            Some(font) => {
                let scale = Scale::uniform(size);
                font.layout(text, scale, point(0.0, 0.0))
                    .last()
                    .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                    .unwrap_or(0.0)
                    .ceil()
                    .max(0.0) as u32
            }
            None => {
                let n = text.chars().count() as u32;
                n * (GLYPH_W + 1) * Self::bitmap_scale(size)
            }
        }
    }

    /// Draws one line with its top-left corner at `(x, y)`.
    pub fn draw(&self, canvas: &mut Canvas, x: i32, y: i32, text: &str, size: f32, color: Rgba<u8>) {
        match &self.font {
            Some(font) => {
                let scale = Scale::uniform(size);
                let ascent = font.v_metrics(scale).ascent;
                for glyph in font.layout(text, scale, point(x as f32, y as f32 + ascent)) {
                    let Some(bb) = glyph.pixel_bounding_box() else {
                        continue;
                    };
                    glyph.draw(|gx, gy, v| {
                        if v < MIN_COVERAGE {
                            return;
                        }
                        let alpha = (color[3] as f32 * v.min(1.0)).round() as u8;
                        let px = Rgba([color[0], color[1], color[2], alpha]);
                        canvas.blend_pixel(bb.min.x + gx as i32, bb.min.y + gy as i32, px);
                    });
                }
            }
            None => {
                let scale = Self::bitmap_scale(size) as i32;
                let advance = (GLYPH_W as i32 + 1) * scale;
                for (i, c) in text.chars().enumerate() {
                    draw_bitmap_char(canvas, x + i as i32 * advance, y + scale, c, scale, color);
                }
            }
        }
    }

    /// Draws `lines` top to bottom; returns the y below the last line.
    pub fn draw_lines<S: AsRef<str>>(
        &self,
        canvas: &mut Canvas,
        x: i32,
        y: i32,
        lines: &[S],
        size: f32,
        color: Rgba<u8>,
    ) -> i32 {
        let step = self.line_height(size) as i32;
        let mut y = y;
        for line in lines {
            self.draw(canvas, x, y, line.as_ref(), size, color);
            y += step;
        }
        y
    }

    /// Lines on a filled box with `pad` pixels of margin.
    pub fn label_box<S: AsRef<str>>(
        &self,
        canvas: &mut Canvas,
        (x, y): (i32, i32),
        lines: &[S],
        size: f32,
        color: Rgba<u8>,
        background: Rgba<u8>,
        pad: u32,
    ) {
        let width = lines.iter().map(|l| self.text_width(l.as_ref(), size)).max().unwrap_or(0);
        let height = self.line_height(size) * lines.len() as u32;
        canvas.fill_rect(x, y, width + 2 * pad, height + 2 * pad, background);
        self.draw_lines(canvas, x + pad as i32, y + pad as i32, lines, size, color);
    }
}

fn font_candidates(family: &str) -> Vec<PathBuf> {
    let lower = family.to_lowercase();
    [
        format!("/usr/share/fonts/truetype/{}/{}.ttf", lower, family),
        format!("/usr/share/fonts/truetype/dejavu/{}.ttf", family),
        format!("/usr/share/fonts/truetype/{}.ttf", family),
        format!("/usr/share/fonts/TTF/{}.ttf", family),
        format!("/Library/Fonts/{}.ttf", family),
        format!("/System/Library/Fonts/{}.ttf", family),
        format!("/System/Library/Fonts/Supplemental/{}.ttf", family),
        format!("{}.ttf", family),
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

/// Rows of a 3x5 glyph, top first; bit 2 is the left column.
fn glyph_rows(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        'A' => [2, 5, 7, 5, 5],
        'B' => [6, 5, 6, 5, 6],
        'C' => [3, 4, 4, 4, 3],
        'D' => [6, 5, 5, 5, 6],
        'E' => [7, 4, 6, 4, 7],
        'F' => [7, 4, 6, 4, 4],
        'G' => [3, 4, 5, 5, 3],
        'H' => [5, 5, 7, 5, 5],
        'I' => [7, 2, 2, 2, 7],
        'J' => [1, 1, 1, 5, 2],
        'K' => [5, 5, 6, 5, 5],
        'L' => [4, 4, 4, 4, 7],
        'M' => [5, 7, 7, 5, 5],
        'N' => [6, 5, 5, 5, 5],
        'O' => [2, 5, 5, 5, 2],
        'P' => [6, 5, 6, 4, 4],
        'Q' => [2, 5, 5, 6, 3],
        'R' => [6, 5, 6, 5, 5],
        'S' => [3, 4, 2, 1, 6],
        'T' => [7, 2, 2, 2, 2],
        'U' => [5, 5, 5, 5, 7],
        'V' => [5, 5, 5, 5, 2],
        'W' => [5, 5, 7, 7, 5],
        'X' => [5, 5, 2, 5, 5],
        'Y' => [5, 5, 2, 2, 2],
        'Z' => [7, 1, 2, 4, 7],
        '0' => [7, 5, 5, 5, 7],
        '1' => [2, 6, 2, 2, 7],
        '2' => [7, 1, 7, 4, 7],
        '3' => [7, 1, 7, 1, 7],
        '4' => [5, 5, 7, 1, 1],
        '5' => [7, 4, 7, 1, 7],
        '6' => [7, 4, 7, 5, 7],
        '7' => [7, 1, 2, 4, 4],
        '8' => [7, 5, 7, 5, 7],
        '9' => [7, 5, 7, 1, 7],
        ' ' => [0, 0, 0, 0, 0],
        ':' => [0, 2, 0, 2, 0],
        '.' => [0, 0, 0, 0, 2],
        ',' => [0, 0, 0, 2, 4],
        '-' => [0, 0, 7, 0, 0],
        '_' => [0, 0, 0, 0, 7],
        '/' => [1, 1, 2, 4, 4],
        '(' => [2, 4, 4, 4, 2],
        ')' => [2, 1, 1, 1, 2],
        '[' => [6, 4, 4, 4, 6],
        ']' => [3, 1, 1, 1, 3],
        '%' => [5, 1, 2, 4, 5],
        '=' => [0, 7, 0, 7, 0],
        '+' => [0, 2, 7, 2, 0],
        '|' => [2, 2, 2, 2, 2],
        '<' => [1, 2, 4, 2, 1],
        '>' => [4, 2, 1, 2, 4],
        '\'' => [2, 2, 0, 0, 0],
        '#' => [5, 7, 5, 7, 5],
        '*' | '•' => [0, 5, 2, 5, 0],
        '?' => [7, 1, 2, 0, 2],
        '!' => [2, 2, 2, 0, 2],
        _ => [7, 7, 7, 7, 7],
    }
}

fn draw_bitmap_char(canvas: &mut Canvas, x: i32, y: i32, c: char, scale: i32, color: Rgba<u8>) {
    for (row, bits) in glyph_rows(c).iter().enumerate() {
        for col in 0..GLYPH_W as i32 {
            if (bits >> (2 - col)) & 1 == 1 {
                canvas.fill_rect(x + col * scale, y + row as i32 * scale, scale as u32, scale as u32, color);
            }
        }
    }
}
