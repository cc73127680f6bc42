//! Animated GIF assembly.

use crate::error::RenderError;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

const PAD: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Per-frame delay in milliseconds for a playback rate.
pub fn frame_delay_ms(fps: f64) -> u32 {
    if !(fps > 0.0) {
        return 1000;
    }
    (1000.0 / fps).round().max(1.0) as u32
}

/// Pads every frame onto a canvas the size of the largest one, top-left aligned.
pub fn pad_frames(frames: Vec<RgbaImage>) -> Vec<RgbaImage> {
    let width = frames.iter().map(RgbaImage::width).max().unwrap_or(0);
    let height = frames.iter().map(RgbaImage::height).max().unwrap_or(0);
    frames
        .into_iter()
        .map(|frame| {
            if frame.dimensions() == (width, height) {
                return frame;
            }
            let mut padded = RgbaImage::from_pixel(width, height, PAD);
            image::imageops::replace(&mut padded, &frame, 0, 0);
            padded
        })
        .collect()
}

/// Encodes `frames` as an infinitely looping GIF at `fps`.
///
/// Returns the file size in bytes.
pub fn write_gif(frames: Vec<RgbaImage>, fps: f64, path: &Path) -> Result<u64, RenderError> {
    if frames.is_empty() {
        return Err(RenderError::NoFrames);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let count = frames.len();
    let delay = Delay::from_numer_denom_ms(frame_delay_ms(fps), 1);
    let frames = pad_frames(frames);

    {
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = GifEncoder::new_with_speed(file, 10);
        encoder.set_repeat(Repeat::Infinite)?;
        for (i, frame) in frames.into_iter().enumerate() {
            encoder.encode_frame(Frame::from_parts(frame, 0, 0, delay))?;
            debug!("Encoded GIF frame {}/{}", i + 1, count);
        }
    }

    let size = fs::metadata(path)?.len();
    info!(
        "Wrote {} ({} frames, {:.2} MB)",
        path.display(),
        count,
        size as f64 / (1024.0 * 1024.0)
    );
    Ok(size)
}
