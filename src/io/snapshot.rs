//! PNG snapshots: generation-boundary progress images and kernel dumps.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};

use crate::compute::{Kernel, PixelBuffer, SnapshotSink};

/// Encode a 3-channel buffer to a PNG file, clamping samples to 0..255.
pub fn save_png(buffer: &PixelBuffer, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
    buffer_to_rgb(buffer).save(path)
}

/// Clamp a 3-channel buffer into an 8-bit RGB image.
pub fn buffer_to_rgb(buffer: &PixelBuffer) -> RgbImage {
    debug_assert_eq!(buffer.channels, 3);
    RgbImage::from_fn(buffer.width as u32, buffer.height as u32, |x, y| {
        let mut px = [0u8; 3];
        for (c, out) in px.iter_mut().enumerate() {
            *out = buffer.get(x as usize, y as usize, c).clamp(0.0, 255.0) as u8;
        }
        image::Rgb(px)
    })
}

/// Save a kernel's weights as a grayscale PNG, min-max normalized so the
/// full weight range is visible.
pub fn save_kernel_png(kernel: &Kernel, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
    let (min, max) = kernel
        .data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = (max - min).max(f32::EPSILON);

    let img = GrayImage::from_fn(kernel.size as u32, kernel.size as u32, |x, y| {
        let v = kernel.get(x as usize, y as usize);
        image::Luma([((v - min) / span * 255.0) as u8])
    });
    img.save(path)
}

/// Sink writing the per-generation progress pair (`gen_out.png` /
/// `gen_in.png`). Write failures are logged and swallowed so a full disk
/// or bad path never aborts training.
pub struct PngSnapshotSink {
    out_path: PathBuf,
    in_path: PathBuf,
}

impl PngSnapshotSink {
    pub fn new(out_path: impl Into<PathBuf>, in_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            in_path: in_path.into(),
        }
    }
}

impl Default for PngSnapshotSink {
    fn default() -> Self {
        Self::new("gen_out.png", "gen_in.png")
    }
}

impl SnapshotSink for PngSnapshotSink {
    fn write_generation(&mut self, output: &PixelBuffer, source: &PixelBuffer) {
        if let Err(e) = save_png(output, &self.out_path) {
            log::warn!("generation output snapshot failed: {}", e);
        }
        if let Err(e) = save_png(source, &self.in_path) {
            log::warn!("generation input snapshot failed: {}", e);
        }
    }
}
