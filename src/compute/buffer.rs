//! Multi-channel floating-point pixel buffers.
//!
//! All numerical work in the crate happens on `PixelBuffer`: an interleaved,
//! row-major `f32` image with an arbitrary channel count. Decoding to and
//! encoding from on-disk formats lives in the `io` module; nothing in
//! `compute` touches a codec.

/// Interleaved row-major pixel storage, `data[(y * width + x) * channels + c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    /// Pixel values, typically in the 0..255 range for dataset images.
    pub data: Vec<f32>,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Samples per pixel.
    pub channels: usize,
}

impl PixelBuffer {
    /// Create a zero-filled buffer.
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            data: vec![0.0; width * height * channels],
            width,
            height,
            channels,
        }
    }

    /// Create a buffer from existing sample data.
    ///
    /// Panics in debug builds if the data length does not match the
    /// dimensions.
    pub fn from_data(data: Vec<f32>, width: usize, height: usize, channels: usize) -> Self {
        debug_assert_eq!(data.len(), width * height * channels);
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    /// Sample at (x, y, c) without bounds checking beyond the slice index.
    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[(y * self.width + x) * self.channels + c]
    }

    /// Mutable sample at (x, y, c).
    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize, c: usize) -> &mut f32 {
        &mut self.data[(y * self.width + x) * self.channels + c]
    }

    /// Bilinear resample to a new resolution, preserving channel count.
    ///
    /// Sample positions are pixel centers, edges clamped, so a constant
    /// image stays constant at any scale.
    pub fn resized(&self, new_width: usize, new_height: usize) -> PixelBuffer {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }

        let mut out = PixelBuffer::new(new_width, new_height, self.channels);
        let x_scale = self.width as f32 / new_width as f32;
        let y_scale = self.height as f32 / new_height as f32;

        for y in 0..new_height {
            // Map output pixel center into source coordinates.
            let sy = ((y as f32 + 0.5) * y_scale - 0.5).max(0.0);
            let y0 = (sy as usize).min(self.height - 1);
            let y1 = (y0 + 1).min(self.height - 1);
            let fy = sy - y0 as f32;

            for x in 0..new_width {
                let sx = ((x as f32 + 0.5) * x_scale - 0.5).max(0.0);
                let x0 = (sx as usize).min(self.width - 1);
                let x1 = (x0 + 1).min(self.width - 1);
                let fx = sx - x0 as f32;

                for c in 0..self.channels {
                    let top = self.get(x0, y0, c) * (1.0 - fx) + self.get(x1, y0, c) * fx;
                    let bottom = self.get(x0, y1, c) * (1.0 - fx) + self.get(x1, y1, c) * fx;
                    *out.get_mut(x, y, c) = top * (1.0 - fy) + bottom * fy;
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_constant_stays_constant() {
        let mut buf = PixelBuffer::new(16, 16, 3);
        buf.data.fill(42.0);

        for (w, h) in [(8, 8), (32, 32), (16, 16), (5, 7)] {
            let resized = buf.resized(w, h);
            assert_eq!(resized.width, w);
            assert_eq!(resized.height, h);
            assert_eq!(resized.channels, 3);
            for &v in &resized.data {
                assert!((v - 42.0).abs() < 1e-5, "constant broken: {}", v);
            }
        }
    }

    #[test]
    fn test_resize_preserves_value_range() {
        let mut buf = PixelBuffer::new(8, 8, 1);
        for (i, v) in buf.data.iter_mut().enumerate() {
            *v = (i % 256) as f32;
        }

        let up = buf.resized(16, 16);
        let (min, max) = buf
            .data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        for &v in &up.data {
            assert!(v >= min - 1e-4 && v <= max + 1e-4, "out of range: {}", v);
        }
    }

    #[test]
    fn test_resize_same_size_is_identity() {
        let mut buf = PixelBuffer::new(4, 4, 2);
        for (i, v) in buf.data.iter_mut().enumerate() {
            *v = i as f32;
        }
        assert_eq!(buf.resized(4, 4), buf);
    }
}
