//! Convolution engine: applies a kernel stack to an image with an
//! inter-stage resolution schedule.
//!
//! Stage 0 correlates the source image with the first layer. Every later
//! stage first resamples the working buffer to a power-of-two size taken
//! from a two-phase linear ramp (source resolution toward the mid
//! resolution, then mid toward the output resolution), producing a funnel
//! shape across the stack.
//!
//! # Complexity
//!
//! Direct correlation is O(N * K^2) per stage, N pixels and K kernel width.
//! Kernels here are small (8x8 by default) so direct beats an FFT plan.

use super::buffer::PixelBuffer;
use super::kernel::{Kernel, KernelStack};

/// Resolution schedule for the inter-stage resampling funnel.
#[derive(Debug, Clone, Copy)]
pub struct RampConfig {
    /// Resolution the ramp targets at the middle of the stack.
    pub mid_res: u32,
    /// Resolution the ramp targets at the final layer.
    pub out_res: u32,
}

/// Same-size 2D correlation with replicated borders.
///
/// Output dimensions match the input; the kernel anchor sits at
/// `size / 2`, so an identity filter reproduces the input exactly.
/// Samples outside the image clamp to the nearest edge pixel.
pub fn correlate(input: &PixelBuffer, kernel: &Kernel) -> PixelBuffer {
    let mut output = PixelBuffer::new(input.width, input.height, input.channels);
    correlate_into(input, kernel, &mut output);
    output
}

/// Same-size correlation into a pre-allocated buffer.
pub fn correlate_into(input: &PixelBuffer, kernel: &Kernel, output: &mut PixelBuffer) {
    let k_size = kernel.size;
    let k_half = (k_size / 2) as i64;
    let width = input.width;
    let height = input.height;
    let channels = input.channels;

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;

                for ky in 0..k_size {
                    for kx in 0..k_size {
                        let k_val = kernel.data[ky * k_size + kx];
                        if k_val == 0.0 {
                            continue;
                        }

                        // Clamp to the nearest edge pixel.
                        let sx =
                            (x as i64 + kx as i64 - k_half).clamp(0, width as i64 - 1) as usize;
                        let sy =
                            (y as i64 + ky as i64 - k_half).clamp(0, height as i64 - 1) as usize;

                        sum += input.get(sx, sy, c) * k_val;
                    }
                }

                *output.get_mut(x, y, c) = sum;
            }
        }
    }
}

/// Apply a full kernel stack with the inter-stage resolution ramp.
///
/// The ramp is skipped entirely when the source resolution already matches
/// both the mid and output resolutions, which keeps an identity stack a
/// bit-exact no-op. Output channel count matches the source; output
/// resolution is whatever the final stage left.
pub fn apply_stack(source: &PixelBuffer, stack: &KernelStack, ramp: &RampConfig) -> PixelBuffer {
    let in_res = source.width as u32;
    let layers = stack.len();

    let mut buf = correlate(source, &stack.layers[0]);

    for i in 1..layers {
        if in_res != ramp.mid_res || in_res != ramp.out_res {
            let size = stage_size(i, layers, in_res, ramp.mid_res, ramp.out_res) as usize;
            if size != buf.width || size != buf.height {
                buf = buf.resized(size, size);
            }
        }
        buf = correlate(&buf, &stack.layers[i]);
    }

    buf
}

/// Working resolution for stage `i` of `layers` (1-indexed stages).
///
/// Two-phase ramp: `t = (i / (layers - 1)) * 2` spans [0, 2]; the first
/// phase lerps from the source resolution to the mid resolution, the
/// second from there to the output resolution. The result is rounded to
/// the nearest power of two.
pub fn stage_size(i: usize, layers: usize, in_res: u32, mid_res: u32, out_res: u32) -> u32 {
    let t = (i as f32 / (layers as f32 - 1.0)) * 2.0;
    let stage_a = lerp(in_res as f32, mid_res as f32, t);
    let target = lerp(stage_a, out_res as f32, t - 1.0);
    nearest_pow2(target as u32)
}

/// Linear interpolation with the fraction clamped to [0, 1].
#[inline]
fn lerp(a: f32, b: f32, fraction: f32) -> f32 {
    a + (b - a) * fraction.clamp(0.0, 1.0)
}

/// Round to the nearest power of two; exact midpoints round up.
pub fn nearest_pow2(x: u32) -> u32 {
    if x <= 1 {
        return 1;
    }
    let next = x.next_power_of_two();
    let prev = next / 2;
    if next - x <= x - prev { next } else { prev }
}
