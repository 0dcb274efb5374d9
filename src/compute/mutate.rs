//! Mutation operator for kernel stacks.
//!
//! Mutation is expressed as an explicit delta: `MutationDelta::sample`
//! draws uniform noise shaped like a stack, and `apply` adds it into one.
//! The same contract serves the training loop and the standalone anneal
//! path, and composes with the deep-copy candidate model (the caller
//! decides which stack absorbs the noise).

use rand::Rng;
use rand::rngs::StdRng;

use super::kernel::KernelStack;

/// Additive noise shaped like a kernel stack, one value per weight.
#[derive(Debug, Clone)]
pub struct MutationDelta {
    layers: Vec<Vec<f32>>,
}

impl MutationDelta {
    /// Draw a delta for `shape` with independent uniform values in
    /// `[-rate, rate]` per kernel element. A rate of zero yields an
    /// all-zero delta.
    pub fn sample(shape: &KernelStack, rate: f32, rng: &mut StdRng) -> Self {
        let layers = shape
            .layers
            .iter()
            .map(|kernel| {
                kernel
                    .data
                    .iter()
                    .map(|_| {
                        if rate == 0.0 {
                            0.0
                        } else {
                            rng.gen_range(-rate..=rate)
                        }
                    })
                    .collect()
            })
            .collect();
        Self { layers }
    }

    /// Per-layer noise buffers.
    pub fn layers(&self) -> &[Vec<f32>] {
        &self.layers
    }
}

impl KernelStack {
    /// Add a delta element-wise into this stack.
    ///
    /// The delta must have been sampled from a stack of this shape.
    pub fn apply(&mut self, delta: &MutationDelta) {
        debug_assert_eq!(self.layers.len(), delta.layers.len());
        for (kernel, noise) in self.layers.iter_mut().zip(delta.layers.iter()) {
            debug_assert_eq!(kernel.data.len(), noise.len());
            for (w, n) in kernel.data.iter_mut().zip(noise.iter()) {
                *w += n;
            }
        }
    }
}
