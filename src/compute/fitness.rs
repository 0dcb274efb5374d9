//! Stochastic fitness evaluation against an image dataset.
//!
//! Fitness is the negated sum of per-pixel absolute differences between the
//! convolution output and the target image: a perfect match scores 0 and
//! everything else is negative, so maximizing fitness minimizes L1 error.
//! Batch scoring is a Monte-Carlo estimate over sampled dataset indices,
//! not an exhaustive pass, so the same stack can score differently between
//! calls.

use rand::Rng;
use rand::rngs::StdRng;

use super::buffer::PixelBuffer;
use super::convolve::{RampConfig, apply_stack};
use super::kernel::KernelStack;

/// Index-aligned source and target image pairs. Loaded once before
/// training, read-only afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    sources: Vec<PixelBuffer>,
    targets: Vec<PixelBuffer>,
}

/// Dataset construction failures. Both are fatal for a run.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("no source images could be loaded")]
    Empty,
    #[error("source image count ({sources}) does not match target image count ({targets})")]
    CountMismatch { sources: usize, targets: usize },
}

impl Dataset {
    /// Pair up sources and targets, rejecting empty or mismatched sets.
    pub fn new(sources: Vec<PixelBuffer>, targets: Vec<PixelBuffer>) -> Result<Self, DatasetError> {
        if sources.is_empty() {
            return Err(DatasetError::Empty);
        }
        if sources.len() != targets.len() {
            return Err(DatasetError::CountMismatch {
                sources: sources.len(),
                targets: targets.len(),
            });
        }
        Ok(Self { sources, targets })
    }

    /// Number of image pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Always false; construction rejects empty sets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source image at `index`.
    #[inline]
    pub fn source(&self, index: usize) -> &PixelBuffer {
        &self.sources[index]
    }

    /// Target image at `index`.
    #[inline]
    pub fn target(&self, index: usize) -> &PixelBuffer {
        &self.targets[index]
    }
}

/// Scores kernel stacks against a dataset, retaining the last convolution
/// output and sampled index for diagnostics and generation snapshots.
pub struct FitnessEvaluator {
    ramp: RampConfig,
    sample_count: usize,
    last_index: usize,
    last_output: Option<PixelBuffer>,
}

impl FitnessEvaluator {
    /// Create an evaluator drawing `sample_count` random pairs per batch.
    pub fn new(ramp: RampConfig, sample_count: usize) -> Self {
        Self {
            ramp,
            sample_count: sample_count.max(1),
            last_index: 0,
            last_output: None,
        }
    }

    /// Score one dataset pair: run the stack over the source, then return
    /// the negated L1 distance to the target.
    ///
    /// The target must match the engine's final output resolution and
    /// channel count; a mismatch is not detected here.
    pub fn score(&mut self, dataset: &Dataset, index: usize, stack: &KernelStack) -> f32 {
        let output = apply_stack(dataset.source(index), stack, &self.ramp);
        let target = dataset.target(index);
        debug_assert_eq!(output.data.len(), target.data.len());

        let mut total = 0.0f64;
        for (o, t) in output.data.iter().zip(target.data.iter()) {
            total += (o - t).abs() as f64;
        }

        self.last_output = Some(output);
        -(total as f32)
    }

    /// Monte-Carlo average fitness: draw `sample_count` indices uniformly
    /// with replacement, score each, and average.
    pub fn test_batch(&mut self, dataset: &Dataset, stack: &KernelStack, rng: &mut StdRng) -> f32 {
        let mut acc = 0.0f64;
        for _ in 0..self.sample_count {
            let index = rng.gen_range(0..dataset.len());
            self.last_index = index;
            acc += self.score(dataset, index, stack) as f64;
        }
        (acc / self.sample_count as f64) as f32
    }

    /// Dataset index of the most recent `score` call driven by `test_batch`.
    #[inline]
    pub fn last_index(&self) -> usize {
        self.last_index
    }

    /// Convolution output of the most recent `score` call, if any.
    #[inline]
    pub fn last_output(&self) -> Option<&PixelBuffer> {
        self.last_output.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn flat(width: usize, value: f32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, width, 3);
        buf.data.fill(value);
        buf
    }

    fn no_ramp(res: u32) -> RampConfig {
        RampConfig {
            mid_res: res,
            out_res: res,
        }
    }

    #[test]
    fn test_dataset_rejects_empty() {
        assert!(matches!(
            Dataset::new(vec![], vec![]),
            Err(DatasetError::Empty)
        ));
    }

    #[test]
    fn test_dataset_rejects_mismatch() {
        let err = Dataset::new(vec![flat(4, 0.0)], vec![]).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::CountMismatch {
                sources: 1,
                targets: 0
            }
        ));
    }

    #[test]
    fn test_perfect_match_scores_zero() {
        let dataset = Dataset::new(vec![flat(8, 50.0)], vec![flat(8, 50.0)]).unwrap();
        let stack = KernelStack::identity(3, 2);
        let mut eval = FitnessEvaluator::new(no_ramp(8), 4);

        assert_eq!(eval.score(&dataset, 0, &stack), 0.0);
    }

    #[test]
    fn test_fitness_strictly_negative_and_monotone() {
        let source = flat(8, 50.0);
        let near = Dataset::new(vec![source.clone()], vec![flat(8, 51.0)]).unwrap();
        let far = Dataset::new(vec![source], vec![flat(8, 60.0)]).unwrap();
        let stack = KernelStack::identity(3, 2);
        let mut eval = FitnessEvaluator::new(no_ramp(8), 4);

        let f_near = eval.score(&near, 0, &stack);
        let f_far = eval.score(&far, 0, &stack);

        assert!(f_near < 0.0);
        assert!(f_far < f_near, "larger error must score lower");
    }

    #[test]
    fn test_batch_averages_and_tracks_last_index() {
        // Two pairs with different errors: the batch average lies strictly
        // between the two per-pair scores.
        let dataset = Dataset::new(
            vec![flat(8, 50.0), flat(8, 50.0)],
            vec![flat(8, 50.0), flat(8, 52.0)],
        )
        .unwrap();
        let stack = KernelStack::identity(3, 2);
        let mut eval = FitnessEvaluator::new(no_ramp(8), 64);
        let mut rng = StdRng::seed_from_u64(11);

        let avg = eval.test_batch(&dataset, &stack, &mut rng);
        let worst = -(8.0 * 8.0 * 3.0 * 2.0);

        assert!(avg <= 0.0 && avg >= worst);
        assert!(avg < 0.0, "with 64 draws both pairs are sampled");
        assert!(eval.last_index() < dataset.len());
        assert!(eval.last_output().is_some());
    }
}
