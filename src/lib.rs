//! evoconv - Evolutionary search over stacked convolution kernels.
//!
//! Instead of gradient training, this crate evolves a stack of small
//! square filters so that, applied in sequence to a source image (with a
//! power-of-two resolution ramp between stages), the result approximates a
//! target image. It is a (μ,λ)-style evolution strategy: mutate a random
//! elite, score it by negated L1 pixel error over sampled dataset pairs,
//! and promote the best of each generation.
//!
//! # Architecture
//!
//! - `schema`: run settings and persisted elite-pool records
//! - `compute`: pixel buffers, the convolution engine, fitness, mutation,
//!   and the training loop
//! - `io`: dataset loading, PNG snapshots, and pool persistence
//!
//! # Example
//!
//! ```rust,no_run
//! use evoconv::compute::{DiscardSnapshots, Trainer};
//! use evoconv::io::load_dataset;
//! use evoconv::schema::Settings;
//!
//! let settings = Settings::default();
//! let dataset = load_dataset("TestImgs", "TargetImgs").unwrap();
//!
//! let mut trainer = Trainer::new(settings, dataset, Box::new(DiscardSnapshots));
//! let pause = trainer.pause_handle();
//!
//! // Runs until something sets the pause flag; resumable by calling
//! // run() again.
//! trainer.run();
//! # let _ = pause;
//! ```

pub mod compute;
pub mod io;
pub mod schema;

// Re-export commonly used types
pub use compute::{Candidate, Dataset, KernelStack, PixelBuffer, Trainer};
pub use schema::Settings;
