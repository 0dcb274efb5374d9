//! Compute module - numerical core of the evolutionary filter search.

mod buffer;
mod convolve;
mod fitness;
mod kernel;
mod mutate;
mod trainer;

pub use buffer::*;
pub use convolve::*;
pub use fitness::*;
pub use kernel::*;
pub use mutate::*;
pub use trainer::*;
