//! I/O module - the collaborators around the compute core: dataset
//! loading, PNG snapshots, and elite-pool persistence.
//!
//! Everything here follows one recovery rule: a single unreadable or
//! malformed element is logged and skipped, while empty or structurally
//! broken inputs fail loudly before training starts.

mod dataset;
mod pool;
mod snapshot;

pub use dataset::*;
pub use pool::*;
pub use snapshot::*;
