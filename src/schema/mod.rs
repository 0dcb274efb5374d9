//! Schema module - configuration and persisted record types.

mod pool;
mod settings;

pub use pool::*;
pub use settings::*;
