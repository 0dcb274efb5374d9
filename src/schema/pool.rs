//! Persisted elite-pool records.
//!
//! The on-disk format is versioned JSON: one entry per candidate, each
//! kernel layer as an explicit array of row arrays of floats. Saving and
//! reloading must reproduce the exact kernel values.

use serde::{Deserialize, Serialize};

/// Current on-disk format version.
pub const POOL_FORMAT_VERSION: u32 = 1;

/// Top-level persisted pool document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolFile {
    pub version: u32,
    pub parents: Vec<PoolEntry>,
}

/// One persisted candidate: fitness, lineage, and kernel weights as
/// `[layer][row][col]` nested arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEntry {
    pub fitness: f32,
    pub lineage: String,
    pub kernels: Vec<Vec<Vec<f32>>>,
}

impl PoolEntry {
    /// Check that every layer is square and all layers share one size.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.kernels.is_empty() {
            return Err(PoolError::BadShape {
                layer: 0,
                detail: "candidate has no kernel layers".into(),
            });
        }

        let size = self.kernels[0].len();
        for (i, layer) in self.kernels.iter().enumerate() {
            if layer.len() != size {
                return Err(PoolError::BadShape {
                    layer: i,
                    detail: format!("expected {} rows, found {}", size, layer.len()),
                });
            }
            for row in layer {
                if row.len() != size {
                    return Err(PoolError::BadShape {
                        layer: i,
                        detail: format!(
                            "layer is not square: {} rows but a row of {} values",
                            size,
                            row.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Elite-pool persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("unsupported pool format version {found} (expected {POOL_FORMAT_VERSION})")]
    Version { found: u32 },
    #[error("kernel layer {layer}: {detail}")]
    BadShape { layer: usize, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_entry() -> PoolEntry {
        PoolEntry {
            fitness: -1.5,
            lineage: "0 3".into(),
            kernels: vec![vec![vec![0.0; 3]; 3], vec![vec![1.0; 3]; 3]],
        }
    }

    #[test]
    fn test_validate_accepts_square_layers() {
        assert!(square_entry().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_ragged_rows() {
        let mut entry = square_entry();
        entry.kernels[1][2].pop();
        let err = entry.validate().unwrap_err();
        assert!(matches!(err, PoolError::BadShape { layer: 1, .. }));
    }

    #[test]
    fn test_validate_rejects_mixed_layer_sizes() {
        let mut entry = square_entry();
        entry.kernels.push(vec![vec![0.0; 4]; 4]);
        let err = entry.validate().unwrap_err();
        assert!(matches!(err, PoolError::BadShape { layer: 2, .. }));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let entry = PoolEntry {
            fitness: 0.0,
            lineage: String::new(),
            kernels: vec![],
        };
        assert!(entry.validate().is_err());
    }
}
