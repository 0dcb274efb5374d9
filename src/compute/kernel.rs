//! Kernel stacks: ordered sequences of small square convolution filters.
//!
//! A freshly initialized stack is a no-op pipeline: every layer is the
//! identity filter (all zeros except a 1 at the center). Evolution then
//! perturbs the weights through `MutationDelta` (see `mutate`).

/// A single square, single-channel filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    /// Filter weights, row-major, `size * size` values.
    pub data: Vec<f32>,
    /// Filter width and height.
    pub size: usize,
}

impl Kernel {
    /// Identity filter: all zeros except a 1 at the center (`size / 2`).
    pub fn identity(size: usize) -> Self {
        let mut data = vec![0.0f32; size * size];
        let center = size / 2;
        data[center * size + center] = 1.0;
        Self { data, size }
    }

    /// Build a filter from row vectors. Rows must be square and uniform;
    /// callers validate before constructing (see `schema::pool`).
    pub fn from_rows(rows: &[Vec<f32>]) -> Self {
        let size = rows.len();
        let mut data = Vec::with_capacity(size * size);
        for row in rows {
            data.extend_from_slice(row);
        }
        Self { data, size }
    }

    /// Weights as row vectors, for serialization.
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.data.chunks(self.size).map(|r| r.to_vec()).collect()
    }

    /// Weight at (x, y).
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.size + x]
    }
}

/// Ordered sequence of filters applied in series by the convolution engine.
///
/// All stacks in one run share the same layer count and per-layer size;
/// stacks are never resized after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelStack {
    pub layers: Vec<Kernel>,
}

impl KernelStack {
    /// Identity-initialized stack: `layers` copies of the identity filter.
    pub fn identity(size: usize, layers: usize) -> Self {
        Self {
            layers: (0..layers).map(|_| Kernel::identity(size)).collect(),
        }
    }

    /// Number of layers.
    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when the stack has no layers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
