use fnv::FnvHashSet as HashSet;
use ndarray::Array3;

/// A sparse 3D tensor (gene x spatial x x spatial y) in coordinate
/// format; every stored entry counts as an observation.
#[derive(Clone, Debug)]
pub struct SparseTensor3 {
    shape: [usize; 3],
    indices: Vec<[usize; 3]>,
    values: Vec<f32>,
}

impl SparseTensor3 {
    /// Build from `(g, x, y, value)` quadruplets
    ///
    /// * `shape` - `[n_g, n_x, n_y]`
    /// * `entries` - unique, in-bound coordinates with finite,
    ///   non-negative values
    pub fn from_entries(
        shape: [usize; 3],
        entries: Vec<(usize, usize, usize, f32)>,
    ) -> anyhow::Result<Self> {
        let [n_g, n_x, n_y] = shape;
        if n_g == 0 || n_x == 0 || n_y == 0 {
            anyhow::bail!("empty tensor shape {:?}", shape);
        }

        let mut seen = HashSet::with_capacity_and_hasher(entries.len(), Default::default());
        let mut indices = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());

        for (g, x, y, v) in entries {
            if g >= n_g || x >= n_x || y >= n_y {
                anyhow::bail!("index ({}, {}, {}) is out of bounds {:?}", g, x, y, shape);
            }
            if !v.is_finite() || v < 0. {
                anyhow::bail!("invalid value {} at ({}, {}, {})", v, g, x, y);
            }
            if !seen.insert([g, x, y]) {
                anyhow::bail!("duplicate index ({}, {}, {})", g, x, y);
            }
            indices.push([g, x, y]);
            values.push(v);
        }

        Ok(Self {
            shape,
            indices,
            values,
        })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn indices(&self) -> &[[usize; 3]] {
        &self.indices
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Row-major position `g * n_x * n_y + x * n_y + y`
    pub fn linear_index(&self, idx: &[usize; 3]) -> usize {
        let [_, n_x, n_y] = self.shape;
        idx[0] * n_x * n_y + idx[1] * n_y + idx[2]
    }

    /// Inverse of `linear_index`
    pub fn unravel_index(&self, pos: usize) -> [usize; 3] {
        let [_, n_x, n_y] = self.shape;
        [pos / (n_x * n_y), (pos / n_y) % n_x, pos % n_y]
    }

    /// Dense copy with zeros at the missing entries
    pub fn to_array3(&self) -> Array3<f32> {
        let [n_g, n_x, n_y] = self.shape;
        let mut ret = Array3::<f32>::zeros((n_g, n_x, n_y));
        for (&[g, x, y], &v) in self.indices.iter().zip(self.values.iter()) {
            ret[[g, x, y]] = v;
        }
        ret
    }
}
