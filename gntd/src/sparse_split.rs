use crate::gntd_common::*;
use crate::gntd_error::GntdError;

use candle_core::{Device, Tensor};
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Observed values with their row-major positions in the dense tensor
#[derive(Clone, Debug, Default)]
pub struct IndexedValues {
    pub values: Vec<f32>,
    pub linear_index: Vec<usize>,
}

impl IndexedValues {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// values (f32) and linear indexes (u32) on `dev`
    pub fn to_tensors(&self, dev: &Device) -> candle_core::Result<(Tensor, Tensor)> {
        let n = self.len();
        let values = Tensor::from_slice(&self.values, n, dev)?;
        let index: Vec<u32> = self.linear_index.iter().map(|&i| i as u32).collect();
        let index = Tensor::from_vec(index, n, dev)?;
        Ok((values, index))
    }
}

pub struct TrainValidationSplit {
    pub training: IndexedValues,
    pub validation: IndexedValues,
}

/// Size of the validation set, `ceil(ratio * n)`, ignoring the
/// floating point noise of products like `0.7 * 10`
pub fn validation_size(ratio: f64, n: usize) -> usize {
    let raw = ratio * n as f64;
    let nearest = raw.round();
    if (raw - nearest).abs() < 1e-9 {
        nearest as usize
    } else {
        raw.ceil() as usize
    }
}

/// Shuffle the observed entries and hold out `ceil(ratio * n)` of them
/// for validation.
///
/// * `tensor` - observed entries
/// * `validation_ratio` - fraction in (0, 1)
/// * `seed` - the same seed gives the same split
///
pub fn split_train_validation(
    tensor: &SparseTensor3,
    validation_ratio: f64,
    seed: u64,
) -> Result<TrainValidationSplit, GntdError> {
    if !(validation_ratio > 0. && validation_ratio < 1.) {
        return Err(GntdError::InvalidConfig(format!(
            "validation ratio {} is not in (0, 1)",
            validation_ratio
        )));
    }

    let nnz = tensor.nnz();
    let n_valid = validation_size(validation_ratio, nnz);

    if nnz < 2 || n_valid >= nnz {
        return Err(GntdError::InsufficientData(format!(
            "{} observed entries cannot give non-empty training and validation sets (ratio {})",
            nnz, validation_ratio
        )));
    }

    let mut order: Vec<usize> = (0..nnz).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let collect = |positions: &[usize]| -> IndexedValues {
        let values = positions.iter().map(|&i| tensor.values()[i]).collect();
        let linear_index = positions
            .iter()
            .map(|&i| tensor.linear_index(&tensor.indices()[i]))
            .collect();
        IndexedValues {
            values,
            linear_index,
        }
    };

    let validation = collect(&order[..n_valid]);
    let training = collect(&order[n_valid..]);

    info!(
        "split {} observed entries: {} training, {} validation",
        nnz,
        training.len(),
        validation.len()
    );

    Ok(TrainValidationSplit {
        training,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_size_rounds_up() {
        assert_eq!(validation_size(0.1, 20), 2);
        assert_eq!(validation_size(0.7, 10), 7);
        assert_eq!(validation_size(0.25, 7), 2);
        assert_eq!(validation_size(0.01, 5), 1);
    }
}
