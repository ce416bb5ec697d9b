pub use log::{info, warn};

pub const DEFAULT_LEARNING_RATE: f32 = 0.05;
pub const DEFAULT_EPOCHS: usize = 3000;
pub const DEFAULT_VALIDATION_RATIO: f64 = 0.1;
pub const DEFAULT_SEED: u64 = 1234567;
pub const DEFAULT_CHECKPOINT_FILE: &str = "./best_checkpoint.safetensors";

pub type Mat = nalgebra::DMatrix<f32>;

pub use candle_util::{candle_core, candle_nn};
pub use matrix_util::graph_laplacian::LaplacianKind;
pub use matrix_util::regression_stat::RegressionMetrics;
pub use matrix_util::sparse_tensor::SparseTensor3;
