pub mod common_io;
pub mod dmatrix_io;
pub mod graph_laplacian;
pub mod regression_stat;
pub mod sparse_tensor;
pub mod tensor_util;
pub mod traits;
