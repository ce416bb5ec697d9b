pub mod candle_checkpoint;
pub mod candle_inference;
pub mod candle_loss_functions;
pub mod candle_model_selection;
pub mod candle_model_traits;
pub mod candle_tensor_factor;

pub use candle_core;
pub use candle_nn;
