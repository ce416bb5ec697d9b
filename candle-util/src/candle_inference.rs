/// Epoch loop settings; the optimizer and the device are set up by the caller
pub struct TrainConfig {
    pub num_epochs: usize,
    pub verbose: bool,
    pub show_progress: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            num_epochs: 3000,
            verbose: true,
            show_progress: true,
        }
    }
}

/// Adam without weight decay
pub fn adam_params(learning_rate: f32) -> candle_nn::ParamsAdamW {
    candle_nn::ParamsAdamW {
        lr: learning_rate as f64,
        beta1: 0.9,
        beta2: 0.999,
        eps: 1e-8,
        weight_decay: 0.0,
    }
}
