use candle_util::candle_model_selection::SelectionError;

/// Failures of graph-guided tensor imputation
#[derive(Debug, thiserror::Error)]
pub enum GntdError {
    #[error("invalid input shape: {0}")]
    InputShape(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("no imputed tensor yet; run `impute` first")]
    UnavailableResult,

    #[error(
        "diverged at epoch {epoch} (loss = {last_loss}, validation mse = {last_val_mse})"
    )]
    NumericDivergence {
        epoch: usize,
        last_loss: f32,
        last_val_mse: f32,
    },

    #[error("checkpoint failed at epoch {epoch}: {cause}")]
    Checkpoint { epoch: usize, cause: anyhow::Error },

    #[error(
        "training failed at epoch {epoch} (loss = {last_loss}, validation mse = {last_val_mse}): {cause}"
    )]
    Training {
        epoch: usize,
        last_loss: f32,
        last_val_mse: f32,
        cause: anyhow::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Candle(#[from] candle_util::candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<SelectionError> for GntdError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::Divergence {
                epoch,
                last_loss,
                last_score,
            } => GntdError::NumericDivergence {
                epoch,
                last_loss,
                last_val_mse: last_score,
            },
            SelectionError::Checkpoint { epoch, cause } => GntdError::Checkpoint { epoch, cause },
            SelectionError::Step {
                epoch,
                last_loss,
                last_score,
                cause,
            } => GntdError::Training {
                epoch,
                last_loss,
                last_val_mse: last_score,
                cause,
            },
        }
    }
}
