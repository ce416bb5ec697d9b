use crate::candle_checkpoint::CheckpointStore;
use crate::candle_inference::TrainConfig;

use candle_nn::VarMap;
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};

/// A validation result that can rank model states (lower is better)
pub trait ValidationScoreT {
    fn selection_score(&self) -> f32;
}

impl ValidationScoreT for f32 {
    fn selection_score(&self) -> f32 {
        *self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("non-finite objective at epoch {epoch} (loss = {last_loss}, validation = {last_score})")]
    Divergence {
        epoch: usize,
        last_loss: f32,
        last_score: f32,
    },

    #[error("checkpoint failed at epoch {epoch}: {cause}")]
    Checkpoint { epoch: usize, cause: anyhow::Error },

    #[error("failed at epoch {epoch} (loss = {last_loss}, validation = {last_score}): {cause}")]
    Step {
        epoch: usize,
        last_loss: f32,
        last_score: f32,
        cause: anyhow::Error,
    },
}

/// Per-epoch record of a training run; epochs are counted from 1
pub struct SelectionTrace<V> {
    pub loss: Vec<f32>,
    pub scores: Vec<V>,
    pub best_epoch: Option<usize>,
    pub best_score: f32,
    pub interrupted: bool,
}

impl<V> SelectionTrace<V> {
    pub fn num_epochs(&self) -> usize {
        self.loss.len()
    }
}

/// Train for a fixed number of epochs, keep the parameters of the
/// epoch with the strictly lowest validation score in `store`, and
/// restore them at the end.
///
/// * `parameters` - all the variables updated by `train_step`
/// * `store` - checkpoint slot
/// * `config` - number of epochs, verbosity
/// * `stop` - checked after each epoch; when set, training ends early
/// * `train_step` - one optimization step; returns the training loss
/// * `validate` - evaluate the current parameters without updating them
///
pub fn train_with_model_selection<V, TrainFn, ValidFn, Store>(
    parameters: &VarMap,
    store: &mut Store,
    config: &TrainConfig,
    stop: Option<&AtomicBool>,
    mut train_step: TrainFn,
    mut validate: ValidFn,
) -> Result<SelectionTrace<V>, SelectionError>
where
    V: ValidationScoreT,
    TrainFn: FnMut(usize) -> anyhow::Result<f32>,
    ValidFn: FnMut(usize) -> anyhow::Result<V>,
    Store: CheckpointStore + ?Sized,
{
    let pb = ProgressBar::new(config.num_epochs as u64);

    if !config.show_progress || config.verbose {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut trace = SelectionTrace {
        loss: Vec::with_capacity(config.num_epochs),
        scores: Vec::with_capacity(config.num_epochs),
        best_epoch: None,
        best_score: f32::INFINITY,
        interrupted: false,
    };

    let mut last_loss = f32::NAN;
    let mut last_score = f32::NAN;

    for epoch in 1..=config.num_epochs {
        let loss = train_step(epoch).map_err(|cause| SelectionError::Step {
            epoch,
            last_loss,
            last_score,
            cause,
        })?;
        last_loss = loss;

        if !loss.is_finite() {
            return Err(SelectionError::Divergence {
                epoch,
                last_loss,
                last_score,
            });
        }

        let score = validate(epoch).map_err(|cause| SelectionError::Step {
            epoch,
            last_loss,
            last_score,
            cause,
        })?;
        last_score = score.selection_score();

        if !last_score.is_finite() {
            return Err(SelectionError::Divergence {
                epoch,
                last_loss,
                last_score,
            });
        }

        if last_score < trace.best_score {
            retry_once("checkpoint save", || store.save(parameters))
                .map_err(|cause| SelectionError::Checkpoint { epoch, cause })?;
            trace.best_score = last_score;
            trace.best_epoch = Some(epoch);
        }

        trace.loss.push(loss);
        trace.scores.push(score);
        pb.inc(1);

        if config.verbose {
            info!(
                "[{}] loss: {}, validation: {}, best: {}",
                epoch, loss, last_score, trace.best_score
            );
        }

        if stop.is_some_and(|s| s.load(Ordering::SeqCst)) {
            info!("Stopping early at epoch {}/{}", epoch, config.num_epochs);
            trace.interrupted = true;
            break;
        }
    }

    pb.finish_and_clear();

    match trace.best_epoch {
        Some(best) if store.has_snapshot() => {
            let epoch = trace.num_epochs();
            retry_once("checkpoint load", || store.load(parameters))
                .map_err(|cause| SelectionError::Checkpoint { epoch, cause })?;
            info!(
                "Restored the parameters of epoch {} (validation: {})",
                best, trace.best_score
            );
        }
        _ => {
            warn!("No checkpoint was taken; keeping the last parameters");
        }
    }

    Ok(trace)
}

fn retry_once<F>(what: &str, mut job: F) -> anyhow::Result<()>
where
    F: FnMut() -> anyhow::Result<()>,
{
    match job() {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!("{} failed: {}; trying once more", what, err);
            job()
        }
    }
}
