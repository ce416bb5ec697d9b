use candle_util::candle_checkpoint::*;
use candle_util::candle_inference::TrainConfig;
use candle_util::candle_model_selection::*;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use std::sync::atomic::AtomicBool;

fn quiet_config(num_epochs: usize) -> TrainConfig {
    TrainConfig {
        num_epochs,
        verbose: false,
        show_progress: false,
        ..Default::default()
    }
}

fn single_variable(varmap: &VarMap) -> anyhow::Result<Var> {
    let vb = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
    let _w = vb.get_with_hints(2, "w", candle_nn::Init::Const(0.0))?;
    Ok(varmap.all_vars().remove(0))
}

/// parameters at epoch `e` are [e, 10 e]
fn set_epoch_value(var: &Var, epoch: usize) -> anyhow::Result<()> {
    let e = epoch as f32;
    var.set(&Tensor::new(&[e, 10. * e], &Device::Cpu)?)?;
    Ok(())
}

#[test]
fn decreasing_scores_keep_the_last_epoch() -> anyhow::Result<()> {
    let varmap = VarMap::new();
    let var = single_variable(&varmap)?;
    let scores = [5f32, 4., 3., 2., 1.];

    let mut store = InMemoryCheckpoint::new();
    let trace = train_with_model_selection(
        &varmap,
        &mut store,
        &quiet_config(scores.len()),
        None,
        |epoch| {
            set_epoch_value(&var, epoch)?;
            Ok(1.0)
        },
        |epoch| Ok(scores[epoch - 1]),
    )?;

    assert_eq!(trace.best_epoch, Some(5));
    assert_eq!(trace.best_score, 1.0);
    assert_eq!(trace.num_epochs(), 5);
    assert_eq!(var.to_vec1::<f32>()?, vec![5., 50.]);
    Ok(())
}

#[test]
fn ties_do_not_overwrite_the_checkpoint() -> anyhow::Result<()> {
    let varmap = VarMap::new();
    let var = single_variable(&varmap)?;
    let scores = [3f32, 1., 1., 2., 5.];

    let mut store = InMemoryCheckpoint::new();
    let trace = train_with_model_selection(
        &varmap,
        &mut store,
        &quiet_config(scores.len()),
        None,
        |epoch| {
            set_epoch_value(&var, epoch)?;
            Ok(1.0)
        },
        |epoch| Ok(scores[epoch - 1]),
    )?;

    assert_eq!(trace.best_epoch, Some(2));
    assert_eq!(var.to_vec1::<f32>()?, vec![2., 20.]);
    Ok(())
}

#[test]
fn file_store_restores_the_best_epoch() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let varmap = VarMap::new();
    let var = single_variable(&varmap)?;
    let scores = [4f32, 2., 3., 6.];

    let mut store = FileCheckpoint::new(dir.path().join("best_checkpoint.safetensors"));
    let trace = train_with_model_selection(
        &varmap,
        &mut store,
        &quiet_config(scores.len()),
        None,
        |epoch| {
            set_epoch_value(&var, epoch)?;
            Ok(0.5)
        },
        |epoch| Ok(scores[epoch - 1]),
    )?;

    assert_eq!(trace.best_epoch, Some(2));
    assert_eq!(var.to_vec1::<f32>()?, vec![2., 20.]);
    Ok(())
}

#[test]
fn non_finite_validation_is_divergence() -> anyhow::Result<()> {
    let varmap = VarMap::new();
    let _var = single_variable(&varmap)?;
    let scores = [2f32, f32::NAN, 1.];

    let mut store = InMemoryCheckpoint::new();
    let result = train_with_model_selection(
        &varmap,
        &mut store,
        &quiet_config(scores.len()),
        None,
        |_| Ok(1.0),
        |epoch| Ok(scores[epoch - 1]),
    );

    match result {
        Err(SelectionError::Divergence { epoch, .. }) => assert_eq!(epoch, 2),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("divergence went unnoticed"),
    }
    Ok(())
}

#[test]
fn non_finite_loss_is_divergence() -> anyhow::Result<()> {
    let varmap = VarMap::new();
    let _var = single_variable(&varmap)?;

    let mut store = InMemoryCheckpoint::new();
    let result = train_with_model_selection(
        &varmap,
        &mut store,
        &quiet_config(3),
        None,
        |_| Ok(f32::INFINITY),
        |_| Ok(1f32),
    );

    assert!(matches!(
        result,
        Err(SelectionError::Divergence { epoch: 1, .. })
    ));
    Ok(())
}

#[test]
fn stop_flag_ends_training_after_current_epoch() -> anyhow::Result<()> {
    let varmap = VarMap::new();
    let var = single_variable(&varmap)?;
    let stop = AtomicBool::new(true);

    let mut store = InMemoryCheckpoint::new();
    let trace = train_with_model_selection(
        &varmap,
        &mut store,
        &quiet_config(100),
        Some(&stop),
        |epoch| {
            set_epoch_value(&var, epoch)?;
            Ok(1.0)
        },
        |_| Ok(1f32),
    )?;

    assert!(trace.interrupted);
    assert_eq!(trace.num_epochs(), 1);
    assert_eq!(var.to_vec1::<f32>()?, vec![1., 10.]);
    Ok(())
}

/// fails the first `failures` saves
struct FlakyStore {
    failures: usize,
    inner: InMemoryCheckpoint,
}

impl CheckpointStore for FlakyStore {
    fn save(&mut self, parameters: &VarMap) -> anyhow::Result<()> {
        if self.failures > 0 {
            self.failures -= 1;
            anyhow::bail!("disk full");
        }
        self.inner.save(parameters)
    }

    fn load(&self, parameters: &VarMap) -> anyhow::Result<()> {
        self.inner.load(parameters)
    }

    fn has_snapshot(&self) -> bool {
        self.inner.has_snapshot()
    }
}

#[test]
fn checkpoint_save_is_retried_once() -> anyhow::Result<()> {
    let varmap = VarMap::new();
    let var = single_variable(&varmap)?;

    let mut store = FlakyStore {
        failures: 1,
        inner: InMemoryCheckpoint::new(),
    };
    let trace = train_with_model_selection(
        &varmap,
        &mut store,
        &quiet_config(2),
        None,
        |epoch| {
            set_epoch_value(&var, epoch)?;
            Ok(1.0)
        },
        |epoch| Ok(10. - epoch as f32),
    )?;
    assert_eq!(trace.best_epoch, Some(2));
    assert_eq!(var.to_vec1::<f32>()?, vec![2., 20.]);

    let mut broken = FlakyStore {
        failures: 2,
        inner: InMemoryCheckpoint::new(),
    };
    let result = train_with_model_selection(
        &varmap,
        &mut broken,
        &quiet_config(2),
        None,
        |_| Ok(1.0),
        |_| Ok(1f32),
    );
    assert!(matches!(
        result,
        Err(SelectionError::Checkpoint { epoch: 1, .. })
    ));
    Ok(())
}
