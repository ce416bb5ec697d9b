use approx::assert_abs_diff_eq;
use gntd::gntd_common::*;
use gntd::gntd_error::GntdError;
use gntd::imputer::*;
use gntd::simulate::{chain_adjacency, grid_adjacency};
use gntd::sparse_split::split_train_validation;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 3 x 4 x 4 tensor with 20 observed entries
fn small_tensor() -> anyhow::Result<SparseTensor3> {
    // 7 is coprime with 48, so the positions are distinct
    let entries = (0..20)
        .map(|i| {
            let pos = (i * 7) % 48;
            (pos / 16, (pos / 4) % 4, pos % 4, 1. + (i % 5) as f32 * 0.5)
        })
        .collect();
    SparseTensor3::from_entries([3, 4, 4], entries)
}

fn small_gntd() -> anyhow::Result<Gntd> {
    Ok(Gntd::new(
        small_tensor()?,
        &chain_adjacency(3),
        &grid_adjacency(4, 4),
        2,
        0.1,
    )?)
}

fn quiet_config(num_epochs: usize) -> ImputeConfig {
    ImputeConfig {
        num_epochs,
        verbose: false,
        show_progress: false,
        ..Default::default()
    }
}

#[test]
fn end_to_end_imputation() -> anyhow::Result<()> {
    let mut gntd = small_gntd()?;
    let config = quiet_config(50);
    let imputed = gntd.impute_with(&config)?;

    assert_eq!(imputed.shape(), &[3, 4, 4]);
    assert!(imputed.iter().all(|v| v.is_finite()));

    let report = gntd.report()?;
    assert_eq!(report.num_epochs(), 50);
    assert_eq!(report.validation.len(), 50);
    assert!(!report.interrupted);
    let best = report.best_epoch.ok_or(anyhow::anyhow!("no best epoch"))?;
    assert!((1..=50).contains(&best));
    assert_eq!(report.best_mse, report.validation[best - 1].mse);
    assert!(report.validation.iter().all(|m| m.mse >= report.best_mse));

    // recompute the validation error from the final tensor
    let split = split_train_validation(&small_tensor()?, config.validation_ratio, config.seed)?;
    assert_eq!(split.validation.len(), 2);

    let tensor = small_tensor()?;
    let sse: f64 = split
        .validation
        .linear_index
        .iter()
        .zip(split.validation.values.iter())
        .map(|(&pos, &v)| {
            let [g, x, y] = tensor.unravel_index(pos);
            (v as f64 - imputed[[g, x, y]] as f64).powi(2)
        })
        .sum();
    let mse = (sse / split.validation.len() as f64) as f32;
    assert_abs_diff_eq!(mse, report.best_mse, epsilon = 1e-5 * report.best_mse.max(1.));

    let factors = gntd.factors()?;
    assert_eq!((factors.g.nrows(), factors.g.ncols()), (3, 2));
    assert_eq!((factors.x.nrows(), factors.x.ncols()), (4, 2));
    assert_eq!((factors.y.nrows(), factors.y.ncols()), (4, 2));

    // T[g,x,y] = sum_k G[g,k] X[x,k] Y[y,k]
    let cp = (0..2)
        .map(|k| factors.g[(2, k)] * factors.x[(1, k)] * factors.y[(3, k)])
        .sum::<f32>();
    assert_abs_diff_eq!(cp, imputed[[2, 1, 3]], epsilon = 1e-4 * cp.abs().max(1.));
    Ok(())
}

#[test]
fn to_array_is_idempotent() -> anyhow::Result<()> {
    let mut gntd = small_gntd()?;
    let imputed = gntd.impute(0.05, 5, false)?;
    let first = gntd.to_array()?;
    let second = gntd.to_array()?;
    assert_eq!(first, second);
    assert_eq!(first, imputed);
    Ok(())
}

#[test]
fn result_is_unavailable_before_impute() -> anyhow::Result<()> {
    let gntd = small_gntd()?;
    assert!(matches!(gntd.to_array(), Err(GntdError::UnavailableResult)));
    assert!(matches!(gntd.factors(), Err(GntdError::UnavailableResult)));
    assert!(matches!(gntd.report(), Err(GntdError::UnavailableResult)));
    Ok(())
}

#[test]
fn mismatched_adjacency_is_an_input_shape_error() -> anyhow::Result<()> {
    let gene = Gntd::new(small_tensor()?, &chain_adjacency(4), &grid_adjacency(4, 4), 2, 0.1);
    assert!(matches!(gene, Err(GntdError::InputShape(_))));

    let spatial = Gntd::new(small_tensor()?, &chain_adjacency(3), &grid_adjacency(4, 3), 2, 0.1);
    assert!(matches!(spatial, Err(GntdError::InputShape(_))));

    let mut asymmetric = chain_adjacency(3);
    asymmetric[(0, 2)] = 1.;
    let asym = Gntd::new(small_tensor()?, &asymmetric, &grid_adjacency(4, 4), 2, 0.1);
    assert!(matches!(asym, Err(GntdError::InputShape(_))));

    let rank0 = Gntd::new(small_tensor()?, &chain_adjacency(3), &grid_adjacency(4, 4), 0, 0.1);
    assert!(matches!(rank0, Err(GntdError::InvalidConfig(_))));
    Ok(())
}

#[test]
fn too_few_entries_is_insufficient_data() -> anyhow::Result<()> {
    let tensor = SparseTensor3::from_entries([3, 4, 4], vec![(0, 1, 2, 1.0)])?;
    let mut gntd = Gntd::new(tensor, &chain_adjacency(3), &grid_adjacency(4, 4), 2, 0.1)?;
    assert!(matches!(
        gntd.impute_with(&quiet_config(5)),
        Err(GntdError::InsufficientData(_))
    ));
    assert!(matches!(gntd.to_array(), Err(GntdError::UnavailableResult)));
    Ok(())
}

#[test]
fn invalid_training_configuration() -> anyhow::Result<()> {
    let mut gntd = small_gntd()?;
    let config = ImputeConfig {
        learning_rate: 0.,
        ..quiet_config(5)
    };
    assert!(matches!(gntd.impute_with(&config), Err(GntdError::InvalidConfig(_))));
    assert!(matches!(gntd.impute_with(&quiet_config(0)), Err(GntdError::InvalidConfig(_))));
    Ok(())
}

#[test]
fn huge_learning_rate_diverges() -> anyhow::Result<()> {
    let mut gntd = small_gntd()?;
    let config = ImputeConfig {
        learning_rate: 1e12,
        ..quiet_config(20)
    };
    match gntd.impute_with(&config) {
        Err(GntdError::NumericDivergence { epoch, .. }) => assert!(epoch <= 20),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected divergence"),
    }
    assert!(matches!(gntd.to_array(), Err(GntdError::UnavailableResult)));
    Ok(())
}

#[test]
fn file_checkpoint_restores_the_best_epoch() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("best.safetensors");

    let mut gntd = small_gntd()?;
    let config = ImputeConfig {
        checkpoint: CheckpointKind::File(path.clone()),
        ..quiet_config(30)
    };
    let imputed = gntd.impute_with(&config)?;
    assert!(path.exists());

    let report = gntd.report()?;
    let split = split_train_validation(&small_tensor()?, config.validation_ratio, config.seed)?;
    let tensor = small_tensor()?;
    let mse = split
        .validation
        .linear_index
        .iter()
        .zip(split.validation.values.iter())
        .map(|(&pos, &v)| {
            let [g, x, y] = tensor.unravel_index(pos);
            (v - imputed[[g, x, y]]).powi(2)
        })
        .sum::<f32>()
        / split.validation.len() as f32;
    assert_abs_diff_eq!(mse, report.best_mse, epsilon = 1e-4 * report.best_mse.max(1.));
    Ok(())
}

#[test]
fn stop_flag_ends_training_early() -> anyhow::Result<()> {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    let mut gntd = small_gntd()?;
    let config = ImputeConfig {
        stop: Some(Arc::new(AtomicBool::new(true))),
        ..quiet_config(100)
    };
    let imputed = gntd.impute_with(&config)?;
    let report = gntd.report()?;
    assert!(report.interrupted);
    assert_eq!(report.num_epochs(), 1);
    assert_eq!(report.best_epoch, Some(1));
    assert!(imputed.iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn laplacians_are_built_at_construction() -> anyhow::Result<()> {
    let gntd = small_gntd()?;
    assert_eq!(gntd.shape(), [3, 4, 4]);
    assert_eq!(gntd.rank(), 2);

    let lap_g = gntd.gene_laplacian();
    let lap_xy = gntd.spatial_laplacian();
    assert_eq!((lap_g.nrows(), lap_g.ncols()), (3, 3));
    assert_eq!((lap_xy.nrows(), lap_xy.ncols()), (16, 16));

    // combinatorial: rows sum to zero, degrees on the diagonal
    for lap in [lap_g, lap_xy] {
        for i in 0..lap.nrows() {
            assert_abs_diff_eq!(lap.row(i).sum(), 0., epsilon = 1e-6);
        }
    }
    assert_abs_diff_eq!(lap_g[(1, 1)], 2.);
    assert_abs_diff_eq!(lap_xy[(5, 5)], 4.);
    Ok(())
}

#[test]
fn checkpoint_directory_is_created() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("run").join("best.safetensors");

    let mut gntd = small_gntd()?;
    let config = ImputeConfig {
        checkpoint: CheckpointKind::File(path.clone()),
        ..quiet_config(5)
    };
    gntd.impute_with(&config)?;
    assert!(path.exists());

    // a regular file where the directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"")?;
    let config = ImputeConfig {
        checkpoint: CheckpointKind::File(blocker.join("best.safetensors")),
        ..quiet_config(5)
    };
    let mut gntd = small_gntd()?;
    assert!(matches!(gntd.impute_with(&config), Err(GntdError::Io(_))));
    Ok(())
}

/// symmetric, zero diagonal, weights in (0, 1) on about half the pairs
fn random_adjacency(n: usize, rng: &mut StdRng) -> Mat {
    let mut adj = Mat::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let w: f32 = rng.random();
            if w > 0.5 {
                adj[(i, j)] = w;
                adj[(j, i)] = w;
            }
        }
    }
    adj
}

#[test]
fn random_weighted_graphs() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(42);
    let gene_adj = random_adjacency(3, &mut rng);
    let spatial_adj = random_adjacency(16, &mut rng);
    assert_eq!(gene_adj, gene_adj.transpose());

    let mut gntd = Gntd::new(small_tensor()?, &gene_adj, &spatial_adj, 2, 0.1)?;
    let config = quiet_config(50);
    let imputed = gntd.impute_with(&config)?;
    assert_eq!(imputed.shape(), &[3, 4, 4]);
    assert!(imputed.iter().all(|v| v.is_finite()));

    let report = gntd.report()?;
    assert!(report.best_mse.is_finite());

    let split = split_train_validation(&small_tensor()?, config.validation_ratio, config.seed)?;
    let tensor = small_tensor()?;
    let sse: f64 = split
        .validation
        .linear_index
        .iter()
        .zip(split.validation.values.iter())
        .map(|(&pos, &v)| {
            let [g, x, y] = tensor.unravel_index(pos);
            (v as f64 - imputed[[g, x, y]] as f64).powi(2)
        })
        .sum();
    let mse = (sse / split.validation.len() as f64) as f32;
    assert_abs_diff_eq!(mse, report.best_mse, epsilon = 1e-5 * report.best_mse.max(1.));
    Ok(())
}
