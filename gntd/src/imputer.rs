use crate::gntd_common::*;
use crate::gntd_error::GntdError;
use crate::sparse_split::*;

use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, VarBuilder, VarMap};
use candle_util::candle_checkpoint::*;
use candle_util::candle_inference::{adam_params, TrainConfig};
use candle_util::candle_loss_functions::{gather_linear, graph_regularized_loss};
use candle_util::candle_model_selection::train_with_model_selection;
use candle_util::candle_model_traits::*;
use candle_util::candle_tensor_factor::TensorFactorModel;
use matrix_util::graph_laplacian::graph_laplacian;
use matrix_util::regression_stat::regression_metrics;
use matrix_util::traits::ConvertMatOps;
use ndarray::Array3;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Where the best parameters are kept during training
#[derive(Clone, Debug, Default)]
pub enum CheckpointKind {
    #[default]
    Memory,
    /// a `safetensors` file, overwritten on every improvement
    File(PathBuf),
}

pub struct ImputeConfig {
    pub learning_rate: f32,
    pub num_epochs: usize,
    pub verbose: bool,
    pub show_progress: bool,
    pub validation_ratio: f64,
    pub seed: u64,
    pub device: Device,
    pub checkpoint: CheckpointKind,
    /// checked after every epoch
    pub stop: Option<Arc<AtomicBool>>,
}

impl Default for ImputeConfig {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            num_epochs: DEFAULT_EPOCHS,
            verbose: true,
            show_progress: true,
            validation_ratio: DEFAULT_VALIDATION_RATIO,
            seed: DEFAULT_SEED,
            device: Device::Cpu,
            checkpoint: CheckpointKind::Memory,
            stop: None,
        }
    }
}

/// Per-epoch training loss and validation metrics
#[derive(Clone, Debug)]
pub struct TrainingReport {
    pub loss: Vec<f32>,
    pub validation: Vec<RegressionMetrics>,
    /// 1-based; `None` if no epoch was ever kept
    pub best_epoch: Option<usize>,
    pub best_mse: f32,
    pub interrupted: bool,
}

impl TrainingReport {
    pub fn num_epochs(&self) -> usize {
        self.loss.len()
    }

    /// Header line followed by one line per epoch
    pub fn to_lines(&self) -> Vec<Box<str>> {
        let mut hdr = vec!["epoch", "loss"];
        hdr.extend(RegressionMetrics::NAMES);

        let mut lines = vec![hdr.join("\t").into_boxed_str()];
        for (e, (loss, metrics)) in self.loss.iter().zip(self.validation.iter()).enumerate() {
            let mut words = vec![(e + 1).to_string(), loss.to_string()];
            words.extend(metrics.to_vec().iter().map(|x| x.to_string()));
            lines.push(words.join("\t").into_boxed_str());
        }
        lines
    }
}

/// Learned factor matrices (rows: axis positions, columns: rank)
#[derive(Clone, Debug)]
pub struct FactorMatrices {
    pub g: Mat,
    pub x: Mat,
    pub y: Mat,
}

/// Graph-guided neural tensor decomposition
///
/// Fits `T[g,x,y] = Σ_k G[g,k] X[x,k] Y[y,k]` to the observed entries
/// of a sparse expression tensor, with a smoothness penalty over the
/// Cartesian product of a gene graph and a spatial graph.
pub struct Gntd {
    tensor: SparseTensor3,
    lap_g: Mat,
    lap_xy: Mat,
    rank: usize,
    lambda: f32,
    imputed: Option<Array3<f32>>,
    factors: Option<FactorMatrices>,
    report: Option<TrainingReport>,
}

impl Gntd {
    /// * `tensor` - observed entries (n_g x n_x x n_y)
    /// * `gene_adj` - gene graph adjacency (n_g x n_g)
    /// * `spatial_adj` - spatial adjacency over `x * n_y + y` (n_x*n_y x n_x*n_y)
    /// * `rank` - number of factors
    /// * `lambda` - weight of the graph penalty
    pub fn new(
        tensor: SparseTensor3,
        gene_adj: &Mat,
        spatial_adj: &Mat,
        rank: usize,
        lambda: f32,
    ) -> Result<Self, GntdError> {
        Self::with_laplacian_kind(
            tensor,
            gene_adj,
            spatial_adj,
            rank,
            lambda,
            LaplacianKind::Combinatorial,
        )
    }

    pub fn with_laplacian_kind(
        tensor: SparseTensor3,
        gene_adj: &Mat,
        spatial_adj: &Mat,
        rank: usize,
        lambda: f32,
        kind: LaplacianKind,
    ) -> Result<Self, GntdError> {
        let [n_g, n_x, n_y] = tensor.shape();

        if gene_adj.nrows() != n_g || gene_adj.ncols() != n_g {
            return Err(GntdError::InputShape(format!(
                "gene adjacency is {} x {}, but the tensor has {} genes",
                gene_adj.nrows(),
                gene_adj.ncols(),
                n_g
            )));
        }

        let n_xy = n_x * n_y;
        if spatial_adj.nrows() != n_xy || spatial_adj.ncols() != n_xy {
            return Err(GntdError::InputShape(format!(
                "spatial adjacency is {} x {}, but the tensor has {} x {} = {} spots",
                spatial_adj.nrows(),
                spatial_adj.ncols(),
                n_x,
                n_y,
                n_xy
            )));
        }

        if tensor.numel() > u32::MAX as usize {
            return Err(GntdError::InputShape(format!(
                "{:?} has too many cells to index",
                tensor.shape()
            )));
        }

        if rank < 1 {
            return Err(GntdError::InvalidConfig("rank must be at least 1".into()));
        }

        if !lambda.is_finite() || lambda < 0. {
            return Err(GntdError::InvalidConfig(format!(
                "regularization weight {} must be finite and non-negative",
                lambda
            )));
        }

        let lap_g =
            graph_laplacian(gene_adj, kind).map_err(|e| GntdError::InputShape(e.to_string()))?;
        let lap_xy = graph_laplacian(spatial_adj, kind)
            .map_err(|e| GntdError::InputShape(e.to_string()))?;

        Ok(Self {
            tensor,
            lap_g,
            lap_xy,
            rank,
            lambda,
            imputed: None,
            factors: None,
            report: None,
        })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.tensor.shape()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn gene_laplacian(&self) -> &Mat {
        &self.lap_g
    }

    pub fn spatial_laplacian(&self) -> &Mat {
        &self.lap_xy
    }

    /// Impute with the default split, device and in-memory checkpoint
    pub fn impute(
        &mut self,
        learning_rate: f32,
        num_epochs: usize,
        verbose: bool,
    ) -> Result<Array3<f32>, GntdError> {
        let config = ImputeConfig {
            learning_rate,
            num_epochs,
            verbose,
            ..Default::default()
        };
        self.impute_with(&config)
    }

    /// Train the factor model, keep the parameters with the lowest
    /// validation MSE, and reconstruct the full tensor from them.
    pub fn impute_with(&mut self, config: &ImputeConfig) -> Result<Array3<f32>, GntdError> {
        if !(config.learning_rate.is_finite() && config.learning_rate > 0.) {
            return Err(GntdError::InvalidConfig(format!(
                "learning rate {} must be positive",
                config.learning_rate
            )));
        }

        if config.num_epochs == 0 {
            return Err(GntdError::InvalidConfig(
                "number of epochs must be positive".into(),
            ));
        }

        let split = split_train_validation(&self.tensor, config.validation_ratio, config.seed)?;

        let [n_g, n_x, n_y] = self.tensor.shape();
        let dev = &config.device;

        let lap_g = self.lap_g.to_tensor(dev)?;
        let lap_xy = self.lap_xy.to_tensor(dev)?;
        let (train_values, train_index) = split.training.to_tensors(dev)?;
        let (_, valid_index) = split.validation.to_tensors(dev)?;

        let x_index = Tensor::arange(0u32, n_x as u32, dev)?;
        let y_index = Tensor::arange(0u32, n_y as u32, dev)?;
        let g_index = Tensor::arange(0u32, n_g as u32, dev)?;

        let parameters = VarMap::new();
        let param_builder = VarBuilder::from_varmap(&parameters, DType::F32, dev);
        let model = TensorFactorModel::new(n_x, n_y, n_g, self.rank, param_builder)?;

        let mut adam = AdamW::new(parameters.all_vars(), adam_params(config.learning_rate))?;

        let mut store: Box<dyn CheckpointStore> = match &config.checkpoint {
            CheckpointKind::Memory => Box::new(InMemoryCheckpoint::new()),
            CheckpointKind::File(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir)?;
                }
                info!("checkpoints go to {}", path.display());
                Box::new(FileCheckpoint::new(path))
            }
        };

        let train_config = TrainConfig {
            num_epochs: config.num_epochs,
            verbose: config.verbose,
            show_progress: config.show_progress,
        };

        info!(
            "fitting rank {} on {} x {} x {} with {} training entries for {} epochs",
            model.rank(),
            model.dim_g(),
            model.dim_x(),
            model.dim_y(),
            split.training.len(),
            config.num_epochs
        );

        let lambda = self.lambda as f64;

        let trace = train_with_model_selection(
            &parameters,
            store.as_mut(),
            &train_config,
            config.stop.as_deref(),
            |_epoch| {
                let out = model.forward_t(&x_index, &y_index, &g_index, true)?;
                let loss =
                    graph_regularized_loss(&train_values, &train_index, &out, &lap_g, &lap_xy, lambda)?;
                let loss_value = loss.to_scalar::<f32>()?;
                adam.backward_step(&loss)?;
                Ok(loss_value)
            },
            |_epoch| {
                let out = model.forward_t(&x_index, &y_index, &g_index, false)?;
                let pred = gather_linear(&out.recon_gxy, &valid_index)?
                    .to_device(&Device::Cpu)?
                    .to_vec1::<f32>()?;
                regression_metrics(&split.validation.values, &pred)
            },
        )?;

        if trace.interrupted {
            warn!(
                "interrupted after {} epochs; using the best epoch so far",
                trace.num_epochs()
            );
        }

        // parameters now hold the best checkpoint
        let out = model.forward_t(&x_index, &y_index, &g_index, false)?;
        let recon = out
            .recon_gxy
            .to_device(&Device::Cpu)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        let imputed =
            Array3::from_shape_vec((n_g, n_x, n_y), recon).map_err(anyhow::Error::from)?;

        self.factors = Some(FactorMatrices {
            g: Mat::from_tensor(&out.g_gk)?,
            x: Mat::from_tensor(&out.x_xk)?,
            y: Mat::from_tensor(&out.y_yk)?,
        });

        self.report = Some(TrainingReport {
            loss: trace.loss,
            validation: trace.scores,
            best_epoch: trace.best_epoch,
            best_mse: trace.best_score,
            interrupted: trace.interrupted,
        });

        self.imputed = Some(imputed.clone());
        Ok(imputed)
    }

    /// Imputed dense tensor (n_g x n_x x n_y)
    pub fn to_array(&self) -> Result<Array3<f32>, GntdError> {
        self.imputed.clone().ok_or(GntdError::UnavailableResult)
    }

    pub fn factors(&self) -> Result<&FactorMatrices, GntdError> {
        self.factors.as_ref().ok_or(GntdError::UnavailableResult)
    }

    pub fn report(&self) -> Result<&TrainingReport, GntdError> {
        self.report.as_ref().ok_or(GntdError::UnavailableResult)
    }
}
