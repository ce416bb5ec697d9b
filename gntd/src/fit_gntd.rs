use gntd::gntd_common::*;
use gntd::gntd_input::*;
use gntd::imputer::*;

use anyhow::Context;
use clap::{Args, ValueEnum};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

#[derive(Args, Debug)]
pub struct ImputeArgs {
    #[arg(
        long,
        short = 't',
        required = true,
        help = "Sparse tensor file",
        long_help = "Observed entries of the expression tensor.\n\
		     One `g x y value` line per entry (tab, comma or space),\n\
		     0-based indexes, optionally gzipped."
    )]
    tensor: Box<str>,

    #[arg(
        long,
        required = true,
        help = "Gene adjacency file",
        long_help = "Gene-gene adjacency (n_g x n_g), e.g., a PPI network.\n\
		     A dense matrix, or an edge list with `--edge-list`."
    )]
    gene_adj: Box<str>,

    #[arg(
        long,
        required = true,
        help = "Spatial adjacency file",
        long_help = "Spot-spot adjacency (n_x*n_y x n_x*n_y).\n\
		     Spot (x, y) is the vertex `x * n_y + y`.\n\
		     A dense matrix, or an edge list with `--edge-list`."
    )]
    spatial_adj: Box<str>,

    #[arg(
        long,
        default_value_t = false,
        help = "Adjacency files are edge lists",
        long_help = "Read the adjacency files as `i j [w]` edge lists\n\
		     (0-based vertexes, weight 1 by default)."
    )]
    edge_list: bool,

    #[arg(
        long,
        value_delimiter(','),
        help = "Tensor shape `n_g,n_x,n_y`",
        long_help = "Tensor shape `n_g,n_x,n_y`.\n\
		     Inferred from the largest indexes if not given."
    )]
    shape: Option<Vec<usize>>,

    #[arg(long, short = 'k', default_value_t = 10, help = "Rank of the decomposition")]
    rank: usize,

    #[arg(
        long,
        short = 'l',
        default_value_t = 0.1,
        help = "Graph regularization weight",
        long_help = "Weight of the Cartesian product graph Laplacian penalty.\n\
		     Larger values give smoother imputation."
    )]
    lambda: f32,

    #[arg(long, default_value_t = DEFAULT_LEARNING_RATE, help = "Learning rate (Adam)")]
    learning_rate: f32,

    #[arg(long, short = 'i', default_value_t = DEFAULT_EPOCHS, help = "Number of epochs")]
    epochs: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_VALIDATION_RATIO,
        help = "Validation fraction",
        long_help = "Fraction of the observed entries held out to select\n\
		     the best epoch by validation MSE."
    )]
    validation_ratio: f64,

    #[arg(long, default_value_t = DEFAULT_SEED, help = "Random seed for the split")]
    seed: u64,

    #[arg(
        long,
        default_value_t = false,
        help = "Use symmetric normalized Laplacians",
        long_help = "Use `I - D^{-1/2} A D^{-1/2}` instead of `D - A`."
    )]
    normalized_laplacian: bool,

    #[arg(
        long,
        default_value = DEFAULT_CHECKPOINT_FILE,
        help = "Checkpoint file",
        long_help = "A `safetensors` file overwritten by the best parameters.\n\
		     Runs sharing the same file overwrite each other."
    )]
    checkpoint: Box<str>,

    #[arg(
        long,
        value_enum,
        default_value = "cpu",
        help = "Candle device",
        long_help = "Select the device for computation.\n\
		     Options: cpu, cuda, metal (needs the matching cargo feature)."
    )]
    device: ComputeDevice,

    #[arg(long, default_value_t = 0, help = "Device number for cuda or metal")]
    device_no: usize,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results:\n\
		     - {out}.imputed.tsv.gz\n\
		     - {out}.trace.tsv\n\
		     - {out}.{g,x,y}_factor.tsv.gz\n"
    )]
    out: Box<str>,

    #[arg(long, short, help = "Verbosity")]
    verbose: bool,
}

pub fn fit_gntd(args: &ImputeArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let shape = match args.shape.as_deref() {
        Some(&[n_g, n_x, n_y]) => Some([n_g, n_x, n_y]),
        Some(other) => anyhow::bail!("shape needs three numbers: {:?}", other),
        None => None,
    };

    // 1. Read the data
    let tensor = read_expression_tensor(&args.tensor, shape)?;
    let [n_g, n_x, n_y] = tensor.shape();

    let gene_adj = read_adjacency(&args.gene_adj, n_g, args.edge_list)?;
    let spatial_adj = read_adjacency(&args.spatial_adj, n_x * n_y, args.edge_list)?;

    let kind = if args.normalized_laplacian {
        LaplacianKind::SymmetricNormalized
    } else {
        LaplacianKind::Combinatorial
    };

    let mut gntd = Gntd::with_laplacian_kind(
        tensor,
        &gene_adj,
        &spatial_adj,
        args.rank,
        args.lambda,
        kind,
    )
    .context("setting up the imputation")?;

    // 2. Fit the model
    let dev = match args.device {
        ComputeDevice::Metal => candle_core::Device::new_metal(args.device_no)?,
        ComputeDevice::Cuda => candle_core::Device::new_cuda(args.device_no)?,
        _ => candle_core::Device::Cpu,
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            info!("Interrupt received; stopping after this epoch...");
            stop.store(true, Ordering::SeqCst);
        })?;
    }

    let config = ImputeConfig {
        learning_rate: args.learning_rate,
        num_epochs: args.epochs,
        verbose: args.verbose,
        show_progress: true,
        validation_ratio: args.validation_ratio,
        seed: args.seed,
        device: dev,
        checkpoint: CheckpointKind::File(std::path::PathBuf::from(&*args.checkpoint)),
        stop: Some(stop),
    };

    let imputed = gntd.impute_with(&config).context("imputation failed")?;

    // 3. Write down the results
    let report = gntd.report()?;
    match report.best_epoch {
        Some(best) => info!(
            "best epoch {} of {} (validation mse {})",
            best,
            report.num_epochs(),
            report.best_mse
        ),
        None => warn!("no epoch improved the validation mse"),
    }

    let imputed_file = format!("{}.imputed.tsv.gz", args.out);
    write_imputed_tensor(&imputed, &imputed_file)?;
    info!("wrote {}", imputed_file);

    let trace_file = format!("{}.trace.tsv", args.out);
    write_training_report(report, &trace_file)?;

    write_factor_matrices(gntd.factors()?, &args.out)?;

    info!("done");
    Ok(())
}
