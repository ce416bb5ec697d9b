use gntd::gntd_common::*;
use gntd::gntd_input::*;
use gntd::simulate::*;

use clap::Args;
use matrix_util::traits::IoOps;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[arg(long, short = 'g', default_value_t = 20, help = "Number of genes")]
    genes: usize,

    #[arg(long, short = 'x', default_value_t = 10, help = "Number of spots along x")]
    n_x: usize,

    #[arg(long, short = 'y', default_value_t = 10, help = "Number of spots along y")]
    n_y: usize,

    #[arg(long, short = 'k', default_value_t = 3, help = "Rank of the true tensor")]
    rank: usize,

    #[arg(
        long,
        default_value_t = 0.3,
        help = "Observed fraction",
        long_help = "Fraction of the cells kept as observations.\n\
		     The rest are missing and left for imputation."
    )]
    observed: f64,

    #[arg(long, default_value_t = 0.1, help = "Standard deviation of the noise")]
    noise: f32,

    #[arg(long, default_value_t = DEFAULT_SEED, help = "Random seed")]
    rseed: u64,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for the simulated files:\n\
		     - {out}.tensor.tsv.gz (observed `g x y value`)\n\
		     - {out}.truth.tsv.gz (every cell)\n\
		     - {out}.gene_adj.tsv.gz\n\
		     - {out}.spatial_adj.tsv.gz\n"
    )]
    out: Box<str>,

    #[arg(long, short, help = "Verbosity")]
    verbose: bool,
}

pub fn run_simulate(args: &SimulateArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let sim_args = SimArgs {
        n_g: args.genes,
        n_x: args.n_x,
        n_y: args.n_y,
        rank: args.rank,
        observed: args.observed,
        noise: args.noise,
        rseed: args.rseed,
    };

    let sim = generate_low_rank_tensor(&sim_args)?;

    let tensor_file = format!("{}.tensor.tsv.gz", args.out);
    write_expression_tensor(&sim.tensor, &tensor_file)?;

    let truth_file = format!("{}.truth.tsv.gz", args.out);
    write_imputed_tensor(&sim.truth, &truth_file)?;

    let gene_adj_file = format!("{}.gene_adj.tsv.gz", args.out);
    sim.gene_adj.to_tsv(&gene_adj_file)?;

    let spatial_adj_file = format!("{}.spatial_adj.tsv.gz", args.out);
    sim.spatial_adj.to_tsv(&spatial_adj_file)?;

    info!(
        "wrote {}, {}, {}, {}",
        tensor_file, truth_file, gene_adj_file, spatial_adj_file
    );
    Ok(())
}
