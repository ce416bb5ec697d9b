mod fit_gntd;
mod run_simulate;

use fit_gntd::*;
use run_simulate::*;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "GNTD",
    long_about = "Graph-guided Neural Tensor Decomposition\n\
		  Impute a sparse gene x spatial-x x spatial-y expression tensor\n\
		  by a low-rank CP decomposition smoothed over a gene graph\n\
		  (e.g., protein-protein interactions) and a spatial graph."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Impute missing entries of a spatial expression tensor",
        long_about = "Fit a graph-regularized CP decomposition in three stages:\n\
		      (1) Hold out a random validation set of the observed entries\n\
		      (2) Optimize the factors by Adam, keeping the best validation MSE\n\
		      (3) Reconstruct every cell from the best factors.\n"
    )]
    Impute(ImputeArgs),

    #[command(
        about = "Simulate a small low-rank tensor with gene and spatial graphs",
        long_about = "Simulate a low-rank tensor with randomly missing cells,\n\
		      a chain graph over genes and a grid graph over spots.\n\
		      Handy for trying out `gntd impute`."
    )]
    Simulate(SimulateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Impute(args) => {
            fit_gntd(args)?;
        }
        Commands::Simulate(args) => {
            run_simulate(args)?;
        }
    }

    Ok(())
}
