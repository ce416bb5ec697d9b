use crate::gntd_common::*;

use ndarray::Array3;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma, Normal, Uniform};

pub struct SimArgs {
    pub n_g: usize,
    pub n_x: usize,
    pub n_y: usize,
    pub rank: usize,
    /// fraction of the cells kept as observations
    pub observed: f64,
    /// standard deviation of the Gaussian noise added to the observations
    pub noise: f32,
    pub rseed: u64,
}

pub struct SimOut {
    pub tensor: SparseTensor3,
    pub truth: Array3<f32>,
    pub gene_adj: Mat,
    pub spatial_adj: Mat,
}

/// Adjacency of a path graph `0 - 1 - ... - (n-1)`
pub fn chain_adjacency(n: usize) -> Mat {
    let mut adj = Mat::zeros(n, n);
    for i in 1..n {
        adj[(i - 1, i)] = 1.;
        adj[(i, i - 1)] = 1.;
    }
    adj
}

/// Four-neighbour adjacency of an `n_x x n_y` grid; spot `(x, y)` is
/// vertex `x * n_y + y`
pub fn grid_adjacency(n_x: usize, n_y: usize) -> Mat {
    let n = n_x * n_y;
    let mut adj = Mat::zeros(n, n);
    for x in 0..n_x {
        for y in 0..n_y {
            let i = x * n_y + y;
            if x + 1 < n_x {
                let j = (x + 1) * n_y + y;
                adj[(i, j)] = 1.;
                adj[(j, i)] = 1.;
            }
            if y + 1 < n_y {
                let j = i + 1;
                adj[(i, j)] = 1.;
                adj[(j, i)] = 1.;
            }
        }
    }
    adj
}

/// Generate a low-rank tensor with a random subset of observed cells
///
/// ```text
/// T(g,x,y) = sum_k G(g,k) X(x,k) Y(y,k),   G, X, Y ~ Gamma(2, 1/2)
/// observed T(g,x,y) + N(0, noise^2), truncated at 0
/// ```
///
/// The gene graph is a chain and the spatial graph is a grid.
pub fn generate_low_rank_tensor(args: &SimArgs) -> anyhow::Result<SimOut> {
    let (n_g, n_x, n_y, kk) = (args.n_g, args.n_x, args.n_y, args.rank);

    if n_g == 0 || n_x == 0 || n_y == 0 || kk == 0 {
        anyhow::bail!("empty simulation: {} x {} x {}, rank {}", n_g, n_x, n_y, kk);
    }
    if !(args.observed > 0. && args.observed <= 1.) {
        anyhow::bail!("observed fraction {} is not in (0, 1]", args.observed);
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(args.rseed);

    let gamma = Gamma::new(2_f32, 0.5_f32)?;
    let mut factor = |n: usize| Mat::from_fn(n, kk, |_, _| gamma.sample(&mut rng));
    let g_gk = factor(n_g);
    let x_xk = factor(n_x);
    let y_yk = factor(n_y);

    let truth = Array3::from_shape_fn((n_g, n_x, n_y), |(g, x, y)| {
        (0..kk).map(|k| g_gk[(g, k)] * x_xk[(x, k)] * y_yk[(y, k)]).sum::<f32>()
    });

    let runif = Uniform::new(0_f64, 1_f64)?;
    let noise = Normal::new(0_f32, args.noise.max(0.))?;

    let entries: Vec<(usize, usize, usize, f32)> = truth
        .indexed_iter()
        .filter_map(|((g, x, y), &v)| {
            if runif.sample(&mut rng) < args.observed {
                Some((g, x, y, (v + noise.sample(&mut rng)).max(0.)))
            } else {
                None
            }
        })
        .collect();

    info!(
        "simulated {} observed entries out of {} cells",
        entries.len(),
        truth.len()
    );

    Ok(SimOut {
        tensor: SparseTensor3::from_entries([n_g, n_x, n_y], entries)?,
        truth,
        gene_adj: chain_adjacency(n_g),
        spatial_adj: grid_adjacency(n_x, n_y),
    })
}
