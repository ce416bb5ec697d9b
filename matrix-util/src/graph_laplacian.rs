use log::warn;
use nalgebra::{DMatrix, DVector};

pub type Mat = DMatrix<f32>;

const SYMMETRY_TOL: f32 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LaplacianKind {
    /// L = D - A
    #[default]
    Combinatorial,
    /// L = I - D^{-1/2} A D^{-1/2}; isolated vertices get a zero row
    SymmetricNormalized,
}

/// Check that `adj` is a valid weighted adjacency matrix: square,
/// finite, non-negative and symmetric.
pub fn check_adjacency(adj: &Mat) -> anyhow::Result<()> {
    let n = adj.nrows();
    if adj.ncols() != n {
        anyhow::bail!("adjacency matrix is not square: {} x {}", n, adj.ncols());
    }

    if let Some(bad) = adj.iter().find(|a| !a.is_finite() || **a < 0.) {
        anyhow::bail!("adjacency matrix has an invalid weight: {}", bad);
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let (a_ij, a_ji) = (adj[(i, j)], adj[(j, i)]);
            if (a_ij - a_ji).abs() > SYMMETRY_TOL * a_ij.abs().max(a_ji.abs()).max(1.) {
                anyhow::bail!(
                    "adjacency matrix is not symmetric at ({}, {}): {} vs. {}",
                    i,
                    j,
                    a_ij,
                    a_ji
                );
            }
        }
    }
    Ok(())
}

/// Graph Laplacian of a weighted adjacency matrix
///
/// * `adj` - symmetric, non-negative adjacency (n x n)
/// * `kind` - combinatorial or symmetric-normalized
///
pub fn graph_laplacian(adj: &Mat, kind: LaplacianKind) -> anyhow::Result<Mat> {
    check_adjacency(adj)?;

    let n = adj.nrows();
    let degree: DVector<f32> = DVector::from_iterator(n, adj.row_iter().map(|r| r.sum()));

    let lap = match kind {
        LaplacianKind::Combinatorial => Mat::from_diagonal(&degree) - adj,
        LaplacianKind::SymmetricNormalized => {
            let isolated = degree.iter().filter(|&&d| d <= 0.).count();
            if isolated > 0 {
                warn!("{} isolated vertices have zero Laplacian rows", isolated);
            }
            let d_inv_sqrt = degree.map(|d| if d > 0. { 1.0 / d.sqrt() } else { 0. });
            let eye = Mat::from_diagonal(&degree.map(|d| if d > 0. { 1. } else { 0. }));
            let d_inv_sqrt = Mat::from_diagonal(&d_inv_sqrt);
            eye - &d_inv_sqrt * adj * &d_inv_sqrt
        }
    };

    Ok(lap)
}

/// Quadratic form `vᵗ L v`
pub fn laplacian_quadratic(lap: &Mat, v: &DVector<f32>) -> f32 {
    v.dot(&(lap * v))
}
