use crate::candle_model_traits::FactorOut;
use candle_core::{Result, Tensor};

/// Row-wise Kronecker expansion of two factor matrices
///
/// xy[i * n_y + j, k] = x[i, k] * y[j, k]
///
/// * `x_xk` - (n_x x rank)
/// * `y_yk` - (n_y x rank)
///
pub fn kronecker_rows(x_xk: &Tensor, y_yk: &Tensor) -> Result<Tensor> {
    let (n_x, rank) = x_xk.dims2()?;
    let n_y = y_yk.dim(0)?;
    x_xk.unsqueeze(1)?
        .broadcast_mul(&y_yk.unsqueeze(0)?)?
        .reshape((n_x * n_y, rank))
}

/// Take entries of a dense tensor at row-major linear indexes
///
/// * `recon` - dense tensor of any shape
/// * `linear_index` - 1D index tensor (u32)
///
pub fn gather_linear(recon: &Tensor, linear_index: &Tensor) -> Result<Tensor> {
    recon.flatten_all()?.index_select(linear_index, 0)
}

/// Sum (not mean) of squared errors
///
/// sse = sum_i [ x(i) - xhat(i) ]^2
///
pub fn sum_squared_error(x_n: &Tensor, hat_n: &Tensor) -> Result<Tensor> {
    x_n.sub(hat_n)?.sqr()?.sum_all()
}

/// Smoothness of a CP tensor over the Cartesian product of the gene
/// graph and the spatial graph without forming the Kronecker Laplacian
///
/// sum( GᵗLG ⊙ XᵗX ⊙ YᵗY + GᵗG ⊙ (XY)ᵗL(XY) )
///
/// * `x_xk`, `y_yk`, `g_gk` - factor matrices
/// * `lap_gg` - gene graph Laplacian (n_g x n_g)
/// * `lap_mm` - spatial graph Laplacian (n_x*n_y x n_x*n_y)
///
pub fn cartesian_laplacian_penalty(
    x_xk: &Tensor,
    y_yk: &Tensor,
    g_gk: &Tensor,
    lap_gg: &Tensor,
    lap_mm: &Tensor,
) -> Result<Tensor> {
    let gt_lap_g = g_gk.t()?.matmul(&lap_gg.matmul(g_gk)?)?;
    let gt_g = g_gk.t()?.matmul(g_gk)?;
    let xt_x = x_xk.t()?.matmul(x_xk)?;
    let yt_y = y_yk.t()?.matmul(y_yk)?;

    let xy_mk = kronecker_rows(x_xk, y_yk)?;
    let xyt_lap_xy = xy_mk.t()?.matmul(&lap_mm.matmul(&xy_mk)?)?;

    let gene_term = gt_lap_g.mul(&xt_x)?.mul(&yt_y)?;
    let spatial_term = gt_g.mul(&xyt_lap_xy)?;
    gene_term.add(&spatial_term)?.sum_all()
}

/// Reconstruction loss on the observed entries plus the Cartesian
/// product graph Laplacian penalty
///
/// * `x_n` - observed values
/// * `linear_index` - their positions in the flattened tensor
/// * `out` - forward pass of the factor model
/// * `lambda` - weight on the graph penalty
///
pub fn graph_regularized_loss(
    x_n: &Tensor,
    linear_index: &Tensor,
    out: &FactorOut,
    lap_gg: &Tensor,
    lap_mm: &Tensor,
    lambda: f64,
) -> Result<Tensor> {
    let hat_n = gather_linear(&out.recon_gxy, linear_index)?;
    let recon_loss = sum_squared_error(x_n, &hat_n)?;
    let penalty = cartesian_laplacian_penalty(&out.x_xk, &out.y_yk, &out.g_gk, lap_gg, lap_mm)?;
    recon_loss.add(&(penalty * lambda)?)
}

/// Quadratic form of a dense tensor with the Cartesian product
/// Laplacian, computed directly on the reconstruction
///
/// vec(T)ᵗ (L_g ⊗ I + I ⊗ L_xy) vec(T)
///
/// Only for small tensors; used to check the factorized penalty.
pub fn kronecker_laplacian_quadratic(
    recon_gxy: &Tensor,
    lap_gg: &Tensor,
    lap_mm: &Tensor,
) -> Result<Tensor> {
    let (n_g, n_x, n_y) = recon_gxy.dims3()?;
    let t_gm = recon_gxy.reshape((n_g, n_x * n_y))?;
    let gene_term = t_gm.mul(&lap_gg.matmul(&t_gm)?)?.sum_all()?;
    let spatial_term = t_gm.mul(&t_gm.matmul(lap_mm)?)?.sum_all()?;
    gene_term.add(&spatial_term)
}
