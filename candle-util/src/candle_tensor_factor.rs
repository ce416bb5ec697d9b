use crate::candle_loss_functions::kronecker_rows;
use crate::candle_model_traits::*;
use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

////////////////////////////////
// CP tensor factor model     //
////////////////////////////////

/// T[g,x,y] = sum_k G[g,k] * X[x,k] * Y[y,k]
#[derive(Clone, Debug)]
pub struct TensorFactorModel {
    n_x: usize,
    n_y: usize,
    n_g: usize,
    rank: usize,
    x_xk: Tensor,
    y_yk: Tensor,
    g_gk: Tensor,
}

impl TensorFactorModel {
    /// Will create a new factor model with the following parameters:
    /// * `x` (n_x x rank)
    /// * `y` (n_y x rank)
    /// * `g` (n_g x rank)
    pub fn new(n_x: usize, n_y: usize, n_g: usize, rank: usize, vb: VarBuilder) -> Result<Self> {
        let init = candle_nn::Init::Uniform { lo: 0.0, up: 1.0 };
        let x_xk = vb.get_with_hints((n_x, rank), "x", init)?;
        let y_yk = vb.get_with_hints((n_y, rank), "y", init)?;
        let g_gk = vb.get_with_hints((n_g, rank), "g", init)?;

        Ok(Self {
            n_x,
            n_y,
            n_g,
            rank,
            x_xk,
            y_yk,
            g_gk,
        })
    }
}

impl TensorFactorModelT for TensorFactorModel {
    fn forward_t(
        &self,
        x_index: &Tensor,
        y_index: &Tensor,
        g_index: &Tensor,
        train: bool,
    ) -> Result<FactorOut> {
        let mut x_xk = self.x_xk.index_select(x_index, 0)?;
        let mut y_yk = self.y_yk.index_select(y_index, 0)?;
        let mut g_gk = self.g_gk.index_select(g_index, 0)?;

        if !train {
            x_xk = x_xk.detach();
            y_yk = y_yk.detach();
            g_gk = g_gk.detach();
        }

        let (n_x, n_y, n_g) = (x_xk.dim(0)?, y_yk.dim(0)?, g_gk.dim(0)?);

        // (g, k) x (k, x*y) -> (g, x, y)
        let xy_mk = kronecker_rows(&x_xk, &y_yk)?;
        let recon_gxy = g_gk.matmul(&xy_mk.t()?)?.reshape((n_g, n_x, n_y))?;

        Ok(FactorOut {
            x_xk,
            y_yk,
            g_gk,
            recon_gxy,
        })
    }

    fn dim_x(&self) -> usize {
        self.n_x
    }

    fn dim_y(&self) -> usize {
        self.n_y
    }

    fn dim_g(&self) -> usize {
        self.n_g
    }

    fn rank(&self) -> usize {
        self.rank
    }
}
