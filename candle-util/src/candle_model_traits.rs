use candle_core::{Result, Tensor};

/// Output of one forward pass of a tensor factor model
pub struct FactorOut {
    /// spatial x factors (n_x x rank)
    pub x_xk: Tensor,
    /// spatial y factors (n_y x rank)
    pub y_yk: Tensor,
    /// gene factors (n_g x rank)
    pub g_gk: Tensor,
    /// dense reconstruction (n_g x n_x x n_y)
    pub recon_gxy: Tensor,
}

pub trait TensorFactorModelT {
    /// Reconstruct the dense tensor over the given index ranges
    ///
    /// # Arguments
    /// * `x_index` - indexes along the spatial x axis (u32)
    /// * `y_index` - indexes along the spatial y axis (u32)
    /// * `g_index` - indexes along the gene axis (u32)
    /// * `train` - keep the computation graph for back-propagation
    ///
    /// # Returns `FactorOut`
    fn forward_t(
        &self,
        x_index: &Tensor,
        y_index: &Tensor,
        g_index: &Tensor,
        train: bool,
    ) -> Result<FactorOut>;

    fn dim_x(&self) -> usize;

    fn dim_y(&self) -> usize;

    fn dim_g(&self) -> usize;

    fn rank(&self) -> usize;
}
