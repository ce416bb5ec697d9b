use crate::traits::*;
use candle_util::candle_core::{DType, Device, Tensor};
use nalgebra::DMatrix;

impl ConvertMatOps for DMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn from_tensor(tensor: &Tensor) -> anyhow::Result<Self::Mat> {
        let (nrow, ncol) = tensor.dims2()?;
        let data = tensor
            .to_device(&Device::Cpu)?
            .to_dtype(DType::F32)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        Ok(DMatrix::<f32>::from_row_iterator(nrow, ncol, data))
    }

    /// `nalgebra` stores column-major; the tensor is row-major
    fn to_tensor(&self, dev: &Device) -> anyhow::Result<Tensor> {
        let data = self.transpose().as_slice().to_vec();
        Ok(Tensor::from_vec(data, (self.nrows(), self.ncols()), dev)?)
    }
}
