use crate::common_io::Delimiter;
use candle_util::candle_core::{Device, Tensor};

/// Reading off from `Tensor`
pub trait ConvertMatOps {
    type Mat;
    type Scalar;

    fn from_tensor(_: &Tensor) -> anyhow::Result<Self::Mat>;
    fn to_tensor(&self, dev: &Device) -> anyhow::Result<Tensor>;
}

/// Read and write matrices from and to files
pub trait IoOps {
    type Scalar;
    type Mat;

    fn read_file_delim(
        file: &str,
        delim: impl Into<Delimiter>,
        skip: Option<usize>,
    ) -> anyhow::Result<Self::Mat>;

    fn from_tsv(tsv_file: &str, skip: Option<usize>) -> anyhow::Result<Self::Mat> {
        Self::read_file_delim(tsv_file, "\t", skip)
    }

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()>;

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(tsv_file, "\t")
    }
}

/// Build a square matrix from a list of weighted edges
pub trait EdgeListOps {
    type Mat;

    /// Read `i j w` lines (`w` defaults to 1); both `(i,j)` and
    /// `(j,i)` are filled and duplicates are added up.
    ///
    /// * `file` - edge list file--either gzipped or not
    /// * `n` - number of vertices
    fn read_edge_list(file: &str, n: usize) -> anyhow::Result<Self::Mat>;
}
