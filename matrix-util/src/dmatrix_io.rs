use crate::common_io::{read_lines_of_types, write_lines, Delimiter};
use crate::traits::*;
pub use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::coo::CooMatrix;

impl IoOps for DMatrix<f32> {
    type Scalar = f32;
    type Mat = Self;

    fn read_file_delim(
        tsv_file: &str,
        delim: impl Into<Delimiter>,
        skip: Option<usize>,
    ) -> anyhow::Result<Self::Mat> {
        let hdr_line = match skip {
            Some(skip) => skip as i64,
            None => -1, // no skipping
        };

        let data = read_lines_of_types::<f32>(tsv_file, delim, hdr_line)?.lines;

        if data.is_empty() {
            return Err(anyhow::anyhow!("No data in file {}", tsv_file));
        }

        let ncols = data[0].len();
        let nrows = data.len();

        if let Some(i) = data.iter().position(|row| row.len() != ncols) {
            return Err(anyhow::anyhow!(
                "{}: row {} has {} columns, expected {}",
                tsv_file,
                i + 1,
                data[i].len(),
                ncols
            ));
        }

        let data = data.into_iter().flatten().collect::<Vec<_>>();

        Ok(DMatrix::<f32>::from_row_iterator(nrows, ncols, data))
    }

    fn write_file_delim(&self, tsv_file: &str, delim: &str) -> anyhow::Result<()> {
        // par_iter() or par_bridge() will
        // mess up the order of the rows
        let lines = self
            .row_iter()
            .map(|row| {
                row.iter()
                    .map(|x| format!("{}", *x))
                    .collect::<Vec<String>>()
                    .join(delim)
                    .into_boxed_str()
            })
            .collect::<Vec<_>>();

        write_lines(&lines, tsv_file)
    }
}

impl EdgeListOps for DMatrix<f32> {
    type Mat = Self;

    fn read_edge_list(file: &str, n: usize) -> anyhow::Result<Self::Mat> {
        let edges = read_lines_of_types::<f32>(file, &['\t', ',', ' '], -1)?.lines;

        let mut coo = CooMatrix::<f32>::new(n, n);

        for (line, words) in edges.iter().enumerate() {
            let (i, j, w) = match words.as_slice() {
                [i, j] => (*i, *j, 1_f32),
                [i, j, w] => (*i, *j, *w),
                _ => {
                    return Err(anyhow::anyhow!(
                        "{}: line {}: expected `i j [w]`",
                        file,
                        line + 1
                    ))
                }
            };

            if i < 0. || j < 0. || i.fract() != 0. || j.fract() != 0. {
                return Err(anyhow::anyhow!(
                    "{}: line {}: invalid vertex indexes ({}, {})",
                    file,
                    line + 1,
                    i,
                    j
                ));
            }

            let (i, j) = (i as usize, j as usize);
            if i >= n || j >= n {
                return Err(anyhow::anyhow!(
                    "{}: line {}: vertex out of range ({}, {}) vs. {}",
                    file,
                    line + 1,
                    i,
                    j,
                    n
                ));
            }

            coo.push(i, j, w);
            if i != j {
                coo.push(j, i, w);
            }
        }

        Ok(DMatrix::from(&coo))
    }
}
