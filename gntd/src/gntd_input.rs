use crate::gntd_common::*;
use crate::imputer::{FactorMatrices, TrainingReport};

use matrix_util::common_io::{mkdir, read_lines_of_types, write_lines};
use matrix_util::traits::{EdgeListOps, IoOps};
use ndarray::Array3;

const TENSOR_DELIMITERS: [char; 3] = ['\t', ',', ' '];

fn as_index(v: f64, what: &str, line: usize) -> anyhow::Result<usize> {
    if v < 0. || v.fract() != 0. {
        anyhow::bail!("line {}: invalid {} index {}", line, what, v);
    }
    Ok(v as usize)
}

/// Read a sparse expression tensor, one `g x y value` entry per line
///
/// * `file` - plain or gzipped text
/// * `shape` - `[n_g, n_x, n_y]`; inferred from the largest indexes if `None`
///
pub fn read_expression_tensor(file: &str, shape: Option<[usize; 3]>) -> anyhow::Result<SparseTensor3> {
    let lines = read_lines_of_types::<f64>(file, &TENSOR_DELIMITERS, -1)?.lines;

    let mut entries = Vec::with_capacity(lines.len());
    for (i, words) in lines.iter().enumerate() {
        let line = i + 1;
        match words.as_slice() {
            [g, x, y, v] => entries.push((
                as_index(*g, "gene", line)?,
                as_index(*x, "x", line)?,
                as_index(*y, "y", line)?,
                *v as f32,
            )),
            _ => anyhow::bail!("{}: line {}: expected `g x y value`", file, line),
        }
    }

    let shape = match shape {
        Some(shape) => shape,
        None => {
            let mut shape = [0usize; 3];
            for &(g, x, y, _) in entries.iter() {
                shape[0] = shape[0].max(g + 1);
                shape[1] = shape[1].max(x + 1);
                shape[2] = shape[2].max(y + 1);
            }
            info!("inferred tensor shape {:?} from {}", shape, file);
            shape
        }
    };

    let tensor = SparseTensor3::from_entries(shape, entries)?;
    info!(
        "read {} observed entries of a {:?} tensor from {}",
        tensor.nnz(),
        shape,
        file
    );
    Ok(tensor)
}

/// Read an `n x n` adjacency matrix, either a dense matrix or an
/// `i j [w]` edge list
pub fn read_adjacency(file: &str, n: usize, edge_list: bool) -> anyhow::Result<Mat> {
    let adj = if edge_list {
        Mat::read_edge_list(file, n)?
    } else {
        Mat::from_tsv(file, None)?
    };
    info!("read a {} x {} adjacency matrix from {}", adj.nrows(), adj.ncols(), file);
    Ok(adj)
}

/// Write the observed entries as `g x y value` lines
pub fn write_expression_tensor(tensor: &SparseTensor3, file: &str) -> anyhow::Result<()> {
    mkdir(file)?;
    let lines: Vec<Box<str>> = tensor
        .indices()
        .iter()
        .zip(tensor.values())
        .map(|([g, x, y], v)| format!("{}\t{}\t{}\t{}", g, x, y, v).into_boxed_str())
        .collect();
    write_lines(&lines, file)
}

/// Write every cell of the dense tensor as a `g x y value` line
pub fn write_imputed_tensor(imputed: &Array3<f32>, file: &str) -> anyhow::Result<()> {
    mkdir(file)?;
    let lines: Vec<Box<str>> = imputed
        .indexed_iter()
        .map(|((g, x, y), v)| format!("{}\t{}\t{}\t{}", g, x, y, v).into_boxed_str())
        .collect();
    write_lines(&lines, file)
}

pub fn write_training_report(report: &TrainingReport, file: &str) -> anyhow::Result<()> {
    mkdir(file)?;
    write_lines(&report.to_lines(), file)
}

/// Write `{out}.g_factor.tsv.gz`, `{out}.x_factor.tsv.gz` and
/// `{out}.y_factor.tsv.gz`
pub fn write_factor_matrices(factors: &FactorMatrices, out: &str) -> anyhow::Result<()> {
    for (name, mat) in [("g", &factors.g), ("x", &factors.x), ("y", &factors.y)] {
        let file = format!("{}.{}_factor.tsv.gz", out, name);
        mkdir(&file)?;
        mat.to_tsv(&file)?;
    }
    Ok(())
}
