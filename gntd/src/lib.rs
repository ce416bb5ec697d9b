pub mod gntd_common;
pub mod gntd_error;
pub mod gntd_input;
pub mod imputer;
pub mod simulate;
pub mod sparse_split;
