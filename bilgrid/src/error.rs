use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BilError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("position {x}, {y} is outside the grid footprint")]
    OutOfBounds { x: f64, y: f64 },

    #[error("grid file {path} is {actual} bytes, expected {expected}")]
    GridLen {
        path: PathBuf,
        actual: u64,
        expected: u64,
    },
}
