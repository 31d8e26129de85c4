use bilgrid::BilError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElevationError {
    #[error("missing required parameters")]
    Builder,

    #[error("{0}")]
    Bil(#[from] BilError),
}
