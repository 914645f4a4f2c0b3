use crate::aiger::AigerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cut size {requested} exceeds the supported maximum of {max}")]
    CutSizeTooLarge { requested: u32, max: u32 },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("AIGER error: {0}")]
    Aiger(#[from] AigerError),
    #[error("node {node} has no match in the technology library")]
    Unmappable { node: u32 },
    #[error("GENLIB error on line {line}: {message}")]
    Genlib { line: usize, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Fails if `cut_size` is zero or larger than `max`.
pub(crate) fn check_cut_size(cut_size: u32, max: u32) -> Result<()> {
    if cut_size > max {
        return Err(Error::CutSizeTooLarge {
            requested: cut_size,
            max,
        });
    }
    if cut_size == 0 {
        return Err(Error::InvalidParameter("cut size must be at least 1".to_string()));
    }
    Ok(())
}
