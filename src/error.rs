use std::path::PathBuf;

use crate::parse::ParseError;
use crate::types::Length;

/// Errors surfaced at the boundary between the optimizer and its callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("length must be greater than 0, got {0}")]
    InvalidLength(f64),

    #[error("'{0}' is not a number")]
    InvalidNumber(String),

    #[error("quantity must be greater than 0 for length {0}")]
    ZeroQuantity(Length),

    #[error("total quantity for length {0} exceeds {max}", max = u32::MAX)]
    QuantityOverflow(Length),

    #[error("stock catalog must contain at least one length")]
    EmptyCatalog,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("could not access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
