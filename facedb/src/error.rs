use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by feature store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("facedb: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("facedb: invalid name {0:?}")]
    InvalidName(String),

    #[error("facedb: invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("facedb: cannot persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("facedb: cannot read {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("facedb: line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

impl StoreError {
    /// True for errors raised before any state was touched.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            StoreError::DimensionMismatch { .. }
                | StoreError::InvalidName(_)
                | StoreError::InvalidField { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
