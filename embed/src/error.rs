use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embed: no face detected in {}", .0.display())]
    NoFace(PathBuf),

    #[error("embed: cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embed: invalid detections in {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("embed: dimension mismatch for face {index}: got {got}, want {want}")]
    DimensionMismatch { index: usize, got: usize, want: usize },
}
