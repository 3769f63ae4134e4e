use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EmbedError;

/// Axis-aligned face box in image pixels, (x0, y0) top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x1 - self.x0).max(0.0) * (self.y1 - self.y0).max(0.0)
    }
}

/// One detected face with its identity embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub embedding: Vec<f32>,

    /// Detector confidence in [0, 1].
    pub confidence: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,

    /// Facial landmarks as (x, y) points, typically eyes, nose and mouth corners.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub landmarks: Vec<[f32; 2]>,
}

/// Embedder detects faces in an image and encodes each into a fixed-length
/// vector. Output is deterministic for a given image.
pub trait Embedder: Send + Sync {
    /// Return every face found in `image`, in detector order.
    fn detect(&self, image: &Path) -> Result<Vec<Face>, EmbedError>;

    /// Return the dimensionality of the output vectors.
    fn dimension(&self) -> usize;

    /// Return the most confident face in `image`.
    fn best_face(&self, image: &Path) -> Result<Face, EmbedError> {
        self.detect(image)?
            .into_iter()
            .reduce(|best, f| if f.confidence > best.confidence { f } else { best })
            .ok_or_else(|| EmbedError::NoFace(image.to_path_buf()))
    }
}
