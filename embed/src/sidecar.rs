use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::embed::{Embedder, Face};
use crate::error::EmbedError;

/// Sidecar extensions tried in order, appended to the full image file name.
const SIDECAR_SUFFIXES: [&str; 3] = [".faces.json", ".faces.yaml", ".faces.yml"];

#[derive(Debug, Deserialize)]
struct SidecarFile {
    #[serde(default)]
    faces: Vec<Face>,
}

/// Embedder that reads detector/encoder output produced offline.
///
/// For `photos/john.jpg` it loads `photos/john.jpg.faces.json` (or
/// `.faces.yaml` / `.faces.yml`):
///
/// ```yaml
/// faces:
///   - confidence: 0.998
///     bbox: { x0: 10, y0: 20, x1: 110, y1: 140 }
///     embedding: [0.013, -0.057, ...]
/// ```
pub struct SidecarEmbedder {
    dim: usize,
}

impl SidecarEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Returns the first existing sidecar path for `image`.
    pub fn sidecar_path(image: &Path) -> Option<PathBuf> {
        SIDECAR_SUFFIXES.iter().map(|s| with_suffix(image, s)).find(|p| p.exists())
    }

    fn parse(&self, path: &Path, data: &[u8]) -> Result<Vec<Face>, EmbedError> {
        let format_err = |reason: String| EmbedError::Format {
            path: path.to_path_buf(),
            reason,
        };

        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let file: SidecarFile = match ext {
            "json" => serde_json::from_slice(data).map_err(|e| format_err(e.to_string()))?,
            _ => serde_yaml::from_slice(data).map_err(|e| format_err(e.to_string()))?,
        };

        for (index, face) in file.faces.iter().enumerate() {
            if face.embedding.len() != self.dim {
                return Err(EmbedError::DimensionMismatch {
                    index,
                    got: face.embedding.len(),
                    want: self.dim,
                });
            }
            if !(0.0..=1.0).contains(&face.confidence) {
                return Err(format_err(format!(
                    "face {index}: confidence {} outside [0, 1]",
                    face.confidence
                )));
            }
        }
        Ok(file.faces)
    }
}

impl Embedder for SidecarEmbedder {
    fn detect(&self, image: &Path) -> Result<Vec<Face>, EmbedError> {
        let path = Self::sidecar_path(image).ok_or_else(|| EmbedError::Io {
            path: with_suffix(image, SIDECAR_SUFFIXES[0]),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no sidecar detections"),
        })?;
        let data = std::fs::read(&path).map_err(|source| EmbedError::Io {
            path: path.clone(),
            source,
        })?;
        self.parse(&path, &data)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

fn with_suffix(image: &Path, suffix: &str) -> PathBuf {
    let mut s = image.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}
