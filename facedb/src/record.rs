use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Field delimiter of the on-disk line format.
pub const FIELD_SEPARATOR: char = '|';

/// Name reported when no stored identity clears the threshold.
pub const UNKNOWN: &str = "Unknown";

/// One registered person.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Unique, case-sensitive key.
    pub name: String,

    /// Image the embedding was taken from. Provenance only.
    pub source_image_path: String,

    /// Face embedding, exactly `dim` elements.
    pub embedding: Vec<f32>,

    /// Detector confidence at registration time. Not used in matching.
    pub confidence: f32,
}

impl IdentityRecord {
    pub fn new(
        name: impl Into<String>,
        source_image_path: impl Into<String>,
        embedding: Vec<f32>,
        confidence: f32,
    ) -> Self {
        Self {
            name: name.into(),
            source_image_path: source_image_path.into(),
            embedding,
            confidence,
        }
    }

    /// Check that the record can be stored in a store of dimension `dim`
    /// and written back without loss.
    ///
    /// The [`UNKNOWN`] sentinel is reserved for new records; files that
    /// already hold such a name still load.
    pub fn validate(&self, dim: usize) -> Result<()> {
        if self.embedding.len() != dim {
            return Err(StoreError::DimensionMismatch {
                got: self.embedding.len(),
                want: dim,
            });
        }
        validate_name(&self.name)?;
        if self.name == UNKNOWN {
            return Err(StoreError::InvalidName(self.name.clone()));
        }
        validate_text("source_image_path", &self.source_image_path)
    }
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("name", &self.name)
            .field("source_image_path", &self.source_image_path)
            .field("confidence", &self.confidence)
            .field("embedding_len", &self.embedding.len())
            .finish()
    }
}

/// Names are non-empty and must not contain the field separator or line breaks.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains([FIELD_SEPARATOR, '\n', '\r']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn validate_text(field: &'static str, value: &str) -> Result<()> {
    if value.contains([FIELD_SEPARATOR, '\n', '\r']) {
        return Err(StoreError::InvalidField {
            field,
            reason: format!("must not contain '{FIELD_SEPARATOR}' or line breaks"),
        });
    }
    Ok(())
}

/// Result of an identity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Matched identity, or [`UNKNOWN`].
    pub name: String,

    /// Dot-product score of the match; 0.0 when unknown.
    pub score: f32,
}

impl Match {
    /// The "no match" sentinel.
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            score: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN && self.score == 0.0
    }
}
