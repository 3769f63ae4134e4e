//! Face embedder contract consumed by the facedb command line.
//!
//! Detection and encoding models live outside this workspace. The
//! [`SidecarEmbedder`] reads their precomputed output from a file next to
//! each image.

pub mod embed;
pub mod error;
pub mod sidecar;

pub use embed::{BoundingBox, Embedder, Face};
pub use error::EmbedError;
pub use sidecar::SidecarEmbedder;
