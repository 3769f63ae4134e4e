//! Local face-identity registry.
//!
//! Stores named people as fixed-length embedding vectors in a line-oriented
//! text file and answers exact nearest-neighbor identity queries.
//!
//! # Usage
//!
//! ```no_run
//! use facedb::{FeatureStore, StoreOptions};
//!
//! let mut store = FeatureStore::open_with("faces.txt", StoreOptions { dim: 4, ..Default::default() })?;
//! store.upsert("alice", "alice.jpg", &[0.5, 0.5, 0.5, 0.5], 0.99)?;
//!
//! let m = store.identify(&[0.5, 0.5, 0.5, 0.5], 0.6);
//! assert_eq!(m.name, "alice");
//! # Ok::<(), facedb::StoreError>(())
//! ```
//!
//! Scores are raw dot products. Embeddings that should compare by cosine
//! similarity must be unit length before they reach the store; see
//! [`l2_normalize`].

pub mod codec;
mod error;
mod record;
mod similarity;
mod store;

pub use codec::{LoadPolicy, LoadReport};
pub use error::{Result, StoreError};
pub use record::{FIELD_SEPARATOR, IdentityRecord, Match, UNKNOWN, validate_name};
pub use similarity::{dot, l2_normalize, normalized};
pub use store::{DEFAULT_DIM, FeatureStore, StoreOptions, Upsert};
