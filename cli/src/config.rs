//! Configuration for the facedb command line.
//!
//! Read once at startup from JSON or YAML (chosen by file extension) and
//! passed down by value; nothing here is global. Keys from the legacy
//! `config.json` layout are accepted, unknown sections (model paths) are
//! ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use facedb::{LoadPolicy, StoreOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".facedb";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Default database filename inside `paths.database`.
pub const DEFAULT_DATABASE_FILE: &str = "face_database.txt";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot determine config path")]
    NoHomeDir,
}

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub images: PathBuf,
    pub test_images: PathBuf,
    /// Recognition reports.
    pub results: PathBuf,
    /// Per-person detection dumps.
    pub features: PathBuf,
    /// Directory holding the database file.
    pub database: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            images: "images".into(),
            test_images: "test_images".into(),
            results: "results".into(),
            features: "features".into(),
            database: "database".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum dot-product score accepted as a match.
    pub face_similarity: f32,
    /// Faces detected below this confidence are ignored.
    pub detection_confidence: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            face_similarity: 0.6,
            detection_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Create every configured directory at startup.
    pub create_directories: bool,
    /// Write the registered face's detection to `paths.features`.
    pub save_detected_faces: bool,
    /// Write recognition reports to `paths.results`.
    pub save_detection_boxes: bool,
    /// L2-normalize embeddings before they reach the store, so scores
    /// behave as cosine similarity.
    pub normalize_embeddings: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub dim: usize,
    pub load_policy: LoadPolicy,
    pub file_name: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            dim: facedb::DEFAULT_DIM,
            load_policy: LoadPolicy::Lenient,
            file_name: DEFAULT_DATABASE_FILE.to_string(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: Paths,
    pub thresholds: Thresholds,
    pub settings: Settings,
    pub store: StoreSettings,

    /// Path the config was loaded from (not serialized).
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Config {
    /// Gets the default config directory (~/.facedb).
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR))
    }

    /// Gets the default config file path (~/.facedb/config.yaml).
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Loads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::parse(&data, path)?;
        cfg.config_path = Some(path.to_path_buf());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads `custom_path` if given, else the default path if it exists,
    /// else the built-in defaults.
    pub fn load_or_default(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(p) = custom_path {
            return Self::load(p);
        }
        match Self::default_config_path() {
            Some(p) if p.exists() => Self::load(p),
            _ => Ok(Self::default()),
        }
    }

    /// Parses config data based on file extension; anything other than
    /// `.json` is read as YAML, which also accepts JSON.
    pub fn parse(data: &[u8], path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("json") => Ok(serde_json::from_slice(data)?),
            _ => Ok(serde_yaml::from_slice(data)?),
        }
    }

    /// Checks value ranges and path sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if !t.face_similarity.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "thresholds.face_similarity must be finite, got {}",
                t.face_similarity
            )));
        }
        if !(0.0..=1.0).contains(&t.detection_confidence) {
            return Err(ConfigError::Invalid(format!(
                "thresholds.detection_confidence must be in [0, 1], got {}",
                t.detection_confidence
            )));
        }
        if self.store.dim == 0 {
            return Err(ConfigError::Invalid("store.dim must be positive".into()));
        }
        let name = &self.store.file_name;
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "store.file_name must be a plain file name, got {name:?}"
            )));
        }
        Ok(())
    }

    /// Returns the path the config was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Returns the database file path.
    pub fn database_file(&self) -> PathBuf {
        self.paths.database.join(&self.store.file_name)
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.paths.images.join(name)
    }

    pub fn result_path(&self, name: &str) -> PathBuf {
        self.paths.results.join(name)
    }

    pub fn feature_path(&self, name: &str) -> PathBuf {
        self.paths.features.join(name)
    }

    /// Options for opening the feature store.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            dim: self.store.dim,
            policy: self.store.load_policy,
            create_dirs: self.settings.create_directories,
        }
    }

    /// Creates every configured directory, stopping at the first failure.
    pub fn create_directories(&self) -> Result<(), ConfigError> {
        let p = &self.paths;
        for dir in [&p.images, &p.test_images, &p.results, &p.features, &p.database] {
            if dir.as_os_str().is_empty() {
                continue;
            }
            fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
