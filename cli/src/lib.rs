//! Configuration and output utilities for the facedb command line.

pub mod config;
pub mod output;

pub use config::{Config, ConfigError, Paths, Settings, StoreSettings, Thresholds};
pub use output::{Output, OutputFormat, print_verbose};
