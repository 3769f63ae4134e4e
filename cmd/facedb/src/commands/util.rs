//! Utility functions for CLI commands.

use anyhow::Context;
use facedb::FeatureStore;
use facedb_cli::{Config, Output, OutputFormat};
use facedb_embed::SidecarEmbedder;

use crate::Cli;

/// Loads the configuration and creates the configured directories.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let cfg = Config::load_or_default(cli.config.as_deref()).context("loading config")?;
    print_verbose(
        cli,
        &format!(
            "Using config: {}",
            cfg.path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<defaults>".into())
        ),
    );
    if cfg.settings.create_directories {
        cfg.create_directories()?;
    }
    tracing::debug!(database = %cfg.database_file().display(), "facedb: database file");
    Ok(cfg)
}

/// Runs `f` against the configured feature store; the store is flushed on
/// every exit path.
pub fn with_store<T>(
    cfg: &Config,
    f: impl FnOnce(&mut FeatureStore) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let path = cfg.database_file();
    FeatureStore::session(&path, cfg.store_options(), f)
        .with_context(|| format!("database {}", path.display()))
}

/// Creates the embedder matching the configured dimension.
pub fn create_embedder(cfg: &Config) -> SidecarEmbedder {
    SidecarEmbedder::new(cfg.store.dim)
}

/// Applies the configured embedding preprocessing.
pub fn prepare_embedding(cfg: &Config, embedding: Vec<f32>) -> Vec<f32> {
    if cfg.settings.normalize_embeddings {
        facedb::normalized(&embedding)
    } else {
        embedding
    }
}

/// Output destination selected by the global flags.
pub fn output(cli: &Cli) -> Output {
    Output::new(OutputFormat::from_json_flag(cli.json), cli.output.clone())
}

/// Prints verbose message.
pub fn print_verbose(cli: &Cli, msg: &str) {
    facedb_cli::print_verbose(cli.verbose, msg);
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints warning message.
pub fn print_warning(msg: &str) {
    eprintln!("\x1b[33m⚠\x1b[0m {}", msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_embedding() {
        let mut cfg = Config::default();
        assert_eq!(prepare_embedding(&cfg, vec![3.0, 4.0]), vec![3.0, 4.0]);

        cfg.settings.normalize_embeddings = true;
        let v = prepare_embedding(&cfg, vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }
}
