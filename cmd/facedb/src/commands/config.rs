//! Config and info commands.

use clap::Args;
use facedb::LoadReport;
use serde::Serialize;

use super::{load_config, output, with_store};
use crate::Cli;

/// Print the effective configuration after defaults are applied.
#[derive(Args)]
pub struct ConfigCommand {}

/// Show database location, size and load statistics.
#[derive(Args)]
pub struct InfoCommand {}

#[derive(Serialize)]
struct DatabaseInfo {
    path: String,
    persons: usize,
    dim: usize,
    load: LoadReport,
}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = load_config(cli)?;
        output(cli).write(&cfg)
    }
}

impl InfoCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = load_config(cli)?;
        let info = with_store(&cfg, |store| {
            Ok(DatabaseInfo {
                path: store.path().display().to_string(),
                persons: store.len(),
                dim: store.dim(),
                load: store.load_report(),
            })
        })?;
        output(cli).write(&info)
    }
}
