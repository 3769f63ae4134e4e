//! Remove and clear commands.

use clap::Args;
use serde::Serialize;

use super::{load_config, output, print_success, print_warning, with_store};
use crate::Cli;

/// Remove a person from the database.
#[derive(Args)]
pub struct RemoveCommand {
    /// Person name
    name: String,
}

/// Remove every person from the database.
#[derive(Args)]
pub struct ClearCommand {
    /// Confirm removal of all persons
    #[arg(long)]
    yes: bool,
}

#[derive(Serialize)]
struct RemoveResult<'a> {
    name: &'a str,
    removed: bool,
}

#[derive(Serialize)]
struct ClearResult {
    removed: usize,
}

impl RemoveCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = load_config(cli)?;
        let removed = with_store(&cfg, |store| Ok(store.remove(&self.name)?))?;

        if removed {
            print_success(&format!("Removed {} from database", self.name));
        } else {
            print_warning(&format!("Person not found: {}", self.name));
        }
        output(cli).write(&RemoveResult {
            name: &self.name,
            removed,
        })
    }
}

impl ClearCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        if !self.yes {
            anyhow::bail!("refusing to clear the database without --yes");
        }

        let cfg = load_config(cli)?;
        let removed = with_store(&cfg, |store| {
            let n = store.len();
            store.clear()?;
            Ok(n)
        })?;

        print_success(&format!("Cleared {} person(s)", removed));
        output(cli).write(&ClearResult { removed })
    }
}
