//! List and show commands.

use clap::Args;
use facedb::IdentityRecord;
use serde::Serialize;

use super::{load_config, output, print_success, with_store};
use crate::Cli;

/// List all registered persons.
#[derive(Args)]
pub struct ListCommand {}

/// Show one registered person, including the stored embedding.
#[derive(Args)]
pub struct ShowCommand {
    /// Person name
    name: String,
}

#[derive(Serialize)]
struct PersonSummary {
    name: String,
    image: String,
    confidence: f32,
}

#[derive(Serialize)]
struct ListResult {
    count: usize,
    persons: Vec<PersonSummary>,
}

impl From<&IdentityRecord> for PersonSummary {
    fn from(r: &IdentityRecord) -> Self {
        Self {
            name: r.name.clone(),
            image: r.source_image_path.clone(),
            confidence: r.confidence,
        }
    }
}

impl ListCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = load_config(cli)?;
        let persons: Vec<PersonSummary> = with_store(&cfg, |store| {
            Ok(store.records().iter().map(PersonSummary::from).collect())
        })?;

        print_success(&format!("Database contains {} person(s)", persons.len()));
        output(cli).write(&ListResult {
            count: persons.len(),
            persons,
        })
    }
}

impl ShowCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = load_config(cli)?;
        let record = with_store(&cfg, |store| Ok(store.get(&self.name).cloned()))?;

        match record {
            Some(r) => output(cli).write(&r),
            None => anyhow::bail!("person '{}' not found", self.name),
        }
    }
}
