//! facedb - register people by face embedding and recognize them later.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use facedb::StoreError;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    ClearCommand, ConfigCommand, InfoCommand, ListCommand, RecognizeCommand, RegisterCommand,
    RemoveCommand, ShowCommand,
};

/// facedb - local face identity registry.
///
/// Faces are detected and encoded outside this tool; for every image the
/// detections are read from a sidecar file (`<image>.faces.json` or
/// `.faces.yaml`).
///
/// Configuration is read from --config, or ~/.facedb/config.yaml when present.
#[derive(Parser)]
#[command(name = "facedb")]
#[command(about = "Face identity registry")]
#[command(version)]
pub struct Cli {
    /// Config file, JSON or YAML (default is ~/.facedb/config.yaml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<PathBuf>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a person from an image
    Register(RegisterCommand),
    /// Recognize the people in an image
    Recognize(RecognizeCommand),
    /// List all registered persons
    List(ListCommand),
    /// Show one registered person
    Show(ShowCommand),
    /// Remove a person from the database
    Remove(RemoveCommand),
    /// Remove every person from the database
    Clear(ClearCommand),
    /// Show database status
    Info(InfoCommand),
    /// Print the effective configuration
    Config(ConfigCommand),
}

/// Exit status for rejected input (bad name, wrong dimension).
const EXIT_INVALID_INPUT: i32 = 2;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Register(cmd) => cmd.run(&cli),
        Commands::Recognize(cmd) => cmd.run(&cli),
        Commands::List(cmd) => cmd.run(&cli),
        Commands::Show(cmd) => cmd.run(&cli),
        Commands::Remove(cmd) => cmd.run(&cli),
        Commands::Clear(cmd) => cmd.run(&cli),
        Commands::Info(cmd) => cmd.run(&cli),
        Commands::Config(cmd) => cmd.run(&cli),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(exit_code(&e));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    let input = err
        .chain()
        .find_map(|c| c.downcast_ref::<StoreError>())
        .is_some_and(StoreError::is_input_error);
    if input { EXIT_INVALID_INPUT } else { 1 }
}
