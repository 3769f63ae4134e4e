//! CLI commands module.

mod config;
mod list;
mod recognize;
mod register;
mod remove;
mod util;

pub use config::{ConfigCommand, InfoCommand};
pub use list::{ListCommand, ShowCommand};
pub use recognize::RecognizeCommand;
pub use register::RegisterCommand;
pub use remove::{ClearCommand, RemoveCommand};

pub(crate) use util::*;
