//! DIRBS Core command-line entry point (spec.md §1, §6): the process
//! that wires `RunContext`, a `DbClient`, and the parsed [`cli::Cli`]
//! into one of the subcommand handlers under [`commands`].

pub mod cli;
pub mod commands;
pub mod error;
pub mod list_registry;

pub use cli::Cli;
pub use error::DirbsError;
