//! Subprocess execution

pub mod runner;

pub use runner::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
