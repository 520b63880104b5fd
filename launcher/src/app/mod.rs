//! Application wiring: options, settings file, collaborators and the run entry point

pub mod options;
pub mod run;
pub mod settings;
pub mod state;
