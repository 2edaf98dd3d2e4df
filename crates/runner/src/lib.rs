//! Command-line inference backend.
//!
//! Runs operator-configured external programs (model inference scripts) as
//! child processes, one per job, exchanging data through files in the job's
//! workspace.

pub mod command;
pub mod config;
pub mod subprocess;
