//! Subcommand handlers. Each prints its operation report and returns
//! the success flag for the process exit code.

pub mod activate;
pub mod deploy;
pub mod list;
pub mod remove;
pub mod size;
pub mod validate;
pub mod verify;
